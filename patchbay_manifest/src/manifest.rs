//====================================================================

use std::{collections::HashMap, hash::BuildHasherDefault, path::Path};

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

//====================================================================

pub(crate) type Hasher = BuildHasherDefault<FxHasher>;

const FLAG_ENCRYPTED: u32 = 1 << 0;
const FLAG_BUILDIN: u32 = 1 << 1;
const FLAG_RAW_FILE: u32 = 1 << 2;

//====================================================================

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("asset path already exists in manifest: '{0}'")]
    DuplicateAssetPath(String),

    #[error("bundle name already exists in manifest: '{0}'")]
    DuplicateBundleName(String),

    #[error("invalid bundle id '{id}' for asset path '{asset_path}'")]
    InvalidBundleId { id: u32, asset_path: String },

    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//====================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchBundle {
    pub bundle_name: String,
    pub hash: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub version: u32,
    pub tags: Vec<String>,
    pub flags: u32,

    #[serde(skip)]
    is_encrypted: bool,
    #[serde(skip)]
    is_buildin: bool,
    #[serde(skip)]
    is_raw_file: bool,
}

impl PatchBundle {
    pub fn new(
        bundle_name: impl Into<String>,
        hash: impl Into<String>,
        checksum: impl Into<String>,
        size_bytes: u64,
        version: u32,
        tags: Vec<String>,
    ) -> Self {
        Self {
            bundle_name: bundle_name.into(),
            hash: hash.into(),
            checksum: checksum.into(),
            size_bytes,
            version,
            tags,
            flags: 0,
            is_encrypted: false,
            is_buildin: false,
            is_raw_file: false,
        }
    }

    pub fn set_flags(&mut self, is_encrypted: bool, is_buildin: bool, is_raw_file: bool) {
        self.is_encrypted = is_encrypted;
        self.is_buildin = is_buildin;
        self.is_raw_file = is_raw_file;

        let mut mask = 0;
        if is_encrypted {
            mask |= FLAG_ENCRYPTED;
        }
        if is_buildin {
            mask |= FLAG_BUILDIN;
        }
        if is_raw_file {
            mask |= FLAG_RAW_FILE;
        }
        self.flags = mask;
    }

    // The only mutation permitted after deserialization.
    pub fn parse_flags(&mut self) {
        self.is_encrypted = self.flags & FLAG_ENCRYPTED != 0;
        self.is_buildin = self.flags & FLAG_BUILDIN != 0;
        self.is_raw_file = self.flags & FLAG_RAW_FILE != 0;
    }

    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    #[inline]
    pub fn is_buildin(&self) -> bool {
        self.is_buildin
    }

    #[inline]
    pub fn is_raw_file(&self) -> bool {
        self.is_raw_file
    }

    pub fn has_tag(&self, tags: &[String]) -> bool {
        if tags.is_empty() || self.tags.is_empty() {
            return false;
        }

        tags.iter().any(|tag| self.tags.contains(tag))
    }

    // A bundle without any tag always ships inside the application package.
    #[inline]
    pub fn is_pure_buildin(&self) -> bool {
        self.tags.is_empty()
    }
}

//====================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchAsset {
    pub asset_path: String,
    pub bundle_id: u32,
    pub depend_ids: Vec<u32>,
}

//====================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchManifest {
    pub resource_version: u32,
    pub buildin_tags: String,
    pub bundle_list: Vec<PatchBundle>,
    pub asset_list: Vec<PatchAsset>,

    #[serde(skip)]
    bundles: HashMap<String, usize, Hasher>,
    #[serde(skip)]
    assets: HashMap<String, usize, Hasher>,
}

impl PatchManifest {
    pub fn from_parts(
        resource_version: u32,
        buildin_tags: impl Into<String>,
        bundle_list: Vec<PatchBundle>,
        asset_list: Vec<PatchAsset>,
    ) -> Result<Self, ManifestError> {
        let mut manifest = Self {
            resource_version,
            buildin_tags: buildin_tags.into(),
            bundle_list,
            asset_list,
            bundles: HashMap::default(),
            assets: HashMap::default(),
        };

        manifest.rebuild_lookups()?;
        Ok(manifest)
    }

    pub fn buildin_tags(&self) -> Vec<String> {
        split_tags(&self.buildin_tags)
    }

    #[inline]
    pub fn bundle(&self, bundle_name: &str) -> Option<&PatchBundle> {
        self.bundles
            .get(bundle_name)
            .map(|index| &self.bundle_list[*index])
    }

    #[inline]
    pub fn asset(&self, asset_path: &str) -> Option<&PatchAsset> {
        self.assets
            .get(asset_path)
            .map(|index| &self.asset_list[*index])
    }

    pub fn bundle_name_for_asset(&self, asset_path: &str) -> Option<&str> {
        match self.asset(asset_path) {
            Some(asset) => Some(self.bundle_list[asset.bundle_id as usize].bundle_name.as_str()),
            None => {
                log::warn!("Asset path not found in patch manifest: '{}'", asset_path);
                None
            }
        }
    }

    pub fn dependencies_for_asset(&self, asset_path: &str) -> Vec<String> {
        match self.asset(asset_path) {
            Some(asset) => asset
                .depend_ids
                .iter()
                .map(|id| self.bundle_list[*id as usize].bundle_name.clone())
                .collect(),
            None => {
                log::warn!("Asset path not found in patch manifest: '{}'", asset_path);
                Vec::new()
            }
        }
    }

    pub fn serialize(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn deserialize(json: &str) -> Result<Self, ManifestError> {
        let mut manifest: PatchManifest = serde_json::from_str(json)?;
        manifest.rebuild_lookups()?;
        Ok(manifest)
    }

    pub fn write_file(&self, path: &Path) -> Result<(), ManifestError> {
        let json = self.serialize()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_file(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path)?;
        Self::deserialize(&json)
    }

    //--------------------------------------------------

    fn rebuild_lookups(&mut self) -> Result<(), ManifestError> {
        self.bundles.clear();
        self.assets.clear();

        for (index, bundle) in self.bundle_list.iter_mut().enumerate() {
            bundle.parse_flags();

            if self
                .bundles
                .insert(bundle.bundle_name.clone(), index)
                .is_some()
            {
                return Err(ManifestError::DuplicateBundleName(
                    bundle.bundle_name.clone(),
                ));
            }
        }

        let bundle_count = self.bundle_list.len() as u32;

        for (index, asset) in self.asset_list.iter().enumerate() {
            // Every recorded index must resolve, otherwise the manifest is corrupt.
            let invalid_id = std::iter::once(asset.bundle_id)
                .chain(asset.depend_ids.iter().copied())
                .find(|id| *id >= bundle_count);

            if let Some(id) = invalid_id {
                return Err(ManifestError::InvalidBundleId {
                    id,
                    asset_path: asset.asset_path.clone(),
                });
            }

            // Full paths may never collide.
            if self.assets.contains_key(&asset.asset_path) {
                return Err(ManifestError::DuplicateAssetPath(asset.asset_path.clone()));
            }
            self.assets.insert(asset.asset_path.clone(), index);

            // Also map the extension-stripped path for convenience. First entry wins.
            if let Some(stripped) = remove_extension(&asset.asset_path) {
                if self.assets.contains_key(stripped) {
                    log::warn!("Asset path already exists in patch manifest: '{}'", stripped);
                } else {
                    self.assets.insert(stripped.to_string(), index);
                }
            }
        }

        Ok(())
    }
}

//====================================================================

pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(';')
        .filter(|tag| !tag.is_empty())
        .map(|tag| tag.to_string())
        .collect()
}

pub fn remove_extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next()?;

    match file_name.rfind('.') {
        Some(index) if index != 0 => Some(&path[..path.len() - (file_name.len() - index)]),
        _ => None,
    }
}

//====================================================================


//====================================================================
