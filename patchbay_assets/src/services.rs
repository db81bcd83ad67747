//====================================================================

use std::{any::TypeId, sync::Arc};

use downcast_rs::DowncastSync;

//====================================================================

// Whatever a backend hands back once a load finishes. Callers downcast to
// their concrete type on the other side of the handle.
pub trait AssetData: DowncastSync {}
downcast_rs::impl_downcast!(sync AssetData);

impl AssetData for String {}
impl AssetData for Vec<u8> {}

pub type AssetObject = Arc<dyn AssetData>;

#[derive(Clone)]
pub enum LoadedValue {
    Asset(AssetObject),
    SubAssets(Vec<AssetObject>),
}

impl LoadedValue {
    #[inline]
    pub fn asset(&self) -> Option<AssetObject> {
        match self {
            LoadedValue::Asset(asset) => Some(asset.clone()),
            LoadedValue::SubAssets(_) => None,
        }
    }

    #[inline]
    pub fn sub_assets(&self) -> Option<Vec<AssetObject>> {
        match self {
            LoadedValue::Asset(_) => None,
            LoadedValue::SubAssets(assets) => Some(assets.clone()),
        }
    }
}

impl std::fmt::Debug for LoadedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadedValue::Asset(_) => f.write_str("LoadedValue::Asset"),
            LoadedValue::SubAssets(assets) => {
                f.write_fmt(format_args!("LoadedValue::SubAssets({})", assets.len()))
            }
        }
    }
}

//====================================================================

#[derive(Debug, Clone)]
pub struct BundleInfo {
    pub bundle_name: String,
    pub local_path: String,
    pub version: u32,
    pub is_encrypted: bool,
    pub is_raw_file: bool,
}

impl BundleInfo {
    pub fn new(
        bundle_name: impl Into<String>,
        local_path: impl Into<String>,
        version: u32,
        is_encrypted: bool,
        is_raw_file: bool,
    ) -> Self {
        Self {
            bundle_name: bundle_name.into(),
            local_path: local_path.into(),
            version,
            is_encrypted,
            is_raw_file,
        }
    }

    // A name that never resolved to a manifest entry. Loaders treat the
    // missing local path as an immediate failure.
    pub fn unresolved(bundle_name: impl Into<String>) -> Self {
        Self::new(bundle_name, String::new(), 0, false, false)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.local_path.is_empty()
    }
}

//====================================================================

#[derive(Debug, Clone)]
pub struct SceneLoadParams {
    pub additive: bool,
    pub activate_on_load: bool,
}

impl Default for SceneLoadParams {
    fn default() -> Self {
        Self {
            additive: false,
            activate_on_load: true,
        }
    }
}

//====================================================================

// Manifest-backed bundle resolution, implemented by the play modes.
pub trait BundleServices {
    fn bundle_info(&self, bundle_name: &str) -> BundleInfo;
    fn bundle_name_for_asset(&self, asset_path: &str) -> Option<String>;
    fn dependencies_for_asset(&self, asset_path: &str) -> Vec<String>;
    fn resource_version(&self) -> u32;
}

pub trait DecryptServices {
    fn is_encrypted(&self, bundle_name: &str) -> bool;
}

//====================================================================

pub enum OpenPoll {
    Pending,
    Done(anyhow::Result<Arc<dyn OpenBundle>>),
}

pub enum LoadPoll {
    Pending,
    Done(Option<LoadedValue>),
}

// One in-flight "open this bundle file" operation.
pub trait BundleOpenRequest: Send {
    fn poll(&mut self) -> OpenPoll;

    // Blocks the calling thread. Only reached through the explicit
    // force-complete path.
    fn wait(&mut self) -> anyhow::Result<Arc<dyn OpenBundle>>;
}

// An opened bundle container, shared by every provider that depends on it.
pub trait OpenBundle: Send + Sync {
    fn load_asset(&self, asset_name: &str, asset_type: Option<TypeId>)
        -> Box<dyn AssetLoadRequest>;

    fn load_sub_assets(
        &self,
        asset_name: &str,
        asset_type: Option<TypeId>,
    ) -> Box<dyn AssetLoadRequest>;

    fn load_scene(&self, scene_path: &str, params: &SceneLoadParams) -> Box<dyn AssetLoadRequest>;
}

pub trait AssetLoadRequest: Send {
    fn poll(&mut self) -> LoadPoll;
    fn wait(&mut self) -> Option<LoadedValue>;
}

// The low-level bundle container primitive, implemented outside the core.
pub trait BundleBackend: Send {
    fn open_bundle(&self, info: &BundleInfo) -> Box<dyn BundleOpenRequest>;
}

// Direct-database loading used by the simulation run mode.
pub trait AssetDatabase: Send {
    fn contains(&self, asset_path: &str) -> bool;

    fn load_asset(&self, asset_path: &str, asset_type: Option<TypeId>)
        -> Box<dyn AssetLoadRequest>;

    fn load_sub_assets(
        &self,
        asset_path: &str,
        asset_type: Option<TypeId>,
    ) -> Box<dyn AssetLoadRequest>;

    fn load_scene(&self, scene_path: &str, params: &SceneLoadParams) -> Box<dyn AssetLoadRequest>;
}

//====================================================================
