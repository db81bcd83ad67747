//====================================================================

use std::{collections::HashMap, hash::BuildHasherDefault, path::PathBuf};

use patchbay_manifest::{
    split_tags, ManifestError, PatchAsset, PatchBundle, PatchManifest, ResourceSettings,
};
use rustc_hash::FxHasher;

use crate::hashing::HashServices;

//====================================================================

type Hasher = BuildHasherDefault<FxHasher>;

//====================================================================

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    // An unresolved dependency edge means the upstream collector is broken.
    #[error("bundle name not found in build output: '{0}'")]
    UnknownBundle(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//====================================================================

#[derive(Debug, Clone)]
pub struct BuildParameters {
    pub build_version: u32,
    pub buildin_tags: String,
    pub force_rebuild: bool,
    pub append_hash_extension: bool,
    pub output_dir: PathBuf,
    pub settings: ResourceSettings,
}

//--------------------------------------------------

// Per-bundle output of the external dependency collector.
#[derive(Debug, Clone)]
pub struct BundleBuildInfo {
    pub bundle_name: String,
    pub is_raw_file: bool,
    pub is_encrypted: bool,
    pub tags: Vec<String>,
    pub assets: Vec<AssetBuildInfo>,
}

#[derive(Debug, Clone)]
pub struct AssetBuildInfo {
    pub asset_path: String,
    pub depend_bundles: Vec<String>,
}

//====================================================================

// Bundle file names are all lower case. A variant becomes a pseudo-extension.
pub fn make_bundle_name(label: &str, variant: &str) -> String {
    match variant.is_empty() {
        true => label.to_lowercase(),
        false => format!("{}.{}", label, variant).to_lowercase(),
    }
}

//====================================================================

pub fn build_manifest(
    params: &BuildParameters,
    bundles: &[BundleBuildInfo],
    hasher: &dyn HashServices,
) -> Result<PatchManifest, BuildError> {
    let bundle_list = collect_patch_bundles(params, bundles, hasher)?;
    let asset_list = collect_patch_assets(bundles, &bundle_list)?;

    Ok(PatchManifest::from_parts(
        params.build_version,
        params.buildin_tags.clone(),
        bundle_list,
        asset_list,
    )?)
}

// Writes the manifest plus the sibling file holding the manifest's own hash,
// so clients can detect manifest changes without downloading the whole file.
pub fn write_manifest_files(
    manifest: &PatchManifest,
    params: &BuildParameters,
    hasher: &dyn HashServices,
) -> Result<(), BuildError> {
    let manifest_path = params.output_dir.join(&params.settings.manifest_file_name);
    log::info!("Creating patch manifest file: {:?}", manifest_path);
    manifest.write_file(&manifest_path)?;

    let hash_path = params
        .output_dir
        .join(&params.settings.manifest_hash_file_name);
    let manifest_hash = hasher.file_hash(&manifest_path)?;
    log::info!("Creating patch manifest hash file: {:?}", hash_path);
    std::fs::write(hash_path, manifest_hash)?;

    Ok(())
}

pub fn load_manifest_file(
    output_dir: &std::path::Path,
    settings: &ResourceSettings,
) -> Result<PatchManifest, BuildError> {
    let path = output_dir.join(&settings.manifest_file_name);
    Ok(PatchManifest::load_file(&path)?)
}

//====================================================================

fn collect_patch_bundles(
    params: &BuildParameters,
    bundles: &[BundleBuildInfo],
    hasher: &dyn HashServices,
) -> Result<Vec<PatchBundle>, BuildError> {
    let buildin_tags = split_tags(&params.buildin_tags);

    // The previous manifest feeds the stable-version lookup. A forced rebuild
    // skips it entirely and stamps every bundle with the current version.
    let previous = match params.force_rebuild {
        true => None,
        false => load_previous_manifest(params)?,
    };

    let mut result = Vec::with_capacity(bundles.len());

    for info in bundles {
        let path = params.output_dir.join(&info.bundle_name);
        let mut hash = hasher.file_hash(&path)?;
        let checksum = hasher.file_checksum(&path)?;
        let size_bytes = hasher.file_size(&path)?;

        if params.append_hash_extension {
            let variant = match info.is_raw_file {
                true => &params.settings.raw_file_variant,
                false => &params.settings.bundle_variant,
            };
            hash = format!("{}.{}", hash, variant);
        }

        // An unchanged file keeps the version it was first published under.
        let version = previous
            .as_ref()
            .and_then(|manifest| manifest.bundle(&info.bundle_name))
            .filter(|old| old.hash == hash)
            .map(|old| old.version)
            .unwrap_or(params.build_version);

        let is_buildin = is_buildin_bundle(&info.tags, &buildin_tags);

        let mut bundle = PatchBundle::new(
            info.bundle_name.clone(),
            hash,
            checksum,
            size_bytes,
            version,
            info.tags.clone(),
        );
        bundle.set_flags(info.is_encrypted, is_buildin, info.is_raw_file);
        result.push(bundle);
    }

    Ok(result)
}

fn load_previous_manifest(params: &BuildParameters) -> Result<Option<PatchManifest>, BuildError> {
    let path = params.output_dir.join(&params.settings.manifest_file_name);
    if !path.exists() {
        log::trace!("No previous patch manifest at {:?}", path);
        return Ok(None);
    }

    // A previous manifest that exists but cannot be parsed is a build error,
    // not a silent full re-version.
    Ok(Some(PatchManifest::load_file(&path)?))
}

fn is_buildin_bundle(bundle_tags: &[String], buildin_tags: &[String]) -> bool {
    // Untagged bundles always ship with the application.
    if bundle_tags.is_empty() {
        return true;
    }

    bundle_tags.iter().any(|tag| buildin_tags.contains(tag))
}

fn collect_patch_assets(
    bundles: &[BundleBuildInfo],
    bundle_list: &[PatchBundle],
) -> Result<Vec<PatchAsset>, BuildError> {
    let bundle_ids: HashMap<&str, u32, Hasher> = bundle_list
        .iter()
        .enumerate()
        .map(|(index, bundle)| (bundle.bundle_name.as_str(), index as u32))
        .collect();

    let lookup = |name: &str| -> Result<u32, BuildError> {
        bundle_ids
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownBundle(name.to_string()))
    };

    let mut result = Vec::new();

    for info in bundles {
        for asset in &info.assets {
            let bundle_id = lookup(&info.bundle_name)?;

            // Dependencies deduplicate in first-seen order.
            let mut depend_ids = Vec::new();
            for depend in &asset.depend_bundles {
                let id = lookup(depend)?;
                if !depend_ids.contains(&id) {
                    depend_ids.push(id);
                }
            }

            result.push(PatchAsset {
                asset_path: asset.asset_path.clone(),
                bundle_id,
                depend_ids,
            });
        }
    }

    Ok(result)
}

//====================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::FileHashServices;

    fn test_params(dir: &std::path::Path, build_version: u32) -> BuildParameters {
        BuildParameters {
            build_version,
            buildin_tags: "base".to_string(),
            force_rebuild: false,
            append_hash_extension: false,
            output_dir: dir.to_path_buf(),
            settings: ResourceSettings::default(),
        }
    }

    fn bundle_info(name: &str, tags: &[&str], assets: &[(&str, &[&str])]) -> BundleBuildInfo {
        BundleBuildInfo {
            bundle_name: name.to_string(),
            is_raw_file: false,
            is_encrypted: false,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            assets: assets
                .iter()
                .map(|(path, depends)| AssetBuildInfo {
                    asset_path: path.to_string(),
                    depend_bundles: depends.iter().map(|name| name.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn write_bundles(dir: &std::path::Path, files: &[(&str, &[u8])]) {
        for (name, content) in files {
            std::fs::write(dir.join(name), content).unwrap();
        }
    }

    #[test]
    fn bundle_naming() {
        assert_eq!(make_bundle_name("UI_Panels", "bundle"), "ui_panels.bundle");
        assert_eq!(make_bundle_name("UI_Panels", ""), "ui_panels");
    }

    #[test]
    fn unchanged_bundles_keep_their_version() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(dir.path(), &[("a.bundle", b"aaaa"), ("b.bundle", b"bbbb")]);

        let bundles = vec![
            bundle_info("a.bundle", &[], &[]),
            bundle_info("b.bundle", &[], &[]),
        ];

        let params = test_params(dir.path(), 1);
        let first = build_manifest(&params, &bundles, &hasher).unwrap();
        write_manifest_files(&first, &params, &hasher).unwrap();

        // Rebuild with nothing changed: every version is reproduced.
        let params = test_params(dir.path(), 2);
        let second = build_manifest(&params, &bundles, &hasher).unwrap();
        write_manifest_files(&second, &params, &hasher).unwrap();

        assert_eq!(second.bundle("a.bundle").unwrap().version, 1);
        assert_eq!(second.bundle("b.bundle").unwrap().version, 1);
        assert_eq!(second.resource_version, 2);

        // Change only b: a keeps its version, b adopts the build version.
        write_bundles(dir.path(), &[("b.bundle", b"b-changed")]);
        let params = test_params(dir.path(), 3);
        let third = build_manifest(&params, &bundles, &hasher).unwrap();

        assert_eq!(third.bundle("a.bundle").unwrap().version, 1);
        assert_eq!(third.bundle("b.bundle").unwrap().version, 3);
        assert_ne!(
            third.bundle("b.bundle").unwrap().hash,
            second.bundle("b.bundle").unwrap().hash
        );
    }

    #[test]
    fn force_rebuild_ignores_previous_versions() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(dir.path(), &[("a.bundle", b"aaaa")]);

        let bundles = vec![bundle_info("a.bundle", &[], &[])];

        let params = test_params(dir.path(), 1);
        let first = build_manifest(&params, &bundles, &hasher).unwrap();
        write_manifest_files(&first, &params, &hasher).unwrap();

        let mut params = test_params(dir.path(), 5);
        params.force_rebuild = true;
        let second = build_manifest(&params, &bundles, &hasher).unwrap();

        assert_eq!(second.bundle("a.bundle").unwrap().version, 5);
    }

    #[test]
    fn buildin_classification() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(
            dir.path(),
            &[
                ("untagged.bundle", b"u"),
                ("base.bundle", b"b"),
                ("dlc.bundle", b"d"),
            ],
        );

        let bundles = vec![
            bundle_info("untagged.bundle", &[], &[]),
            bundle_info("base.bundle", &["base"], &[]),
            bundle_info("dlc.bundle", &["dlc"], &[]),
        ];

        let params = test_params(dir.path(), 1);
        let manifest = build_manifest(&params, &bundles, &hasher).unwrap();

        assert!(manifest.bundle("untagged.bundle").unwrap().is_buildin());
        assert!(manifest.bundle("base.bundle").unwrap().is_buildin());
        assert!(!manifest.bundle("dlc.bundle").unwrap().is_buildin());
    }

    #[test]
    fn dependency_edges_resolve_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(dir.path(), &[("a.bundle", b"a"), ("b.bundle", b"b")]);

        let bundles = vec![
            bundle_info(
                "a.bundle",
                &[],
                &[("char/hero.prefab", &["b.bundle", "b.bundle", "a.bundle"])],
            ),
            bundle_info("b.bundle", &[], &[]),
        ];

        let params = test_params(dir.path(), 1);
        let manifest = build_manifest(&params, &bundles, &hasher).unwrap();

        let asset = manifest.asset("char/hero.prefab").unwrap();
        assert_eq!(asset.bundle_id, 0);
        assert_eq!(asset.depend_ids, vec![1, 0]);
    }

    #[test]
    fn unknown_dependency_aborts_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(dir.path(), &[("a.bundle", b"a")]);

        let bundles = vec![bundle_info(
            "a.bundle",
            &[],
            &[("char/hero.prefab", &["missing.bundle"])],
        )];

        let params = test_params(dir.path(), 1);
        let result = build_manifest(&params, &bundles, &hasher);

        assert!(matches!(result, Err(BuildError::UnknownBundle(name)) if name == "missing.bundle"));
    }

    #[test]
    fn append_hash_extension() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(dir.path(), &[("a.bundle", b"a")]);

        let mut params = test_params(dir.path(), 1);
        params.append_hash_extension = true;

        let bundles = vec![bundle_info("a.bundle", &[], &[])];
        let manifest = build_manifest(&params, &bundles, &hasher).unwrap();

        assert!(manifest.bundle("a.bundle").unwrap().hash.ends_with(".bundle"));
    }

    #[test]
    fn manifest_and_hash_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let hasher = FileHashServices;
        write_bundles(dir.path(), &[("a.bundle", b"a")]);

        let params = test_params(dir.path(), 1);
        let bundles = vec![bundle_info("a.bundle", &[], &[])];
        let manifest = build_manifest(&params, &bundles, &hasher).unwrap();
        write_manifest_files(&manifest, &params, &hasher).unwrap();

        let loaded = load_manifest_file(dir.path(), &params.settings).unwrap();
        assert_eq!(loaded.resource_version, 1);

        let manifest_path = dir.path().join(&params.settings.manifest_file_name);
        let recorded =
            std::fs::read_to_string(dir.path().join(&params.settings.manifest_hash_file_name))
                .unwrap();
        assert_eq!(recorded, hasher.file_hash(&manifest_path).unwrap());
    }
}

//====================================================================
