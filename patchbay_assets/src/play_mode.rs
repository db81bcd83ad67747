//====================================================================

use std::path::PathBuf;

use patchbay_manifest::{PatchManifest, ResourceSettings};

use crate::{
    cache::PatchCache,
    paths,
    services::{BundleInfo, BundleServices},
};

//====================================================================

pub const CACHE_FILE_NAME: &str = "patch-cache.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    None,
    Succeed,
    Failed,
}

//====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfflineSteps {
    Idle,
    LoadAppManifest,
    CheckAppManifest,
    Done,
}

// Loads the manifest shipped inside the application package. Nothing to
// reconcile afterwards.
pub struct OfflinePlayMode {
    package_root: PathBuf,
    settings: ResourceSettings,

    steps: OfflineSteps,
    status: OperationStatus,
    error: String,
    pending: Option<std::io::Result<String>>,

    app_manifest: Option<PatchManifest>,
}

impl OfflinePlayMode {
    pub fn new(package_root: impl Into<PathBuf>, settings: ResourceSettings) -> Self {
        Self {
            package_root: package_root.into(),
            settings,
            steps: OfflineSteps::Idle,
            status: OperationStatus::None,
            error: String::new(),
            pending: None,
            app_manifest: None,
        }
    }

    pub fn initialize(&mut self) {
        if self.steps == OfflineSteps::Idle {
            self.steps = OfflineSteps::LoadAppManifest;
        }
    }

    pub fn update(&mut self) {
        if self.steps == OfflineSteps::LoadAppManifest {
            log::info!("Load application patch manifest.");
            let path = paths::package_load_path(&self.package_root, &self.settings.manifest_file_name);
            self.pending = Some(std::fs::read_to_string(path));
            self.steps = OfflineSteps::CheckAppManifest;
        }

        if self.steps == OfflineSteps::CheckAppManifest {
            match check_app_manifest(self.pending.take()) {
                Ok(manifest) => {
                    self.app_manifest = Some(manifest);
                    self.status = OperationStatus::Succeed;
                }
                Err(error) => {
                    // Startup cannot continue without the embedded manifest.
                    log::error!("{}", error);
                    self.error = error;
                    self.status = OperationStatus::Failed;
                }
            }
            self.steps = OfflineSteps::Done;
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.steps == OfflineSteps::Done
    }

    #[inline]
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    #[inline]
    pub fn error(&self) -> &str {
        &self.error
    }

    #[inline]
    pub fn app_manifest(&self) -> Option<&PatchManifest> {
        self.app_manifest.as_ref()
    }

    pub fn buildin_tags(&self) -> Vec<String> {
        self.app_manifest
            .as_ref()
            .map(|manifest| manifest.buildin_tags())
            .unwrap_or_default()
    }
}

impl BundleServices for OfflinePlayMode {
    fn bundle_info(&self, bundle_name: &str) -> BundleInfo {
        resolve_bundle_info(
            self.app_manifest.as_ref(),
            bundle_name,
            |bundle| paths::package_load_path(&self.package_root, &bundle.hash),
        )
    }

    fn bundle_name_for_asset(&self, asset_path: &str) -> Option<String> {
        self.app_manifest
            .as_ref()?
            .bundle_name_for_asset(asset_path)
            .map(|name| name.to_string())
    }

    fn dependencies_for_asset(&self, asset_path: &str) -> Vec<String> {
        self.app_manifest
            .as_ref()
            .map(|manifest| manifest.dependencies_for_asset(asset_path))
            .unwrap_or_default()
    }

    fn resource_version(&self) -> u32 {
        self.app_manifest
            .as_ref()
            .map(|manifest| manifest.resource_version)
            .unwrap_or(0)
    }
}

//====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostSteps {
    Idle,
    InitCache,
    LoadAppManifest,
    CheckAppManifest,
    LoadSandboxManifest,
    Done,
}

// The patchable distribution strategy: reconciles the writable sandbox
// against the running application before adopting a manifest.
pub struct HostPlayMode {
    package_root: PathBuf,
    sandbox_root: PathBuf,
    app_version: String,
    clear_cache_when_dirty: bool,
    settings: ResourceSettings,

    steps: HostSteps,
    status: OperationStatus,
    error: String,
    pending: Option<std::io::Result<String>>,

    cache: Option<PatchCache>,
    app_manifest: Option<PatchManifest>,
    local_manifest: Option<PatchManifest>,
}

impl HostPlayMode {
    pub fn new(
        package_root: impl Into<PathBuf>,
        sandbox_root: impl Into<PathBuf>,
        app_version: impl Into<String>,
        clear_cache_when_dirty: bool,
        settings: ResourceSettings,
    ) -> Self {
        Self {
            package_root: package_root.into(),
            sandbox_root: sandbox_root.into(),
            app_version: app_version.into(),
            clear_cache_when_dirty,
            settings,
            steps: HostSteps::Idle,
            status: OperationStatus::None,
            error: String::new(),
            pending: None,
            cache: None,
            app_manifest: None,
            local_manifest: None,
        }
    }

    pub fn initialize(&mut self) {
        if self.steps == HostSteps::Idle {
            self.steps = HostSteps::InitCache;
        }
    }

    pub fn update(&mut self) {
        if self.steps == HostSteps::InitCache {
            self.init_cache();
            self.steps = HostSteps::LoadAppManifest;
        }

        if self.steps == HostSteps::LoadAppManifest {
            log::info!("Load application patch manifest.");
            let path = paths::package_load_path(&self.package_root, &self.settings.manifest_file_name);
            self.pending = Some(std::fs::read_to_string(path));
            self.steps = HostSteps::CheckAppManifest;
        }

        if self.steps == HostSteps::CheckAppManifest {
            match check_app_manifest(self.pending.take()) {
                Ok(manifest) => {
                    self.local_manifest = Some(manifest.clone());
                    self.app_manifest = Some(manifest);
                    self.steps = HostSteps::LoadSandboxManifest;
                }
                Err(error) => {
                    log::error!("{}", error);
                    self.error = error;
                    self.status = OperationStatus::Failed;
                    self.steps = HostSteps::Done;
                }
            }
        }

        if self.steps == HostSteps::LoadSandboxManifest {
            // A previously downloaded manifest supersedes the embedded one.
            let path =
                paths::sandbox_load_path(&self.sandbox_root, &self.settings.manifest_file_name);
            if path.exists() {
                log::info!("Load sandbox patch manifest.");
                match PatchManifest::load_file(&path) {
                    Ok(manifest) => self.local_manifest = Some(manifest),
                    Err(error) => {
                        let error = format!("Failed to load sandbox patch manifest: {}", error);
                        log::error!("{}", error);
                        self.error = error;
                        self.status = OperationStatus::Failed;
                        self.steps = HostSteps::Done;
                        return;
                    }
                }
            }

            self.status = OperationStatus::Succeed;
            self.steps = HostSteps::Done;
        }
    }

    fn init_cache(&mut self) {
        let cache_path = paths::sandbox_load_path(&self.sandbox_root, CACHE_FILE_NAME);

        let mut cache = match cache_path.exists() {
            false => PatchCache::new(self.app_version.clone()),
            true => match PatchCache::load_file(&cache_path) {
                Ok(cache) => cache,
                Err(error) => {
                    log::warn!("Failed to load patch cache, starting fresh: {}", error);
                    PatchCache::new(self.app_version.clone())
                }
            },
        };

        // An application upgrade invalidates the sandbox state.
        if cache.cache_app_version != self.app_version {
            log::warn!(
                "Cache is dirty! Cache app version is {}, current app version is {}",
                cache.cache_app_version,
                self.app_version
            );

            if self.clear_cache_when_dirty {
                cache.clear_cache_files(&self.sandbox_root);
            }

            // The stale manifest must always go, even when the files stay.
            let manifest_path =
                paths::sandbox_load_path(&self.sandbox_root, &self.settings.manifest_file_name);
            if manifest_path.exists() {
                if let Err(error) = std::fs::remove_file(&manifest_path) {
                    log::warn!("Failed to delete stale sandbox manifest: {}", error);
                }
            }

            cache.set_app_version(self.app_version.clone());
        }

        if let Err(error) = cache.save_file(&cache_path) {
            log::warn!("Failed to save patch cache: {}", error);
        }

        self.cache = Some(cache);
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.steps == HostSteps::Done
    }

    #[inline]
    pub fn status(&self) -> OperationStatus {
        self.status
    }

    #[inline]
    pub fn error(&self) -> &str {
        &self.error
    }

    #[inline]
    pub fn app_manifest(&self) -> Option<&PatchManifest> {
        self.app_manifest.as_ref()
    }

    #[inline]
    pub fn local_manifest(&self) -> Option<&PatchManifest> {
        self.local_manifest.as_ref()
    }

    #[inline]
    pub fn cache(&self) -> Option<&PatchCache> {
        self.cache.as_ref()
    }

    pub fn buildin_tags(&self) -> Vec<String> {
        self.local_manifest
            .as_ref()
            .map(|manifest| manifest.buildin_tags())
            .unwrap_or_default()
    }

    // Called by the external downloader once a bundle file has fully landed
    // in the sandbox.
    pub fn cache_download_file(&mut self, file_name: &str) -> bool {
        let Some(cache) = self.cache.as_mut() else {
            return false;
        };

        if !cache.record(file_name) {
            return false;
        }

        let cache_path = paths::sandbox_load_path(&self.sandbox_root, CACHE_FILE_NAME);
        if let Err(error) = cache.save_file(&cache_path) {
            log::warn!("Failed to save patch cache: {}", error);
        }
        true
    }
}

impl BundleServices for HostPlayMode {
    fn bundle_info(&self, bundle_name: &str) -> BundleInfo {
        resolve_bundle_info(self.local_manifest.as_ref(), bundle_name, |bundle| {
            let cached = self
                .cache
                .as_ref()
                .is_some_and(|cache| cache.contains(&bundle.hash));

            // Built-in bundles load from the package; everything else lives
            // in the sandbox, where the external downloader places it.
            match !cached && bundle.is_buildin() {
                true => paths::package_load_path(&self.package_root, &bundle.hash),
                false => paths::sandbox_load_path(&self.sandbox_root, &bundle.hash),
            }
        })
    }

    fn bundle_name_for_asset(&self, asset_path: &str) -> Option<String> {
        self.local_manifest
            .as_ref()?
            .bundle_name_for_asset(asset_path)
            .map(|name| name.to_string())
    }

    fn dependencies_for_asset(&self, asset_path: &str) -> Vec<String> {
        self.local_manifest
            .as_ref()
            .map(|manifest| manifest.dependencies_for_asset(asset_path))
            .unwrap_or_default()
    }

    fn resource_version(&self) -> u32 {
        self.local_manifest
            .as_ref()
            .map(|manifest| manifest.resource_version)
            .unwrap_or(0)
    }
}

//====================================================================

fn check_app_manifest(pending: Option<std::io::Result<String>>) -> Result<PatchManifest, String> {
    let json = pending
        .unwrap_or_else(|| {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no pending manifest read",
            ))
        })
        .map_err(|error| format!("Failed to load application patch manifest file: {}", error))?;

    PatchManifest::deserialize(&json)
        .map_err(|error| format!("Failed to parse application patch manifest file: {}", error))
}

fn resolve_bundle_info<F>(
    manifest: Option<&PatchManifest>,
    bundle_name: &str,
    local_path: F,
) -> BundleInfo
where
    F: FnOnce(&patchbay_manifest::PatchBundle) -> PathBuf,
{
    if bundle_name.is_empty() {
        return BundleInfo::unresolved(bundle_name);
    }

    let Some(bundle) = manifest.and_then(|manifest| manifest.bundle(bundle_name)) else {
        log::warn!("Bundle not found in patch manifest: '{}'", bundle_name);
        return BundleInfo::unresolved(bundle_name);
    };

    BundleInfo::new(
        bundle_name,
        local_path(bundle).to_string_lossy().into_owned(),
        bundle.version,
        bundle.is_encrypted(),
        bundle.is_raw_file(),
    )
}

//====================================================================


//====================================================================
