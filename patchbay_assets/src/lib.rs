//====================================================================

use std::hash::BuildHasherDefault;

use rustc_hash::FxHasher;

pub mod bundle_loader;
pub mod cache;
pub mod handle;
pub mod paths;
pub mod play_mode;
pub mod provider;
pub mod services;
pub mod system;

pub(crate) type Hasher = BuildHasherDefault<FxHasher>;

//====================================================================

pub use bundle_loader::{BundleFileLoader, LoaderId, LoaderState};
pub use cache::{CacheError, PatchCache};
pub use handle::{AssetHandle, LoadOutcome, LoadStatus};
pub use play_mode::{HostPlayMode, OfflinePlayMode, OperationStatus, CACHE_FILE_NAME};
pub use provider::ProviderState;
pub use services::{
    AssetData, AssetDatabase, AssetLoadRequest, AssetObject, BundleBackend, BundleInfo,
    BundleOpenRequest, BundleServices, DecryptServices, LoadPoll, LoadedValue, OpenBundle,
    OpenPoll, SceneLoadParams,
};
pub use system::{AssetError, AssetSystem, SystemDescriptor, SystemMode};

//====================================================================
