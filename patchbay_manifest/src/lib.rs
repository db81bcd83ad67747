//====================================================================

pub mod manifest;
pub mod settings;

pub use manifest::{
    remove_extension, split_tags, ManifestError, PatchAsset, PatchBundle, PatchManifest,
};
pub use settings::ResourceSettings;

//====================================================================
