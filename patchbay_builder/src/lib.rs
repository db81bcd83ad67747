//====================================================================

pub mod builder;
pub mod hashing;

pub use builder::{
    build_manifest, load_manifest_file, make_bundle_name, write_manifest_files, AssetBuildInfo,
    BuildError, BuildParameters, BundleBuildInfo,
};
pub use hashing::{FileHashServices, HashServices};

//====================================================================
