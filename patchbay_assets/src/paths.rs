//====================================================================

use std::path::{Path, PathBuf};

//====================================================================

// Normalizes to forward slashes.
pub fn regular_path(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn combine_asset_path(root: &str, location: &str) -> String {
    match root.is_empty() {
        true => location.to_string(),
        false => format!("{}/{}", root, location),
    }
}

// Load path for a file shipped inside the application package.
pub fn package_load_path(package_root: &Path, file_name: &str) -> PathBuf {
    package_root.join(file_name)
}

// Load path for a file placed in the writable sandbox.
pub fn sandbox_load_path(sandbox_root: &Path, file_name: &str) -> PathBuf {
    sandbox_root.join(file_name)
}

//====================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        assert_eq!(regular_path("a\\b\\c"), "a/b/c");
        assert_eq!(combine_asset_path("", "ui/panel"), "ui/panel");
        assert_eq!(combine_asset_path("assets", "ui/panel"), "assets/ui/panel");
    }
}

//====================================================================
