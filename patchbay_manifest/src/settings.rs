//====================================================================

#[derive(Debug, Clone)]
pub struct ResourceSettings {
    pub bundle_variant: String,
    pub raw_file_variant: String,
    pub manifest_file_name: String,
    pub manifest_hash_file_name: String,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            bundle_variant: "bundle".to_string(),
            raw_file_variant: "rawfile".to_string(),
            manifest_file_name: "patch-manifest.json".to_string(),
            manifest_hash_file_name: "patch-manifest.hash".to_string(),
        }
    }
}

//====================================================================
