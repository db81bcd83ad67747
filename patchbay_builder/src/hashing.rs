//====================================================================

use std::{io, path::Path};

use sha2::{Digest, Sha256};

//====================================================================

// Content hashing is pluggable so a build pipeline can swap in its own
// digest without touching the differ.
pub trait HashServices {
    fn file_hash(&self, path: &Path) -> io::Result<String>;
    fn file_checksum(&self, path: &Path) -> io::Result<String>;
    fn file_size(&self, path: &Path) -> io::Result<u64>;
}

//====================================================================

#[derive(Debug, Default)]
pub struct FileHashServices;

impl HashServices for FileHashServices {
    fn file_hash(&self, path: &Path) -> io::Result<String> {
        let bytes = std::fs::read(path)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = hasher.finalize();

        Ok(hash.iter().map(|b| format!("{:02x}", b)).collect())
    }

    fn file_checksum(&self, path: &Path) -> io::Result<String> {
        let bytes = std::fs::read(path)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }
}

//====================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_follow_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bundle");
        let services = FileHashServices;

        std::fs::write(&path, b"alpha").unwrap();
        let first = services.file_hash(&path).unwrap();
        let first_checksum = services.file_checksum(&path).unwrap();
        assert_eq!(services.file_size(&path).unwrap(), 5);

        // Same content, same digests.
        assert_eq!(services.file_hash(&path).unwrap(), first);

        std::fs::write(&path, b"omega").unwrap();
        assert_ne!(services.file_hash(&path).unwrap(), first);
        assert_ne!(services.file_checksum(&path).unwrap(), first_checksum);
    }
}

//====================================================================
