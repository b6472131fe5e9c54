//! Layer storage for local images
//!
//! Layers are kept uncompressed, keyed by the hex part of their diff ID
//! (the sha256 of the tar stream).

use crate::storage::paths::PorterPaths;
use crate::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// Layer manager for handling image layers on disk
pub struct LayerManager {
    paths: PorterPaths,
}

impl LayerManager {
    /// Create a new layer manager
    pub fn new(paths: &PorterPaths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }

    /// Check if a layer exists
    pub fn exists(&self, digest: &str) -> bool {
        self.paths.layer_tar(strip_algorithm(digest)).exists()
    }

    /// Get the path to a layer tar file
    pub fn layer_tar_path(&self, digest: &str) -> PathBuf {
        self.paths.layer_tar(strip_algorithm(digest))
    }

    /// Store an uncompressed layer and return its diff ID
    pub fn store_layer_bytes(&self, data: &[u8]) -> Result<String> {
        let digest = Self::compute_digest_bytes(data);
        let hex = strip_algorithm(&digest);

        if !self.exists(hex) {
            fs::create_dir_all(self.paths.layer_dir(hex))?;
            fs::write(self.paths.layer_tar(hex), data)?;
        }

        Ok(digest)
    }

    /// Remove a layer
    pub fn remove_layer(&self, digest: &str) -> Result<()> {
        let layer_dir = self.paths.layer_dir(strip_algorithm(digest));
        if layer_dir.exists() {
            fs::remove_dir_all(&layer_dir)?;
        }
        Ok(())
    }

    /// Compute the SHA256 digest of bytes
    pub fn compute_digest_bytes(data: &[u8]) -> String {
        format!("sha256:{}", hex::encode(Sha256::digest(data)))
    }
}

/// `sha256:abc` -> `abc`
pub fn strip_algorithm(digest: &str) -> &str {
    digest.strip_prefix("sha256:").unwrap_or(digest)
}
