//! Path management for ~/.porter/ directory structure

use crate::{PorterError, Result};
use std::path::{Path, PathBuf};

/// Manages paths for porter's filesystem storage
#[derive(Debug, Clone)]
pub struct PorterPaths {
    root: PathBuf,
}

impl PorterPaths {
    /// Create a new PorterPaths instance using the default root (~/.porter/)
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            PorterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine user home directory. Please ensure HOME environment variable is set.",
            ))
        })?;

        Ok(Self {
            root: home.join(".porter"),
        })
    }

    /// Create a new PorterPaths instance with a custom root
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.layers_dir())?;
        Ok(())
    }

    /// Directory containing image data
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Directory for a specific image
    pub fn image_dir(&self, image_id: &str) -> PathBuf {
        self.images_dir().join(image_id)
    }

    /// Image config blob, stored byte-for-byte as received
    pub fn image_config(&self, image_id: &str) -> PathBuf {
        self.image_dir(image_id).join("config.json")
    }

    /// Image metadata file (porter-specific)
    pub fn image_metadata(&self, image_id: &str) -> PathBuf {
        self.image_dir(image_id).join("metadata.json")
    }

    /// Directory containing layer data
    pub fn layers_dir(&self) -> PathBuf {
        self.root.join("layers")
    }

    /// Directory for a specific layer
    pub fn layer_dir(&self, layer_sha: &str) -> PathBuf {
        self.layers_dir().join(layer_sha)
    }

    /// Uncompressed layer tar file
    pub fn layer_tar(&self, layer_sha: &str) -> PathBuf {
        self.layer_dir(layer_sha).join("layer.tar")
    }

    /// Image index file (maps tags to image IDs)
    pub fn image_index(&self) -> PathBuf {
        self.root.join("images.json")
    }

    /// Append-only log of push events
    pub fn events_log(&self) -> PathBuf {
        self.root.join("events.jsonl")
    }

    /// User configuration file
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }
}
