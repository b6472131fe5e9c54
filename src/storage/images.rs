//! Image metadata storage

use crate::image::oci::{ImageReference, NamedTagged};
use crate::storage::paths::PorterPaths;
use crate::{PorterError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;

/// Image metadata stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub id: String,
    /// Canonical `registry/repository:tag` names, in the order they were added
    #[serde(default)]
    pub repo_tags: Vec<String>,
    pub digest: Option<String>,
    pub created: DateTime<Utc>,
    pub size: u64,
    /// Layer diff IDs, bottom first
    pub layers: Vec<String>,
}

/// Image index for quick lookups
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ImageIndex {
    /// Maps "registry/repository:tag" to image IDs
    tags: HashMap<String, String>,
    /// Maps short IDs to full IDs
    short_ids: HashMap<String, String>,
}

/// Locates an image inside the local store for the copy engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReference {
    pub id: String,
    pub name: Option<String>,
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}@{}", name, self.id),
            None => write!(f, "@{}", self.id),
        }
    }
}

/// Handle to an image found in the local store
#[derive(Debug, Clone)]
pub struct LocalImage {
    metadata: ImageMetadata,
    paths: PorterPaths,
}

impl LocalImage {
    pub fn new(metadata: ImageMetadata, paths: &PorterPaths) -> Self {
        Self {
            metadata,
            paths: paths.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Reference the copy engines read the image through.
    ///
    /// Fails if the image was removed from disk after it was looked up.
    pub fn storage_reference(&self) -> Result<StorageReference> {
        if !self.paths.image_dir(&self.metadata.id).exists() {
            return Err(PorterError::ImageNotFound(self.metadata.id.clone()));
        }
        Ok(StorageReference {
            id: self.metadata.id.clone(),
            name: self.metadata.repo_tags.first().cloned(),
        })
    }

    /// Every repository tag of the image that carries an explicit tag
    pub fn named_tagged_repo_tags(&self) -> Result<Vec<NamedTagged>> {
        let mut tagged = Vec::with_capacity(self.metadata.repo_tags.len());
        for name in &self.metadata.repo_tags {
            if let Some(named) = ImageReference::parse_named(name)?.tagged() {
                tagged.push(named);
            }
        }
        Ok(tagged)
    }
}

/// Resolves user-supplied names to local images
pub trait ImageLookup: Send + Sync {
    /// Find `name` regardless of platform and return the image together
    /// with the name it was resolved as.
    fn lookup_image(&self, name: &str) -> Result<(LocalImage, String)>;
}

/// Manages image metadata storage
pub struct ImageStore {
    paths: PorterPaths,
}

impl ImageStore {
    /// Create a new image store
    pub fn new(paths: &PorterPaths) -> Result<Self> {
        Ok(Self {
            paths: paths.clone(),
        })
    }

    /// Find an image by name, tag, or ID
    pub fn find(&self, name_or_id: &str) -> Option<String> {
        self.resolve(name_or_id).map(|(id, _)| id)
    }

    /// Resolve a name or ID to an image ID and the name it matched
    fn resolve(&self, name_or_id: &str) -> Option<(String, String)> {
        if let Ok(index) = self.load_index() {
            if let Some(id) = index.tags.get(name_or_id) {
                return Some((id.clone(), name_or_id.to_string()));
            }

            // Normalize short names like "alpine" or "alpine:3.18"
            if let Ok(reference) = ImageReference::parse(name_or_id) {
                let canonical = reference.canonical_name();
                if let Some(id) = index.tags.get(&canonical) {
                    return Some((id.clone(), canonical));
                }
            }

            if let Some(id) = index.short_ids.get(name_or_id) {
                return Some((id.clone(), name_or_id.to_string()));
            }

            if index.short_ids.values().any(|id| id == name_or_id) {
                return Some((name_or_id.to_string(), name_or_id.to_string()));
            }
        }

        let clean_id = name_or_id.strip_prefix("sha256:").unwrap_or(name_or_id);
        if !clean_id.is_empty() && !clean_id.contains('/') && self.paths.image_metadata(clean_id).exists() {
            return Some((clean_id.to_string(), name_or_id.to_string()));
        }

        None
    }

    /// Store image metadata and index its tags
    pub fn store(
        &self,
        image_id: &str,
        repo_tags: &[String],
        digest: Option<&str>,
        layers: &[String],
        size: u64,
    ) -> Result<()> {
        fs::create_dir_all(self.paths.image_dir(image_id))?;

        // Storing an image again keeps the tags it already had
        let existing = self.load_metadata(image_id).ok();
        let metadata = ImageMetadata {
            id: image_id.to_string(),
            repo_tags: existing
                .as_ref()
                .map(|m| m.repo_tags.clone())
                .unwrap_or_default(),
            digest: digest.map(String::from),
            created: existing.map(|m| m.created).unwrap_or_else(Utc::now),
            size,
            layers: layers.to_vec(),
        };
        self.save_metadata(&metadata)?;

        let mut index = self.load_index().unwrap_or_default();
        let short_id = &image_id[..12.min(image_id.len())];
        index
            .short_ids
            .insert(short_id.to_string(), image_id.to_string());
        self.save_index(&index)?;

        for name in repo_tags {
            self.tag(image_id, &ImageReference::parse_named(name)?)?;
        }

        Ok(())
    }

    /// Load image metadata
    pub fn load_metadata(&self, image_id: &str) -> Result<ImageMetadata> {
        let metadata_path = self.paths.image_metadata(image_id);
        let metadata_json = fs::read_to_string(&metadata_path)
            .map_err(|_| PorterError::ImageNotFound(image_id.to_string()))?;
        let metadata: ImageMetadata = serde_json::from_str(&metadata_json)?;
        Ok(metadata)
    }

    fn save_metadata(&self, metadata: &ImageMetadata) -> Result<()> {
        let metadata_json = serde_json::to_string_pretty(metadata)?;
        fs::write(self.paths.image_metadata(&metadata.id), metadata_json)?;
        Ok(())
    }

    /// Raw config blob of an image
    pub fn config_bytes(&self, image_id: &str) -> Result<Vec<u8>> {
        let config_path = self.paths.image_config(image_id);
        fs::read(&config_path).map_err(|_| {
            PorterError::ImageNotFound(format!("{}: missing config blob", image_id))
        })
    }

    /// Save the config blob of an image
    pub fn save_config_bytes(&self, image_id: &str, config: &[u8]) -> Result<()> {
        fs::create_dir_all(self.paths.image_dir(image_id))?;
        fs::write(self.paths.image_config(image_id), config)?;
        Ok(())
    }

    /// Tag an image, moving the tag off any image that held it before
    pub fn tag(&self, image_id: &str, reference: &ImageReference) -> Result<()> {
        let tag_key = reference.canonical_name();
        let mut index = self.load_index().unwrap_or_default();

        if let Some(previous) = index.tags.get(&tag_key).cloned() {
            if previous != image_id {
                if let Ok(mut metadata) = self.load_metadata(&previous) {
                    metadata.repo_tags.retain(|t| t != &tag_key);
                    self.save_metadata(&metadata)?;
                }
            }
        }

        let mut metadata = self.load_metadata(image_id)?;
        if !metadata.repo_tags.contains(&tag_key) {
            metadata.repo_tags.push(tag_key.clone());
            self.save_metadata(&metadata)?;
        }

        index.tags.insert(tag_key, image_id.to_string());
        self.save_index(&index)?;

        Ok(())
    }

    /// Remove a tag from whichever image holds it
    pub fn untag(&self, reference: &ImageReference) -> Result<()> {
        let tag_key = reference.canonical_name();
        let mut index = self.load_index().unwrap_or_default();

        let image_id = index
            .tags
            .remove(&tag_key)
            .ok_or_else(|| PorterError::ImageNotFound(tag_key.clone()))?;

        let mut metadata = self.load_metadata(&image_id)?;
        metadata.repo_tags.retain(|t| t != &tag_key);
        self.save_metadata(&metadata)?;
        self.save_index(&index)?;

        Ok(())
    }

    /// List all images
    pub fn list(&self) -> Result<Vec<ImageMetadata>> {
        let images_dir = self.paths.images_dir();
        if !images_dir.exists() {
            return Ok(Vec::new());
        }

        let mut images = Vec::new();
        for entry in fs::read_dir(images_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let image_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(metadata) = self.load_metadata(&image_id) {
                    images.push(metadata);
                }
            }
        }

        images.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(images)
    }

    fn load_index(&self) -> Result<ImageIndex> {
        let index_path = self.paths.image_index();
        if !index_path.exists() {
            return Ok(ImageIndex::default());
        }
        let index_json = fs::read_to_string(&index_path)?;
        let index: ImageIndex = serde_json::from_str(&index_json)?;
        Ok(index)
    }

    fn save_index(&self, index: &ImageIndex) -> Result<()> {
        let index_json = serde_json::to_string_pretty(index)?;
        fs::write(self.paths.image_index(), index_json)?;
        Ok(())
    }
}

impl ImageLookup for ImageStore {
    fn lookup_image(&self, name: &str) -> Result<(LocalImage, String)> {
        let (image_id, resolved) = self
            .resolve(name)
            .ok_or_else(|| PorterError::ImageNotFound(name.to_string()))?;
        let metadata = self.load_metadata(&image_id)?;
        tracing::debug!("Resolved {} to image {}", name, image_id);
        Ok((LocalImage::new(metadata, &self.paths), resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_image(tmp: &TempDir) -> ImageStore {
        let paths = PorterPaths::with_root(tmp.path());
        paths.ensure_directories().unwrap();

        let store = ImageStore::new(&paths).unwrap();
        store
            .store(
                "abc123456789def",
                &["docker.io/library/alpine:latest".to_string()],
                Some("sha256:abc"),
                &["sha256:layer1".to_string()],
                1024,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_find_by_tag_and_id() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_image(&tmp);

        assert_eq!(
            store.find("docker.io/library/alpine:latest"),
            Some("abc123456789def".to_string())
        );
        assert_eq!(store.find("alpine"), Some("abc123456789def".to_string()));
        assert_eq!(store.find("abc123456789"), Some("abc123456789def".to_string()));
        assert_eq!(store.find("abc123456789def"), Some("abc123456789def".to_string()));
        assert_eq!(store.find("busybox"), None);
    }

    #[test]
    fn test_lookup_reports_resolved_name() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_image(&tmp);

        let (image, resolved) = store.lookup_image("alpine").unwrap();
        assert_eq!(image.id(), "abc123456789def");
        assert_eq!(resolved, "docker.io/library/alpine:latest");

        let (_, resolved) = store.lookup_image("abc123456789").unwrap();
        assert_eq!(resolved, "abc123456789");

        let err = store.lookup_image("busybox").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_tags_keep_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_image(&tmp);

        for name in ["quay.io/org/app:v2", "quay.io/org/app:v1"] {
            store
                .tag("abc123456789def", &ImageReference::parse_named(name).unwrap())
                .unwrap();
        }

        let (image, _) = store.lookup_image("alpine").unwrap();
        let tags: Vec<_> = image
            .named_tagged_repo_tags()
            .unwrap()
            .iter()
            .map(|t| t.tag().to_string())
            .collect();
        assert_eq!(tags, ["latest", "v2", "v1"]);
    }

    #[test]
    fn test_tag_moves_between_images() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_image(&tmp);
        store
            .store("fff000000000aaa", &[], None, &[], 0)
            .unwrap();

        let reference = ImageReference::parse_named("alpine:latest").unwrap();
        store.tag("fff000000000aaa", &reference).unwrap();

        assert_eq!(store.find("alpine"), Some("fff000000000aaa".to_string()));
        assert!(store.load_metadata("abc123456789def").unwrap().repo_tags.is_empty());

        store.untag(&reference).unwrap();
        assert_eq!(store.find("alpine"), None);
    }

    #[test]
    fn test_storage_reference_requires_image_on_disk() {
        let tmp = TempDir::new().unwrap();
        let store = store_with_image(&tmp);
        let (image, _) = store.lookup_image("alpine").unwrap();

        let reference = image.storage_reference().unwrap();
        assert_eq!(reference.to_string(), "docker.io/library/alpine:latest@abc123456789def");

        fs::remove_dir_all(tmp.path().join("images/abc123456789def")).unwrap();
        assert!(image.storage_reference().unwrap_err().is_not_found());
    }
}
