//! Copy engines moving a stored image to a destination
//!
//! [`Copier`] is the seam the push logic talks to. [`LocalCopier`] reads
//! images out of the local store and writes them through one of the
//! transport-specific writers.

pub mod archive;
pub mod dir;
pub mod registry;

use crate::config::PorterConfig;
use crate::image::oci::{media_types, Descriptor, ImageManifest, NamedTagged};
use crate::storage::images::{ImageStore, StorageReference};
use crate::storage::layers::LayerManager;
use crate::storage::paths::PorterPaths;
use crate::transport::{Location, TransportReference};
use crate::{PorterError, Result};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use registry::RegistryClient;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Options forwarded untouched from the caller to the copy engine
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Gzip layers for registry and directory destinations
    pub compress_layers: bool,
    /// Drop signatures while copying
    pub remove_signatures: bool,
    /// Suppress progress output
    pub quiet: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            compress_layers: true,
            remove_signatures: false,
            quiet: false,
        }
    }
}

/// Everything one copy needs besides the two references.
///
/// Built fresh for every destination; `archive_tags` only applies to
/// `docker-archive` destinations.
#[derive(Debug, Clone)]
pub struct CopyRequest<'a> {
    pub options: &'a CopyOptions,
    pub archive_tags: Vec<NamedTagged>,
}

impl<'a> CopyRequest<'a> {
    pub fn new(options: &'a CopyOptions) -> Self {
        Self {
            options,
            archive_tags: Vec::new(),
        }
    }
}

/// Transfers an image between two references
#[async_trait]
pub trait Copier: Send + Sync {
    /// Copy `source` to `destination` and return the manifest written there
    async fn copy(
        &self,
        source: &StorageReference,
        destination: &TransportReference,
        request: &CopyRequest<'_>,
    ) -> Result<Vec<u8>>;
}

/// A blob ready to be written, with its descriptor
#[derive(Debug, Clone)]
pub struct Blob {
    pub descriptor: Descriptor,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(media_type: &str, data: Vec<u8>) -> Self {
        let digest = LayerManager::compute_digest_bytes(&data);
        Self {
            descriptor: Descriptor::new(media_type, digest, data.len()),
            data,
        }
    }

    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }
}

/// An image read back out of the local store
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub id: String,
    pub config: Vec<u8>,
    /// Uncompressed layer tars, bottom first
    pub layers: Vec<PathBuf>,
}

impl SourceImage {
    pub fn config_blob(&self) -> Blob {
        Blob::new(media_types::DOCKER_CONTAINER_IMAGE, self.config.clone())
    }

    /// Read every layer, gzipping it when `compress` is set
    pub fn layer_blobs(&self, compress: bool) -> Result<Vec<Blob>> {
        self.layers
            .iter()
            .map(|path| -> Result<Blob> {
                let data = fs::read(path)?;
                if compress {
                    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&data)?;
                    Ok(Blob::new(media_types::DOCKER_LAYER_TAR_GZIP, encoder.finish()?))
                } else {
                    Ok(Blob::new(media_types::DOCKER_LAYER_TAR, data))
                }
            })
            .collect()
    }
}

/// Assemble and serialize a schema 2 manifest
pub fn build_manifest(config: &Blob, layers: &[Blob]) -> Result<Vec<u8>> {
    let manifest = ImageManifest {
        schema_version: 2,
        media_type: Some(media_types::DOCKER_MANIFEST_V2.to_string()),
        config: config.descriptor.clone(),
        layers: layers.iter().map(|l| l.descriptor.clone()).collect(),
        annotations: None,
    };
    Ok(serde_json::to_vec_pretty(&manifest)?)
}

/// Copy engine reading from the local store
pub struct LocalCopier {
    store: ImageStore,
    layers: LayerManager,
    registry: RegistryClient,
}

impl LocalCopier {
    pub fn new(paths: &PorterPaths, config: &PorterConfig) -> Result<Self> {
        Ok(Self {
            store: ImageStore::new(paths)?,
            layers: LayerManager::new(paths),
            registry: RegistryClient::new(&config.user_agent)?,
        })
    }

    fn load_source(&self, source: &StorageReference) -> Result<SourceImage> {
        let metadata = self.store.load_metadata(&source.id)?;
        let config = self.store.config_bytes(&source.id)?;

        let mut layers = Vec::with_capacity(metadata.layers.len());
        for digest in &metadata.layers {
            if !self.layers.exists(digest) {
                return Err(PorterError::Copy(format!(
                    "layer {} of image {} is missing from the store",
                    digest, source.id
                )));
            }
            layers.push(self.layers.layer_tar_path(digest));
        }

        Ok(SourceImage {
            id: metadata.id,
            config,
            layers,
        })
    }
}

#[async_trait]
impl Copier for LocalCopier {
    async fn copy(
        &self,
        source: &StorageReference,
        destination: &TransportReference,
        request: &CopyRequest<'_>,
    ) -> Result<Vec<u8>> {
        let options = request.options;
        let image = self.load_source(source)?;

        if options.remove_signatures {
            tracing::debug!("Image {} carries no signatures, nothing to remove", image.id);
        }
        if !options.quiet {
            eprintln!("Getting image source signatures");
        }

        let config = image.config_blob();
        match destination.location() {
            Location::Registry(reference) => {
                let layers = image.layer_blobs(options.compress_layers)?;
                let manifest = build_manifest(&config, &layers)?;
                self.registry
                    .push(reference, &config, &layers, &manifest, options.quiet)
                    .await?;
                Ok(manifest)
            }
            Location::Archive { path, reference } => {
                let layers = image.layer_blobs(false)?;
                let manifest = build_manifest(&config, &layers)?;

                let mut repo_tags: Vec<String> =
                    request.archive_tags.iter().map(NamedTagged::familiar).collect();
                if let Some(tagged) = reference.as_ref().and_then(|r| r.tagged()) {
                    let familiar = tagged.familiar();
                    if !repo_tags.contains(&familiar) {
                        repo_tags.push(familiar);
                    }
                }

                archive::write_archive(path, &config, &layers, &repo_tags, options.quiet)?;
                Ok(manifest)
            }
            Location::Dir(path) => {
                let layers = image.layer_blobs(options.compress_layers)?;
                let manifest = build_manifest(&config, &layers)?;
                dir::write_dir(path, &config, &layers, &manifest, options.quiet)?;
                Ok(manifest)
            }
        }
    }
}

/// Print a blob progress line the way the other writers do
pub(crate) fn report_blob(quiet: bool, blob: &Blob, skipped: bool) {
    if quiet {
        return;
    }
    let hex = crate::storage::layers::strip_algorithm(blob.digest());
    let short = &hex[..12.min(hex.len())];
    if skipped {
        eprintln!("Copying blob {} skipped: already exists", short);
    } else {
        eprintln!("Copying blob {} done", short);
    }
}
