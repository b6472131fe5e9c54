//! `docker save` compatible archives
//!
//! Layout: `manifest.json` listing each image, `<config hex>.json` and one
//! `<diff id hex>/layer.tar` per layer.

use crate::copy::{report_blob, Blob};
use crate::image::oci::ImageReference;
use crate::storage::images::ImageStore;
use crate::storage::layers::{strip_algorithm, LayerManager};
use crate::storage::paths::PorterPaths;
use crate::{PorterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// One entry of an archive's `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveEntry {
    pub config: String,
    #[serde(default)]
    pub repo_tags: Vec<String>,
    pub layers: Vec<String>,
}

/// Write a single-image archive at `path`, replacing any existing file
pub fn write_archive(
    path: &Path,
    config: &Blob,
    layers: &[Blob],
    repo_tags: &[String],
    quiet: bool,
) -> Result<()> {
    let config_name = format!("{}.json", strip_algorithm(config.digest()));
    let layer_names: Vec<String> = layers
        .iter()
        .map(|l| format!("{}/layer.tar", strip_algorithm(l.digest())))
        .collect();

    let entry = ArchiveEntry {
        config: config_name.clone(),
        repo_tags: repo_tags.to_vec(),
        layers: layer_names.clone(),
    };
    let manifest = serde_json::to_vec(&[entry])?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temporary_sibling(path);

    let result = (|| -> Result<()> {
        let mut builder = tar::Builder::new(File::create(&tmp_path)?);
        for (name, blob) in layer_names.iter().zip(layers) {
            append_file(&mut builder, name, &blob.data)?;
            report_blob(quiet, blob, false);
        }
        append_file(&mut builder, &config_name, &config.data)?;
        append_file(&mut builder, "manifest.json", &manifest)?;
        builder.into_inner()?.sync_all()?;
        if !quiet {
            eprintln!("Writing manifest to image destination");
        }
        Ok(())
    })();

    // The temporary archive must not outlive a failed write or rename
    if let Err(e) = result.and_then(|()| Ok(fs::rename(&tmp_path, path)?)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    tracing::debug!("Wrote archive {} with tags {:?}", path.display(), repo_tags);
    Ok(())
}

fn append_file<W: std::io::Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
}

/// Read the entries of an archive's `manifest.json`
pub fn read_manifest(path: &Path) -> Result<Vec<ArchiveEntry>> {
    let files = read_files(path)?;
    parse_manifest(&files)
}

fn parse_manifest(files: &HashMap<String, Vec<u8>>) -> Result<Vec<ArchiveEntry>> {
    let manifest = files
        .get("manifest.json")
        .ok_or_else(|| PorterError::Copy("archive has no manifest.json".to_string()))?;
    Ok(serde_json::from_slice(manifest)?)
}

fn read_files(path: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(File::open(path)?);
    let mut files = HashMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().trim_start_matches("./").to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        files.insert(name, data);
    }

    Ok(files)
}

/// Load every image of an archive into the local store, returning their IDs
pub fn load_archive(paths: &PorterPaths, path: &Path) -> Result<Vec<String>> {
    let files = read_files(path)?;
    let entries = parse_manifest(&files)?;

    let store = ImageStore::new(paths)?;
    let layer_manager = LayerManager::new(paths);
    let missing = |name: &str| PorterError::Copy(format!("archive is missing {}", name));

    let mut loaded = Vec::with_capacity(entries.len());
    for entry in entries {
        let config = files.get(&entry.config).ok_or_else(|| missing(&entry.config))?;
        let config_digest = LayerManager::compute_digest_bytes(config);
        let image_id = strip_algorithm(&config_digest).to_string();

        let mut diff_ids = Vec::with_capacity(entry.layers.len());
        let mut size = 0u64;
        for layer in &entry.layers {
            let data = files.get(layer).ok_or_else(|| missing(layer))?;
            diff_ids.push(layer_manager.store_layer_bytes(data)?);
            size += data.len() as u64;
        }

        let mut repo_tags = Vec::with_capacity(entry.repo_tags.len());
        for tag in &entry.repo_tags {
            match ImageReference::parse_named(tag) {
                Ok(reference) => repo_tags.push(reference.canonical_name()),
                Err(e) => tracing::warn!("Ignoring tag {} in {}: {}", tag, path.display(), e),
            }
        }

        store.save_config_bytes(&image_id, config)?;
        store.store(&image_id, &repo_tags, Some(&config_digest), &diff_ids, size)?;
        tracing::info!("Loaded image {} from {}", &image_id[..12.min(image_id.len())], path.display());
        loaded.push(image_id);
    }

    Ok(loaded)
}
