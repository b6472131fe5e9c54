//! Directory destinations: one file per blob plus `manifest.json`

use crate::copy::{report_blob, Blob};
use crate::storage::layers::strip_algorithm;
use crate::Result;
use std::fs;
use std::path::Path;

const VERSION_FILE_CONTENTS: &str = "Directory Transport Version: 1.1\n";

/// Write blobs and manifest into `path`, creating it if needed
pub fn write_dir(
    path: &Path,
    config: &Blob,
    layers: &[Blob],
    manifest: &[u8],
    quiet: bool,
) -> Result<()> {
    fs::create_dir_all(path)?;
    fs::write(path.join("version"), VERSION_FILE_CONTENTS)?;

    for blob in layers.iter().chain(std::iter::once(config)) {
        let blob_path = path.join(strip_algorithm(blob.digest()));
        let skipped = blob_path.exists();
        if !skipped {
            fs::write(&blob_path, &blob.data)?;
        }
        report_blob(quiet, blob, skipped);
    }

    if !quiet {
        eprintln!("Writing manifest to image destination");
    }
    fs::write(path.join("manifest.json"), manifest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::oci::media_types;
    use tempfile::TempDir;

    #[test]
    fn test_write_dir_layout() {
        let tmp = TempDir::new().unwrap();
        let config = Blob::new(media_types::DOCKER_CONTAINER_IMAGE, b"{}".to_vec());
        let layer = Blob::new(media_types::DOCKER_LAYER_TAR, b"layer".to_vec());

        write_dir(tmp.path(), &config, &[layer.clone()], b"manifest", true).unwrap();

        assert_eq!(
            fs::read_to_string(tmp.path().join("version")).unwrap(),
            VERSION_FILE_CONTENTS
        );
        assert_eq!(
            fs::read(tmp.path().join(strip_algorithm(layer.digest()))).unwrap(),
            b"layer"
        );
        assert_eq!(fs::read(tmp.path().join("manifest.json")).unwrap(), b"manifest");
    }
}
