//! Tag preservation for docker-archive destinations

use crate::image::oci::{ImageReference, NamedTagged};
use crate::transport::{Transport, TransportReference};
use tracing::debug;

/// Tags to embed in the archive written for `destination`.
///
/// Only docker-archive destinations get any. The destination string must
/// parse as a named reference with an explicit tag; otherwise the archive is
/// written untagged.
pub fn preserved_tags(destination: &str, reference: &TransportReference) -> Vec<NamedTagged> {
    if reference.transport() != Transport::DockerArchive {
        return Vec::new();
    }

    match ImageReference::parse_named(destination) {
        Ok(named) => named.tagged().into_iter().collect(),
        Err(e) => {
            debug!("Not preserving a tag for {}: {}", destination, e);
            Vec::new()
        }
    }
}
