//! Image references and Docker/OCI manifest types

use crate::{PorterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry used when a reference names no domain
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag used when a reference names neither tag nor digest
pub const DEFAULT_TAG: &str = "latest";

/// Docker/OCI image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry (e.g., "docker.io", "ghcr.io")
    pub registry: String,
    /// Repository (e.g., "library/alpine", "myuser/myapp")
    pub repository: String,
    /// Explicit tag, if the reference carried one
    pub tag: Option<String>,
    /// Digest (optional, e.g., "sha256:...")
    pub digest: Option<String>,
}

/// A repository name paired with an explicit tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedTagged {
    name: String,
    tag: String,
}

impl NamedTagged {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Fully qualified repository name, e.g. `docker.io/library/alpine`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Short form used by `docker save`, e.g. `alpine:3.18`
    pub fn familiar(&self) -> String {
        format!("{}:{}", familiar_name(&self.name), self.tag)
    }
}

impl fmt::Display for NamedTagged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl ImageReference {
    /// Parse an image reference string leniently.
    ///
    /// Anything shaped like `[registry/]repo[:tag][@digest]` is accepted
    /// without validating the characters of each component. Use
    /// [`ImageReference::parse_named`] where a malformed name must be
    /// rejected.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PorterError::InvalidReference(
                "Empty image reference".to_string(),
            ));
        }

        let (ref_without_digest, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (reference, None),
        };

        let (ref_without_tag, tag) = split_tag(ref_without_digest);
        let (registry, repository) = split_registry(ref_without_tag);

        Ok(Self {
            registry,
            repository,
            tag: tag.map(String::from),
            digest,
        })
    }

    /// Parse a named reference, validating every component.
    ///
    /// Mirrors the grammar of the distribution reference format: an
    /// optional domain, lowercase path components, an optional tag and an
    /// optional digest. Names without a domain are normalized onto
    /// `docker.io`, single component names onto `docker.io/library`.
    pub fn parse_named(reference: &str) -> Result<Self> {
        let invalid = |why: &str| PorterError::InvalidReference(format!("{reference}: {why}"));

        if reference.is_empty() {
            return Err(invalid("empty reference"));
        }

        let (name_and_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                if !is_valid_digest(digest) {
                    return Err(invalid("invalid digest"));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_and_tag);
        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return Err(invalid("invalid tag"));
            }
        }

        if name.len() > 255 {
            return Err(invalid("repository name must not be more than 255 characters"));
        }

        let (domain, path) = match name.split_once('/') {
            Some((first, rest)) if looks_like_domain(first) => (Some(first), rest),
            _ => (None, name),
        };

        if let Some(domain) = domain {
            if !is_valid_domain(domain) {
                return Err(invalid("invalid domain"));
            }
        }
        if !path.split('/').all(is_valid_path_component) {
            return Err(invalid("invalid reference format"));
        }

        let registry = domain.unwrap_or(DEFAULT_REGISTRY).to_string();
        let repository = if registry == DEFAULT_REGISTRY && !path.contains('/') {
            format!("library/{path}")
        } else {
            path.to_string()
        };

        Ok(Self {
            registry,
            repository,
            tag: tag.map(String::from),
            digest,
        })
    }

    /// Repository name including the registry, even for docker.io
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Key under which the local store indexes this reference
    pub fn canonical_name(&self) -> String {
        format!("{}:{}", self.name(), self.tag())
    }

    /// Get the tag, falling back to `latest`
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// The name and tag, only when the reference spelled out a tag
    pub fn tagged(&self) -> Option<NamedTagged> {
        self.tag
            .as_ref()
            .map(|tag| NamedTagged::new(self.name(), tag.clone()))
    }

    /// Tag or digest to address the manifest with
    pub fn manifest_reference(&self) -> &str {
        match (&self.tag, &self.digest) {
            (None, Some(digest)) => digest,
            _ => self.tag(),
        }
    }

    /// Get the API URL for the registry
    pub fn registry_url(&self) -> String {
        if self.registry == DEFAULT_REGISTRY {
            "https://registry-1.docker.io".to_string()
        } else if self.registry.starts_with("localhost") || self.registry.starts_with("127.") {
            format!("http://{}", self.registry)
        } else {
            format!("https://{}", self.registry)
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// Split a trailing `:tag`; a colon followed by a `/` belongs to a port.
fn split_tag(reference: &str) -> (&str, Option<&str>) {
    match reference.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, Some(tag)),
        _ => (reference, None),
    }
}

fn split_registry(name: &str) -> (String, String) {
    match name.split_once('/') {
        Some((first, rest)) if looks_like_domain(first) => (first.to_string(), rest.to_string()),
        Some(_) => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        None => (DEFAULT_REGISTRY.to_string(), format!("library/{name}")),
    }
}

fn looks_like_domain(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

fn familiar_name(name: &str) -> &str {
    let name = name
        .strip_prefix(DEFAULT_REGISTRY)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name);
    match name.strip_prefix("library/") {
        Some(short) if !short.contains('/') => short,
        _ => name,
    }
}

/// `[a-z0-9]+` runs joined by `.`, `_`, `__` or any number of `-`
fn is_valid_path_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    if bytes.is_empty() || !alnum(&bytes[0]) || !alnum(&bytes[bytes.len() - 1]) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        if alnum(&bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !alnum(&bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let ok = matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-');
        if !ok {
            return false;
        }
    }
    true
}

fn is_valid_domain(domain: &str) -> bool {
    let (host, port) = match domain.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };

    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }

    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

/// `[\w][\w.-]{0,127}`
fn is_valid_tag(tag: &str) -> bool {
    let word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let bytes = tag.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 128
        && word(bytes[0])
        && bytes[1..].iter().all(|&b| word(b) || b == b'.' || b == b'-')
}

fn is_valid_digest(digest: &str) -> bool {
    match digest.split_once(':') {
        Some((algorithm, hex)) => {
            !algorithm.is_empty()
                && algorithm
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"+._-".contains(&b))
                && hex.len() >= 32
                && hex.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Docker Image Manifest, schema version 2
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<std::collections::HashMap<String, String>>,
}

/// OCI Content Descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<std::collections::HashMap<String, String>>,
}

impl Descriptor {
    pub fn new(media_type: &str, digest: String, size: usize) -> Self {
        Self {
            media_type: media_type.to_string(),
            digest,
            size: size as i64,
            urls: None,
            annotations: None,
        }
    }
}

/// Media types
pub mod media_types {
    pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const DOCKER_CONTAINER_IMAGE: &str = "application/vnd.docker.container.image.v1+json";
    pub const DOCKER_LAYER_TAR_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    pub const DOCKER_LAYER_TAR: &str = "application/vnd.docker.image.rootfs.diff.tar";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_image() {
        let reference = ImageReference::parse("alpine").unwrap();
        assert_eq!(reference.registry, "docker.io");
        assert_eq!(reference.repository, "library/alpine");
        assert_eq!(reference.tag(), "latest");
        assert!(reference.tagged().is_none());
    }

    #[test]
    fn test_parse_image_with_registry_port() {
        let reference = ImageReference::parse("localhost:5000/owner/repo").unwrap();
        assert_eq!(reference.registry, "localhost:5000");
        assert_eq!(reference.repository, "owner/repo");
        assert_eq!(reference.tag, None);
        assert_eq!(reference.registry_url(), "http://localhost:5000");
    }

    #[test]
    fn test_canonical_name() {
        let reference = ImageReference::parse("alpine:3.18").unwrap();
        assert_eq!(reference.canonical_name(), "docker.io/library/alpine:3.18");

        let reference = ImageReference::parse("ghcr.io/owner/repo:tag").unwrap();
        assert_eq!(reference.canonical_name(), "ghcr.io/owner/repo:tag");
    }

    #[test]
    fn test_parse_named_normalizes() {
        let reference = ImageReference::parse_named("myuser/myapp:v1.0").unwrap();
        assert_eq!(reference.registry, "docker.io");
        assert_eq!(reference.repository, "myuser/myapp");

        let tagged = reference.tagged().unwrap();
        assert_eq!(tagged.name(), "docker.io/myuser/myapp");
        assert_eq!(tagged.tag(), "v1.0");
        assert_eq!(tagged.familiar(), "myuser/myapp:v1.0");
    }

    #[test]
    fn test_parse_named_rejects_malformed() {
        assert!(ImageReference::parse_named("").is_err());
        assert!(ImageReference::parse_named("UPPER/case").is_err());
        assert!(ImageReference::parse_named("repo:bad tag").is_err());
        assert!(ImageReference::parse_named("docker-archive:/tmp/out.tar").is_err());
        assert!(ImageReference::parse_named("docker-archive:/tmp/out.tar:app:v1").is_err());
        assert!(ImageReference::parse_named("repo@sha256:short").is_err());
    }

    #[test]
    fn test_parse_named_with_digest() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let reference = ImageReference::parse_named(&format!("quay.io/org/app@{digest}")).unwrap();
        assert_eq!(reference.registry, "quay.io");
        assert_eq!(reference.digest.as_deref(), Some(digest.as_str()));
        assert_eq!(reference.manifest_reference(), digest);
        assert!(reference.tagged().is_none());
    }

    #[test]
    fn test_path_components() {
        assert!(is_valid_path_component("my-app"));
        assert!(is_valid_path_component("my__app"));
        assert!(is_valid_path_component("a---b"));
        assert!(!is_valid_path_component("a.-b"));
        assert!(!is_valid_path_component("-app"));
        assert!(!is_valid_path_component("app_"));
    }

    #[test]
    fn test_familiar_name() {
        assert_eq!(NamedTagged::new("docker.io/library/alpine", "3").familiar(), "alpine:3");
        assert_eq!(NamedTagged::new("quay.io/org/app", "v1").familiar(), "quay.io/org/app:v1");
    }
}
