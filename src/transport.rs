//! Transports and transport-qualified image references
//!
//! A destination is written as `transport:location`, e.g.
//! `docker://quay.io/org/app:v1`, `docker-archive:/tmp/app.tar:app:v1` or
//! `dir:/tmp/app`.

use crate::image::oci::ImageReference;
use crate::{PorterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A named scheme for locating and transferring an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    /// Container registry speaking the distribution API
    #[serde(rename = "docker")]
    Docker,
    /// Single tarball in `docker save` format
    #[serde(rename = "docker-archive")]
    DockerArchive,
    /// Directory holding a manifest and one file per blob
    #[serde(rename = "dir")]
    Dir,
}

impl Transport {
    pub const ALL: [Transport; 3] = [Transport::Docker, Transport::DockerArchive, Transport::Dir];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::DockerArchive => "docker-archive",
            Self::Dir => "dir",
        }
    }

    /// Prefix that turns a bare location into a qualified reference
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Docker => "docker://",
            Self::DockerArchive => "docker-archive:",
            Self::Dir => "dir:",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transport {
    type Err = PorterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| PorterError::InvalidReference(format!("unknown transport {s:?}")))
    }
}

/// Transport-specific part of a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Registry(ImageReference),
    Archive {
        path: PathBuf,
        reference: Option<ImageReference>,
    },
    Dir(PathBuf),
}

/// A destination resolved to a transport and a location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReference {
    location: Location,
}

impl TransportReference {
    pub fn new(location: Location) -> Self {
        Self { location }
    }

    pub fn transport(&self) -> Transport {
        match self.location {
            Location::Registry(_) => Transport::Docker,
            Location::Archive { .. } => Transport::DockerArchive,
            Location::Dir(_) => Transport::Dir,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport().name()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl fmt::Display for TransportReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.transport().prefix())?;
        match &self.location {
            Location::Registry(reference) => write!(f, "{reference}"),
            Location::Archive { path, reference } => {
                write!(f, "{}", path.display())?;
                if let Some(reference) = reference {
                    write!(f, ":{reference}")?;
                }
                Ok(())
            }
            Location::Dir(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Parses `transport:location` strings for the transports it knows
#[derive(Debug, Clone)]
pub struct TransportRegistry {
    transports: Vec<Transport>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new(Transport::ALL.to_vec())
    }
}

impl TransportRegistry {
    pub fn new(transports: Vec<Transport>) -> Self {
        Self { transports }
    }

    /// Look up a transport by name
    pub fn get(&self, name: &str) -> Option<Transport> {
        self.transports.iter().copied().find(|t| t.name() == name)
    }

    /// Parse a fully transport-qualified image name
    pub fn parse(&self, image_name: &str) -> Result<TransportReference> {
        let (name, within) = image_name.split_once(':').ok_or_else(|| {
            PorterError::InvalidReference(format!(
                "{image_name}: expected colon-separated transport:reference"
            ))
        })?;

        let transport = self.get(name).ok_or_else(|| {
            PorterError::InvalidReference(format!("{image_name}: unknown transport {name:?}"))
        })?;

        let location = match transport {
            Transport::Docker => parse_docker(within)?,
            Transport::DockerArchive => parse_archive(within)?,
            Transport::Dir => Location::Dir(non_empty_path(within)?),
        };

        Ok(TransportReference::new(location))
    }
}

fn parse_docker(within: &str) -> Result<Location> {
    let name = within.strip_prefix("//").ok_or_else(|| {
        PorterError::InvalidReference(format!(
            "docker:{within}: docker references must start with //"
        ))
    })?;

    let mut reference = ImageReference::parse_named(name)?;
    if reference.tag.is_none() && reference.digest.is_none() {
        reference.tag = Some(crate::image::oci::DEFAULT_TAG.to_string());
    }
    Ok(Location::Registry(reference))
}

fn parse_archive(within: &str) -> Result<Location> {
    let (path, reference) = match within.split_once(':') {
        Some((path, reference)) => (path, Some(reference)),
        None => (within, None),
    };
    let path = non_empty_path(path)?;

    let reference = match reference {
        Some(reference) => {
            let mut reference = ImageReference::parse_named(reference)?;
            if reference.digest.is_some() {
                return Err(PorterError::InvalidReference(format!(
                    "docker-archive:{within}: digest references are not allowed"
                )));
            }
            if reference.tag.is_none() {
                reference.tag = Some(crate::image::oci::DEFAULT_TAG.to_string());
            }
            Some(reference)
        }
        None => None,
    };

    Ok(Location::Archive { path, reference })
}

fn non_empty_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(PorterError::InvalidReference(
            "path must not be empty".to_string(),
        ));
    }
    Ok(Path::new(path).to_path_buf())
}
