//! Destination resolution with default-transport fallback

use crate::transport::{Transport, TransportReference, TransportRegistry};
use crate::{PorterError, Result};
use tracing::debug;

/// How a destination string was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The string named its transport itself
    Qualified(TransportReference),
    /// The string only parsed once the default transport was prepended
    Defaulted(TransportReference),
}

impl Resolution {
    pub fn reference(&self) -> &TransportReference {
        match self {
            Self::Qualified(reference) | Self::Defaulted(reference) => reference,
        }
    }

    pub fn into_reference(self) -> TransportReference {
        match self {
            Self::Qualified(reference) | Self::Defaulted(reference) => reference,
        }
    }
}

/// Resolve `destination`, retrying with `default`'s prefix if it does not
/// parse as is. When both attempts fail the error of the first one is kept.
pub fn resolve(
    transports: &TransportRegistry,
    default: Transport,
    destination: &str,
) -> Result<Resolution> {
    let original = match transports.parse(destination) {
        Ok(reference) => return Ok(Resolution::Qualified(reference)),
        Err(e) => e,
    };

    match transports.parse(&format!("{}{}", default.prefix(), destination)) {
        Ok(reference) => Ok(Resolution::Defaulted(reference)),
        Err(fallback) => {
            debug!(
                "Destination {} is not valid with the {} transport either: {}",
                destination,
                default,
                fallback
            );
            Err(PorterError::TransportResolution {
                destination: destination.to_string(),
                source: Box::new(original),
            })
        }
    }
}
