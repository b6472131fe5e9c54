//! Porter - push locally stored container images
//!
//! This crate keeps images in a local store and publishes them to container
//! registries, `docker-archive` tarballs or plain directory layouts. The
//! [`push::Pusher`] decides where an image goes; the [`copy`] engines move
//! the bytes.

pub mod cli;
pub mod config;
pub mod copy;
pub mod events;
pub mod image;
pub mod push;
pub mod storage;
pub mod transport;

use thiserror::Error;

/// Main error type for Porter operations
#[derive(Error, Debug)]
pub enum PorterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    #[error("Tag can't be used with --all-tags/-a: {0}")]
    ConflictingTag(String),

    #[error("Unsupported push mode: {0}")]
    UnsupportedMode(String),

    #[error("Invalid destination {destination:?}: {source}")]
    TransportResolution {
        destination: String,
        source: Box<PorterError>,
    },

    #[error("Copy error: {0}")]
    Copy(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl PorterError {
    /// Whether the error reports a source image missing from the local store
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ImageNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, PorterError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "porter";
