//! User configuration loaded from `config.json` under the store root

use crate::storage::paths::PorterPaths;
use crate::transport::Transport;
use crate::{PorterError, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Settings that apply to every command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PorterConfig {
    /// Transport assumed for destinations without a `transport:` prefix
    pub default_transport: Transport,
    /// User agent sent to registries
    pub user_agent: String,
}

impl Default for PorterConfig {
    fn default() -> Self {
        Self {
            default_transport: Transport::Docker,
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
        }
    }
}

impl PorterConfig {
    /// Load the config file, falling back to defaults when it is absent
    pub fn load(paths: &PorterPaths) -> Result<Self> {
        let path = paths.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| PorterError::Config(format!("{}: {}", path.display(), e)))
    }
}
