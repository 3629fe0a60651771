/// Engine configuration loading from a JSON file
use crate::config::types::{ResourceLimits, Result, SandboxError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Immutable engine configuration, built once at startup
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Resource envelope applied to every job
    pub limits: ResourceLimits,
    /// Directory under which per-job workspaces are created
    pub workspace_root: PathBuf,
    /// Container CLI used to launch sandboxes
    pub docker_binary: String,
    /// Image overrides keyed by language id
    pub images: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            workspace_root: std::env::temp_dir(),
            docker_binary: "docker".to_string(),
            images: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SandboxError::Config(format!(
                "Failed to parse config JSON {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load from `path` when given, otherwise fall back to built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = Self::load_from_file(path)?;
                log::info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                log::debug!("No config file given, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}
