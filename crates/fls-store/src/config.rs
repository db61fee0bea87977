//! Store configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Configuration for an [`crate::ArtifactStore`].
///
/// Loadable from TOML; every field has a default:
///
/// ```toml
/// root = "./data"
/// default_branch = "main"
/// sync_writes = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `projects/`.
    pub root: PathBuf,
    /// Branch used when a node is created without one.
    pub default_branch: String,
    /// `fsync` every record write.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data"),
            default_branch: "main".into(),
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))
    }

    /// Directory of all projects.
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    fn check(&self) -> StoreResult<()> {
        crate::names::validate_branch_name(&self.default_branch)
            .map_err(|e| StoreError::Config(format!("default_branch: {e}")))
    }
}
