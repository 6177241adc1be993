//! Annotator settings
//!
//! Loaded from a YAML document; every field is optional.
//!
//! ```yaml
//! history_limit: 100
//! navigation_debounce_ms: 50
//! backup_on_edit: true
//! backup_path: /tmp/annotator-backup.json
//! ```

use crate::error::PersistError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Maximum number of undo steps kept
    pub history_limit: usize,
    /// Minimum interval between repeated navigation gestures; honored by
    /// the caller, the engine records every navigation it is given
    pub navigation_debounce_ms: u64,
    /// Write a snapshot after every committed edit
    pub backup_on_edit: bool,
    pub backup_path: Option<PathBuf>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            navigation_debounce_ms: 50,
            backup_on_edit: false,
            backup_path: None,
        }
    }
}

impl AnnotatorConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PersistError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&content)?;
        log::info!("Loaded annotator config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Backup destination, only when backups are switched on
    pub fn backup_target(&self) -> Option<&Path> {
        self.backup_path.as_deref().filter(|_| self.backup_on_edit)
    }
}
