//! TOML-based engine configuration.
//!
//! Configuration is stored at `~/.config/eca/config.toml`. Every field has a
//! default, so a missing or partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EcaError, Result};
use crate::tokens::resolver::DEFAULT_LIST_SEPARATOR;
use crate::value::Value;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory the rule store reads documents from; `<data_dir>/rules` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_dir: Option<PathBuf>,

    /// Separator used when a list is rendered as text.
    #[serde(default = "default_list_separator")]
    pub list_separator: String,

    /// Result slot value used when the event does not bring one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_result: Option<serde_json::Value>,

    /// Rule ids that never take part in dispatch.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

fn default_list_separator() -> String {
    DEFAULT_LIST_SEPARATOR.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_dir: None,
            list_separator: default_list_separator(),
            default_result: None,
            disabled_rules: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Path of the configuration file in the data directory.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load from the data directory.
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::path()?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Directory of the rule store.
    pub fn rules_dir(&self) -> Result<PathBuf> {
        match &self.rules_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(data_dir()?.join("rules")),
        }
    }

    /// Default result slot as an engine value.
    pub fn default_result(&self) -> Value {
        self.default_result
            .clone()
            .map(Value::from)
            .unwrap_or_default()
    }

    pub fn is_disabled(&self, rule: &str) -> bool {
        self.disabled_rules.iter().any(|id| id == rule)
    }
}

/// Returns `~/.config/eca[-dev]/` based on ECA_ENV.
///
/// Set ECA_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("ECA_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("eca-dev")
    } else {
        base_dir.join("eca")
    };

    std::fs::create_dir_all(&dir).map_err(|e| EcaError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
