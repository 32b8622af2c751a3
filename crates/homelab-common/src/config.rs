//! Engine configuration model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HomelabError, Result};
use crate::types::Severity;

/// Concrete serialization used for the emitted manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// Compose-file YAML.
    #[default]
    Compose,
    /// Pretty-printed JSON of the manifest structure.
    Json,
}

/// Root configuration for one engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Host path prefixes treated as unresolved placeholders.
    pub placeholder_prefixes: Vec<String>,
    /// Severity assigned to unresolved placeholder findings.
    pub placeholder_severity: Severity,
    /// Output adapter for the manifest.
    pub format: ManifestFormat,
    /// Optional project name written at the top of the manifest.
    pub project_name: Option<String>,
}

impl EngineConfig {
    /// Loads a configuration from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid configuration JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HomelabError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Whether `host_path` still matches one of the placeholder prefixes.
    #[must_use]
    pub fn is_placeholder(&self, host_path: &str) -> bool {
        self.placeholder_prefixes
            .iter()
            .any(|prefix| host_path.starts_with(prefix.as_str()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placeholder_prefixes: crate::constants::DEFAULT_PLACEHOLDER_PREFIXES
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            placeholder_severity: Severity::Error,
            format: ManifestFormat::default(),
            project_name: None,
        }
    }
}
