//! Unified error types for the homelab workspace.
//!
//! Only structural failures live here. Validation problems are collected as
//! findings in a report and never surface as an `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum HomelabError {
    /// A catalog record does not have the expected shape.
    #[error("malformed catalog record #{index}: field `{field}` {reason}")]
    MalformedCatalog {
        /// Zero-based position of the offending record.
        index: usize,
        /// Field that is missing or invalid.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The dependency graph has no valid linear order.
    #[error("dependency cycle: {}", format_cycle(.cycle))]
    DependencyCycle {
        /// Services on the cycle, starting and ending at the same service.
        cycle: Vec<String>,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration or override value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The manifest could not be rendered by the selected output adapter.
    #[error("manifest rendering failed: {message}")]
    Render {
        /// Description of the rendering failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl HomelabError {
    /// Builds a [`HomelabError::MalformedCatalog`] for the record at `index`.
    pub fn malformed(index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCatalog {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn format_cycle(cycle: &[String]) -> String {
    cycle.join(" -> ")
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, HomelabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_names_index_and_field() {
        let err = HomelabError::malformed(3, "ports", "has non-numeric key \"http\"");
        let msg = err.to_string();
        assert!(msg.contains("#3"), "got: {msg}");
        assert!(msg.contains("`ports`"), "got: {msg}");
    }

    #[test]
    fn cycle_message_joins_with_arrows() {
        let err = HomelabError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }
}
