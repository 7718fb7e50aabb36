//! Configuration-related error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error covering file access, parse failures and invalid
/// values.
///
/// # Examples
///
/// ```
/// use sirocco_core::error::ConfigError;
///
/// let error = ConfigError::invalid_value("active_limit", "must be -1 or >= 0");
/// assert!(error.to_string().contains("active_limit"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("[Config] Failed to read file '{path}': {reason}")]
    FileRead {
        /// Path to the configuration file.
        path: String,
        /// Reason for the read failure.
        reason: String,
    },

    /// Configuration file extension is not a supported format.
    #[error("[Config] Unsupported format for '{path}' (expected .yaml, .toml or .json)")]
    UnsupportedFormat {
        /// Path to the configuration file.
        path: String,
    },

    /// Configuration file content failed to parse.
    #[error("[Config] Invalid format in '{path}': {reason}")]
    Parse {
        /// Path to the configuration file.
        path: String,
        /// Reason for the parse failure.
        reason: String,
    },

    /// Configuration value is invalid.
    #[error("[Config] Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field with the invalid value.
        field: String,
        /// Reason why the value is invalid.
        reason: String,
    },

    /// Environment variable override has an invalid value.
    #[error("[Config] Invalid environment variable '{name}': {reason}")]
    InvalidEnvVar {
        /// Name of the environment variable.
        name: String,
        /// Reason why the value is invalid.
        reason: String,
    },
}

impl ConfigError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::FileRead { .. } | Self::UnsupportedFormat { .. } | Self::Parse { .. } => {
                ErrorSeverity::Fatal
            }
            Self::InvalidValue { .. } | Self::InvalidEnvVar { .. } => ErrorSeverity::Warning,
        }
    }

    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value() {
        let error = ConfigError::invalid_value("window_ms", "must be positive");
        assert!(error.to_string().contains("window_ms"));
        assert!(error.severity().is_recoverable());
    }

    #[test]
    fn test_file_read_is_fatal() {
        let error = ConfigError::FileRead {
            path: "/etc/sirocco/feed.yaml".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(error.to_string().contains("feed.yaml"));
        assert!(error.severity().is_fatal());
    }

    #[test]
    fn test_serde_roundtrip() {
        let error = ConfigError::parse("feed.yaml", "bad indentation");
        let json = serde_json::to_string(&error).unwrap();
        let parsed: ConfigError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, parsed);
    }
}
