//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why the gateway could not produce usable settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file {}: {source}", .path.display())]
    Read {
        /// File that was opened.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("settings file {} is not valid JSON: {source}", .path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser error with line and column.
        #[source]
        source: serde_json::Error,
    },
    /// The merged document has a key with the wrong type.
    #[error("settings have the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),
    /// A value parsed but cannot be used.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// camelCase path of the offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidValue { field, reason }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = SettingsError::Parse {
            path: PathBuf::from("/etc/herald/settings.json"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("settings file /etc/herald/settings.json is not valid JSON"));
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::invalid("broker.queueName", "must not be empty");
        assert_eq!(err.to_string(), "invalid broker.queueName: must not be empty");
    }

    #[test]
    fn read_error_keeps_source() {
        let err = SettingsError::Read {
            path: PathBuf::from("settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
