//! Error types for configuration loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key was absent or blank.
    #[error("required configuration key '{field}' is missing")]
    MissingField {
        /// Name of the missing key.
        field: &'static str,
    },
    /// Key contained an invalid value.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// Key that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Key is not part of the configuration schema.
    #[error("unknown configuration key '{field}'")]
    UnknownField {
        /// Name of the unexpected key.
        field: String,
    },
    /// A non-comment line did not contain a `key = value` pair.
    #[error("malformed configuration line {line}")]
    MalformedLine {
        /// One-based line number.
        line: usize,
        /// Raw line content.
        content: String,
    },
    /// Reading the configuration file failed.
    #[error("failed to {operation} configuration file {}", path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path of the configuration file.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn messages_carry_field_context() {
        let missing = ConfigError::MissingField {
            field: "output_root",
        };
        assert_eq!(
            missing.to_string(),
            "required configuration key 'output_root' is missing"
        );

        let invalid = ConfigError::InvalidField {
            field: "debug",
            value: Some("maybe".to_string()),
            reason: "expected a boolean",
        };
        assert_eq!(
            invalid.to_string(),
            "invalid value for 'debug': expected a boolean"
        );
    }

    #[test]
    fn io_variant_exposes_source() {
        let err = ConfigError::Io {
            operation: "read",
            path: PathBuf::from("/etc/seqtrack.conf"),
            source: io::Error::other("denied"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read configuration file /etc/seqtrack.conf"
        );
        assert!(err.source().is_some());
    }
}
