//! Validation helpers and parsing utilities for raw configuration values.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::model::LogFormatSetting;

fn invalid(field: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        value: Some(value.to_string()),
        reason,
    }
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_bool(field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(field, value, "expected a boolean")),
    }
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_u64(field: &'static str, value: &str) -> ConfigResult<u64> {
    value
        .trim()
        .replace('_', "")
        .parse::<u64>()
        .map_err(|_| invalid(field, value, "expected a non-negative integer"))
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_file_name(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(field, value, "must not be empty"));
    }
    if trimmed.contains(['/', '\\']) || matches!(trimmed, "." | "..") {
        return Err(invalid(field, value, "must be a plain file name"));
    }
    Ok(trimmed.to_string())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_extension(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return Err(invalid(field, value, "must not be empty"));
    }
    if trimmed.contains(['/', '\\', '.', '*', '?']) {
        return Err(invalid(field, value, "must be a single extension"));
    }
    Ok(trimmed.to_ascii_lowercase())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_path(field: &'static str, value: &str) -> ConfigResult<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingField { field });
    }
    Ok(Path::new(trimmed).to_path_buf())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_log_format(field: &'static str, value: &str) -> ConfigResult<LogFormatSetting> {
    match value.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormatSetting::Json),
        "pretty" | "text" => Ok(LogFormatSetting::Pretty),
        _ => Err(invalid(field, value, "expected 'json' or 'pretty'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for truthy in ["true", "YES", "On", "1"] {
            assert!(parse_bool("debug", truthy).expect("truthy value"));
        }
        for falsy in ["false", "no", "OFF", "0"] {
            assert!(!parse_bool("debug", falsy).expect("falsy value"));
        }
        let err = parse_bool("debug", "maybe").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "debug",
                reason: "expected a boolean",
                ..
            }
        ));
    }

    #[test]
    fn parse_u64_allows_digit_separators() {
        assert_eq!(parse_u64("min_payload_bytes", "100_000").unwrap(), 100_000);
        assert_eq!(parse_u64("min_payload_bytes", " 42 ").unwrap(), 42);
        assert!(parse_u64("min_payload_bytes", "-1").is_err());
        assert!(parse_u64("min_payload_bytes", "ten").is_err());
    }

    #[test]
    fn parse_file_name_rejects_paths() {
        assert_eq!(
            parse_file_name("completion_marker", " done.txt ").unwrap(),
            "done.txt"
        );
        assert!(parse_file_name("completion_marker", "sub/done.txt").is_err());
        assert!(parse_file_name("completion_marker", "sub\\done.txt").is_err());
        assert!(parse_file_name("completion_marker", "..").is_err());
        assert!(parse_file_name("completion_marker", "").is_err());
    }

    #[test]
    fn parse_extension_normalises_case_and_dot() {
        assert_eq!(parse_extension("payload_extension", ".RAW").unwrap(), "raw");
        assert!(parse_extension("payload_extension", "*.raw").is_err());
        assert!(parse_extension("payload_extension", "tar.gz").is_err());
    }

    #[test]
    fn parse_log_format_maps_known_values() {
        assert_eq!(
            parse_log_format("log_format", "JSON").unwrap(),
            LogFormatSetting::Json
        );
        assert_eq!(
            parse_log_format("log_format", "pretty").unwrap(),
            LogFormatSetting::Pretty
        );
        assert!(parse_log_format("log_format", "xml").is_err());
    }
}
