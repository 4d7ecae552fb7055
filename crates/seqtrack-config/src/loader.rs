//! Raw `key = value` parsing and the single validation pass into
//! [`TrackerConfig`].
//!
//! # Design
//! - `RawSettings` keeps the untyped mapping so callers can layer overrides
//!   (command-line flags) before validation.
//! - `TrackerConfig::from_raw` is the only place raw strings become typed values.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::defaults::{
    CLEANUP_DIRECTORIES, CLEANUP_FILES, COMPLETION_MARKER, DEBUG, DEFAULT_COMPLETION_MARKER,
    DEFAULT_FAILURE_MARKER, DEFAULT_IGNORE_PATTERN, DEFAULT_LEDGER_FILE_NAME,
    DEFAULT_MANIFEST_EXTENSION, DEFAULT_MIN_PAYLOAD_BYTES, DEFAULT_PAYLOAD_EXTENSION,
    DEFAULT_SCRATCH_DIR_NAME, FAILURE_MARKER, IGNORE_ENABLED, IGNORE_PATTERN, KNOWN_KEYS,
    LEDGER_FILE_NAME, LOG_FORMAT, MANIFEST_EXTENSION, MANIFEST_PREFIX, MIN_PAYLOAD_BYTES,
    MOCK_SAMPLES, NOTIFY_COMMAND, OUTPUT_ROOT, OVERWRITE_NEWER, PAYLOAD_EXTENSION,
    PRESERVE_MANIFEST, REPEAT_TAG, SCRATCH_DIR, TRIM_SEGMENT,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    CleanupPolicy, LedgerSettings, ManifestSettings, MarkerNames, OverwritePolicy, TrackerConfig,
    TransferPolicy,
};
use crate::validate::{
    parse_bool, parse_extension, parse_file_name, parse_log_format, parse_path, parse_u64,
};

/// Untyped configuration mapping read from a `key = value` text file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSettings {
    values: BTreeMap<String, String>,
}

impl RawSettings {
    /// Parse configuration text.
    ///
    /// Blank lines and lines starting with `#` or `;` are ignored. Keys are
    /// case-insensitive; a value wrapped in double quotes is unwrapped. A key
    /// that appears twice keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedLine`] for a line without `=` or with an
    /// empty key.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut values = BTreeMap::new();
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(ConfigError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                });
            }
            let value = unquote(value.trim());
            if let Some(previous) = values.insert(key.clone(), value.to_string()) {
                debug!(key = %key, previous = %previous, "configuration key overridden");
            }
        }

        Ok(Self { values })
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, or any error
    /// produced by [`RawSettings::parse`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: "read",
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Set or replace a value, e.g. from a command-line override.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_ascii_lowercase(), value.into());
    }

    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterate over every key and value in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).map_or_else(|| default.to_string(), |value| value.trim().to_string())
    }

    fn bool_or(&self, key: &'static str, default: bool) -> ConfigResult<bool> {
        self.non_blank(key)
            .map_or(Ok(default), |value| parse_bool(key, value))
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

impl TrackerConfig {
    /// Validate a raw mapping into a typed configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] for keys outside the schema,
    /// [`ConfigError::MissingField`] when `output_root` is absent, and
    /// [`ConfigError::InvalidField`] for values that fail validation.
    pub fn from_raw(raw: &RawSettings) -> ConfigResult<Self> {
        if let Some(unknown) = raw
            .values
            .keys()
            .find(|key| !KNOWN_KEYS.contains(&key.as_str()))
        {
            return Err(ConfigError::UnknownField {
                field: unknown.clone(),
            });
        }

        let output_root = parse_path(OUTPUT_ROOT, raw.get(OUTPUT_ROOT).unwrap_or_default())?;

        let manifest = ManifestSettings {
            prefix: raw.string_or(MANIFEST_PREFIX, ""),
            extension: raw.non_blank(MANIFEST_EXTENSION).map_or_else(
                || Ok(DEFAULT_MANIFEST_EXTENSION.to_string()),
                |value| parse_extension(MANIFEST_EXTENSION, value),
            )?,
            mock_samples: raw.non_blank(MOCK_SAMPLES).map(str::to_string),
            scratch_dir: raw.non_blank(SCRATCH_DIR).map_or_else(
                || Ok(std::env::temp_dir().join(DEFAULT_SCRATCH_DIR_NAME)),
                |value| parse_path(SCRATCH_DIR, value),
            )?,
        };

        let ledger = LedgerSettings {
            file_name: raw.non_blank(LEDGER_FILE_NAME).map_or_else(
                || Ok(DEFAULT_LEDGER_FILE_NAME.to_string()),
                |value| parse_file_name(LEDGER_FILE_NAME, value),
            )?,
            ignore_pattern: raw.string_or(IGNORE_PATTERN, DEFAULT_IGNORE_PATTERN),
            ignore_enabled: raw.bool_or(IGNORE_ENABLED, false)?,
        };

        let transfer = TransferPolicy {
            payload_extension: raw.non_blank(PAYLOAD_EXTENSION).map_or_else(
                || Ok(DEFAULT_PAYLOAD_EXTENSION.to_string()),
                |value| parse_extension(PAYLOAD_EXTENSION, value),
            )?,
            min_payload_bytes: raw.non_blank(MIN_PAYLOAD_BYTES).map_or(
                Ok(DEFAULT_MIN_PAYLOAD_BYTES),
                |value| parse_u64(MIN_PAYLOAD_BYTES, value),
            )?,
            overwrite: if raw.bool_or(OVERWRITE_NEWER, true)? {
                OverwritePolicy::IfNewer
            } else {
                OverwritePolicy::Never
            },
        };

        let cleanup = CleanupPolicy {
            files: raw.bool_or(CLEANUP_FILES, false)?,
            directories: raw.bool_or(CLEANUP_DIRECTORIES, false)?,
            preserve_manifest: raw.bool_or(PRESERVE_MANIFEST, true)?,
        };

        let markers = MarkerNames {
            completion: raw.non_blank(COMPLETION_MARKER).map_or_else(
                || Ok(DEFAULT_COMPLETION_MARKER.to_string()),
                |value| parse_file_name(COMPLETION_MARKER, value),
            )?,
            failure: raw.non_blank(FAILURE_MARKER).map_or_else(
                || Ok(DEFAULT_FAILURE_MARKER.to_string()),
                |value| parse_file_name(FAILURE_MARKER, value),
            )?,
        };
        if markers.completion.eq_ignore_ascii_case(&markers.failure) {
            return Err(ConfigError::InvalidField {
                field: FAILURE_MARKER,
                value: Some(markers.failure),
                reason: "must differ from the completion marker",
            });
        }

        Ok(Self {
            output_root,
            trim_segment: raw.string_or(TRIM_SEGMENT, ""),
            repeat_tag: raw.string_or(REPEAT_TAG, ""),
            manifest,
            ledger,
            transfer,
            cleanup,
            markers,
            notify_command: raw.non_blank(NOTIFY_COMMAND).map(|value| value.trim().to_string()),
            log_format: raw
                .non_blank(LOG_FORMAT)
                .map(|value| parse_log_format(LOG_FORMAT, value))
                .transpose()?,
            debug: raw.bool_or(DEBUG, false)?,
        })
    }

    /// Load and validate a configuration file in one step.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing and validation failures.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        Self::from_raw(&RawSettings::load(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::path::PathBuf;

    #[test]
    fn parse_skips_comments_and_unquotes_values() -> Result<()> {
        let raw = RawSettings::parse(
            "\u{feff}# tracker\n\n; legacy comment\nOutput_Root = \"/data/out\"\nrepeat_tag=_rpt\n",
        )?;
        assert_eq!(raw.get("output_root"), Some("/data/out"));
        assert_eq!(raw.get("repeat_tag"), Some("_rpt"));
        Ok(())
    }

    #[test]
    fn parse_reports_line_number_of_malformed_entry() {
        let err = RawSettings::parse("output_root=/out\njust words\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { line: 2, .. }));

        let err = RawSettings::parse(" = value").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { line: 1, .. }));
    }

    #[test]
    fn last_duplicate_key_wins() -> Result<()> {
        let raw = RawSettings::parse("debug=no\ndebug=yes\noutput_root=/out")?;
        let config = TrackerConfig::from_raw(&raw)?;
        assert!(config.debug);
        Ok(())
    }

    #[test]
    fn defaults_fill_every_optional_key() -> Result<()> {
        let raw = RawSettings::parse("output_root=/srv/finished")?;
        let config = TrackerConfig::from_raw(&raw)?;

        assert_eq!(config.output_root, PathBuf::from("/srv/finished"));
        assert_eq!(config.trim_segment, "");
        assert_eq!(config.manifest.extension, "sld");
        assert_eq!(config.manifest.mock_samples, None);
        assert!(config.manifest.scratch_dir.ends_with("seqtrack-scratch"));
        assert_eq!(config.ledger.file_name, "acquisition_ledger.txt");
        assert_eq!(config.ledger.active_ignore_pattern(), None);
        assert_eq!(config.transfer.payload_extension, "raw");
        assert_eq!(config.transfer.min_payload_bytes, 100_000);
        assert_eq!(config.transfer.overwrite, OverwritePolicy::IfNewer);
        assert!(!config.cleanup.files);
        assert!(!config.cleanup.directories);
        assert!(config.cleanup.preserve_manifest);
        assert_eq!(config.markers.completion, "acquisition_complete.txt");
        assert_eq!(config.markers.failure, "acquisition_failed.txt");
        assert_eq!(config.notify_command, None);
        assert_eq!(config.log_format, None);
        assert!(!config.debug);
        Ok(())
    }

    #[test]
    fn missing_output_root_is_fatal() -> Result<()> {
        let raw = RawSettings::parse("repeat_tag=_rpt")?;
        let err = TrackerConfig::from_raw(&raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "output_root"
            }
        ));

        let raw = RawSettings::parse("output_root =   ")?;
        assert!(TrackerConfig::from_raw(&raw).is_err());
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() -> Result<()> {
        let raw = RawSettings::parse("output_root=/out\nouput_root=/typo")?;
        let err = TrackerConfig::from_raw(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { field } if field == "ouput_root"));
        Ok(())
    }

    #[test]
    fn overrides_replace_file_values() -> Result<()> {
        let mut raw = RawSettings::parse("output_root=/out\nmock_samples=a.raw")?;
        raw.set("MOCK_SAMPLES", "b.raw;c.raw");
        raw.set(DEBUG, "true");
        let config = TrackerConfig::from_raw(&raw)?;
        assert_eq!(config.manifest.mock_samples.as_deref(), Some("b.raw;c.raw"));
        assert!(config.debug);
        Ok(())
    }

    #[test]
    fn identical_marker_names_are_rejected() -> Result<()> {
        let raw = RawSettings::parse(
            "output_root=/out\ncompletion_marker=marker.txt\nfailure_marker=MARKER.txt",
        )?;
        let err = TrackerConfig::from_raw(&raw).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "failure_marker",
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn typed_values_are_validated() -> Result<()> {
        let raw = RawSettings::parse("output_root=/out\nmin_payload_bytes=lots")?;
        assert!(matches!(
            TrackerConfig::from_raw(&raw).unwrap_err(),
            ConfigError::InvalidField {
                field: "min_payload_bytes",
                ..
            }
        ));

        let raw = RawSettings::parse(
            "output_root=/out\noverwrite_newer=no\ncleanup_files=yes\nignore_enabled=1\nignore_pattern=QC",
        )?;
        let config = TrackerConfig::from_raw(&raw)?;
        assert_eq!(config.transfer.overwrite, OverwritePolicy::Never);
        assert!(config.cleanup.files);
        assert_eq!(config.ledger.active_ignore_pattern(), Some("QC"));
        Ok(())
    }
}
