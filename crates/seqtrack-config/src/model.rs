//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers built once by the loader and passed by reference.
//! - No interior mutability; every field has a validated, concrete value.

use std::path::PathBuf;

use serde::Serialize;

/// Immutable configuration for one tracker invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerConfig {
    /// Root directory that receives finalized batches.
    pub output_root: PathBuf,
    /// Source path component below which the layout is mirrored (may be empty).
    pub trim_segment: String,
    /// Substring marking a batch as a repeat run (empty disables detection).
    pub repeat_tag: String,
    /// Manifest discovery settings.
    pub manifest: ManifestSettings,
    /// Acquisition ledger settings.
    pub ledger: LedgerSettings,
    /// Payload staging and copy policy.
    pub transfer: TransferPolicy,
    /// Source cleanup policy applied after relocation.
    pub cleanup: CleanupPolicy,
    /// Marker file names written into the destination.
    pub markers: MarkerNames,
    /// External program invoked for notifications.
    pub notify_command: Option<String>,
    /// Explicit log format; inferred from the build when unset.
    pub log_format: Option<LogFormatSetting>,
    /// Whether debug logging is enabled.
    pub debug: bool,
}

/// Manifest discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSettings {
    /// Required file-name prefix (empty accepts every manifest).
    pub prefix: String,
    /// Manifest extension without the leading dot, lowercase.
    pub extension: String,
    /// Semicolon-delimited synthetic sample list that replaces manifest lookup.
    pub mock_samples: Option<String>,
    /// Directory holding scratch copies of manifests.
    pub scratch_dir: PathBuf,
}

/// Acquisition ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSettings {
    /// File name of the ledger inside the batch directory.
    pub file_name: String,
    /// Case-insensitive substring excluding samples from tracking.
    pub ignore_pattern: String,
    /// Whether `ignore_pattern` is applied.
    pub ignore_enabled: bool,
}

impl LedgerSettings {
    /// The ignore pattern when it is enabled and non-empty.
    #[must_use]
    pub fn active_ignore_pattern(&self) -> Option<&str> {
        let pattern = self.ignore_pattern.trim();
        (self.ignore_enabled && !pattern.is_empty()).then_some(pattern)
    }
}

/// Payload staging and copy policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPolicy {
    /// Payload file extension without the leading dot, lowercase.
    pub payload_extension: String,
    /// Payload files smaller than this mark an interrupted transfer.
    pub min_payload_bytes: u64,
    /// Behaviour when a destination file already exists.
    pub overwrite: OverwritePolicy,
}

/// Behaviour when a destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Replace the destination file when the source is newer.
    IfNewer,
    /// Never replace an existing destination file.
    Never,
}

impl OverwritePolicy {
    /// Render the policy as its configuration label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IfNewer => "if_newer",
            Self::Never => "never",
        }
    }
}

/// Source cleanup policy applied after relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct CleanupPolicy {
    /// Delete files from the batch directory.
    pub files: bool,
    /// Delete subdirectories of the batch directory.
    pub directories: bool,
    /// Keep manifest files; also suppresses directory deletion.
    pub preserve_manifest: bool,
}

impl CleanupPolicy {
    /// Whether subdirectories are removed once `preserve_manifest` is honoured.
    #[must_use]
    pub const fn removes_directories(self) -> bool {
        self.directories && !self.preserve_manifest
    }
}

/// Marker file names written into the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerNames {
    /// Completion marker file name.
    pub completion: String,
    /// Failure marker file name.
    pub failure: String,
}

/// Log output format requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}
