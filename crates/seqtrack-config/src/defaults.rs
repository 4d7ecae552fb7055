//! Configuration key names and their default values.
//!
//! # Design
//! - Centralize key spellings so the loader, tests and documentation agree.
//! - Keep every default explicit; only `output_root` is required.

/// Root directory that receives finalized batches (required).
pub const OUTPUT_ROOT: &str = "output_root";
/// Path component below which the source layout is mirrored.
pub const TRIM_SEGMENT: &str = "trim_segment";
/// Substring marking a batch as a repeat run.
pub const REPEAT_TAG: &str = "repeat_tag";
/// Required manifest file-name prefix.
pub const MANIFEST_PREFIX: &str = "manifest_prefix";
/// Manifest file extension.
pub const MANIFEST_EXTENSION: &str = "manifest_extension";
/// Semicolon-delimited synthetic sample list (mock mode).
pub const MOCK_SAMPLES: &str = "mock_samples";
/// Directory holding scratch copies of manifests.
pub const SCRATCH_DIR: &str = "scratch_dir";
/// File name of the per-batch acquisition ledger.
pub const LEDGER_FILE_NAME: &str = "ledger_file_name";
/// Case-insensitive substring excluding samples from tracking.
pub const IGNORE_PATTERN: &str = "ignore_pattern";
/// Whether the ignore pattern is applied.
pub const IGNORE_ENABLED: &str = "ignore_enabled";
/// Extension of payload files.
pub const PAYLOAD_EXTENSION: &str = "payload_extension";
/// Payload files below this size mark an interrupted transfer.
pub const MIN_PAYLOAD_BYTES: &str = "min_payload_bytes";
/// Overwrite destination files when the source is newer.
pub const OVERWRITE_NEWER: &str = "overwrite_newer";
/// Delete files from the batch directory after relocation.
pub const CLEANUP_FILES: &str = "cleanup_files";
/// Delete subdirectories of the batch directory after relocation.
pub const CLEANUP_DIRECTORIES: &str = "cleanup_directories";
/// Keep manifest files in the batch directory during cleanup.
pub const PRESERVE_MANIFEST: &str = "preserve_manifest";
/// File name of the completion marker.
pub const COMPLETION_MARKER: &str = "completion_marker";
/// File name of the failure marker.
pub const FAILURE_MARKER: &str = "failure_marker";
/// External program invoked for notifications.
pub const NOTIFY_COMMAND: &str = "notify_command";
/// Log output format (`json` or `pretty`).
pub const LOG_FORMAT: &str = "log_format";
/// Enable debug logging.
pub const DEBUG: &str = "debug";

/// Every key accepted by the loader.
pub const KNOWN_KEYS: &[&str] = &[
    OUTPUT_ROOT,
    TRIM_SEGMENT,
    REPEAT_TAG,
    MANIFEST_PREFIX,
    MANIFEST_EXTENSION,
    MOCK_SAMPLES,
    SCRATCH_DIR,
    LEDGER_FILE_NAME,
    IGNORE_PATTERN,
    IGNORE_ENABLED,
    PAYLOAD_EXTENSION,
    MIN_PAYLOAD_BYTES,
    OVERWRITE_NEWER,
    CLEANUP_FILES,
    CLEANUP_DIRECTORIES,
    PRESERVE_MANIFEST,
    COMPLETION_MARKER,
    FAILURE_MARKER,
    NOTIFY_COMMAND,
    LOG_FORMAT,
    DEBUG,
];

pub(crate) const DEFAULT_MANIFEST_EXTENSION: &str = "sld";
pub(crate) const DEFAULT_SCRATCH_DIR_NAME: &str = "seqtrack-scratch";
pub(crate) const DEFAULT_LEDGER_FILE_NAME: &str = "acquisition_ledger.txt";
pub(crate) const DEFAULT_IGNORE_PATTERN: &str = "blank";
pub(crate) const DEFAULT_PAYLOAD_EXTENSION: &str = "raw";
pub(crate) const DEFAULT_MIN_PAYLOAD_BYTES: u64 = 100_000;
pub(crate) const DEFAULT_COMPLETION_MARKER: &str = "acquisition_complete.txt";
pub(crate) const DEFAULT_FAILURE_MARKER: &str = "acquisition_failed.txt";
