//! # Design
//!
//! - Provide structured errors for every stage of an acquisition invocation.
//! - Capture operation context (paths, fields, inputs) so markers and logs can
//!   name what failed without re-deriving it.
//! - Classify every error so the command-line layer can map it to an exit code.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type for acquisition operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while tracking and finalizing a batch.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("io failure during {operation} at {}", path.display())]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// JSON parsing or serialization failures for the finalize journal.
    #[error("json failure during {operation} at {}", path.display())]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Path involved in the JSON failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Walkdir traversal failures.
    #[error("directory walk failure during {operation} at {}", path.display())]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Globset compilation failures.
    #[error("invalid glob pattern {pattern} for {operation}")]
    Glob {
        /// Operation that triggered the glob failure.
        operation: &'static str,
        /// Glob pattern that failed to compile.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// Regular expression compilation failures.
    #[error("invalid pattern {pattern} for {operation}")]
    Regex {
        /// Operation that triggered the compilation.
        operation: &'static str,
        /// Pattern that failed to compile.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// Atomic rename of a temporary file failed.
    #[error("failed to persist {operation} at {}", path.display())]
    Persist {
        /// Operation that triggered the persist.
        operation: &'static str,
        /// Final path of the file being persisted.
        path: PathBuf,
        /// Underlying persist error.
        source: tempfile::PersistError,
    },
    /// The triggering file does not exist or is not a regular file.
    #[error("triggering file {} does not exist", path.display())]
    TriggerMissing {
        /// Path supplied by the caller.
        path: PathBuf,
    },
    /// Input validation failures.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// No manifest candidate exists in the batch directory.
    #[error("no manifest (*.{extension}) found in {}", batch_dir.display())]
    ManifestNotFound {
        /// Batch directory that was searched.
        batch_dir: PathBuf,
        /// Manifest extension searched for.
        extension: String,
    },
    /// Several manifests exist and the newest does not list the triggering file.
    #[error(
        "{candidates} manifest files in {}; newest {} does not list {file_name}, remove extra manifest files",
        batch_dir.display(),
        newest.display()
    )]
    ManifestAmbiguous {
        /// Batch directory that was searched.
        batch_dir: PathBuf,
        /// Number of candidate manifests.
        candidates: usize,
        /// Most recently modified candidate.
        newest: PathBuf,
        /// Expected name of the triggering file.
        file_name: String,
    },
    /// The manifest could not be decoded.
    #[error("failed to decode manifest {}: {reason}", path.display())]
    ManifestDecode {
        /// Manifest (or scratch copy) being decoded.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Every expected name was excluded, leaving nothing to track.
    #[error("manifest yields no trackable samples ({expected} listed, {ignored} ignored)")]
    EmptyLedger {
        /// Names listed by the manifest.
        expected: usize,
        /// Names removed by the ignore rule.
        ignored: usize,
    },
    /// The triggering file is not one of the batch's expected files.
    #[error("{file_name} is not part of this batch")]
    NotInBatch {
        /// Normalised name of the triggering file.
        file_name: String,
    },
    /// The notification command exited unsuccessfully.
    #[error("notification command {program} exited with {status}")]
    NotifyCommand {
        /// Program that was run.
        program: String,
        /// Exit status reported by the program.
        status: ExitStatus,
    },
    /// The destination resolves to the batch directory or one of its children.
    #[error("destination {} lies inside batch directory {}", destination.display(), batch_dir.display())]
    DestinationInsideBatch {
        /// Planned destination directory.
        destination: PathBuf,
        /// Batch directory being finalized.
        batch_dir: PathBuf,
    },
}

/// Broad category of a failure, used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing trigger or invalid input.
    Input,
    /// Manifest lookup or decoding.
    Resolution,
    /// Ledger state or ledger IO.
    Ledger,
    /// Staging, relocation, cleanup or marker writes.
    Finalize,
}

impl ErrorClass {
    /// Process exit code for the class.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Input => 2,
            Self::Resolution => 3,
            Self::Ledger => 4,
            Self::Finalize => 5,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Resolution => "resolution",
            Self::Ledger => "ledger",
            Self::Finalize => "finalize",
        }
    }
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn glob(
        operation: &'static str,
        pattern: String,
        source: globset::Error,
    ) -> Self {
        Self::Glob {
            operation,
            pattern,
            source,
        }
    }

    pub(crate) fn persist(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: tempfile::PersistError,
    ) -> Self {
        Self::Persist {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Classify the error for exit-code mapping.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::TriggerMissing { .. } | Self::InvalidInput { .. } => ErrorClass::Input,
            Self::ManifestNotFound { .. }
            | Self::ManifestAmbiguous { .. }
            | Self::ManifestDecode { .. } => ErrorClass::Resolution,
            Self::EmptyLedger { .. } | Self::NotInBatch { .. } => ErrorClass::Ledger,
            Self::DestinationInsideBatch { .. }
            | Self::Glob { .. }
            | Self::NotifyCommand { .. } => ErrorClass::Finalize,
            Self::Io { operation, .. }
            | Self::Json { operation, .. }
            | Self::Walkdir { operation, .. }
            | Self::Regex { operation, .. }
            | Self::Persist { operation, .. } => class_of_operation(operation),
        }
    }
}

/// Operations are named `<stage>.<action>`; the stage prefix picks the class.
fn class_of_operation(operation: &str) -> ErrorClass {
    match operation.split('.').next().unwrap_or_default() {
        "trigger" => ErrorClass::Input,
        "manifest" | "scratch" => ErrorClass::Resolution,
        "ledger" => ErrorClass::Ledger,
        _ => ErrorClass::Finalize,
    }
}

/// Render an error and its sources joined by `": "`.
#[must_use]
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        rendered.push_str(": ");
        rendered.push_str(&source.to_string());
        current = source.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::Error as _;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn io_error() -> io::Error {
        io::Error::other("disk unplugged")
    }

    fn json_error() -> serde_json::Error {
        match serde_json::from_str::<serde_json::Value>("invalid") {
            Ok(_) => serde_json::Error::custom("expected invalid json"),
            Err(err) => err,
        }
    }

    #[test]
    fn helpers_build_variants_with_sources() -> anyhow::Result<()> {
        let io_err = FsOpsError::io("ledger.read", "ledger.txt", io_error());
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert!(io_err.source().is_some());

        let json_err = FsOpsError::json("journal.parse", "journal.json", json_error());
        assert!(matches!(json_err, FsOpsError::Json { .. }));
        assert!(json_err.source().is_some());

        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk_err = FsOpsError::walkdir("relocate.walk", &missing, walkdir_error);
        assert!(walk_err.source().is_some());

        let Err(glob_error) = globset::Glob::new("[") else {
            return Err(io::Error::other("expected glob error").into());
        };
        let glob_err = FsOpsError::glob("stage.compile", "[".to_string(), glob_error);
        assert!(matches!(glob_err, FsOpsError::Glob { .. }));
        assert!(glob_err.source().is_some());
        Ok(())
    }

    #[test]
    fn classes_map_to_exit_codes() {
        let cases = [
            (
                FsOpsError::TriggerMissing {
                    path: PathBuf::from("/missing.raw"),
                },
                2,
            ),
            (
                FsOpsError::ManifestNotFound {
                    batch_dir: PathBuf::from("/batch"),
                    extension: "sld".into(),
                },
                3,
            ),
            (
                FsOpsError::NotInBatch {
                    file_name: "x.raw".into(),
                },
                4,
            ),
            (FsOpsError::io("ledger.write", "/batch/l.txt", io_error()), 4),
            (FsOpsError::io("scratch.copy", "/tmp/s.sld", io_error()), 3),
            (FsOpsError::io("relocate.copy", "/out/a.raw", io_error()), 5),
            (FsOpsError::io("marker.write", "/out/done.txt", io_error()), 5),
        ];
        for (error, code) in cases {
            assert_eq!(error.class().exit_code(), code, "{error}");
        }
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = FsOpsError::io("ledger.read", "/batch/ledger.txt", io_error());
        assert_eq!(
            error_chain(&err),
            "io failure during ledger.read at /batch/ledger.txt: disk unplugged"
        );
    }
}
