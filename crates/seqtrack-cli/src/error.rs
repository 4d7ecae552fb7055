//! Error type for the command-line boundary.

use seqtrack_fsops::{FsOpsError, error_chain};

/// Failure surfaced to the operator, mapped to an exit code.
#[derive(Debug)]
pub(crate) enum CliError {
    /// The configuration could not be loaded or validated.
    Configuration(anyhow::Error),
    /// The invocation failed after configuration succeeded.
    Acquisition(FsOpsError),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn configuration(error: impl Into<anyhow::Error>) -> Self {
        Self::Configuration(error.into())
    }

    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Acquisition(error) => error.class().exit_code(),
        }
    }

    pub(crate) fn class_label(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Acquisition(error) => error.class().as_str(),
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Configuration(error) => format!("{error:#}"),
            Self::Acquisition(error) => error_chain(error),
        }
    }
}

impl From<FsOpsError> for CliError {
    fn from(error: FsOpsError) -> Self {
        Self::Acquisition(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;

    #[test]
    fn configuration_errors_exit_with_input_code() {
        let err = CliError::configuration(
            anyhow!("missing output_root").context("invalid configuration"),
        );
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.class_label(), "configuration");
        assert_eq!(
            err.display_message(),
            "invalid configuration: missing output_root"
        );
    }

    #[test]
    fn acquisition_errors_use_their_class() {
        let err = CliError::from(FsOpsError::ManifestNotFound {
            batch_dir: PathBuf::from("/data/Incoming/run"),
            extension: "sld".into(),
        });
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.class_label(), "resolution");
        assert!(err.display_message().contains("no manifest (*.sld)"));
    }
}
