//! Per-invocation orchestration.
//!
//! # Design
//! - One call to [`AcquisitionService::run`] handles one arrived file: record
//!   it in the ledger, then finalize when the batch is complete.
//! - The manifest is only consulted while no usable ledger exists.
//! - A batch is finalized at most once; afterwards every trigger is a no-op.
//! - Every error is reported once through the failure signal before it is
//!   returned for exit-code mapping.

use std::fs;
use std::path::{Path, PathBuf};

use seqtrack_config::TrackerConfig;
use tracing::{debug, error, info, warn};

use crate::completion::{Progress, is_complete};
use crate::destination::compute_destination;
use crate::error::{FsOpsError, FsOpsResult, error_chain};
use crate::failure::{FailureOutcome, FailureSignal};
use crate::finalize::{FinalizeRequest, Finalizer, lies_within};
use crate::ledger::{
    AcquisitionLedger, IgnoreRule, MarkOutcome, is_finalized, record_finalized,
};
use crate::manifest::{ManifestDecoder, ManifestResolver};
use crate::notify::Notifier;
use crate::pattern::ExtensionRule;

/// Why an invocation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The triggering file does not carry the payload extension.
    NotPayload,
    /// The triggering file matches the ignore pattern.
    Ignored,
    /// The batch has already been finalized.
    AlreadyFinalized,
}

impl SkipReason {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotPayload => "not_payload",
            Self::Ignored => "ignored",
            Self::AlreadyFinalized => "already_finalized",
        }
    }
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The triggering file was not tracked.
    Skipped {
        /// Why nothing happened.
        reason: SkipReason,
    },
    /// The file was recorded; the batch is still incomplete.
    Recorded {
        /// Files acquired so far.
        acquired: usize,
        /// Files tracked by the ledger.
        total: usize,
    },
    /// The batch was complete and has been finalized.
    Finalized {
        /// Destination the batch was relocated to.
        destination: PathBuf,
    },
}

impl InvocationOutcome {
    /// Short label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Recorded { .. } => "recorded",
            Self::Finalized { .. } => "finalized",
        }
    }
}

/// Handles one arrived file against the configured layout.
pub struct AcquisitionService<'a> {
    config: &'a TrackerConfig,
    decoder: &'a dyn ManifestDecoder,
    notifier: &'a dyn Notifier,
}

impl<'a> AcquisitionService<'a> {
    /// Build a service over an immutable configuration.
    #[must_use]
    pub const fn new(
        config: &'a TrackerConfig,
        decoder: &'a dyn ManifestDecoder,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            decoder,
            notifier,
        }
    }

    /// Record `trigger` and finalize its batch when complete.
    ///
    /// # Errors
    ///
    /// Returns the first failure after it has been reported through the
    /// failure signal.
    pub fn run(&self, trigger: &Path) -> FsOpsResult<InvocationOutcome> {
        match self.process(trigger) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.report_failure(trigger, &err);
                Err(err)
            }
        }
    }

    fn process(&self, trigger: &Path) -> FsOpsResult<InvocationOutcome> {
        let trigger = validate_trigger(trigger)?;
        let file_name = trigger
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .ok_or_else(|| FsOpsError::InvalidInput {
                field: "trigger",
                reason: "missing file name",
                value: Some(trigger.to_string_lossy().into_owned()),
            })?;

        let payload =
            ExtensionRule::new("trigger.compile", &self.config.transfer.payload_extension)?;
        if !payload.matches(&trigger) {
            debug!(file = %file_name, "not a payload file; nothing to do");
            return Ok(InvocationOutcome::Skipped {
                reason: SkipReason::NotPayload,
            });
        }
        let ignore = IgnoreRule::from_settings(&self.config.ledger);
        if ignore.matches(&file_name) {
            info!(file = %file_name, "file matches ignore pattern; nothing to do");
            return Ok(InvocationOutcome::Skipped {
                reason: SkipReason::Ignored,
            });
        }

        let batch_dir = trigger.parent().ok_or_else(|| FsOpsError::InvalidInput {
            field: "trigger",
            reason: "missing parent directory",
            value: Some(trigger.to_string_lossy().into_owned()),
        })?;
        let ledger_path = batch_dir.join(&self.config.ledger.file_name);
        if is_finalized(&ledger_path) {
            info!(file = %file_name, "batch already finalized; nothing to do");
            return Ok(InvocationOutcome::Skipped {
                reason: SkipReason::AlreadyFinalized,
            });
        }

        let mut ledger = if let Some(ledger) = AcquisitionLedger::load(&ledger_path)? {
            ledger
        } else {
            let resolver = ManifestResolver::new(
                &self.config.manifest,
                &self.config.transfer.payload_extension,
                self.decoder,
            )?;
            let resolved = resolver.resolve(batch_dir, &file_name)?;
            let ledger = AcquisitionLedger::create(&resolved.expected_names, &ignore)?;
            ledger.save(&ledger_path)?;
            info!(
                ledger = %ledger_path.display(),
                entries = ledger.len(),
                "created acquisition ledger"
            );
            ledger
        };

        match ledger.mark_acquired(&file_name)? {
            MarkOutcome::Acquired => ledger.save(&ledger_path)?,
            MarkOutcome::AlreadyAcquired => {
                debug!(file = %file_name, "file already recorded");
            }
        }

        let progress = Progress::of(&ledger);
        info!(file = %file_name, progress = %progress, "recorded acquisition");
        if !is_complete(&ledger) {
            return Ok(InvocationOutcome::Recorded {
                acquired: progress.acquired,
                total: progress.total,
            });
        }

        let destination = self.plan_destination(batch_dir);
        let report = Finalizer::new(self.config)?.finalize(FinalizeRequest {
            batch_dir,
            destination: &destination,
            trigger: &trigger,
        })?;
        if ledger_path.is_file() {
            if let Err(err) = record_finalized(&ledger_path, &report.destination) {
                warn!(
                    error = %error_chain(&err),
                    ledger = %ledger_path.display(),
                    "failed to record finalized batch; a later trigger will finalize again"
                );
            }
        } else {
            debug!("ledger removed by source cleanup; finalized record not written");
        }
        Ok(InvocationOutcome::Finalized {
            destination: report.destination,
        })
    }

    fn plan_destination(&self, batch_dir: &Path) -> PathBuf {
        compute_destination(batch_dir, &self.config.output_root, &self.config.trim_segment)
    }

    fn report_failure(&self, trigger: &Path, err: &FsOpsError) {
        let message = error_chain(err);
        error!(class = err.class().as_str(), error = %message, "invocation failed");

        let trigger = trigger.canonicalize().unwrap_or_else(|_| trigger.to_path_buf());
        let Some(batch_dir) = trigger.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
            error!("triggering path has no parent directory; failure marker skipped");
            return;
        };
        let destination = self.plan_destination(batch_dir);
        let signal =
            FailureSignal::new(&self.config.markers, &self.config.repeat_tag, self.notifier);
        if lies_within(&destination, batch_dir) {
            error!(
                destination = %destination.display(),
                batch_dir = %batch_dir.display(),
                "planned destination lies inside the batch directory; failure marker skipped"
            );
            signal.notify_only(&destination, &message);
            return;
        }
        match signal.on_error(&destination, &trigger, &message) {
            Ok(FailureOutcome::Recorded | FailureOutcome::Suppressed) => {}
            Err(signal_err) => error!(
                error = %error_chain(&signal_err),
                destination = %destination.display(),
                "failed to record failure marker"
            ),
        }
    }
}

fn validate_trigger(trigger: &Path) -> FsOpsResult<PathBuf> {
    let missing = || FsOpsError::TriggerMissing {
        path: trigger.to_path_buf(),
    };
    let metadata = fs::metadata(trigger).map_err(|_| missing())?;
    if !metadata.is_file() {
        return Err(missing());
    }
    trigger
        .canonicalize()
        .map_err(|err| FsOpsError::io("trigger.canonicalize", trigger, err))
}
