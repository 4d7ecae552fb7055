//! One-time relocation of a completed batch.
//!
//! # Design
//! - Four fixed steps: stage the destination, relocate the payload, clean up
//!   the source, then write the completion marker. The marker is always last.
//! - Every attempt re-runs every step; staging, relocation and cleanup are
//!   safe to repeat.
//! - Each step outcome is logged and recorded in a JSON journal under
//!   `<destination>/.seqtrack/`. The journal is diagnostic only and never
//!   decides whether a step runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use seqtrack_config::{CleanupPolicy, OverwritePolicy, TrackerConfig};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};
use crate::markers::{MarkerRecord, is_repeat_run, write_marker};
use crate::pattern::ExtensionRule;

const JOURNAL_DIR_NAME: &str = ".seqtrack";
const JOURNAL_FILE_NAME: &str = "finalize.meta.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    StageDestination,
    RelocatePayload,
    CleanupSource,
    SignalCompletion,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::StageDestination => "stage_destination",
            Self::RelocatePayload => "relocate_payload",
            Self::CleanupSource => "cleanup_source",
            Self::SignalCompletion => "signal_completion",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StepStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StepRecord {
    name: String,
    status: StepStatus,
    detail: Option<String>,
    updated_at: DateTime<Utc>,
}

enum StepOutcome {
    Completed(Option<String>),
    Skipped(Option<String>),
}

impl StepOutcome {
    const fn status(&self) -> StepStatus {
        match self {
            Self::Completed(_) => StepStatus::Completed,
            Self::Skipped(_) => StepStatus::Skipped,
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Self::Completed(detail) | Self::Skipped(detail) => detail.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FinalizeJournal {
    batch_dir: String,
    destination: String,
    attempts: u32,
    completed: bool,
    updated_at: DateTime<Utc>,
    steps: Vec<StepRecord>,
}

impl FinalizeJournal {
    fn new(batch_dir: &Path, destination: &Path) -> Self {
        Self {
            batch_dir: batch_dir.to_string_lossy().into_owned(),
            destination: destination.to_string_lossy().into_owned(),
            attempts: 0,
            completed: false,
            updated_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    fn begin_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.completed = false;
        self.steps.clear();
        self.updated_at = Utc::now();
    }

    #[cfg(test)]
    fn step_status(&self, step: StepKind) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|record| record.name == step.as_str())
            .map(|record| record.status)
    }

    fn update_step(&mut self, step: StepKind, status: StepStatus, detail: Option<String>) {
        let now = Utc::now();
        if let Some(record) = self
            .steps
            .iter_mut()
            .find(|record| record.name == step.as_str())
        {
            record.status = status;
            record.detail = detail;
            record.updated_at = now;
        } else {
            self.steps.push(StepRecord {
                name: step.as_str().to_string(),
                status,
                detail,
                updated_at: now,
            });
        }
        self.updated_at = now;
    }
}

fn load_journal(path: &Path) -> FsOpsResult<Option<FinalizeJournal>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(FsOpsError::io("journal.read", path, err)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source_err| FsOpsError::json("journal.parse", path, source_err))
}

fn persist_journal(path: &Path, journal: &FinalizeJournal) -> FsOpsResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source_err| FsOpsError::io("journal.create_dir", parent, source_err))?;
    }
    let serialised = serde_json::to_string_pretty(journal)
        .map_err(|source_err| FsOpsError::json("journal.serialize", path, source_err))?;
    fs::write(path, serialised)
        .map_err(|source_err| FsOpsError::io("journal.write", path, source_err))
}

/// Inputs for one finalize attempt.
#[derive(Copy, Clone, Debug)]
pub struct FinalizeRequest<'a> {
    /// Batch directory holding the completed payload.
    pub batch_dir: &'a Path,
    /// Planned destination directory.
    pub destination: &'a Path,
    /// Triggering file of the invocation that completed the batch.
    pub trigger: &'a Path,
}

/// Summary of a successful finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Destination the batch was relocated to.
    pub destination: PathBuf,
    /// Files copied into the destination.
    pub copied: usize,
    /// Files left untouched by the overwrite policy.
    pub kept: usize,
    /// Source entries removed by cleanup.
    pub removed: usize,
    /// Whether the batch was flagged as a repeat run.
    pub repeat_run: bool,
    /// Finalize attempt number recorded in the journal.
    pub attempt: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CopyStats {
    copied: usize,
    kept: usize,
}

/// Executes the finalize steps for a completed batch.
pub struct Finalizer<'a> {
    config: &'a TrackerConfig,
    payload: ExtensionRule,
    manifest: ExtensionRule,
}

impl<'a> Finalizer<'a> {
    /// Build a finalizer for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload or manifest patterns cannot be compiled.
    pub fn new(config: &'a TrackerConfig) -> FsOpsResult<Self> {
        Ok(Self {
            config,
            payload: ExtensionRule::new("stage.compile", &config.transfer.payload_extension)?,
            manifest: ExtensionRule::new("cleanup.compile", &config.manifest.extension)?,
        })
    }

    /// Relocate the batch and write the completion marker.
    ///
    /// # Errors
    ///
    /// Returns the first step failure. No completion marker is written unless
    /// every earlier step succeeded.
    pub fn finalize(&self, request: FinalizeRequest<'_>) -> FsOpsResult<FinalizeReport> {
        let journal_path = request
            .destination
            .join(JOURNAL_DIR_NAME)
            .join(JOURNAL_FILE_NAME);
        let mut journal = match load_journal(&journal_path) {
            Ok(Some(journal)) => journal,
            Ok(None) => FinalizeJournal::new(request.batch_dir, request.destination),
            Err(err) => {
                warn!(
                    error = %err,
                    path = %journal_path.display(),
                    "discarding unreadable finalize journal"
                );
                FinalizeJournal::new(request.batch_dir, request.destination)
            }
        };
        journal.begin_attempt();
        info!(
            batch_dir = %request.batch_dir.display(),
            destination = %request.destination.display(),
            attempt = journal.attempts,
            "finalize started"
        );

        let mut stats = CopyStats::default();
        let mut removed = 0usize;
        let mut repeat_run = false;

        execute_step(
            &mut journal,
            &journal_path,
            StepKind::StageDestination,
            || self.stage_destination(request.batch_dir, request.destination),
        )?;
        execute_step(
            &mut journal,
            &journal_path,
            StepKind::RelocatePayload,
            || {
                stats = copy_tree(
                    request.batch_dir,
                    request.destination,
                    self.config.transfer.overwrite,
                )?;
                Ok(StepOutcome::Completed(Some(format!(
                    "copied={} kept={}",
                    stats.copied, stats.kept
                ))))
            },
        )?;
        execute_step(
            &mut journal,
            &journal_path,
            StepKind::CleanupSource,
            || {
                let policy = self.config.cleanup;
                if !policy.files && !policy.removes_directories() {
                    return Ok(StepOutcome::Skipped(Some("cleanup disabled".into())));
                }
                removed = self.cleanup_source(request.batch_dir, policy)?;
                Ok(StepOutcome::Completed(Some(format!("removed_entries={removed}"))))
            },
        )?;
        execute_commit_step(&mut journal, &journal_path, || {
            repeat_run =
                is_repeat_run(request.destination, request.trigger, &self.config.repeat_tag);
            self.signal_completion(request.destination, request.trigger, repeat_run)
        })?;

        info!(
            destination = %request.destination.display(),
            copied = stats.copied,
            kept = stats.kept,
            removed,
            repeat_run,
            "finalize completed"
        );

        Ok(FinalizeReport {
            destination: request.destination.to_path_buf(),
            copied: stats.copied,
            kept: stats.kept,
            removed,
            repeat_run,
            attempt: journal.attempts,
        })
    }

    fn stage_destination(&self, batch_dir: &Path, destination: &Path) -> FsOpsResult<StepOutcome> {
        if lies_within(destination, batch_dir) {
            return Err(FsOpsError::DestinationInsideBatch {
                destination: destination.to_path_buf(),
                batch_dir: batch_dir.to_path_buf(),
            });
        }

        if !destination.exists() {
            fs::create_dir_all(destination)
                .map_err(|err| FsOpsError::io("stage.create_dir", destination, err))?;
            return Ok(StepOutcome::Completed(Some("created destination".into())));
        }

        let undersized = self.undersized_payloads(destination)?;
        if undersized == 0 {
            return Ok(StepOutcome::Skipped(Some("destination ready".into())));
        }

        warn!(
            destination = %destination.display(),
            undersized,
            min_payload_bytes = self.config.transfer.min_payload_bytes,
            "destination holds interrupted payload copies; recreating"
        );
        fs::remove_dir_all(destination)
            .map_err(|err| FsOpsError::io("stage.remove_dir", destination, err))?;
        fs::create_dir_all(destination)
            .map_err(|err| FsOpsError::io("stage.create_dir", destination, err))?;
        Ok(StepOutcome::Completed(Some(format!(
            "recreated destination; undersized_payloads={undersized}"
        ))))
    }

    fn undersized_payloads(&self, destination: &Path) -> FsOpsResult<usize> {
        let mut count = 0usize;
        for entry in WalkDir::new(destination) {
            let entry =
                entry.map_err(|err| FsOpsError::walkdir("stage.walk", destination, err))?;
            if !entry.file_type().is_file() || !self.payload.matches(entry.path()) {
                continue;
            }
            let len = entry
                .metadata()
                .map_err(|err| FsOpsError::walkdir("stage.stat", entry.path(), err))?
                .len();
            if len < self.config.transfer.min_payload_bytes {
                count += 1;
            }
        }
        Ok(count)
    }

    fn cleanup_source(&self, batch_dir: &Path, policy: CleanupPolicy) -> FsOpsResult<usize> {
        let listing = fs::read_dir(batch_dir)
            .map_err(|err| FsOpsError::io("cleanup.list", batch_dir, err))?;
        let mut removed = 0usize;
        for entry in listing {
            let entry = entry.map_err(|err| FsOpsError::io("cleanup.list", batch_dir, err))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|err| FsOpsError::io("cleanup.stat", &path, err))?;
            let result = if file_type.is_dir() {
                if !policy.removes_directories() {
                    continue;
                }
                fs::remove_dir_all(&path)
            } else {
                if !policy.files || (policy.preserve_manifest && self.manifest.matches(&path)) {
                    continue;
                }
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(err) => warn!(
                    error = %err,
                    path = %path.display(),
                    "failed to remove source entry"
                ),
            }
        }
        Ok(removed)
    }

    fn signal_completion(
        &self,
        destination: &Path,
        trigger: &Path,
        repeat_run: bool,
    ) -> FsOpsResult<StepOutcome> {
        let marker = destination.join(&self.config.markers.completion);
        write_marker(&marker, &MarkerRecord::completion(trigger, repeat_run))?;

        let failure_marker = destination.join(&self.config.markers.failure);
        let cleared = match fs::remove_file(&failure_marker) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => {
                return Err(FsOpsError::io(
                    "marker.remove_failure",
                    &failure_marker,
                    err,
                ));
            }
        };
        Ok(StepOutcome::Completed(Some(format!(
            "marker={} repeat_run={repeat_run} cleared_failure={cleared}",
            marker.display()
        ))))
    }
}

fn execute_step<F>(
    journal: &mut FinalizeJournal,
    journal_path: &Path,
    step: StepKind,
    op: F,
) -> FsOpsResult<()>
where
    F: FnOnce() -> FsOpsResult<StepOutcome>,
{
    info!(step = step.as_str(), status = StepStatus::Started.as_str(), "finalize step");
    journal.update_step(step, StepStatus::Started, None);

    match op() {
        Ok(outcome) => {
            log_outcome(step, &outcome);
            record_step(journal, journal_path, step, outcome.status(), outcome.detail());
            Ok(())
        }
        Err(err) => Err(fail_step(journal, journal_path, step, err)),
    }
}

/// Runs the completion signal. The journal is committed before the marker is
/// written so the marker is the last entry to change in the destination.
fn execute_commit_step<F>(
    journal: &mut FinalizeJournal,
    journal_path: &Path,
    op: F,
) -> FsOpsResult<()>
where
    F: FnOnce() -> FsOpsResult<StepOutcome>,
{
    let step = StepKind::SignalCompletion;
    info!(step = step.as_str(), status = StepStatus::Started.as_str(), "finalize step");
    journal.completed = true;
    record_step(journal, journal_path, step, StepStatus::Completed, None);

    match op() {
        Ok(outcome) => {
            log_outcome(step, &outcome);
            Ok(())
        }
        Err(err) => {
            journal.completed = false;
            Err(fail_step(journal, journal_path, step, err))
        }
    }
}

fn log_outcome(step: StepKind, outcome: &StepOutcome) {
    info!(
        step = step.as_str(),
        status = outcome.status().as_str(),
        detail = outcome.detail().unwrap_or_default(),
        "finalize step"
    );
}

fn fail_step(
    journal: &mut FinalizeJournal,
    journal_path: &Path,
    step: StepKind,
    err: FsOpsError,
) -> FsOpsError {
    let detail = err.to_string();
    error!(
        step = step.as_str(),
        status = StepStatus::Failed.as_str(),
        detail = %detail,
        "finalize step"
    );
    record_step(journal, journal_path, step, StepStatus::Failed, Some(&detail));
    err
}

fn record_step(
    journal: &mut FinalizeJournal,
    journal_path: &Path,
    step: StepKind,
    status: StepStatus,
    detail: Option<&str>,
) {
    journal.update_step(step, status, detail.map(str::to_string));
    record_journal(journal_path, journal);
}

/// Persists the journal only once its destination exists; never creates it.
fn record_journal(path: &Path, journal: &FinalizeJournal) {
    let destination_exists = path
        .parent()
        .and_then(Path::parent)
        .is_some_and(Path::is_dir);
    if !destination_exists {
        return;
    }
    if let Err(err) = persist_journal(path, journal) {
        warn!(error = %err, path = %path.display(), "failed to persist finalize journal");
    }
}

/// Lexical and canonical containment check; `destination` may not exist yet.
pub(crate) fn lies_within(destination: &Path, batch_dir: &Path) -> bool {
    if destination.starts_with(batch_dir) {
        return true;
    }
    let Ok(batch) = batch_dir.canonicalize() else {
        return false;
    };
    let mut ancestor = destination;
    let mut suffix = Vec::new();
    loop {
        if let Ok(canonical) = ancestor.canonicalize() {
            let full = suffix
                .iter()
                .rev()
                .fold(canonical, |path: PathBuf, part| path.join(part));
            return full.starts_with(&batch);
        }
        let (Some(parent), Some(name)) = (ancestor.parent(), ancestor.file_name()) else {
            return false;
        };
        suffix.push(name);
        ancestor = parent;
    }
}

fn copy_tree(
    source: &Path,
    destination: &Path,
    overwrite: OverwritePolicy,
) -> FsOpsResult<CopyStats> {
    fs::create_dir_all(destination)
        .map_err(|source_err| FsOpsError::io("relocate.create_dir", destination, source_err))?;

    let mut stats = CopyStats::default();
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry
            .map_err(|source_err| FsOpsError::walkdir("relocate.walk", source, source_err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| FsOpsError::InvalidInput {
                field: "batch_dir",
                reason: "entry outside batch directory",
                value: Some(entry.path().to_string_lossy().into_owned()),
            })?;
        let target_path = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path).map_err(|source_err| {
                FsOpsError::io("relocate.create_dir", &target_path, source_err)
            })?;
            continue;
        }
        if !should_copy(entry.path(), &target_path, overwrite)? {
            stats.kept += 1;
            continue;
        }
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|source_err| {
                FsOpsError::io("relocate.create_parent", parent, source_err)
            })?;
        }
        fs::copy(entry.path(), &target_path)
            .map_err(|source_err| FsOpsError::io("relocate.copy", &target_path, source_err))?;
        stats.copied += 1;
    }
    Ok(stats)
}

fn should_copy(source: &Path, target: &Path, overwrite: OverwritePolicy) -> FsOpsResult<bool> {
    let target_meta = match fs::metadata(target) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(FsOpsError::io("relocate.stat_target", target, err)),
    };
    match overwrite {
        OverwritePolicy::Never => Ok(false),
        OverwritePolicy::IfNewer => {
            let source_modified = fs::metadata(source)
                .and_then(|meta| meta.modified())
                .map_err(|err| FsOpsError::io("relocate.stat_source", source, err))?;
            let target_modified = target_meta
                .modified()
                .map_err(|err| FsOpsError::io("relocate.stat_target", target, err))?;
            Ok(source_modified > target_modified)
        }
    }
}
