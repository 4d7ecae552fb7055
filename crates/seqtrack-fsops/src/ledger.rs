//! Durable per-batch acquisition ledger.
//!
//! # Design
//! - The key set is fixed when the ledger is created; statuses only move from
//!   pending to acquired.
//! - On disk the ledger is one `name=yes|no` line per entry in manifest order,
//!   rewritten atomically (temporary file in the same directory, then rename).
//! - Unparsable lines are skipped individually with a warning.
//! - Once the batch is finalized a sidecar (`<ledger>.finalized`) is written
//!   next to the ledger; its presence turns every later trigger into a no-op.
//!
//! There is no lock file: invocations touching the same batch directory are
//! expected to be serialized by whatever launches them.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use seqtrack_config::LedgerSettings;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::markers::format_timestamp;

const FINALIZED_SUFFIX: &str = ".finalized";

/// Acquisition status of one expected file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    /// Not yet observed.
    Pending,
    /// Observed by an invocation.
    Acquired,
}

impl LedgerStatus {
    /// On-disk spelling of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "no",
            Self::Acquired => "yes",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "no" => Some(Self::Pending),
            "yes" => Some(Self::Acquired),
            _ => None,
        }
    }
}

/// Case-insensitive substring rule excluding samples from tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRule {
    needle: Option<String>,
}

impl IgnoreRule {
    /// Build a rule from an optional pattern; blank patterns match nothing.
    #[must_use]
    pub fn new(pattern: Option<&str>) -> Self {
        Self {
            needle: pattern
                .map(str::trim)
                .filter(|pattern| !pattern.is_empty())
                .map(str::to_lowercase),
        }
    }

    /// Build the rule configured for the ledger.
    #[must_use]
    pub fn from_settings(settings: &LedgerSettings) -> Self {
        Self::new(settings.active_ignore_pattern())
    }

    /// Whether `name` is excluded.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.needle
            .as_deref()
            .is_some_and(|needle| name.to_lowercase().contains(needle))
    }
}

/// Result of marking a file as acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The entry moved from pending to acquired.
    Acquired,
    /// The entry was already acquired; nothing changed.
    AlreadyAcquired,
}

/// Ordered mapping from expected file name to acquisition status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionLedger {
    order: Vec<String>,
    entries: HashMap<String, LedgerStatus>,
}

impl AcquisitionLedger {
    /// Create a ledger with every non-ignored name pending.
    ///
    /// Names are lowercased; duplicates collapse onto their first position.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::EmptyLedger`] when no name survives the ignore rule.
    pub fn create<I, S>(expected: I, ignore: &IgnoreRule) -> FsOpsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ledger = Self::default();
        let mut listed = 0usize;
        let mut ignored = 0usize;
        for name in expected {
            listed += 1;
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            if ignore.matches(&name) {
                ignored += 1;
                continue;
            }
            ledger.insert(name, LedgerStatus::Pending);
        }
        if ledger.is_empty() {
            return Err(FsOpsError::EmptyLedger {
                expected: listed,
                ignored,
            });
        }
        Ok(ledger)
    }

    /// Reconstruct a ledger from its text form, skipping malformed lines.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut ledger = Self::default();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                warn!(line = index + 1, content = %trimmed, "skipping ledger line without a single '='");
                continue;
            };
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                warn!(line = index + 1, content = %trimmed, "skipping ledger line with empty key");
                continue;
            }
            let Some(status) = LedgerStatus::parse(&value.trim().to_ascii_lowercase()) else {
                warn!(line = index + 1, content = %trimmed, "skipping ledger line with unknown status");
                continue;
            };
            ledger.insert(key, status);
        }
        ledger
    }

    /// Load the ledger at `path`.
    ///
    /// Returns `None` when the file is absent or yields no entries, in which
    /// case the caller rebuilds it from the manifest.
    ///
    /// # Errors
    ///
    /// Returns an IO error when an existing file cannot be read.
    pub fn load(path: &Path) -> FsOpsResult<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FsOpsError::io("ledger.read", path, err)),
        };
        let ledger = Self::parse(&text);
        if ledger.is_empty() {
            warn!(path = %path.display(), "ledger has no usable entries; rebuilding");
            return Ok(None);
        }
        debug!(path = %path.display(), entries = ledger.len(), "loaded ledger");
        Ok(Some(ledger))
    }

    /// Render the ledger in its on-disk form.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, status) in self.iter() {
            out.push_str(name);
            out.push('=');
            out.push_str(status.as_str());
            out.push('\n');
        }
        out
    }

    /// Atomically replace the ledger file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary file cannot be written or renamed.
    pub fn save(&self, path: &Path) -> FsOpsResult<()> {
        write_atomic(path, self.render().as_bytes())
    }

    /// Record `file_name` as acquired.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::NotInBatch`] when the name is not a ledger key.
    pub fn mark_acquired(&mut self, file_name: &str) -> FsOpsResult<MarkOutcome> {
        let key = file_name.trim().to_lowercase();
        match self.entries.get_mut(&key) {
            Some(status @ LedgerStatus::Pending) => {
                *status = LedgerStatus::Acquired;
                Ok(MarkOutcome::Acquired)
            }
            Some(LedgerStatus::Acquired) => Ok(MarkOutcome::AlreadyAcquired),
            None => Err(FsOpsError::NotInBatch { file_name: key }),
        }
    }

    /// Status recorded for `file_name`.
    #[must_use]
    pub fn status(&self, file_name: &str) -> Option<LedgerStatus> {
        self.entries.get(&file_name.to_lowercase()).copied()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, LedgerStatus)> {
        self.order.iter().filter_map(|name| {
            self.entries
                .get(name)
                .map(|status| (name.as_str(), *status))
        })
    }

    /// Number of tracked files.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the ledger tracks nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of acquired files.
    #[must_use]
    pub fn acquired_count(&self) -> usize {
        self.entries
            .values()
            .filter(|status| **status == LedgerStatus::Acquired)
            .count()
    }

    fn insert(&mut self, name: String, status: LedgerStatus) {
        if let Some(existing) = self.entries.get_mut(&name) {
            *existing = status;
        } else {
            self.order.push(name.clone());
            self.entries.insert(name, status);
        }
    }
}

/// Sidecar next to the ledger recording that its batch has been finalized.
#[must_use]
pub fn finalized_path(ledger_path: &Path) -> PathBuf {
    let mut name = ledger_path
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(FINALIZED_SUFFIX);
    ledger_path.with_file_name(name)
}

/// Whether the batch owning `ledger_path` has already been finalized.
#[must_use]
pub fn is_finalized(ledger_path: &Path) -> bool {
    finalized_path(ledger_path).is_file()
}

/// Record that the batch owning `ledger_path` was finalized into `destination`.
///
/// # Errors
///
/// Returns an error when the sidecar cannot be written or renamed.
pub fn record_finalized(ledger_path: &Path, destination: &Path) -> FsOpsResult<()> {
    let body = format!(
        "destination=\"{}\"\nfinalized_at=\"{}\"\n",
        destination.display(),
        format_timestamp(Utc::now())
    );
    write_atomic(&finalized_path(ledger_path), body.as_bytes())
}

/// Temporary file in the target directory, synced, then renamed over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> FsOpsResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| FsOpsError::io("ledger.create_temp", parent, err))?;
    temp.write_all(contents)
        .map_err(|err| FsOpsError::io("ledger.write", temp.path().to_path_buf(), err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| FsOpsError::io("ledger.sync", temp.path().to_path_buf(), err))?;
    temp.persist(path)
        .map_err(|err| FsOpsError::persist("ledger.persist", path, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn create_applies_ignore_rule_and_collapses_duplicates() -> Result<()> {
        let ignore = IgnoreRule::new(Some("Blank"));
        let ledger =
            AcquisitionLedger::create(["A.raw", "blank_01.raw", "b.raw", "a.RAW"], &ignore)?;
        assert_eq!(
            ledger.iter().collect::<Vec<_>>(),
            vec![
                ("a.raw", LedgerStatus::Pending),
                ("b.raw", LedgerStatus::Pending)
            ]
        );
        Ok(())
    }

    #[test]
    fn create_rejects_fully_ignored_list() {
        let ignore = IgnoreRule::new(Some("blank"));
        let err = AcquisitionLedger::create(["blank1.raw", "BLANK2.raw"], &ignore).unwrap_err();
        assert!(matches!(
            err,
            FsOpsError::EmptyLedger {
                expected: 2,
                ignored: 2
            }
        ));
    }

    #[test]
    fn disabled_ignore_rule_matches_nothing() {
        assert!(!IgnoreRule::new(None).matches("blank.raw"));
        assert!(!IgnoreRule::new(Some("  ")).matches("blank.raw"));
        let settings = LedgerSettings {
            file_name: "ledger.txt".into(),
            ignore_pattern: "blank".into(),
            ignore_enabled: false,
        };
        assert!(!IgnoreRule::from_settings(&settings).matches("blank.raw"));
    }

    #[test]
    fn mark_acquired_is_idempotent_and_rejects_strangers() -> Result<()> {
        let mut ledger = AcquisitionLedger::create(["a.raw", "b.raw"], &IgnoreRule::default())?;
        assert_eq!(ledger.mark_acquired("A.RAW")?, MarkOutcome::Acquired);
        let rendered = ledger.render();
        assert_eq!(ledger.mark_acquired("a.raw")?, MarkOutcome::AlreadyAcquired);
        assert_eq!(ledger.render(), rendered);
        assert_eq!(ledger.acquired_count(), 1);

        let err = ledger.mark_acquired("c.raw").unwrap_err();
        assert!(matches!(err, FsOpsError::NotInBatch { ref file_name } if file_name == "c.raw"));
        Ok(())
    }

    #[test]
    fn save_then_load_round_trips_order_and_status() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("acquisition_ledger.txt");
        let mut ledger =
            AcquisitionLedger::create(["zeta.raw", "alpha.raw", "mid.raw"], &IgnoreRule::default())?;
        ledger.mark_acquired("alpha.raw")?;
        ledger.save(&path)?;

        assert_eq!(
            fs::read_to_string(&path)?,
            "zeta.raw=no\nalpha.raw=yes\nmid.raw=no\n"
        );
        let loaded = AcquisitionLedger::load(&path)?;
        assert_eq!(loaded.as_ref(), Some(&ledger));
        assert_eq!(fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn parse_skips_malformed_lines() {
        let ledger = AcquisitionLedger::parse(
            "a.raw=yes\nno-separator\n=no\nb.raw=maybe\nc.raw=no=yes\n\nD.RAW = NO \n",
        );
        assert_eq!(
            ledger.iter().collect::<Vec<_>>(),
            vec![
                ("a.raw", LedgerStatus::Acquired),
                ("d.raw", LedgerStatus::Pending)
            ]
        );
    }

    #[test]
    fn missing_or_empty_ledger_loads_as_absent() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("ledger.txt");
        assert!(AcquisitionLedger::load(&path)?.is_none());
        fs::write(&path, "garbage\n")?;
        assert!(AcquisitionLedger::load(&path)?.is_none());
        Ok(())
    }

    #[test]
    fn finalized_sidecar_sits_next_to_ledger() -> Result<()> {
        let temp = TempDir::new()?;
        let ledger_path = temp.path().join("acquisition_ledger.txt");
        assert_eq!(
            finalized_path(&ledger_path),
            temp.path().join("acquisition_ledger.txt.finalized")
        );
        assert!(!is_finalized(&ledger_path));

        record_finalized(&ledger_path, Path::new("/out/Run1"))?;
        assert!(is_finalized(&ledger_path));
        let body = fs::read_to_string(finalized_path(&ledger_path))?;
        assert!(body.starts_with("destination=\"/out/Run1\"\nfinalized_at=\""));
        assert_eq!(fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }
}
