//! Temporary batch trees for filesystem tests.
//!
//! Every fixture lives under its own `TempDir` laid out as:
//!
//! ```text
//! <root>/input/Incoming/<batch>/   batch directory (payloads, manifest, ledger)
//! <root>/output/                   output root
//! <root>/scratch/                  scratch directory for manifest copies
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use seqtrack_config::{RawSettings, TrackerConfig, defaults};
use tempfile::TempDir;

/// Path component under which fixture batches are created.
pub const TRIM_SEGMENT: &str = "Incoming";

/// A batch directory plus matching output and scratch roots.
pub struct BatchFixture {
    root: TempDir,
    batch_dir: PathBuf,
    output_root: PathBuf,
    scratch_dir: PathBuf,
}

impl BatchFixture {
    /// Create a fixture whose batch directory is `input/Incoming/<batch>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary tree cannot be created.
    pub fn new(batch: &str) -> Result<Self> {
        let root = tempfile::Builder::new().prefix("seqtrack-").tempdir()?;
        let batch_dir = root.path().join("input").join(TRIM_SEGMENT).join(batch);
        let output_root = root.path().join("output");
        let scratch_dir = root.path().join("scratch");
        for dir in [&batch_dir, &output_root, &scratch_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(Self {
            root,
            batch_dir,
            output_root,
            scratch_dir,
        })
    }

    /// Root of the temporary tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Batch directory receiving payloads.
    #[must_use]
    pub fn batch_dir(&self) -> &Path {
        &self.batch_dir
    }

    /// Output root for finalized batches.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Scratch directory for manifest copies.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Destination the batch maps to when trimming at [`TRIM_SEGMENT`].
    #[must_use]
    pub fn expected_destination(&self) -> PathBuf {
        self.batch_dir
            .file_name()
            .map_or_else(|| self.output_root.clone(), |name| self.output_root.join(name))
    }

    /// Write a payload file of `size` bytes into the batch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_payload(&self, name: &str, size: usize) -> Result<PathBuf> {
        self.write_file(name, &vec![b'x'; size])
    }

    /// Write arbitrary bytes relative to the batch directory, creating parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, relative: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.batch_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Write a tab-delimited manifest listing `samples` into the batch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_manifest(&self, name: &str, samples: &[&str]) -> Result<PathBuf> {
        let mut body = String::from("Sample\tPath\n");
        for sample in samples {
            body.push_str(sample);
            body.push('\t');
            body.push_str(&self.batch_dir.to_string_lossy());
            body.push('\n');
        }
        self.write_file(name, body.as_bytes())
    }

    /// Raw settings pointing at this fixture's output and scratch roots.
    #[must_use]
    pub fn settings(&self) -> RawSettings {
        let mut raw = RawSettings::default();
        raw.set(
            defaults::OUTPUT_ROOT,
            self.output_root.to_string_lossy().into_owned(),
        );
        raw.set(
            defaults::SCRATCH_DIR,
            self.scratch_dir.to_string_lossy().into_owned(),
        );
        raw.set(defaults::TRIM_SEGMENT, TRIM_SEGMENT);
        raw
    }

    /// Validated configuration built from [`Self::settings`] plus `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if the overrides do not validate.
    pub fn config(&self, overrides: &[(&str, &str)]) -> Result<TrackerConfig> {
        let mut raw = self.settings();
        for (key, value) in overrides {
            raw.set(key, *value);
        }
        Ok(TrackerConfig::from_raw(&raw)?)
    }

    /// Write a configuration file for this fixture and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_config(&self, overrides: &[(&str, &str)]) -> Result<PathBuf> {
        let mut raw = self.settings();
        for (key, value) in overrides {
            raw.set(key, *value);
        }
        let mut body = String::new();
        for (key, value) in raw.iter() {
            body.push_str(key);
            body.push_str(" = \"");
            body.push_str(value);
            body.push_str("\"\n");
        }
        let path = self.root.path().join("seqtrack.conf");
        fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Move a file's modification time `age` into the past.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or its time updated.
pub fn set_modified_ago(path: &Path, age: Duration) -> Result<()> {
    let when = SystemTime::now()
        .checked_sub(age)
        .context("modification time underflow")?;
    let file = File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.set_modified(when)?;
    Ok(())
}
