//! Completion and failure marker files.
//!
//! Markers are small `key="value"` text files polled by downstream automation.
//! They are written through a temporary file and renamed into place so a
//! reader never observes a partial marker.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tempfile::NamedTempFile;

use crate::error::{FsOpsError, FsOpsResult};

/// Content of a completion or failure marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRecord {
    /// When the marker was produced.
    pub timestamp: DateTime<Utc>,
    /// Path of the triggering file.
    pub trigger: String,
    /// Whether the batch is a repeat run.
    pub repeat_run: bool,
    /// Sanitized error description; present only on failure markers.
    pub error: Option<String>,
}

impl MarkerRecord {
    /// Record for a completion marker stamped now.
    #[must_use]
    pub fn completion(trigger: &Path, repeat_run: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            trigger: trigger.display().to_string(),
            repeat_run,
            error: None,
        }
    }

    /// Record for a failure marker stamped now; `message` is sanitized.
    #[must_use]
    pub fn failure(trigger: &Path, repeat_run: bool, message: &str) -> Self {
        Self {
            error: Some(sanitize_message(message)),
            ..Self::completion(trigger, repeat_run)
        }
    }

    /// Render the marker body.
    #[must_use]
    pub fn render(&self) -> String {
        let mut body = format!(
            "trigger_date=\"{}\"\nraw_file=\"{}\"\nrepeat_run=\"{}\"\n",
            format_timestamp(self.timestamp),
            single_line(&self.trigger),
            self.repeat_run
        );
        if let Some(error) = &self.error {
            body.push_str("trigger_error=\"");
            body.push_str(error);
            body.push_str("\"\n");
        }
        body
    }
}

/// RFC 3339 UTC timestamp with second precision.
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalise an error description for a marker field.
///
/// Backslashes become forward slashes, double quotes become single quotes and
/// line breaks become spaces.
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    single_line(&message.replace('\\', "/"))
}

fn single_line(value: &str) -> String {
    value
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .replace('"', "'")
}

/// Whether the batch is a repeat run.
///
/// True when `repeat_tag` is non-empty and appears, case-insensitively, in the
/// destination path or in the triggering file name.
#[must_use]
pub fn is_repeat_run(destination: &Path, trigger: &Path, repeat_tag: &str) -> bool {
    let tag = repeat_tag.trim().to_lowercase();
    if tag.is_empty() {
        return false;
    }
    let in_destination = destination
        .to_string_lossy()
        .to_lowercase()
        .contains(&tag);
    let in_trigger = trigger
        .file_name()
        .is_some_and(|name| name.to_string_lossy().to_lowercase().contains(&tag));
    in_destination || in_trigger
}

/// Atomically write `record` to `path`.
///
/// # Errors
///
/// Returns an error when the temporary file cannot be written or renamed.
pub fn write_marker(path: &Path, record: &MarkerRecord) -> FsOpsResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| FsOpsError::io("marker.create_temp", parent, err))?;
    temp.write_all(record.render().as_bytes())
        .map_err(|err| FsOpsError::io("marker.write", path, err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| FsOpsError::io("marker.sync", path, err))?;
    temp.persist(path)
        .map_err(|err| FsOpsError::persist("marker.persist", path, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn fixed_time() -> Result<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid timestamp"))
    }

    #[test]
    fn completion_marker_renders_three_fields() -> Result<()> {
        let record = MarkerRecord {
            timestamp: fixed_time()?,
            trigger: "/data/Incoming/Run1/b.raw".into(),
            repeat_run: false,
            error: None,
        };
        assert_eq!(
            record.render(),
            "trigger_date=\"2024-03-09T14:05:07Z\"\nraw_file=\"/data/Incoming/Run1/b.raw\"\nrepeat_run=\"false\"\n"
        );
        Ok(())
    }

    #[test]
    fn failure_marker_adds_sanitized_error() {
        let record = MarkerRecord::failure(
            Path::new("/data/a.raw"),
            true,
            "copy failed: C:\\out\\\"a\".raw\nretry",
        );
        let rendered = record.render();
        assert!(rendered.contains("repeat_run=\"true\"\n"));
        assert!(rendered.ends_with("trigger_error=\"copy failed: C:/out/'a'.raw retry\"\n"));
    }

    #[test]
    fn repeat_flag_checks_destination_and_trigger_name() {
        let trigger = Path::new("/in/Run1/a.raw");
        assert!(is_repeat_run(Path::new("/out/Run1_RPT"), trigger, "_rpt"));
        assert!(is_repeat_run(
            Path::new("/out/Run1"),
            Path::new("/in/Run1/a_Rpt.raw"),
            "_RPT"
        ));
        assert!(!is_repeat_run(Path::new("/out/Run1"), trigger, "_rpt"));
        assert!(!is_repeat_run(Path::new("/out/Run1_RPT"), trigger, ""));
    }

    #[test]
    fn write_marker_replaces_file_atomically() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("acquisition_complete.txt");
        fs::write(&path, "stale")?;
        let record = MarkerRecord::completion(Path::new("/in/a.raw"), false);
        write_marker(&path, &record)?;
        assert_eq!(fs::read_to_string(&path)?, record.render());
        assert_eq!(fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }
}
