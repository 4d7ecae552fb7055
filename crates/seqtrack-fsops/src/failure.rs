//! De-duplicated failure reporting.
//!
//! The first failure for a destination writes the failure marker and sends one
//! notification. While that marker exists, later failures are only logged.

use std::fs;
use std::path::Path;

use seqtrack_config::MarkerNames;
use tracing::{info, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::markers::{MarkerRecord, is_repeat_run, write_marker};
use crate::notify::{Notification, Notifier, deliver};

/// Whether a failure was recorded or suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// A new failure marker was written and a notification sent.
    Recorded,
    /// A failure marker already existed; nothing was written.
    Suppressed,
}

/// Writes failure markers and notifies once per destination.
pub struct FailureSignal<'a> {
    markers: &'a MarkerNames,
    repeat_tag: &'a str,
    notifier: &'a dyn Notifier,
}

impl<'a> FailureSignal<'a> {
    /// Build a failure signal.
    #[must_use]
    pub const fn new(
        markers: &'a MarkerNames,
        repeat_tag: &'a str,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            markers,
            repeat_tag,
            notifier,
        }
    }

    /// Record a failure for `destination` unless one is already recorded.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination or the marker cannot be written.
    pub fn on_error(
        &self,
        destination: &Path,
        trigger: &Path,
        message: &str,
    ) -> FsOpsResult<FailureOutcome> {
        let marker_path = destination.join(&self.markers.failure);
        if marker_path.exists() {
            info!(
                marker = %marker_path.display(),
                "failure marker already present; suppressing duplicate report"
            );
            return Ok(FailureOutcome::Suppressed);
        }

        fs::create_dir_all(destination)
            .map_err(|err| FsOpsError::io("marker.create_dir", destination, err))?;
        let repeat_run = is_repeat_run(destination, trigger, self.repeat_tag);
        write_marker(
            &marker_path,
            &MarkerRecord::failure(trigger, repeat_run, message),
        )?;
        warn!(marker = %marker_path.display(), "failure marker written");

        self.notify_only(destination, message);
        Ok(FailureOutcome::Recorded)
    }

    /// Send the failure notification without touching the filesystem.
    pub fn notify_only(&self, destination: &Path, message: &str) {
        deliver(
            self.notifier,
            &Notification::new(
                "Acquisition failed",
                format!("{message} (destination: {})", destination.display()),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) -> FsOpsResult<()> {
            self.sent.borrow_mut().push(notification.clone());
            Ok(())
        }
    }

    fn marker_names() -> MarkerNames {
        MarkerNames {
            completion: "acquisition_complete.txt".into(),
            failure: "acquisition_failed.txt".into(),
        }
    }

    #[test]
    fn repeated_failures_write_one_marker_and_one_notification() -> Result<()> {
        let temp = TempDir::new()?;
        let destination = temp.path().join("out").join("Run1");
        let names = marker_names();
        let notifier = RecordingNotifier::default();
        let signal = FailureSignal::new(&names, "", &notifier);
        let trigger = Path::new("/in/Run1/a.raw");

        assert_eq!(
            signal.on_error(&destination, trigger, "first \"boom\"")?,
            FailureOutcome::Recorded
        );
        let first = fs::read_to_string(destination.join("acquisition_failed.txt"))?;
        assert!(first.contains("trigger_error=\"first 'boom'\""));

        assert_eq!(
            signal.on_error(&destination, trigger, "second")?,
            FailureOutcome::Suppressed
        );
        assert_eq!(
            fs::read_to_string(destination.join("acquisition_failed.txt"))?,
            first
        );
        assert_eq!(notifier.sent.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn failure_marker_carries_repeat_flag() -> Result<()> {
        let temp = TempDir::new()?;
        let destination = temp.path().join("Run1_rpt");
        let names = marker_names();
        let notifier = RecordingNotifier::default();
        FailureSignal::new(&names, "_RPT", &notifier).on_error(
            &destination,
            Path::new("/in/a.raw"),
            "oops",
        )?;
        let body = fs::read_to_string(destination.join("acquisition_failed.txt"))?;
        assert!(body.contains("repeat_run=\"true\""));
        Ok(())
    }
}
