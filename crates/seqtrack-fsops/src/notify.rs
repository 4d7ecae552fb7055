//! Best-effort notifications.
//!
//! A failed notification never changes the outcome of an invocation; callers
//! go through [`deliver`], which logs the failure at `warn`.

use std::process::Command;

use tracing::{info, warn};

use crate::error::{FsOpsError, FsOpsResult, error_chain};

/// Message shown to an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short headline.
    pub title: String,
    /// Detail text.
    pub body: String,
}

impl Notification {
    /// Build a notification.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Sink for operator notifications.
pub trait Notifier {
    /// Deliver `notification`.
    ///
    /// # Errors
    ///
    /// Returns an error when the notification could not be delivered.
    fn notify(&self, notification: &Notification) -> FsOpsResult<()>;
}

/// Deliver `notification`, logging instead of propagating failures.
pub fn deliver(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(err) = notifier.notify(notification) {
        warn!(
            error = %error_chain(&err),
            title = %notification.title,
            "failed to deliver notification"
        );
    }
}

/// Notifier that emits a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> FsOpsResult<()> {
        info!(
            title = %notification.title,
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}

/// Notifier that runs an external program with the title and body appended
/// as the last two arguments.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Parse a command line such as `notify-send -u critical`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InvalidInput`] for a blank command line.
    pub fn new(command_line: &str) -> FsOpsResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(FsOpsError::InvalidInput {
            field: "notify_command",
            reason: "must not be blank",
            value: None,
        })?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notification: &Notification) -> FsOpsResult<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&notification.title)
            .arg(&notification.body)
            .status()
            .map_err(|err| FsOpsError::io("notify.spawn", &self.program, err))?;
        if status.success() {
            Ok(())
        } else {
            Err(FsOpsError::NotifyCommand {
                program: self.program.clone(),
                status,
            })
        }
    }
}
