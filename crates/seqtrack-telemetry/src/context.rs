//! Span helpers that tag every log line with the invocation it belongs to.
//!
//! # Design
//! - One invocation equals one process run, so the span is entered once and
//!   kept alive until the guard drops.
//! - The outcome field starts empty and is filled in once the run settles.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the invocation span entered for the lifetime of the run.
pub struct InvocationContextGuard {
    span: &'static Span,
    _guard: Entered<'static>,
}

impl InvocationContextGuard {
    /// Enter the invocation span carrying the identifier and trigger path.
    #[must_use]
    pub fn new(invocation_id: impl Into<String>, trigger: impl Into<String>) -> Self {
        let invocation_id = invocation_id.into();
        let trigger = trigger.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "invocation",
            invocation_id = %invocation_id,
            trigger = %trigger,
            build_sha = %build_sha(),
            outcome = tracing::field::Empty,
        )));
        let guard = span.enter();
        Self {
            span,
            _guard: guard,
        }
    }

    /// Span entered by this guard.
    #[must_use]
    pub const fn span(&self) -> &Span {
        self.span
    }
}

/// Record the final outcome label on the current span.
pub fn record_outcome(outcome: &str) {
    Span::current().record("outcome", tracing::field::display(outcome));
}
