//! Batch completion predicate.

use std::fmt;

use crate::ledger::{AcquisitionLedger, LedgerStatus};

/// True when the ledger tracks at least one file and every file is acquired.
#[must_use]
pub fn is_complete(ledger: &AcquisitionLedger) -> bool {
    !ledger.is_empty()
        && ledger
            .iter()
            .all(|(_, status)| status == LedgerStatus::Acquired)
}

/// Acquired versus total counts for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Files acquired so far.
    pub acquired: usize,
    /// Files tracked by the ledger.
    pub total: usize,
}

impl Progress {
    /// Summarise a ledger snapshot.
    #[must_use]
    pub fn of(ledger: &AcquisitionLedger) -> Self {
        Self {
            acquired: ledger.acquired_count(),
            total: ledger.len(),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.acquired, self.total)
    }
}
