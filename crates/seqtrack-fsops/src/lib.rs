#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Acquisition tracking and batch finalization.
//!
//! Each invocation handles one arrived file: the batch's ledger is loaded (or
//! built from its manifest), the file is marked acquired, and once every
//! expected file has arrived the batch is relocated and a completion marker is
//! written. Failures leave a single failure marker in the destination.
//!
//! Invocations for the same batch directory must not run concurrently; no
//! lock file is taken.
//!
//! Layout: `manifest.rs` (discovery and decoding), `scratch.rs` (manifest
//! working copies), `ledger.rs` (durable acquisition state), `completion.rs`,
//! `destination.rs` (path planning), `finalize.rs` (step pipeline),
//! `markers.rs`, `failure.rs`, `notify.rs`, `service.rs` (per-invocation flow).

pub mod completion;
pub mod destination;
pub mod error;
pub mod failure;
pub mod finalize;
pub mod ledger;
pub mod manifest;
pub mod markers;
pub mod notify;
pub mod pattern;
pub mod scratch;
pub mod service;

pub use completion::{Progress, is_complete};
pub use destination::compute_destination;
pub use error::{ErrorClass, FsOpsError, FsOpsResult, error_chain};
pub use failure::{FailureOutcome, FailureSignal};
pub use finalize::{FinalizeReport, FinalizeRequest, Finalizer};
pub use ledger::{AcquisitionLedger, IgnoreRule, LedgerStatus, MarkOutcome};
pub use manifest::{
    DelimitedManifestDecoder, ManifestDecoder, ManifestResolver, ManifestSource,
    ResolvedManifest, SampleEntry,
};
pub use notify::{CommandNotifier, LogNotifier, Notification, Notifier, deliver};
pub use service::{AcquisitionService, InvocationOutcome, SkipReason};
