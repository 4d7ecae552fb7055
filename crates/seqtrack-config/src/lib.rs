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

//! Typed configuration for the acquisition tracker.
//!
//! Layout: `loader.rs` (raw `key = value` parsing and the single validation
//! pass), `model.rs` (immutable typed configuration), `validate.rs` (per-field
//! parsing helpers), `defaults.rs` (key names and default values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::RawSettings;
pub use model::{
    CleanupPolicy, LedgerSettings, LogFormatSetting, ManifestSettings, MarkerNames,
    OverwritePolicy, TrackerConfig, TransferPolicy,
};
