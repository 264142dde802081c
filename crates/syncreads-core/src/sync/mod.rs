//! Sync jobs: lifecycle, per-job logging and live events.

mod error;
mod logger;
mod runner;

pub use error::SyncError;
pub use logger::{SyncEvent, SyncEvents, SyncLogger};
pub use runner::{BatchReport, SyncOptions, SyncReport, SyncRunner};
