//! syncreads-core - Core library for SyncReads
//!
//! This crate contains the shared models, database layer, device cloud
//! client and sync job runner used by the CLI and the API server.

pub mod article;
pub mod config;
pub mod db;
pub mod device;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{SyncId, SyncJob, SyncOutcome, UserId};
