//! Shared services used by the CLI and the sync API

mod database;

pub use database::DatabaseService;
