//! Database layer for SyncReads

mod connection;
mod migrations;
mod sync_repository;
mod user_repository;

pub use connection::Database;
pub use sync_repository::{LibSqlSyncRepository, SyncRepository};
pub use user_repository::{LibSqlUserRepository, UserRepository};
