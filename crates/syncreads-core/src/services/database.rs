//! Shared database service wrapper used across binaries.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlSyncRepository, LibSqlUserRepository, SyncRepository, UserRepository,
};
use crate::models::{
    Device, LogLine, SyncId, SyncJob, SyncSettings, SyncStatus, SyncTrigger, User, UserId,
};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory databases.
    pub fn path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Create a user.
    pub async fn create_user(&self, email: &str) -> Result<User> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .create(email)
            .await
    }

    /// Fetch a user by id.
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection()).get(id).await
    }

    /// Fetch a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .get_by_email(email)
            .await
    }

    /// Resolve the user owning an API key.
    pub async fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .get_by_api_key(api_key)
            .await
    }

    /// Link a device token to a user.
    pub async fn link_device(&self, id: &UserId, token: &str) -> Result<Device> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .link_device(id, token)
            .await
    }

    /// Fetch the user's linked device.
    pub async fn get_device(&self, id: &UserId) -> Result<Option<Device>> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .get_device(id)
            .await
    }

    /// Fetch the user's stored sync defaults.
    pub async fn get_sync_settings(&self, id: &UserId) -> Result<SyncSettings> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .get_sync_settings(id)
            .await
    }

    /// Replace the user's stored sync defaults.
    pub async fn put_sync_settings(
        &self,
        id: &UserId,
        settings: &SyncSettings,
    ) -> Result<SyncSettings> {
        let db = self.db.lock().await;
        LibSqlUserRepository::new(db.connection())
            .put_sync_settings(id, settings)
            .await
    }

    /// Create a pending sync job.
    pub async fn create_sync(&self, user_id: &UserId, trigger: SyncTrigger) -> Result<SyncJob> {
        let db = self.db.lock().await;
        LibSqlSyncRepository::new(db.connection())
            .create(user_id, trigger)
            .await
    }

    /// Move a pending sync job to a terminal status.
    pub async fn finish_sync(
        &self,
        id: &SyncId,
        status: SyncStatus,
        synced_articles_count: u32,
    ) -> Result<SyncJob> {
        let db = self.db.lock().await;
        LibSqlSyncRepository::new(db.connection())
            .finish(id, status, synced_articles_count)
            .await
    }

    /// Fetch a sync job by id.
    pub async fn get_sync(&self, id: &SyncId) -> Result<Option<SyncJob>> {
        let db = self.db.lock().await;
        LibSqlSyncRepository::new(db.connection()).get(id).await
    }

    /// List a user's sync jobs newest-first.
    pub async fn list_syncs(&self, user_id: &UserId, limit: usize) -> Result<Vec<SyncJob>> {
        let db = self.db.lock().await;
        LibSqlSyncRepository::new(db.connection())
            .list_for_user(user_id, limit)
            .await
    }

    /// Append a line to a sync job's log.
    pub async fn append_sync_log(&self, id: &SyncId, line: &LogLine) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSyncRepository::new(db.connection())
            .append_log(id, line)
            .await
    }

    /// Read a sync job's log in append order.
    pub async fn list_sync_log(&self, id: &SyncId) -> Result<Vec<LogLine>> {
        let db = self.db.lock().await;
        LibSqlSyncRepository::new(db.connection()).list_log(id).await
    }

    /// Run a raw statement, for tests that need to break the schema.
    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(sql, ()).await?;
        Ok(())
    }
}
