//! User and device repository implementation

use crate::error::{Error, Result};
use crate::models::{Device, SyncSettings, User, UserId};
use libsql::{params, Connection, Row, Value};

/// Trait for user and linked-device storage operations (async)
#[allow(async_fn_in_trait)]
pub trait UserRepository {
    /// Create a new user with a fresh API key
    async fn create(&self, email: &str) -> Result<User>;

    /// Get a user by ID
    async fn get(&self, id: &UserId) -> Result<Option<User>>;

    /// Get a user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Resolve the user owning an API key
    async fn get_by_api_key(&self, api_key: &str) -> Result<Option<User>>;

    /// Link (or relink) the user's device token
    async fn link_device(&self, id: &UserId, token: &str) -> Result<Device>;

    /// Get the user's linked device, if any
    async fn get_device(&self, id: &UserId) -> Result<Option<Device>>;

    /// Get the user's stored sync defaults; empty when never set
    async fn get_sync_settings(&self, id: &UserId) -> Result<SyncSettings>;

    /// Replace the user's stored sync defaults
    async fn put_sync_settings(&self, id: &UserId, settings: &SyncSettings)
        -> Result<SyncSettings>;
}

/// libSQL implementation of `UserRepository`
pub struct LibSqlUserRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlUserRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_user(row: &Row) -> Result<User> {
        let id: String = row.get(0)?;
        Ok(User {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid user id '{id}'")))?,
            email: row.get(1)?,
            api_key: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    async fn query_user(&self, sql: &str, value: String) -> Result<Option<User>> {
        let mut rows = self.conn.query(sql, params![value]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_user(&row)?)),
            None => Ok(None),
        }
    }
}

impl UserRepository for LibSqlUserRepository<'_> {
    async fn create(&self, email: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidInput(format!("'{email}' is not an email address")));
        }

        let user = User::new(email);
        self.conn
            .execute(
                "INSERT INTO users (id, email, api_key, created_at) VALUES (?, ?, ?, ?)",
                params![
                    user.id.as_str(),
                    user.email.clone(),
                    user.api_key.clone(),
                    user.created_at
                ],
            )
            .await?;

        tracing::debug!(user = %user.id, "Created user");
        Ok(user)
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>> {
        self.query_user(
            "SELECT id, email, api_key, created_at FROM users WHERE id = ?",
            id.as_str(),
        )
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user(
            "SELECT id, email, api_key, created_at FROM users WHERE email = ? COLLATE NOCASE",
            email.trim().to_string(),
        )
        .await
    }

    async fn get_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.query_user(
            "SELECT id, email, api_key, created_at FROM users WHERE api_key = ?",
            api_key.to_string(),
        )
        .await
    }

    async fn link_device(&self, id: &UserId, token: &str) -> Result<Device> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidInput("device token must not be empty".into()));
        }
        if self.get(id).await?.is_none() {
            return Err(Error::NotFound("User not found!".into()));
        }

        let device = Device {
            user_id: *id,
            token: token.to_string(),
            registered_at: chrono::Utc::now().timestamp_millis(),
        };
        self.conn
            .execute(
                "INSERT OR REPLACE INTO devices (user_id, token, registered_at) VALUES (?, ?, ?)",
                params![id.as_str(), device.token.clone(), device.registered_at],
            )
            .await?;

        Ok(device)
    }

    async fn get_device(&self, id: &UserId) -> Result<Option<Device>> {
        let mut rows = self
            .conn
            .query(
                "SELECT token, registered_at FROM devices WHERE user_id = ?",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Device {
                user_id: *id,
                token: row.get(0)?,
                registered_at: row.get(1)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_sync_settings(&self, id: &UserId) -> Result<SyncSettings> {
        let mut rows = self
            .conn
            .query(
                "SELECT folder_name FROM sync_settings WHERE user_id = ?",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(SyncSettings {
                folder: match row.get_value(0)? {
                    Value::Text(name) => Some(name),
                    _ => None,
                },
            }),
            None => Ok(SyncSettings::default()),
        }
    }

    async fn put_sync_settings(
        &self,
        id: &UserId,
        settings: &SyncSettings,
    ) -> Result<SyncSettings> {
        if let Some(problem) = settings.problem() {
            return Err(Error::InvalidInput(problem));
        }
        if self.get(id).await?.is_none() {
            return Err(Error::NotFound("User not found!".into()));
        }

        let stored = SyncSettings {
            folder: settings.folder_name().map(str::to_string),
        };
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_settings (user_id, folder_name, updated_at) VALUES (?, ?, ?)",
                params![
                    id.as_str(),
                    stored.folder.clone(),
                    chrono::Utc::now().timestamp_millis()
                ],
            )
            .await?;

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let user = repo.create("reader@example.com").await.unwrap();
        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);

        let by_key = repo.get_by_api_key(&user.api_key).await.unwrap().unwrap();
        assert_eq!(by_key.id, user.id);
        assert!(repo.get_by_api_key("nope").await.unwrap().is_none());

        let by_email = repo.get_by_email(" Reader@Example.com ").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_invalid_email() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        assert!(matches!(
            repo.create("  ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_email_fails() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        repo.create("reader@example.com").await.unwrap();
        assert!(repo.create("READER@example.com").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_link_and_relink_device() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());
        let user = repo.create("reader@example.com").await.unwrap();

        assert!(repo.get_device(&user.id).await.unwrap().is_none());

        repo.link_device(&user.id, "first-token").await.unwrap();
        repo.link_device(&user.id, "second-token").await.unwrap();

        let device = repo.get_device(&user.id).await.unwrap().unwrap();
        assert_eq!(device.token, "second-token");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_link_device_requires_user() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());

        let result = repo.link_device(&UserId::new(), "token").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_settings_default_then_replace() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());
        let user = repo.create("reader@example.com").await.unwrap();

        assert_eq!(
            repo.get_sync_settings(&user.id).await.unwrap(),
            SyncSettings::default()
        );

        let stored = repo
            .put_sync_settings(&user.id, &SyncSettings::with_folder(" Reading "))
            .await
            .unwrap();
        assert_eq!(stored, SyncSettings::with_folder("Reading"));
        assert_eq!(repo.get_sync_settings(&user.id).await.unwrap(), stored);

        repo.put_sync_settings(&user.id, &SyncSettings::default())
            .await
            .unwrap();
        assert_eq!(repo.get_sync_settings(&user.id).await.unwrap().folder, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_settings_validation() {
        let db = setup().await;
        let repo = LibSqlUserRepository::new(db.connection());
        let user = repo.create("reader@example.com").await.unwrap();

        let invalid = repo
            .put_sync_settings(&user.id, &SyncSettings::with_folder("a\tb"))
            .await;
        assert!(matches!(invalid, Err(Error::InvalidInput(_))));

        let missing = repo
            .put_sync_settings(&UserId::new(), &SyncSettings::with_folder("Reading"))
            .await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
