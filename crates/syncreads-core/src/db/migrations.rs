//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }
    if version < 3 {
        migrate_v3(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run a migration's statements in one transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: users and linked devices
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                api_key TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS devices (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                token TEXT NOT NULL,
                registered_at INTEGER NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )
    .await
}

/// Migration to version 2: sync jobs and their append-only logs
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "CREATE TABLE IF NOT EXISTS syncs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                trigger_kind TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                started_at INTEGER NOT NULL,
                finished_at INTEGER,
                synced_articles_count INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE INDEX IF NOT EXISTS idx_syncs_user_started ON syncs(user_id, started_at DESC)",
            "CREATE TABLE IF NOT EXISTS sync_logs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                sync_id TEXT NOT NULL REFERENCES syncs(id) ON DELETE CASCADE,
                date INTEGER NOT NULL,
                message TEXT NOT NULL,
                level TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_logs_sync ON sync_logs(sync_id, seq)",
            "CREATE TRIGGER IF NOT EXISTS sync_logs_append_only BEFORE UPDATE ON sync_logs
             BEGIN
                 SELECT RAISE(ABORT, 'sync logs are append-only');
             END",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )
    .await
}

/// Migration to version 3: per-user sync defaults, log rows undeletable
async fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        CURRENT_VERSION,
        &[
            "CREATE TABLE IF NOT EXISTS sync_settings (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                folder_name TEXT,
                updated_at INTEGER NOT NULL
            )",
            "CREATE TRIGGER IF NOT EXISTS sync_logs_no_delete BEFORE DELETE ON sync_logs
             BEGIN
                 SELECT RAISE(ABORT, 'sync logs are append-only');
             END",
            "INSERT INTO schema_version (version) VALUES (3)",
        ],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master
                    WHERE type = 'table' AND name = ?
                )",
                [name],
            )
            .await
            .unwrap();

        rows.next()
            .await
            .unwrap()
            .is_some_and(|row| row.get::<i32>(0).unwrap() != 0)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_upgrade_from_v2() {
        let conn = setup().await;
        migrate_v1(&conn).await.unwrap();
        migrate_v2(&conn).await.unwrap();
        assert_eq!(get_version(&conn).await.unwrap(), 2);
        assert!(!table_exists(&conn, "sync_settings").await);

        run(&conn).await.unwrap();
        assert_eq!(get_version(&conn).await.unwrap(), 3);
        assert!(table_exists(&conn, "sync_settings").await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_create_sync_tables() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in ["users", "devices", "syncs", "sync_logs", "sync_settings"] {
            assert!(table_exists(&conn, table).await, "missing table {table}");
        }
    }
}
