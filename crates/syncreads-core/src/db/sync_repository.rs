//! Sync job and sync log repository implementation

use crate::error::{Error, Result};
use crate::models::{LogLevel, LogLine, SyncId, SyncJob, SyncStatus, SyncTrigger, UserId};
use libsql::{params, Connection, Row, Value};

/// Trait for sync job and log storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SyncRepository {
    /// Insert a new pending job
    async fn create(&self, user_id: &UserId, trigger: SyncTrigger) -> Result<SyncJob>;

    /// Move a pending job to a terminal status
    async fn finish(
        &self,
        id: &SyncId,
        status: SyncStatus,
        synced_articles_count: u32,
    ) -> Result<SyncJob>;

    /// Get a job by ID
    async fn get(&self, id: &SyncId) -> Result<Option<SyncJob>>;

    /// List a user's jobs, newest first
    async fn list_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<SyncJob>>;

    /// Append one line to a job's log
    async fn append_log(&self, id: &SyncId, line: &LogLine) -> Result<()>;

    /// Read a job's log in append order
    async fn list_log(&self, id: &SyncId) -> Result<Vec<LogLine>>;
}

/// libSQL implementation of `SyncRepository`
pub struct LibSqlSyncRepository<'a> {
    conn: &'a Connection,
}

const JOB_COLUMNS: &str =
    "id, user_id, trigger_kind, status, started_at, finished_at, synced_articles_count";

impl<'a> LibSqlSyncRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a job from a row selected with `JOB_COLUMNS`
    fn parse_job(row: &Row) -> Result<SyncJob> {
        let id: String = row.get(0)?;
        let user_id: String = row.get(1)?;
        let trigger: String = row.get(2)?;
        let status: String = row.get(3)?;
        let finished_at = match row.get_value(5)? {
            Value::Integer(value) => Some(value),
            _ => None,
        };

        Ok(SyncJob {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid sync id '{id}'")))?,
            user_id: user_id
                .parse()
                .map_err(|_| Error::Database(format!("invalid user id '{user_id}'")))?,
            trigger: trigger.parse().map_err(Error::Database)?,
            status: status.parse().map_err(Error::Database)?,
            started_at: row.get(4)?,
            finished_at,
            synced_articles_count: u32::try_from(row.get::<i64>(6)?).unwrap_or(0),
        })
    }
}

impl SyncRepository for LibSqlSyncRepository<'_> {
    async fn create(&self, user_id: &UserId, trigger: SyncTrigger) -> Result<SyncJob> {
        let job = SyncJob::new(*user_id, trigger);

        self.conn
            .execute(
                "INSERT INTO syncs (id, user_id, trigger_kind, status, started_at, finished_at, synced_articles_count)
                 VALUES (?, ?, ?, ?, ?, NULL, 0)",
                params![
                    job.id.as_str(),
                    user_id.as_str(),
                    trigger.as_str(),
                    job.status.as_str(),
                    job.started_at
                ],
            )
            .await?;

        Ok(job)
    }

    async fn finish(
        &self,
        id: &SyncId,
        status: SyncStatus,
        synced_articles_count: u32,
    ) -> Result<SyncJob> {
        if !status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "cannot finish sync {id} with non-terminal status {}",
                status.as_str()
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let rows = self
            .conn
            .execute(
                "UPDATE syncs SET status = ?, finished_at = ?, synced_articles_count = ?
                 WHERE id = ? AND status = 'PENDING'",
                params![
                    status.as_str(),
                    now,
                    i64::from(synced_articles_count),
                    id.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return match self.get(id).await? {
                Some(job) => Err(Error::InvalidInput(format!(
                    "sync {id} already finished with status {}",
                    job.status.as_str()
                ))),
                None => Err(Error::NotFound(format!("Sync not found: {id}"))),
            };
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Sync not found: {id}")))
    }

    async fn get(&self, id: &SyncId) -> Result<Option<SyncJob>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM syncs WHERE id = ?"),
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_job(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<SyncJob>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM syncs
                     WHERE user_id = ?
                     ORDER BY started_at DESC, id DESC
                     LIMIT ?"
                ),
                params![user_id.as_str(), limit],
            )
            .await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(Self::parse_job(&row)?);
        }
        Ok(jobs)
    }

    async fn append_log(&self, id: &SyncId, line: &LogLine) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_logs (sync_id, date, message, level) VALUES (?, ?, ?, ?)",
                params![
                    id.as_str(),
                    line.date,
                    line.message.clone(),
                    line.level.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_log(&self, id: &SyncId) -> Result<Vec<LogLine>> {
        let mut rows = self
            .conn
            .query(
                "SELECT date, message, level FROM sync_logs WHERE sync_id = ? ORDER BY seq ASC",
                params![id.as_str()],
            )
            .await?;

        let mut lines = Vec::new();
        while let Some(row) = rows.next().await? {
            let level: String = row.get(2)?;
            lines.push(LogLine {
                date: row.get(0)?,
                message: row.get(1)?,
                level: level.parse::<LogLevel>().map_err(Error::Database)?,
            });
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlUserRepository, UserRepository};
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, UserId) {
        let db = Database::open_in_memory().await.unwrap();
        let user = LibSqlUserRepository::new(db.connection())
            .create("reader@example.com")
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());

        let job = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();
        let fetched = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(fetched, job);
        assert_eq!(fetched.status, SyncStatus::Pending);
        assert_eq!(fetched.finished_at, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finish_is_terminal_once() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let job = repo.create(&user_id, SyncTrigger::Scheduled).await.unwrap();

        let finished = repo.finish(&job.id, SyncStatus::Success, 1).await.unwrap();
        assert_eq!(finished.status, SyncStatus::Success);
        assert_eq!(finished.synced_articles_count, 1);
        assert!(finished.finished_at.is_some());

        let again = repo.finish(&job.id, SyncStatus::Failed, 0).await;
        assert!(matches!(again, Err(Error::InvalidInput(_))));
        let unchanged = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, SyncStatus::Success);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finish_rejects_pending_and_unknown() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let job = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();

        assert!(repo.finish(&job.id, SyncStatus::Pending, 0).await.is_err());
        assert!(matches!(
            repo.finish(&SyncId::new(), SyncStatus::Failed, 0).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_for_user_newest_first() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());

        let first = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();

        let jobs = repo.list_for_user(&user_id, 10).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);

        assert_eq!(repo.list_for_user(&user_id, 1).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_log_preserves_append_order() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let job = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();

        let lines = vec![
            LogLine::now(LogLevel::Info, "Starting"),
            LogLine::now(LogLevel::Error, "Boom"),
            LogLine::now(LogLevel::Info, "Sync exited with an error."),
        ];
        for line in &lines {
            repo.append_log(&job.id, line).await.unwrap();
        }

        assert_eq!(repo.list_log(&job.id).await.unwrap(), lines);
        assert!(repo.list_log(&SyncId::new()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_log_rows_are_append_only() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let job = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();
        repo.append_log(&job.id, &LogLine::now(LogLevel::Info, "original"))
            .await
            .unwrap();

        let update = db
            .connection()
            .execute("UPDATE sync_logs SET message = 'edited'", ())
            .await;
        assert!(update.is_err());
        assert_eq!(repo.list_log(&job.id).await.unwrap()[0].message, "original");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_log_rows_cannot_be_deleted() {
        let (db, user_id) = setup().await;
        let repo = LibSqlSyncRepository::new(db.connection());
        let job = repo.create(&user_id, SyncTrigger::Manual).await.unwrap();
        repo.append_log(&job.id, &LogLine::now(LogLevel::Info, "kept"))
            .await
            .unwrap();

        let delete = db
            .connection()
            .execute("DELETE FROM sync_logs WHERE sync_id = ?", params![job.id.as_str()])
            .await;
        assert!(delete.is_err());
        assert_eq!(repo.list_log(&job.id).await.unwrap().len(), 1);
    }
}
