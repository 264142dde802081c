//! Job-scoped log writer and the live event hub observers subscribe to.

use tokio::sync::broadcast;

use crate::models::{LogLevel, LogLine, SyncId, SyncStatus};
use crate::services::DatabaseService;
use crate::Result;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something observers of a job want to see as it happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Log { sync_id: SyncId, line: LogLine },
    Status { sync_id: SyncId, status: SyncStatus },
}

impl SyncEvent {
    pub const fn sync_id(&self) -> SyncId {
        match self {
            Self::Log { sync_id, .. } | Self::Status { sync_id, .. } => *sync_id,
        }
    }
}

/// Broadcast hub for [`SyncEvent`]s
///
/// Slow subscribers lag and drop events rather than stall a job; the
/// persisted log stays the source of truth.
#[derive(Debug, Clone)]
pub struct SyncEvents {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, event: SyncEvent) {
        // No subscribers is fine.
        self.sender.send(event).ok();
    }
}

impl Default for SyncEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Appends to one job's log; the only write path for log lines
pub struct SyncLogger {
    sync_id: SyncId,
    db: DatabaseService,
    events: SyncEvents,
}

impl SyncLogger {
    pub(crate) fn new(sync_id: SyncId, db: DatabaseService, events: SyncEvents) -> Self {
        Self {
            sync_id,
            db,
            events,
        }
    }

    pub const fn sync_id(&self) -> SyncId {
        self.sync_id
    }

    pub async fn info(&self, message: impl Into<String>) -> Result<()> {
        self.append(LogLevel::Info, message.into()).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<()> {
        self.append(LogLevel::Error, message.into()).await
    }

    /// Append a line without failing the caller
    ///
    /// Used on paths that must still reach a terminal status when the log
    /// store is unavailable; the line then only reaches tracing.
    pub async fn record(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        if let Err(err) = self.append(level, message.clone()).await {
            tracing::error!(
                sync_id = %self.sync_id,
                error = %err,
                "Could not store sync log line: {message}"
            );
        }
    }

    async fn append(&self, level: LogLevel, message: String) -> Result<()> {
        let line = LogLine::now(level, message);
        self.db.append_sync_log(&self.sync_id, &line).await?;

        match level {
            LogLevel::Info => tracing::info!(sync_id = %self.sync_id, "{}", line.message),
            LogLevel::Error => tracing::error!(sync_id = %self.sync_id, "{}", line.message),
        }
        self.events.publish(SyncEvent::Log {
            sync_id: self.sync_id,
            line,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncTrigger;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn lines_are_persisted_and_broadcast() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let user = db.create_user("reader@example.com").await.unwrap();
        let job = db.create_sync(&user.id, SyncTrigger::Manual).await.unwrap();

        let events = SyncEvents::default();
        let mut receiver = events.subscribe();
        let logger = SyncLogger::new(job.id, db.clone(), events);

        logger.info("Fetching article").await.unwrap();
        logger.error("Render failed").await.unwrap();

        let stored = db.list_sync_log(&job.id).await.unwrap();
        let levels: Vec<LogLevel> = stored.iter().map(|line| line.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Error]);

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.sync_id(), job.id);
        assert_eq!(
            first,
            SyncEvent::Log {
                sync_id: job.id,
                line: stored[0].clone()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_survives_missing_log_table() {
        let db = DatabaseService::open_in_memory().await.unwrap();
        let user = db.create_user("reader@example.com").await.unwrap();
        let job = db.create_sync(&user.id, SyncTrigger::Manual).await.unwrap();
        let logger = SyncLogger::new(job.id, db.clone(), SyncEvents::default());

        db.execute_raw("DROP TABLE sync_logs").await.unwrap();
        assert!(logger.info("lost").await.is_err());
        logger.record(LogLevel::Error, "also lost").await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publishing_without_subscribers_is_silent() {
        let events = SyncEvents::new(0);
        events.publish(SyncEvent::Status {
            sync_id: SyncId::new(),
            status: SyncStatus::Pending,
        });
    }
}
