use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use syncreads_core::models::{LogLine, SyncJob, User};
use syncreads_core::services::DatabaseService;
use syncreads_core::{SyncId, UserId};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncListItem {
    pub id: String,
    pub trigger: String,
    pub status: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub started_at_iso: String,
    pub synced_articles_count: u32,
}

pub fn sync_to_list_item(job: &SyncJob) -> SyncListItem {
    SyncListItem {
        id: job.id.to_string(),
        trigger: job.trigger.as_str().to_string(),
        status: job.status.as_str().to_string(),
        started_at: job.started_at,
        finished_at: job.finished_at,
        started_at_iso: format_sync_timestamp(job.started_at),
        synced_articles_count: job.synced_articles_count,
    }
}

pub fn format_sync_lines(jobs: &[SyncJob]) -> Vec<String> {
    jobs.iter()
        .map(|job| {
            let duration = job.finished_at.map_or_else(
                || "running".to_string(),
                |finished_at| {
                    let elapsed = syncreads_core::util::time::elapsed_millis(
                        job.started_at,
                        finished_at,
                    );
                    let took = syncreads_core::util::format_time(elapsed);
                    if took.is_empty() {
                        "0ms".to_string()
                    } else {
                        took
                    }
                },
            );
            format!(
                "{}  {:<7}  {:<9}  {}  articles={}  {}",
                job.id,
                job.status.as_str(),
                job.trigger.as_str(),
                format_sync_timestamp(job.started_at),
                job.synced_articles_count,
                duration
            )
        })
        .collect()
}

pub fn format_log_line(line: &LogLine) -> String {
    format!(
        "{} [{}] {}",
        format_sync_timestamp(line.date),
        line.level.as_str().to_uppercase(),
        line.message
    )
}

pub fn format_user_lines(user: &User, device_registered_at: Option<i64>) -> Vec<String> {
    vec![
        format!("id:       {}", user.id),
        format!("email:    {}", user.email),
        format!("api key:  {}", user.api_key),
        format!("created:  {}", format_sync_timestamp(user.created_at)),
        format!(
            "device:   {}",
            device_registered_at.map_or_else(
                || "not linked".to_string(),
                |at| format!("linked {}", format_sync_timestamp(at))
            )
        ),
    ]
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn parse_user_id(value: &str) -> Result<UserId, CliError> {
    value.trim().parse().map_err(|_| CliError::InvalidId {
        kind: "user",
        value: value.to_string(),
    })
}

pub fn parse_sync_id(value: &str) -> Result<SyncId, CliError> {
    value.trim().parse().map_err(|_| CliError::InvalidId {
        kind: "sync",
        value: value.to_string(),
    })
}

pub async fn require_user(db: &DatabaseService, id: &UserId) -> Result<User, CliError> {
    db.get_user(id)
        .await?
        .ok_or_else(|| CliError::UserNotFound(id.to_string()))
}

/// Look a user up by id, or by email when the value contains `@`
pub async fn resolve_user(db: &DatabaseService, value: &str) -> Result<User, CliError> {
    let value = value.trim();
    if value.contains('@') {
        return db
            .get_user_by_email(value)
            .await?
            .ok_or_else(|| CliError::UserNotFound(value.to_string()));
    }
    require_user(db, &parse_user_id(value)?).await
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("SYNCREADS_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncreads")
        .join("syncreads.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}
