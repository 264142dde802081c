//! Sync job model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UserId;

/// A unique identifier for a sync job, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncId(Uuid);

impl SyncId {
    /// Create a new unique sync ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What started a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncTrigger {
    Manual,
    Scheduled,
}

impl SyncTrigger {
    /// Column value stored in `syncs.trigger_kind`
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Scheduled => "SCHEDULED",
        }
    }
}

impl FromStr for SyncTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(Self::Manual),
            "SCHEDULED" => Ok(Self::Scheduled),
            other => Err(format!("unknown sync trigger '{other}'")),
        }
    }
}

/// Lifecycle state of a sync job
///
/// `Pending` is the only non-terminal state; a job moves to `Success` or
/// `Failed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
}

impl SyncStatus {
    /// Column value stored in `syncs.status`
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

/// One attempt to push content to a user's device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: SyncId,
    pub user_id: UserId,
    pub trigger: SyncTrigger,
    pub status: SyncStatus,
    /// Start timestamp (Unix ms)
    pub started_at: i64,
    /// Set once the job reaches a terminal status (Unix ms)
    pub finished_at: Option<i64>,
    pub synced_articles_count: u32,
}

impl SyncJob {
    /// Create a pending job starting now
    #[must_use]
    pub fn new(user_id: UserId, trigger: SyncTrigger) -> Self {
        Self {
            id: SyncId::new(),
            user_id,
            trigger,
            status: SyncStatus::Pending,
            started_at: chrono::Utc::now().timestamp_millis(),
            finished_at: None,
            synced_articles_count: 0,
        }
    }
}

/// Coarse result reported to whoever requested a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of a sync request; an `Error` status is a job fact, not a transport failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub url: String,
}

impl SyncOutcome {
    pub fn success(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            url: url.into(),
        }
    }

    pub fn error(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: message.into(),
            url: url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = SyncJob::new(UserId::new(), SyncTrigger::Manual);
        assert_eq!(job.status, SyncStatus::Pending);
        assert!(job.finished_at.is_none());
        assert_eq!(job.synced_articles_count, 0);
        assert!(job.started_at > 0);
    }

    #[test]
    fn test_status_column_values() {
        for status in [SyncStatus::Pending, SyncStatus::Success, SyncStatus::Failed] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!("RUNNING".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_outcome_shape() {
        let outcome = SyncOutcome::error("Error occurred during article sync!", "https://a.b/c");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "Error");
        assert_eq!(json["url"], "https://a.b/c");
    }
}
