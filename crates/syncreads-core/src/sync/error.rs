//! Failure taxonomy recorded in a job's log.

use thiserror::Error;

use crate::article::ArticleError;
use crate::remote::RemoteError;

/// Why a sync attempt failed
///
/// The message becomes the job's error log line; the cause, when present,
/// is logged verbatim as a second line.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{message}")]
    RemoteApi {
        message: String,
        cause: Option<String>,
    },
    #[error("{message}")]
    Conflict {
        message: String,
        cause: Option<String>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Content {
        message: String,
        cause: Option<String>,
    },
    #[error("Sync was cancelled before it finished.")]
    Cancelled,
    #[error("Unknown error occured during synchronization! Try to sync once again.")]
    Unknown,
}

impl SyncError {
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::RemoteApi { cause, .. }
            | Self::Conflict { cause, .. }
            | Self::Content { cause, .. } => cause.as_deref(),
            Self::NotFound(_) | Self::Cancelled | Self::Unknown => None,
        }
    }
}

/// Render the `source()` chain below `err`, one cause per line
fn cause_chain(err: &dyn std::error::Error) -> Option<String> {
    let mut lines = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Cancelled => Self::Cancelled,
            RemoteError::Conflict { .. } => Self::Conflict {
                message: err.to_string(),
                cause: cause_chain(&err),
            },
            _ => Self::RemoteApi {
                message: err.to_string(),
                cause: cause_chain(&err),
            },
        }
    }
}

impl From<ArticleError> for SyncError {
    fn from(err: ArticleError) -> Self {
        Self::Content {
            message: err.to_string(),
            cause: cause_chain(&err),
        }
    }
}

impl From<crate::Error> for SyncError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::NotFound(message) => Self::NotFound(message),
            crate::Error::Remote(remote) => remote.into(),
            other => {
                tracing::error!(error = %other, "Unexpected failure inside sync attempt");
                Self::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn remote_errors_map_by_kind() {
        assert!(matches!(
            SyncError::from(RemoteError::Conflict { expected: 4 }),
            SyncError::Conflict { .. }
        ));
        assert!(matches!(
            SyncError::from(RemoteError::Cancelled),
            SyncError::Cancelled
        ));

        let err = SyncError::from(RemoteError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert_eq!(err.to_string(), "Device cloud API error: bad gateway (502)");
        assert_eq!(err.cause(), None);
    }

    #[test]
    fn content_and_storage_failures_map() {
        let article = ArticleError::Render("Chrome exited".to_string());
        let err = SyncError::from(article);
        assert!(matches!(err, SyncError::Content { .. }));
        assert_eq!(err.to_string(), "Failed to render article: Chrome exited");

        let io = crate::Error::Io(std::io::Error::other("disk full"));
        assert!(matches!(SyncError::from(io), SyncError::Unknown));
    }

    #[test]
    fn cause_chain_walks_sources() {
        let inner = std::io::Error::other("connection reset");
        let outer = crate::Error::Io(inner);
        assert_eq!(
            cause_chain(&outer).as_deref(),
            Some("caused by: connection reset")
        );
        assert_eq!(cause_chain(&std::io::Error::other("leaf")), None);
    }

    #[test]
    fn unknown_uses_generic_message() {
        assert_eq!(
            SyncError::Unknown.to_string(),
            "Unknown error occured during synchronization! Try to sync once again."
        );
    }
}
