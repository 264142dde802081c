//! Runs article sync jobs from PENDING to a terminal status.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{SyncError, SyncEvent, SyncEvents, SyncLogger};
use crate::article::{ArticleRenderer, Document};
use crate::config::{WorkerConfig, DEFAULT_FOLDER_NAME};
use crate::device::{CommitPolicy, RemarkableStrategy, UploadRequest, UserLocks};
use crate::models::{
    Device, Entry, LogLevel, SyncJob, SyncOutcome, SyncSettings, SyncStatus, SyncTrigger, User,
    UserId,
};
use crate::remote::{DeviceConnector, GuardedTree, RemoteError, RemoteTree};
use crate::services::DatabaseService;
use crate::util::{format_time, time::elapsed_millis, unix_millis_now};
use crate::{Error, Result};

const SYNCED_MESSAGE: &str = "Successfully synced article!";
const FAILED_MESSAGE: &str = "Error occurred during article sync!";

/// Knobs applied to every job a runner executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub folder_name: String,
    pub call_timeout: Duration,
    pub commit: CommitPolicy,
}

impl SyncOptions {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            folder_name: config.folder_name.clone(),
            call_timeout: config.remote_call_timeout,
            commit: CommitPolicy {
                max_attempts: config.commit_max_attempts,
            },
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            call_timeout: Duration::from_secs(30),
            commit: CommitPolicy::default(),
        }
    }
}

/// The finished job together with what the requester is told
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub job: SyncJob,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// A finished multi-article job with one outcome per requested URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub job: SyncJob,
    pub outcomes: Vec<SyncOutcome>,
}

/// Executes sync jobs against linked devices
pub struct SyncRunner<C, R> {
    db: DatabaseService,
    connector: C,
    renderer: R,
    locks: UserLocks,
    events: SyncEvents,
    options: SyncOptions,
}

impl<C, R> SyncRunner<C, R>
where
    C: DeviceConnector,
    R: ArticleRenderer,
{
    pub fn new(db: DatabaseService, connector: C, renderer: R, options: SyncOptions) -> Self {
        Self {
            db,
            connector,
            renderer,
            locks: UserLocks::new(),
            events: SyncEvents::default(),
            options,
        }
    }

    pub fn events(&self) -> &SyncEvents {
        &self.events
    }

    pub fn database(&self) -> &DatabaseService {
        &self.db
    }

    /// Render `url` and place it in the user's device folder
    ///
    /// Uses the user's stored defaults. See [`Self::sync_article_with`].
    pub async fn sync_article(
        &self,
        user_id: &UserId,
        url: &str,
        trigger: SyncTrigger,
        cancel: CancellationToken,
    ) -> Result<SyncReport> {
        self.sync_article_with(user_id, url, trigger, &SyncSettings::default(), cancel)
            .await
    }

    /// Render `url` and place it in the folder `request` resolves to
    ///
    /// A missing user or device is returned as [`Error::NotFound`] and
    /// unusable settings as [`Error::InvalidInput`], both before any job
    /// exists. Once the job is created, every failure ends the job as
    /// `FAILED` and is reported through the outcome rather than as `Err`.
    pub async fn sync_article_with(
        &self,
        user_id: &UserId,
        url: &str,
        trigger: SyncTrigger,
        request: &SyncSettings,
        cancel: CancellationToken,
    ) -> Result<SyncReport> {
        let (user, device) = self.resolve(user_id).await?;
        let folder_name = self.folder_for(&user.id, request).await?;

        let job = self.db.create_sync(&user.id, trigger).await?;
        self.publish_status(&job);
        let logger = SyncLogger::new(job.id, self.db.clone(), self.events.clone());

        let attempt = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SyncError::Cancelled),
            result = self.attempt(&user, &device, url, &folder_name, &logger, &cancel) => result,
        };

        match attempt {
            Ok(entry) => {
                let job = self.complete(&job, &logger, SyncStatus::Success, 1).await?;
                tracing::debug!(sync_id = %job.id, document = %entry.id, "Article synced");

                Ok(SyncReport {
                    job,
                    outcome: SyncOutcome::success(SYNCED_MESSAGE, url),
                })
            }
            Err(error) => {
                Self::record_failure(&logger, &error).await;
                let job = self.complete(&job, &logger, SyncStatus::Failed, 0).await?;

                Ok(SyncReport {
                    job,
                    outcome: SyncOutcome::error(FAILED_MESSAGE, url),
                })
            }
        }
    }

    /// Sync several articles into one folder as a single job
    ///
    /// Each URL that fails is logged and skipped. The job succeeds when at
    /// least one article was placed and its count is the number placed.
    /// Failing to reach the device or its folder fails the whole job.
    pub async fn sync_articles(
        &self,
        user_id: &UserId,
        urls: &[String],
        trigger: SyncTrigger,
        request: &SyncSettings,
        cancel: CancellationToken,
    ) -> Result<BatchReport> {
        if urls.is_empty() {
            return Err(Error::InvalidInput("at least one url is required".to_string()));
        }
        let (user, device) = self.resolve(user_id).await?;
        let folder_name = self.folder_for(&user.id, request).await?;

        let job = self.db.create_sync(&user.id, trigger).await?;
        self.publish_status(&job);
        let logger = SyncLogger::new(job.id, self.db.clone(), self.events.clone());
        logger
            .record(LogLevel::Info, format!("Syncing {} articles", urls.len()))
            .await;

        let prepared = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SyncError::Cancelled),
            result = self.prepare(&user, &device, &folder_name, &cancel) => result,
        };
        let (strategy, folder) = match prepared {
            Ok(prepared) => prepared,
            Err(error) => {
                Self::record_failure(&logger, &error).await;
                let job = self.complete(&job, &logger, SyncStatus::Failed, 0).await?;
                let outcomes = urls
                    .iter()
                    .map(|url| SyncOutcome::error(FAILED_MESSAGE, url.as_str()))
                    .collect();
                return Ok(BatchReport { job, outcomes });
            }
        };

        let mut outcomes = Vec::with_capacity(urls.len());
        let mut synced = 0_u32;
        let mut cancelled = false;
        for url in urls {
            if cancelled {
                outcomes.push(SyncOutcome::error(FAILED_MESSAGE, url.as_str()));
                continue;
            }

            let placed = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(SyncError::Cancelled),
                result = self.sync_one(&strategy, &user, &folder, url, &logger) => result,
            };
            match placed {
                Ok(_) => {
                    synced += 1;
                    outcomes.push(SyncOutcome::success(SYNCED_MESSAGE, url.as_str()));
                }
                Err(error) => {
                    Self::record_failure(&logger, &error).await;
                    cancelled = matches!(error, SyncError::Cancelled);
                    outcomes.push(SyncOutcome::error(FAILED_MESSAGE, url.as_str()));
                }
            }
        }

        logger
            .record(
                LogLevel::Info,
                format!("Synced {synced} of {} articles", urls.len()),
            )
            .await;
        let status = if synced > 0 && !cancelled {
            SyncStatus::Success
        } else {
            SyncStatus::Failed
        };
        let job = self.complete(&job, &logger, status, synced).await?;
        Ok(BatchReport { job, outcomes })
    }

    async fn resolve(&self, user_id: &UserId) -> Result<(User, Device)> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found!".to_string()))?;
        let Some(device) = self.db.get_device(&user.id).await? else {
            tracing::warn!(user = %user.id, "Device not found for user {}", user.email);
            return Err(Error::NotFound(
                "Device not found, register it first!".to_string(),
            ));
        };
        Ok((user, device))
    }

    /// Request settings, then the user's stored defaults, then the runner's
    async fn folder_for(&self, user_id: &UserId, request: &SyncSettings) -> Result<String> {
        if let Some(problem) = request.problem() {
            return Err(Error::InvalidInput(problem));
        }
        let defaults = self.db.get_sync_settings(user_id).await?;
        Ok(request
            .or(&defaults)
            .folder_name()
            .unwrap_or(&self.options.folder_name)
            .to_string())
    }

    async fn attempt(
        &self,
        user: &User,
        device: &Device,
        url: &str,
        folder_name: &str,
        logger: &SyncLogger,
        cancel: &CancellationToken,
    ) -> std::result::Result<Entry, SyncError> {
        logger.info(format!("Syncing article {url}")).await?;

        let strategy = self.connect(device, cancel).await?;
        let document = self.render(url, logger).await?;
        let folder = strategy.upsert_folder(&user.id, folder_name).await?;
        self.place(&strategy, user, &folder, document, logger).await
    }

    async fn prepare(
        &self,
        user: &User,
        device: &Device,
        folder_name: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<(RemarkableStrategy, Entry), SyncError> {
        let strategy = self.connect(device, cancel).await?;
        let folder = strategy.upsert_folder(&user.id, folder_name).await?;
        Ok((strategy, folder))
    }

    async fn sync_one(
        &self,
        strategy: &RemarkableStrategy,
        user: &User,
        folder: &Entry,
        url: &str,
        logger: &SyncLogger,
    ) -> std::result::Result<Entry, SyncError> {
        logger.info(format!("Syncing article {url}")).await?;
        let document = self.render(url, logger).await?;
        self.place(strategy, user, folder, document, logger).await
    }

    async fn connect(
        &self,
        device: &Device,
        cancel: &CancellationToken,
    ) -> std::result::Result<RemarkableStrategy, SyncError> {
        let client = tokio::time::timeout(self.options.call_timeout, self.connector.connect(device))
            .await
            .map_err(|_| RemoteError::Timeout(self.options.call_timeout))??;
        let tree: Arc<dyn RemoteTree> = Arc::new(GuardedTree::new(
            client,
            self.options.call_timeout,
            cancel.clone(),
        ));
        Ok(RemarkableStrategy::new(
            tree,
            self.locks.clone(),
            self.options.commit,
        ))
    }

    async fn render(
        &self,
        url: &str,
        logger: &SyncLogger,
    ) -> std::result::Result<Document, SyncError> {
        let document = self.renderer.render(url).await?;
        logger
            .info(format!(
                "Rendered \"{}\" ({} bytes)",
                document.title,
                document.pdf.len()
            ))
            .await?;
        Ok(document)
    }

    async fn place(
        &self,
        strategy: &RemarkableStrategy,
        user: &User,
        folder: &Entry,
        document: Document,
        logger: &SyncLogger,
    ) -> std::result::Result<Entry, SyncError> {
        let entry = strategy
            .upload(UploadRequest {
                user_id: &user.id,
                folder: Some(&folder.id),
                title: &document.title,
                pdf: document.pdf,
            })
            .await?;
        logger
            .info(format!(
                "Uploaded \"{}\" to folder \"{}\"",
                entry.visible_name, folder.visible_name
            ))
            .await?;

        Ok(entry)
    }

    async fn record_failure(logger: &SyncLogger, error: &SyncError) {
        logger.record(LogLevel::Error, error.to_string()).await;
        if let Some(cause) = error.cause() {
            logger.record(LogLevel::Error, format!("```\n{cause}")).await;
        }
    }

    /// Move the job to `status` and write its closing log line
    ///
    /// The closing line is best-effort so a broken log store never leaves
    /// the job PENDING.
    async fn complete(
        &self,
        job: &SyncJob,
        logger: &SyncLogger,
        status: SyncStatus,
        synced_articles_count: u32,
    ) -> Result<SyncJob> {
        let job = self
            .db
            .finish_sync(&job.id, status, synced_articles_count)
            .await?;
        self.publish_status(&job);

        if status == SyncStatus::Success {
            let elapsed = elapsed_millis(
                job.started_at,
                job.finished_at.unwrap_or_else(unix_millis_now),
            );
            let mut took = format_time(elapsed);
            if took.is_empty() {
                took = "0ms".to_string();
            }
            logger
                .record(LogLevel::Info, format!("Sync completed successfully: {took}"))
                .await;
        } else {
            logger
                .record(LogLevel::Info, "Sync exited with an error.")
                .await;
        }
        Ok(job)
    }

    fn publish_status(&self, job: &SyncJob) {
        self.events.publish(SyncEvent::Status {
            sync_id: job.id,
            status: job.status,
        });
    }
}
