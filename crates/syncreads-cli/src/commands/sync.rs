use std::path::Path;

use syncreads_core::article::ChromeRenderer;
use syncreads_core::config::WorkerConfig;
use syncreads_core::models::{OutcomeStatus, SyncSettings, SyncStatus, SyncTrigger};
use syncreads_core::remote::RemarkableConnector;
use syncreads_core::sync::{SyncEvent, SyncEvents, SyncOptions, SyncRunner};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::common::{format_log_line, open_database, parse_user_id};
use crate::error::CliError;

type CliRunner = SyncRunner<RemarkableConnector, ChromeRenderer>;

/// What to sync and where, as given on the command line
pub struct SyncArgs<'a> {
    pub user: &'a str,
    pub folder: Option<String>,
    pub scheduled: bool,
    pub follow: bool,
}

impl SyncArgs<'_> {
    const fn trigger(&self) -> SyncTrigger {
        if self.scheduled {
            SyncTrigger::Scheduled
        } else {
            SyncTrigger::Manual
        }
    }

    fn settings(&self) -> SyncSettings {
        SyncSettings {
            folder: self.folder.clone(),
        }
    }
}

async fn build_runner(db_path: &Path) -> Result<CliRunner, CliError> {
    let config = WorkerConfig::from_env()?;
    let renderer = ChromeRenderer::new(config.require_chrome_bin()?, config.remote_call_timeout)?;
    let connector =
        RemarkableConnector::new(&config.remarkable_auth_url, &config.remarkable_sync_url)?;
    let db = open_database(db_path).await?;
    Ok(SyncRunner::new(
        db,
        connector,
        renderer,
        SyncOptions::from_config(&config),
    ))
}

fn follow_log(events: &SyncEvents) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(SyncEvent::Log { line, .. }) => println!("{}", format_log_line(&line)),
                Ok(SyncEvent::Status { .. }) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn cancel_on_interrupt(cancel: &CancellationToken) -> JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling sync");
            cancel.cancel();
        }
    })
}

pub async fn run_sync_article(
    args: &SyncArgs<'_>,
    url: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let user_id = parse_user_id(args.user)?;
    let runner = build_runner(db_path).await?;
    let printer = args.follow.then(|| follow_log(runner.events()));
    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(&cancel);

    let report = runner
        .sync_article_with(&user_id, url, args.trigger(), &args.settings(), cancel)
        .await;
    interrupt.abort();
    drop(runner);
    if let Some(printer) = printer {
        printer.await.ok();
    }
    let report = report?;

    println!("{}", report.job.id);
    match report.outcome.status {
        OutcomeStatus::Success => {
            println!("{}", report.outcome.message);
            Ok(())
        }
        OutcomeStatus::Error => Err(CliError::SyncFailed(format!(
            "{} Run `syncreads syncs log {}` for details.",
            report.outcome.message, report.job.id
        ))),
    }
}

pub async fn run_sync_articles(
    args: &SyncArgs<'_>,
    urls: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let user_id = parse_user_id(args.user)?;
    let runner = build_runner(db_path).await?;
    let printer = args.follow.then(|| follow_log(runner.events()));
    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(&cancel);

    let report = runner
        .sync_articles(&user_id, urls, args.trigger(), &args.settings(), cancel)
        .await;
    interrupt.abort();
    drop(runner);
    if let Some(printer) = printer {
        printer.await.ok();
    }
    let report = report?;

    println!("{}", report.job.id);
    for outcome in &report.outcomes {
        let mark = match outcome.status {
            OutcomeStatus::Success => "ok  ",
            OutcomeStatus::Error => "fail",
        };
        println!("{mark}  {}", outcome.url);
    }

    if report.job.status == SyncStatus::Success {
        println!(
            "Synced {} of {} articles.",
            report.job.synced_articles_count,
            urls.len()
        );
        Ok(())
    } else {
        Err(CliError::SyncFailed(format!(
            "No articles were synced. Run `syncreads syncs log {}` for details.",
            report.job.id
        )))
    }
}
