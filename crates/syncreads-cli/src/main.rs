//! SyncReads CLI - push web articles to a reMarkable from the terminal

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, DeviceCommands, SyncCommands, SyncsCommands, UserCommands};
use crate::commands::common::resolve_db_path;
use crate::commands::device::run_device_link;
use crate::commands::sync::{run_sync_article, run_sync_articles, SyncArgs};
use crate::commands::syncs::{run_syncs_list, run_syncs_log};
use crate::commands::user::{run_user_add, run_user_options, run_user_show};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "syncreads=info"
        .parse()
        .map_err(|_| CliError::Config("invalid default log directive".to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add { email } => run_user_add(&email, &db_path).await?,
            UserCommands::Show { user } => run_user_show(&user, &db_path).await?,
            UserCommands::Options {
                user,
                folder,
                clear,
            } => run_user_options(&user, folder, clear, &db_path).await?,
        },
        Commands::Device { command } => match command {
            DeviceCommands::Link { user, code } => run_device_link(&user, &code, &db_path).await?,
        },
        Commands::Sync { command } => match command {
            SyncCommands::Article {
                user,
                url,
                folder,
                scheduled,
                follow,
            } => {
                let args = SyncArgs {
                    user: &user,
                    folder,
                    scheduled,
                    follow,
                };
                run_sync_article(&args, &url, &db_path).await?;
            }
            SyncCommands::Articles {
                user,
                urls,
                folder,
                scheduled,
                follow,
            } => {
                let args = SyncArgs {
                    user: &user,
                    folder,
                    scheduled,
                    follow,
                };
                run_sync_articles(&args, &urls, &db_path).await?;
            }
        },
        Commands::Syncs { command } => match command {
            SyncsCommands::List { user, limit, json } => {
                run_syncs_list(&user, limit, json, &db_path).await?;
            }
            SyncsCommands::Log { id, json } => run_syncs_log(&id, json, &db_path).await?,
        },
    }

    Ok(())
}
