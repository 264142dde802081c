use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "syncreads")]
#[command(about = "Push web articles to a reMarkable from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Link a reMarkable device to a user
    Device {
        #[command(subcommand)]
        command: DeviceCommands,
    },
    /// Run a sync job
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Inspect past sync jobs
    Syncs {
        #[command(subcommand)]
        command: SyncsCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user and print its id and API key
    Add {
        /// Contact email
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Show a user and its linked device
    Show {
        /// User ID or email
        user: String,
    },
    /// Show or change a user's sync defaults
    Options {
        /// User ID or email
        user: String,
        /// Device folder new articles go to
        #[arg(long, value_name = "NAME")]
        folder: Option<String>,
        /// Forget the stored defaults
        #[arg(long, conflicts_with = "folder")]
        clear: bool,
    },
}

#[derive(Subcommand)]
pub enum DeviceCommands {
    /// Register a device with a one-time pairing code
    Link {
        /// User ID
        #[arg(long, value_name = "ID")]
        user: String,
        /// Eight character pairing code
        #[arg(long, value_name = "CODE")]
        code: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Render an article and upload it to the user's device
    Article {
        /// User ID
        #[arg(long, value_name = "ID")]
        user: String,
        /// Article URL
        url: String,
        /// Device folder, overriding the user's default
        #[arg(long, value_name = "NAME")]
        folder: Option<String>,
        /// Record the job as scheduled instead of manual
        #[arg(long)]
        scheduled: bool,
        /// Stream the job log while it runs
        #[arg(long)]
        follow: bool,
    },
    /// Render several articles and upload them as one job
    Articles {
        /// User ID
        #[arg(long, value_name = "ID")]
        user: String,
        /// Article URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Device folder, overriding the user's default
        #[arg(long, value_name = "NAME")]
        folder: Option<String>,
        /// Record the job as scheduled instead of manual
        #[arg(long)]
        scheduled: bool,
        /// Stream the job log while it runs
        #[arg(long)]
        follow: bool,
    },
}

#[derive(Subcommand)]
pub enum SyncsCommands {
    /// List a user's recent sync jobs
    List {
        /// User ID
        #[arg(long, value_name = "ID")]
        user: String,
        /// Number of jobs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a sync job's log
    Log {
        /// Sync job ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
