use std::path::Path;

use syncreads_core::config::WorkerConfig;
use syncreads_core::remote::RemarkableConnector;

use crate::commands::common::{open_database, parse_user_id, require_user};
use crate::error::CliError;

pub async fn run_device_link(user: &str, code: &str, db_path: &Path) -> Result<(), CliError> {
    let user_id = parse_user_id(user)?;
    let db = open_database(db_path).await?;
    let user = require_user(&db, &user_id).await?;

    let config = WorkerConfig::from_env()?;
    let connector =
        RemarkableConnector::new(&config.remarkable_auth_url, &config.remarkable_sync_url)?;
    let token = connector.auth().register_device(code).await?;
    db.link_device(&user.id, &token).await?;

    println!("Device linked for {}", user.email);
    Ok(())
}
