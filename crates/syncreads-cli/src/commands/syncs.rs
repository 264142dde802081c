use std::path::Path;

use crate::commands::common::{
    format_log_line, format_sync_lines, open_database, parse_sync_id, parse_user_id,
    require_user, sync_to_list_item, SyncListItem,
};
use crate::error::CliError;

pub async fn run_syncs_list(
    user: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let user_id = parse_user_id(user)?;
    let db = open_database(db_path).await?;
    let user = require_user(&db, &user_id).await?;
    let jobs = db.list_syncs(&user.id, limit).await?;

    if as_json {
        let json_items = jobs
            .iter()
            .map(sync_to_list_item)
            .collect::<Vec<SyncListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No syncs recorded.");
        return Ok(());
    }

    for line in format_sync_lines(&jobs) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_syncs_log(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let sync_id = parse_sync_id(id)?;
    let db = open_database(db_path).await?;
    if db.get_sync(&sync_id).await?.is_none() {
        return Err(CliError::SyncNotFound(sync_id.to_string()));
    }
    let lines = db.list_sync_log(&sync_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    for line in &lines {
        println!("{}", format_log_line(line));
    }
    Ok(())
}
