use std::path::Path;

use syncreads_core::models::SyncSettings;

use crate::commands::common::{format_user_lines, open_database, resolve_user};
use crate::error::CliError;

pub async fn run_user_add(email: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let user = db.create_user(email).await?;

    println!("{}", user.id);
    println!("API key: {}", user.api_key);
    Ok(())
}

pub async fn run_user_show(user: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let user = resolve_user(&db, user).await?;
    let device = db.get_device(&user.id).await?;

    for line in format_user_lines(&user, device.map(|device| device.registered_at)) {
        println!("{line}");
    }
    Ok(())
}

/// Show the user's sync defaults, replacing them first when asked
pub async fn run_user_options(
    user: &str,
    folder: Option<String>,
    clear: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let user = resolve_user(&db, user).await?;

    let settings = if clear {
        db.put_sync_settings(&user.id, &SyncSettings::default())
            .await?
    } else if let Some(folder) = folder {
        db.put_sync_settings(&user.id, &SyncSettings::with_folder(folder))
            .await?
    } else {
        db.get_sync_settings(&user.id).await?
    };

    println!(
        "folder:   {}",
        settings.folder_name().unwrap_or("(server default)")
    );
    Ok(())
}
