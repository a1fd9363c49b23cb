use std::{fs, path::Path, str::FromStr};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::StoreError;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Opens the local store, creating the file and its directory when missing,
/// and brings the schema up to date.
pub async fn open(db_url: &str) -> Result<SqlitePool, StoreError> {
    ensure_sqlite_dir(db_url).map_err(|err| StoreError::Rejected(err.to_string()))?;

    let connect_options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(if is_memory(db_url) { 1 } else { 4 })
        .connect_with(connect_options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

fn sqlite_path(db_url: &str) -> Option<&str> {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;

    let path = path.split('?').next().unwrap_or(path);
    Some(path.strip_prefix("file:").unwrap_or(path))
}

fn is_memory(db_url: &str) -> bool {
    matches!(sqlite_path(db_url), Some(":memory:") | Some(""))
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let Some(path) = sqlite_path(db_url) else {
        return Ok(());
    };

    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
