// src/db.rs
use crate::error::Result;
use rusqlite::Connection;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

const DB_FILE_NAME: &str = "code_manager.db";

/// Settings database path, next to the executable.
pub fn get_db_path() -> Result<PathBuf> {
    let exe_path = env::current_exe()?;
    let exe_dir = exe_path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Failed to get parent directory of executable: {}", exe_path.display()),
        )
    })?;

    if !exe_dir.exists() {
        fs::create_dir_all(exe_dir)?;
    }
    Ok(exe_dir.join(DB_FILE_NAME))
}

pub fn init_connection(db_path: &Path) -> Result<Connection> {
    info!("[DB] Settings database: {}", db_path.display());
    Ok(Connection::open(db_path)?)
}

pub fn init_db_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT
        );
        "#,
    )?;
    Ok(())
}
