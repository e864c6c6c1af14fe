// src/app_settings.rs
use crate::error::Result;
use crate::parser::BodyCase;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const BODY_CASE_KEY: &str = "code_body_case";
pub const NEW_LIST_TITLE_KEY: &str = "new_list_title";

pub const DEFAULT_NEW_LIST_TITLE: &str = "New Code List";

/// Settings the catalog core reads at import and transfer time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerSettings {
    pub body_case: BodyCase,
    pub new_list_title: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            body_case: BodyCase::default(),
            new_list_title: DEFAULT_NEW_LIST_TITLE.to_string(),
        }
    }
}

pub fn get_setting_internal(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_setting_internal(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR REPLACE INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value, now],
    )?;
    Ok(())
}

/// Loads settings, falling back to defaults for missing or unreadable values.
pub fn load_manager_settings(conn: &Connection) -> Result<ManagerSettings> {
    let mut settings = ManagerSettings::default();

    if let Some(raw) = get_setting_internal(conn, BODY_CASE_KEY)? {
        match raw.parse::<BodyCase>() {
            Ok(case) => settings.body_case = case,
            Err(e) => warn!("[SETTINGS] Ignoring {}: {}", BODY_CASE_KEY, e),
        }
    }

    if let Some(title) = get_setting_internal(conn, NEW_LIST_TITLE_KEY)? {
        let title = title.trim();
        if title.is_empty() {
            warn!("[SETTINGS] Ignoring empty {}", NEW_LIST_TITLE_KEY);
        } else {
            settings.new_list_title = title.to_string();
        }
    }

    Ok(settings)
}

pub fn save_manager_settings(conn: &Connection, settings: &ManagerSettings) -> Result<()> {
    set_setting_internal(conn, BODY_CASE_KEY, settings.body_case.as_str())?;
    set_setting_internal(conn, NEW_LIST_TITLE_KEY, &settings.new_list_title)?;
    Ok(())
}
