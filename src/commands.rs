// src/commands.rs
// Tauri commands: the window layer talks to the catalog core only through these.

use crate::app_settings::{
    get_setting_internal, load_manager_settings, save_manager_settings, set_setting_internal, ManagerSettings,
};
use crate::catalog_tree::SortOrder;
use crate::ids::{CatalogId, NodeId};
use crate::registry::{viewer_title, CatalogRegistry, CatalogSummary};
use crate::types::{Code, NodeView};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tauri::{command, AppHandle, Emitter, State};
use tracing::{error, info, warn};

pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
    pub registry: Mutex<CatalogRegistry>,
}

impl AppState {
    fn registry(&self) -> Result<MutexGuard<'_, CatalogRegistry>, String> {
        self.registry
            .lock()
            .map_err(|e| format!("Registry lock failed: {}", e))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DestinationEntry {
    pub title: String,
    pub catalog_id: CatalogId,
}

#[derive(Debug, Clone, Serialize)]
struct CodeRenamed {
    node_id: NodeId,
    title: String,
}

fn destination_entries(registry: &CatalogRegistry) -> Vec<DestinationEntry> {
    registry
        .destinations()
        .into_iter()
        .map(|(title, catalog_id)| DestinationEntry { title, catalog_id })
        .collect()
}

fn notify_destinations(app_handle: &AppHandle, registry: &CatalogRegistry) {
    let _ = app_handle.emit("catalogs_changed", destination_entries(registry));
}

// --- Import and catalog lifecycle ---

#[command]
pub fn import_database(state: State<AppState>, path: String) -> Result<CatalogSummary, String> {
    info!("[CMD] Importing database: {}", path);
    let mut registry = state.registry()?;
    let id = registry.import_database(&PathBuf::from(&path)).map_err(|e| {
        error!("[CMD] Import of {} failed: {}", path, e);
        e.to_string()
    })?;
    registry.get(id).map(|c| c.summary()).map_err(|e| e.to_string())
}

#[command]
pub fn open_code_list(
    app_handle: AppHandle,
    state: State<AppState>,
    game_id: Option<String>,
) -> Result<CatalogSummary, String> {
    let mut registry = state.registry()?;
    let base_title = registry.settings().new_list_title.clone();
    let game_id = game_id.unwrap_or_else(|| crate::parser::UNKNOWN_GAME_ID.to_string());
    let id = registry.open_list(&base_title, &game_id);
    notify_destinations(&app_handle, &registry);
    registry.get(id).map(|c| c.summary()).map_err(|e| e.to_string())
}

#[command]
pub fn close_catalog(app_handle: AppHandle, state: State<AppState>, catalog_id: CatalogId) -> Result<(), String> {
    let mut registry = state.registry()?;
    if registry.close(catalog_id).is_none() {
        warn!("[CMD] Attempted to close {}, but it was not open.", catalog_id);
    }
    notify_destinations(&app_handle, &registry);
    Ok(())
}

#[command]
pub fn get_catalog_tree(state: State<AppState>, catalog_id: CatalogId) -> Result<Vec<NodeView>, String> {
    let registry = state.registry()?;
    registry.get(catalog_id).map(|c| c.view()).map_err(|e| e.to_string())
}

#[command]
pub fn list_catalogs(state: State<AppState>) -> Result<Vec<CatalogSummary>, String> {
    let registry = state.registry()?;
    Ok(registry.catalogs().map(|c| c.summary()).collect())
}

#[command]
pub fn list_destinations(state: State<AppState>) -> Result<Vec<DestinationEntry>, String> {
    let registry = state.registry()?;
    Ok(destination_entries(&registry))
}

// --- Interaction ---

#[command]
pub fn set_catalog_selection(
    state: State<AppState>,
    catalog_id: CatalogId,
    selected: Vec<NodeId>,
    expanded: Vec<NodeId>,
) -> Result<Vec<NodeId>, String> {
    let selected: HashSet<NodeId> = selected.into_iter().collect();
    let expanded: HashSet<NodeId> = expanded.into_iter().collect();
    let mut registry = state.registry()?;
    let catalog = registry.get_mut(catalog_id).map_err(|e| e.to_string())?;
    Ok(catalog.set_selection(&selected, &expanded))
}

#[command]
pub fn search_catalog(state: State<AppState>, catalog_id: CatalogId, query: String) -> Result<Vec<NodeView>, String> {
    let mut registry = state.registry()?;
    let catalog = registry.get_mut(catalog_id).map_err(|e| e.to_string())?;
    catalog.search(&query);
    Ok(catalog.view())
}

// --- Transfer ---

#[command]
pub fn add_to_code_list(
    app_handle: AppHandle,
    state: State<AppState>,
    source_id: CatalogId,
    destination_id: Option<CatalogId>,
) -> Result<Option<CatalogSummary>, String> {
    let mut registry = state.registry()?;
    let target = registry
        .add_to_list(source_id, destination_id)
        .map_err(|e| e.to_string())?;
    notify_destinations(&app_handle, &registry);
    match target {
        Some(id) => registry.get(id).map(|c| Some(c.summary())).map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

// --- Code list editing ---

#[command]
pub fn add_code(
    state: State<AppState>,
    catalog_id: CatalogId,
    parent_id: Option<NodeId>,
    name: String,
    body: String,
    comment: String,
) -> Result<NodeId, String> {
    let mut registry = state.registry()?;
    let catalog = registry.get_mut(catalog_id).map_err(|e| e.to_string())?;
    catalog
        .add_code(parent_id, Code::new(name, body, comment, Vec::new()))
        .map_err(|e| e.to_string())
}

#[command]
pub fn add_category(
    state: State<AppState>,
    catalog_id: CatalogId,
    parent_id: Option<NodeId>,
    name: String,
) -> Result<NodeId, String> {
    let mut registry = state.registry()?;
    let catalog = registry.get_mut(catalog_id).map_err(|e| e.to_string())?;
    catalog.add_category(parent_id, &name).map_err(|e| e.to_string())
}

#[command]
pub fn remove_nodes(state: State<AppState>, catalog_id: CatalogId, node_ids: Vec<NodeId>) -> Result<usize, String> {
    let ids: HashSet<NodeId> = node_ids.into_iter().collect();
    let mut registry = state.registry()?;
    registry.remove(catalog_id, &ids).map_err(|e| e.to_string())
}

#[command]
pub fn rename_node(
    state: State<AppState>,
    catalog_id: CatalogId,
    node_id: NodeId,
    name: String,
) -> Result<bool, String> {
    let mut registry = state.registry()?;
    registry
        .rename(catalog_id, node_id, &name)
        .map_err(|e| e.to_string())
}

#[command]
pub fn sort_code_list(state: State<AppState>, catalog_id: CatalogId, order: SortOrder) -> Result<Vec<NodeView>, String> {
    let mut registry = state.registry()?;
    let catalog = registry.get_mut(catalog_id).map_err(|e| e.to_string())?;
    catalog.sort(order).map_err(|e| e.to_string())?;
    Ok(catalog.view())
}

#[command]
pub fn set_list_game_id(state: State<AppState>, catalog_id: CatalogId, game_id: String) -> Result<CatalogSummary, String> {
    let mut registry = state.registry()?;
    let catalog = registry.get_mut(catalog_id).map_err(|e| e.to_string())?;
    catalog.set_game_id(&game_id).map_err(|e| e.to_string())?;
    Ok(catalog.summary())
}

/// Keeps an open code viewer's title in sync with its code's name.
/// Watching a code that already has a viewer replaces the old one.
#[command]
pub fn watch_code_name(app_handle: AppHandle, state: State<AppState>, node_id: NodeId) -> Result<(), String> {
    let mut registry = state.registry()?;
    let replaced = registry.on_rename(
        node_id,
        Box::new(move |node_id: NodeId, name: &str| {
            let payload = CodeRenamed { node_id, title: viewer_title(name) };
            let _ = app_handle.emit("code_renamed", payload);
        }),
    );
    if replaced {
        info!("[CMD] Viewer for {} reopened", node_id);
    }
    Ok(())
}

#[command]
pub fn unwatch_code_name(state: State<AppState>, node_id: NodeId) -> Result<(), String> {
    let mut registry = state.registry()?;
    if !registry.off_rename(node_id) {
        warn!("[CMD] No viewer was watching {}", node_id);
    }
    Ok(())
}

// --- Settings ---

#[command]
pub fn get_app_setting_cmd(state: State<AppState>, key: String) -> Result<Option<String>, String> {
    let conn_guard = state
        .conn
        .lock()
        .map_err(|e| format!("DB lock failed for get_app_setting: {}", e))?;
    get_setting_internal(&conn_guard, &key)
        .map_err(|e| format!("Failed to query app_settings for key '{}': {}", key, e))
}

#[command]
pub fn set_app_setting_cmd(state: State<AppState>, key: String, value: String) -> Result<(), String> {
    let conn_guard = state
        .conn
        .lock()
        .map_err(|e| format!("DB lock failed for set_app_setting: {}", e))?;
    set_setting_internal(&conn_guard, &key, &value)
        .map_err(|e| format!("Failed to set app_setting for key '{}': {}", key, e))?;

    // Settings take effect on the next import or transfer.
    let settings = load_manager_settings(&conn_guard).map_err(|e| e.to_string())?;
    state.registry()?.set_settings(settings);
    Ok(())
}

#[command]
pub fn get_manager_settings(state: State<AppState>) -> Result<ManagerSettings, String> {
    Ok(state.registry()?.settings().clone())
}

#[command]
pub fn update_manager_settings(state: State<AppState>, settings: ManagerSettings) -> Result<(), String> {
    let conn_guard = state
        .conn
        .lock()
        .map_err(|e| format!("DB lock failed for update_manager_settings: {}", e))?;
    save_manager_settings(&conn_guard, &settings).map_err(|e| e.to_string())?;
    state.registry()?.set_settings(settings);
    Ok(())
}
