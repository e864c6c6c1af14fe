// src/lib.rs
//! Catalog core of the code manager: database import, check-state
//! propagation, search, and copying codes into user code lists.

pub mod app_settings;
pub mod catalog_tree;
pub mod db;
pub mod error;
pub mod ids;
pub mod logging;
pub mod parser;
pub mod registry;
pub mod selection;
pub mod transfer;
pub mod types;

#[cfg(feature = "desktop")]
pub mod commands;

pub use catalog_tree::{CatalogTree, SortOrder};
pub use error::{CatalogError, Result};
pub use ids::{CatalogId, NodeId};
pub use parser::{parse_file, parse_str, BodyCase, ParseOptions, ParsedCatalog};
pub use registry::{Catalog, CatalogRegistry};
pub use transfer::{extract_enabled, merge};
pub use types::{CatalogKind, CatalogNode, Category, Code, NodeView, PlaceholderSpec, TriState};

#[cfg(feature = "desktop")]
pub fn run() {
    use commands::AppState;
    use std::sync::{Arc, Mutex};
    use tauri::Manager; // Needed for app.manage()
    use tracing::error;

    logging::init_logging();
    let context = tauri::generate_context!();

    tauri::Builder::default()
        .setup(|app| {
            let conn = match db::get_db_path().and_then(|path| db::init_connection(&path)) {
                Ok(c) => c,
                Err(e) => {
                    error!("FATAL: DB connection failed during setup: {}", e);
                    panic!("DB connection failed: {}", e);
                }
            };

            if let Err(e) = db::init_db_tables(&conn) {
                error!("FATAL: DB table init failed during setup: {}", e);
                panic!("DB table init failed: {}", e);
            }

            let settings = app_settings::load_manager_settings(&conn).unwrap_or_else(|e| {
                error!("Failed to load settings, using defaults: {}", e);
                Default::default()
            });

            app.manage(AppState {
                conn: Arc::new(Mutex::new(conn)),
                registry: Mutex::new(CatalogRegistry::new(settings)),
            });
            Ok(())
        })
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            commands::import_database,
            commands::open_code_list,
            commands::close_catalog,
            commands::list_catalogs,
            commands::get_catalog_tree,
            commands::list_destinations,
            commands::set_catalog_selection,
            commands::search_catalog,
            commands::add_to_code_list,
            commands::add_code,
            commands::add_category,
            commands::remove_nodes,
            commands::rename_node,
            commands::sort_code_list,
            commands::set_list_game_id,
            commands::watch_code_name,
            commands::unwatch_code_name,
            commands::get_app_setting_cmd,
            commands::set_app_setting_cmd,
            commands::get_manager_settings,
            commands::update_manager_settings
        ])
        .run(context)
        .expect("error while running tauri application");
}
