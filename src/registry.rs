// src/registry.rs
// Open catalogs (databases and code lists) and the hooks the window layer needs.

use crate::app_settings::ManagerSettings;
use crate::catalog_tree::{CatalogTree, SortOrder};
use crate::error::{CatalogError, Result};
use crate::ids::{CatalogId, NodeId};
use crate::parser::{self, ParseOptions, ParsedCatalog};
use crate::transfer;
use crate::types::{CatalogKind, CatalogNode, Category, Code, NodeView};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Invoked with the node and its new name after a rename.
pub type RenameCallback = Box<dyn FnMut(NodeId, &str) + Send>;

pub fn viewer_title(code_name: &str) -> String {
    format!("Code Viewer - {}", code_name)
}

/// A tree plus the kind of window that owns it.
#[derive(Debug, Clone)]
pub struct Catalog {
    id: CatalogId,
    title: String,
    kind: CatalogKind,
    game_id: String,
    game_name: String,
    tree: CatalogTree,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub catalog_id: CatalogId,
    pub title: String,
    pub kind: CatalogKind,
    pub game_id: String,
    pub game_name: String,
}

impl Catalog {
    pub fn database(parsed: ParsedCatalog) -> Self {
        let title = format!("Database Browser - {} [{}]", parsed.game_name, parsed.game_id);
        Catalog {
            id: CatalogId::fresh(),
            title,
            kind: CatalogKind::Database,
            game_id: parsed.game_id,
            game_name: parsed.game_name,
            tree: parsed.tree,
        }
    }

    pub fn list(title: impl Into<String>, game_id: impl Into<String>) -> Self {
        Catalog {
            id: CatalogId::fresh(),
            title: title.into(),
            kind: CatalogKind::List,
            game_id: game_id.into(),
            game_name: parser::UNKNOWN_GAME_NAME.to_string(),
            tree: CatalogTree::new(),
        }
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Code lists only; a database keeps the id it was imported with.
    pub fn set_game_id(&mut self, game_id: &str) -> Result<()> {
        let game_id = game_id.trim();
        match self.kind {
            CatalogKind::List if !game_id.is_empty() => {
                self.game_id = game_id.to_string();
                Ok(())
            }
            CatalogKind::List => Ok(()),
            CatalogKind::Database => Err(CatalogError::ReadOnly(self.id)),
        }
    }

    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    pub fn tree(&self) -> &CatalogTree {
        &self.tree
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary {
            catalog_id: self.id,
            title: self.title.clone(),
            kind: self.kind,
            game_id: self.game_id.clone(),
            game_name: self.game_name.clone(),
        }
    }

    pub fn view(&self) -> Vec<NodeView> {
        self.tree.nodes().iter().map(NodeView::from).collect()
    }

    // --- State changes allowed on both kinds ---

    pub fn set_selection(&mut self, selected: &HashSet<NodeId>, expanded: &HashSet<NodeId>) -> Vec<NodeId> {
        self.tree.set_selection(selected, expanded)
    }

    pub fn search(&mut self, query: &str) -> usize {
        self.tree.search(query)
    }

    // --- Structural edits, code lists only ---

    fn editable_tree(&mut self) -> Result<&mut CatalogTree> {
        match self.kind {
            CatalogKind::List => Ok(&mut self.tree),
            CatalogKind::Database => Err(CatalogError::ReadOnly(self.id)),
        }
    }

    pub fn add_code(&mut self, parent: Option<NodeId>, mut code: Code) -> Result<NodeId> {
        code.editable = true;
        self.editable_tree()?.insert(parent, CatalogNode::Code(code))
    }

    pub fn add_category(&mut self, parent: Option<NodeId>, name: &str) -> Result<NodeId> {
        let mut category = Category::new(name, Vec::new());
        category.editable = true;
        self.editable_tree()?.insert(parent, CatalogNode::Category(category))
    }

    pub fn remove(&mut self, ids: &HashSet<NodeId>) -> Result<usize> {
        Ok(self.editable_tree()?.remove(ids))
    }

    pub fn rename(&mut self, id: NodeId, name: &str) -> Result<bool> {
        Ok(self.editable_tree()?.rename(id, name))
    }

    pub fn sort(&mut self, order: SortOrder) -> Result<()> {
        self.editable_tree()?.sort(order);
        Ok(())
    }

    pub fn merge(&mut self, clones: Vec<CatalogNode>) -> Result<Vec<NodeId>> {
        Ok(transfer::merge(self.editable_tree()?, clones))
    }
}

/// Directory of open catalogs, injected into whatever drives the windows.
pub struct CatalogRegistry {
    catalogs: BTreeMap<CatalogId, Catalog>,
    // One open viewer per code.
    rename_listeners: HashMap<NodeId, RenameCallback>,
    settings: ManagerSettings,
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::new(ManagerSettings::default())
    }
}

impl CatalogRegistry {
    pub fn new(settings: ManagerSettings) -> Self {
        CatalogRegistry {
            catalogs: BTreeMap::new(),
            rename_listeners: HashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ManagerSettings) {
        self.settings = settings;
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions { body_case: self.settings.body_case }
    }

    pub fn import_database(&mut self, path: &Path) -> Result<CatalogId> {
        let parsed = parser::parse_file(path, &self.parse_options())?;
        Ok(self.open_database(parsed))
    }

    pub fn open_database(&mut self, parsed: ParsedCatalog) -> CatalogId {
        let catalog = Catalog::database(parsed);
        let id = catalog.id();
        info!("[REGISTRY] Opened {} as {}", catalog.title(), id);
        self.catalogs.insert(id, catalog);
        id
    }

    /// Opens an empty code list titled `"{base_title} {n}"` with the first
    /// `n` not taken by another open list.
    pub fn open_list(&mut self, base_title: &str, game_id: &str) -> CatalogId {
        let taken: HashSet<&str> = self
            .catalogs
            .values()
            .filter(|c| c.kind() == CatalogKind::List)
            .map(Catalog::title)
            .collect();
        let title = (1..)
            .map(|n| format!("{} {}", base_title, n))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base_title.to_string());

        let catalog = Catalog::list(title, game_id);
        let id = catalog.id();
        info!("[REGISTRY] Opened code list '{}' as {}", catalog.title(), id);
        self.catalogs.insert(id, catalog);
        id
    }

    /// Closes a catalog and forgets rename listeners attached to its nodes.
    pub fn close(&mut self, id: CatalogId) -> Option<Catalog> {
        let catalog = self.catalogs.remove(&id)?;
        let listeners = &mut self.rename_listeners;
        catalog.tree().walk(&mut |node| {
            listeners.remove(&node.id());
        });
        info!("[REGISTRY] Closed {}", id);
        Some(catalog)
    }

    pub fn get(&self, id: CatalogId) -> Result<&Catalog> {
        self.catalogs.get(&id).ok_or(CatalogError::CatalogNotFound(id))
    }

    pub fn get_mut(&mut self, id: CatalogId) -> Result<&mut Catalog> {
        self.catalogs.get_mut(&id).ok_or(CatalogError::CatalogNotFound(id))
    }

    /// Open catalogs, in the order they were opened.
    pub fn catalogs(&self) -> impl Iterator<Item = &Catalog> {
        self.catalogs.values()
    }

    /// Open code lists as `(title, handle)`, in the order they were opened.
    pub fn destinations(&self) -> Vec<(String, CatalogId)> {
        self.catalogs
            .values()
            .filter(|c| c.kind() == CatalogKind::List)
            .map(|c| (c.title().to_string(), c.id()))
            .collect()
    }

    /// Copies the enabled codes of `source` into `destination`, or into a new
    /// list when no destination is chosen. Returns the list that received the
    /// codes, or None when nothing was enabled and no list was chosen.
    pub fn add_to_list(&mut self, source: CatalogId, destination: Option<CatalogId>) -> Result<Option<CatalogId>> {
        let source_catalog = self.get(source)?;
        if destination.is_none() && !source_catalog.tree().has_enabled() {
            warn!("[REGISTRY] Nothing enabled in {}, no code list created", source);
            return Ok(None);
        }
        let clones = transfer::extract_enabled(source_catalog.tree());
        let game_id = source_catalog.game_id().to_string();

        let target = match destination {
            Some(id) => {
                self.get(id)?;
                id
            }
            None => {
                let base_title = self.settings.new_list_title.clone();
                self.open_list(&base_title, &game_id)
            }
        };

        let added = self.get_mut(target)?.merge(clones)?;
        debug!("[REGISTRY] {} top-level nodes from {} into {}", added.len(), source, target);
        Ok(Some(target))
    }

    /// Attaches the viewer of `node`. A viewer already open for the node is
    /// replaced; returns true in that case.
    pub fn on_rename(&mut self, node: NodeId, callback: RenameCallback) -> bool {
        let replaced = self.rename_listeners.insert(node, callback).is_some();
        if replaced {
            debug!("[REGISTRY] Replaced viewer listener for {}", node);
        }
        replaced
    }

    /// Detaches the viewer of `node`. Returns false when none was attached.
    pub fn off_rename(&mut self, node: NodeId) -> bool {
        self.rename_listeners.remove(&node).is_some()
    }

    /// Removes nodes (and their subtrees) from a code list and detaches
    /// every viewer watching a removed node.
    pub fn remove(&mut self, catalog: CatalogId, ids: &HashSet<NodeId>) -> Result<usize> {
        let mut doomed = Vec::new();
        {
            let tree = self.get(catalog)?.tree();
            for id in ids {
                if let Some(node) = tree.find(*id) {
                    node.walk(&mut |n| doomed.push(n.id()));
                }
            }
        }
        let removed = self.get_mut(catalog)?.remove(ids)?;
        for id in doomed {
            self.rename_listeners.remove(&id);
        }
        Ok(removed)
    }

    /// Renames a node of a code list and notifies its listeners.
    /// Unknown nodes are a no-op and return false.
    pub fn rename(&mut self, catalog: CatalogId, node: NodeId, name: &str) -> Result<bool> {
        if !self.get_mut(catalog)?.rename(node, name)? {
            return Ok(false);
        }
        if let Some(listener) = self.rename_listeners.get_mut(&node) {
            listener(node, name);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const DB: &str = "<codes><gameid>RMCE01</gameid><gamename>Mario Kart Wii</gamename>\
        <category name=\"A\"><code name=\"X\" comment=\"\"><d>*00*...</d></code>\
        <code name=\"Y\" comment=\"\"><d>*11*...</d></code></category></codes>";

    fn registry_with_db() -> (CatalogRegistry, CatalogId) {
        let mut registry = CatalogRegistry::default();
        let parsed = parser::parse_str(DB, &ParseOptions::default()).unwrap();
        let db = registry.open_database(parsed);
        (registry, db)
    }

    fn select_first_code(registry: &mut CatalogRegistry, db: CatalogId) {
        let catalog = registry.get_mut(db).unwrap();
        let x = catalog.tree().codes()[0].id;
        catalog.set_selection(&[x].into_iter().collect(), &HashSet::new());
    }

    #[test]
    fn database_title_and_read_only() {
        let (mut registry, db) = registry_with_db();
        let catalog = registry.get_mut(db).unwrap();
        assert_eq!(catalog.title(), "Database Browser - Mario Kart Wii [RMCE01]");
        assert!(matches!(catalog.add_category(None, "New"), Err(CatalogError::ReadOnly(id)) if id == db));
        assert!(matches!(catalog.sort(SortOrder::Size), Err(CatalogError::ReadOnly(_))));
    }

    #[test]
    fn list_titles_are_unique() {
        let mut registry = CatalogRegistry::default();
        let first = registry.open_list("New Code List", "RMCE01");
        let second = registry.open_list("New Code List", "RMCE01");
        registry.close(first);
        let third = registry.open_list("New Code List", "RMCE01");

        let titles: Vec<String> = registry.destinations().into_iter().map(|(t, _)| t).collect();
        assert_eq!(titles, vec!["New Code List 2", "New Code List 1"]);
        assert_eq!(registry.get(second).unwrap().title(), "New Code List 2");
        assert_eq!(registry.get(third).unwrap().title(), "New Code List 1");
    }

    #[test]
    fn add_to_new_list_inherits_game_id() {
        let (mut registry, db) = registry_with_db();
        select_first_code(&mut registry, db);

        let list = registry.add_to_list(db, None).unwrap().unwrap();
        let catalog = registry.get(list).unwrap();
        assert_eq!(catalog.kind(), CatalogKind::List);
        assert_eq!(catalog.title(), "New Code List 1");
        assert_eq!(catalog.game_id(), "RMCE01");
        assert_eq!(catalog.tree().code_count(), 1);
        assert_eq!(registry.destinations(), vec![("New Code List 1".to_string(), list)]);
    }

    #[test]
    fn add_to_existing_list_and_nothing_enabled() {
        let (mut registry, db) = registry_with_db();
        assert_eq!(registry.add_to_list(db, None).unwrap(), None);
        assert!(registry.destinations().is_empty());

        let list = registry.open_list("Mine", "RMCE01");
        select_first_code(&mut registry, db);
        assert_eq!(registry.add_to_list(db, Some(list)).unwrap(), Some(list));
        assert_eq!(registry.add_to_list(db, Some(list)).unwrap(), Some(list));
        assert_eq!(registry.get(list).unwrap().tree().nodes().len(), 2);

        let missing = CatalogId::fresh();
        assert!(matches!(
            registry.add_to_list(db, Some(missing)),
            Err(CatalogError::CatalogNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn rename_notifies_viewers() {
        let (mut registry, db) = registry_with_db();
        select_first_code(&mut registry, db);
        let list = registry.add_to_list(db, None).unwrap().unwrap();
        let code = registry.get(list).unwrap().tree().codes()[0].id;

        let titles = Arc::new(Mutex::new(Vec::new()));
        let sink = titles.clone();
        registry.on_rename(
            code,
            Box::new(move |_: NodeId, name: &str| sink.lock().unwrap().push(viewer_title(name))),
        );

        assert!(registry.rename(list, code, "Renamed").unwrap());
        assert!(!registry.rename(list, NodeId::fresh(), "Ghost").unwrap());
        assert_eq!(*titles.lock().unwrap(), vec!["Code Viewer - Renamed".to_string()]);

        let db_code = registry.get(db).unwrap().tree().codes()[0].id;
        assert!(matches!(registry.rename(db, db_code, "No"), Err(CatalogError::ReadOnly(_))));

        registry.close(list);
        assert!(registry.rename_listeners.is_empty());
    }

    fn recording_listener(sink: &Arc<Mutex<Vec<String>>>) -> RenameCallback {
        let sink = sink.clone();
        Box::new(move |_: NodeId, name: &str| sink.lock().unwrap().push(viewer_title(name)))
    }

    #[test]
    fn reopening_a_viewer_keeps_one_listener() {
        let (mut registry, db) = registry_with_db();
        select_first_code(&mut registry, db);
        let list = registry.add_to_list(db, None).unwrap().unwrap();
        let code = registry.get(list).unwrap().tree().codes()[0].id;

        let titles = Arc::new(Mutex::new(Vec::new()));
        assert!(!registry.on_rename(code, recording_listener(&titles)));
        assert!(registry.on_rename(code, recording_listener(&titles)));
        registry.rename(list, code, "Renamed").unwrap();
        assert_eq!(*titles.lock().unwrap(), vec!["Code Viewer - Renamed".to_string()]);

        assert!(registry.off_rename(code));
        assert!(!registry.off_rename(code));
        registry.rename(list, code, "Again").unwrap();
        assert_eq!(titles.lock().unwrap().len(), 1);
    }

    #[test]
    fn removing_nodes_detaches_their_viewers() {
        let (mut registry, db) = registry_with_db();
        let category = registry.get(db).unwrap().tree().nodes()[0].id();
        registry
            .get_mut(db)
            .unwrap()
            .set_selection(&[category].into_iter().collect(), &HashSet::new());
        let list = registry.add_to_list(db, None).unwrap().unwrap();

        let copied = registry.get(list).unwrap().tree().nodes()[0].id();
        let codes: Vec<NodeId> = registry.get(list).unwrap().tree().codes().iter().map(|c| c.id).collect();
        let titles = Arc::new(Mutex::new(Vec::new()));
        for code in &codes {
            registry.on_rename(*code, recording_listener(&titles));
        }

        assert!(matches!(
            registry.remove(db, &[category].into_iter().collect()),
            Err(CatalogError::ReadOnly(_))
        ));
        assert_eq!(registry.rename_listeners.len(), 2);

        assert_eq!(registry.remove(list, &[copied].into_iter().collect()).unwrap(), 1);
        assert!(registry.rename_listeners.is_empty());
        assert!(registry.get(list).unwrap().tree().is_empty());
    }

    #[test]
    fn game_id_changes_on_lists_only() {
        let (mut registry, db) = registry_with_db();
        let list = registry.open_list("Mine", "RMCE01");

        registry.get_mut(list).unwrap().set_game_id(" RMCP01 ").unwrap();
        assert_eq!(registry.get(list).unwrap().game_id(), "RMCP01");
        registry.get_mut(list).unwrap().set_game_id("  ").unwrap();
        assert_eq!(registry.get(list).unwrap().game_id(), "RMCP01");

        assert!(matches!(
            registry.get_mut(db).unwrap().set_game_id("RMCP01"),
            Err(CatalogError::ReadOnly(id)) if id == db
        ));
        let ids: Vec<CatalogId> = registry.catalogs().map(Catalog::id).collect();
        assert_eq!(ids, vec![db, list]);
    }
}
