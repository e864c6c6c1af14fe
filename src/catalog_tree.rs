// src/catalog_tree.rs

use crate::error::{CatalogError, Result};
use crate::ids::NodeId;
use crate::types::{CatalogNode, Code};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Ordering applied by the "Sort by..." actions of a code list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Alphabetical,
    AlphabeticalReverse,
    Size,
}

/// Index path from the top level down to a node.
pub type NodePath = Vec<usize>;

/// The ordered top-level nodes of one catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTree {
    nodes: Vec<CatalogNode>,
}

impl CatalogTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<CatalogNode>) -> Self {
        CatalogTree { nodes }
    }

    pub fn nodes(&self) -> &[CatalogNode] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut Vec<CatalogNode> {
        &mut self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a CatalogNode)) {
        for node in &self.nodes {
            node.walk(f);
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut CatalogNode)) {
        for node in &mut self.nodes {
            node.walk_mut(f);
        }
    }

    /// All codes in tree order.
    pub fn codes(&self) -> Vec<&Code> {
        let mut codes = Vec::new();
        for node in &self.nodes {
            node.for_each_code(&mut |code| codes.push(code));
        }
        codes
    }

    pub fn code_count(&self) -> usize {
        self.codes().len()
    }

    pub fn find(&self, id: NodeId) -> Option<&CatalogNode> {
        let path = self.path_of(id)?;
        self.node_at(&path)
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut CatalogNode> {
        let path = self.path_of(id)?;
        self.node_at_mut(&path)
    }

    pub fn path_of(&self, id: NodeId) -> Option<NodePath> {
        fn search(nodes: &[CatalogNode], id: NodeId, path: &mut NodePath) -> bool {
            for (index, node) in nodes.iter().enumerate() {
                path.push(index);
                if node.id() == id || search(node.children(), id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }
        let mut path = Vec::new();
        search(&self.nodes, id, &mut path).then_some(path)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&CatalogNode> {
        let (first, rest) = path.split_first()?;
        let mut current = self.nodes.get(*first)?;
        for index in rest {
            current = current.children().get(*index)?;
        }
        Some(current)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut CatalogNode> {
        let (first, rest) = path.split_first()?;
        let mut current = self.nodes.get_mut(*first)?;
        for index in rest {
            current = match current {
                CatalogNode::Category(c) => c.children.get_mut(*index)?,
                CatalogNode::Code(_) => return None,
            };
        }
        Some(current)
    }

    // --- Structural edits (code lists only; the owning Catalog guards this) ---

    /// Appends `node` under `parent`, or at the top level when `parent` is None.
    pub fn insert(&mut self, parent: Option<NodeId>, node: CatalogNode) -> Result<NodeId> {
        let id = node.id();
        match parent {
            None => self.nodes.push(node),
            Some(parent_id) => match self.find_mut(parent_id) {
                Some(CatalogNode::Category(category)) => category.children.push(node),
                Some(CatalogNode::Code(_)) => return Err(CatalogError::NotACategory(parent_id)),
                None => return Err(CatalogError::ParentNotFound(parent_id)),
            },
        }
        Ok(id)
    }

    /// Removes every node whose identity is in `ids`, with its subtree.
    /// Returns how many of the requested nodes were found and removed.
    pub fn remove(&mut self, ids: &HashSet<NodeId>) -> usize {
        fn retain(nodes: Vec<CatalogNode>, ids: &HashSet<NodeId>, removed: &mut usize) -> Vec<CatalogNode> {
            nodes
                .into_iter()
                .filter_map(|node| {
                    if ids.contains(&node.id()) {
                        *removed += 1;
                        return None;
                    }
                    Some(match node {
                        CatalogNode::Category(mut category) => {
                            category.children = retain(std::mem::take(&mut category.children), ids, removed);
                            CatalogNode::Category(category)
                        }
                        code => code,
                    })
                })
                .collect()
        }
        let mut removed = 0;
        self.nodes = retain(std::mem::take(&mut self.nodes), ids, &mut removed);
        removed
    }

    pub fn rename(&mut self, id: NodeId, name: &str) -> bool {
        match self.find_mut(id) {
            Some(node) => {
                node.set_name(name);
                true
            }
            None => false,
        }
    }

    /// Recursively sorts siblings at every level. Stable.
    pub fn sort(&mut self, order: SortOrder) {
        sort_nodes(&mut self.nodes, order);
    }
}

fn sort_nodes(nodes: &mut [CatalogNode], order: SortOrder) {
    for node in nodes.iter_mut() {
        if let CatalogNode::Category(category) = node {
            sort_nodes(&mut category.children, order);
        }
    }
    let by_name = |a: &CatalogNode, b: &CatalogNode| a.name().to_lowercase().cmp(&b.name().to_lowercase());
    nodes.sort_by(|a, b| match order {
        SortOrder::Alphabetical => by_name(a, b),
        SortOrder::AlphabeticalReverse => by_name(b, a),
        SortOrder::Size => match a.size().cmp(&b.size()) {
            Ordering::Equal => by_name(a, b),
            other => other,
        },
    });
}
