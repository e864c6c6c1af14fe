// src/selection.rs
// Check-state propagation and search filtering over a CatalogTree.

use crate::catalog_tree::{CatalogTree, NodePath};
use crate::ids::NodeId;
use crate::types::{CatalogNode, TriState};
use std::collections::HashSet;
use tracing::debug;

impl CatalogTree {
    /// Mirrors the window selection into check states.
    ///
    /// Every code is checked iff it is selected. A selected category that is
    /// collapsed (not in `expanded`) additionally checks every code beneath it.
    /// Category states are derived, so nothing else needs recomputing.
    /// Returns the enabled codes in tree order. Unknown identities are ignored.
    pub fn set_selection(&mut self, selected: &HashSet<NodeId>, expanded: &HashSet<NodeId>) -> Vec<NodeId> {
        self.walk_mut(&mut |node| {
            if let CatalogNode::Code(code) = node {
                code.checked = if selected.contains(&code.id) {
                    TriState::Checked
                } else {
                    TriState::Unchecked
                };
            }
        });

        self.walk_mut(&mut |node| {
            if let CatalogNode::Category(category) = node {
                if selected.contains(&category.id) && !expanded.contains(&category.id) {
                    for child in &mut category.children {
                        child.for_each_code_mut(&mut |code| code.checked = TriState::Checked);
                    }
                }
            }
        });

        let enabled = self.enabled_codes();
        debug!("[SELECTION] {} selected, {} codes enabled", selected.len(), enabled.len());
        enabled
    }

    /// Identities of the checked codes, in tree order.
    pub fn enabled_codes(&self) -> Vec<NodeId> {
        self.codes()
            .into_iter()
            .filter(|code| code.checked == TriState::Checked)
            .map(|code| code.id)
            .collect()
    }

    /// True when at least one code is checked ("Add to Codelist" is enabled).
    pub fn has_enabled(&self) -> bool {
        self.nodes().iter().any(|node| node.check_state().is_enabled())
    }

    /// Case-insensitive substring filter on code names.
    ///
    /// Recomputes visibility from scratch: a code is visible iff it matches,
    /// a category iff some descendant code is visible. Check states are
    /// untouched. Returns the number of matching codes.
    pub fn search(&mut self, query: &str) -> usize {
        let needle = query.to_lowercase();

        let mut matches: Vec<NodePath> = Vec::new();
        let mut path: NodePath = Vec::new();
        collect_matches(self.nodes(), &needle, &mut path, &mut matches);

        self.walk_mut(&mut |node| node.set_visible(false));

        for code_path in &matches {
            if let Some(code) = self.node_at_mut(code_path) {
                code.set_visible(true);
            }
            // Walk up the ancestor chain, nearest first.
            for len in (1..code_path.len()).rev() {
                match self.node_at_mut(&code_path[..len]) {
                    Some(ancestor) if !ancestor.is_visible() => ancestor.set_visible(true),
                    _ => break,
                }
            }
        }

        debug!("[SELECTION] Search '{}' matched {} codes", query, matches.len());
        matches.len()
    }
}

fn collect_matches(nodes: &[CatalogNode], needle: &str, path: &mut NodePath, out: &mut Vec<NodePath>) {
    for (index, node) in nodes.iter().enumerate() {
        path.push(index);
        match node {
            CatalogNode::Code(code) => {
                if code.name.to_lowercase().contains(needle) {
                    out.push(path.clone());
                }
            }
            CatalogNode::Category(category) => collect_matches(&category.children, needle, path, out),
        }
        path.pop();
    }
}
