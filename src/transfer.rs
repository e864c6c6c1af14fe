// src/transfer.rs
// Copies the enabled part of one catalog into another.

use crate::catalog_tree::CatalogTree;
use crate::ids::NodeId;
use crate::types::{CatalogNode, Category, Code, TriState};
use tracing::{debug, info};

/// Pruned deep copies of every top-level node that has an enabled code
/// beneath it. Only checked codes survive, and categories left without
/// children are dropped. The source is never mutated; the copies keep the
/// source identities until they are merged.
pub fn extract_enabled(source: &CatalogTree) -> Vec<CatalogNode> {
    let clones: Vec<CatalogNode> = source
        .nodes()
        .iter()
        .filter(|node| node.check_state().is_enabled())
        .filter_map(pruned_copy)
        .collect();
    debug!("[TRANSFER] Extracted {} top-level nodes", clones.len());
    clones
}

// Bottom-up rebuild: children are copied first, the parent only if any survived.
fn pruned_copy(node: &CatalogNode) -> Option<CatalogNode> {
    match node {
        CatalogNode::Code(code) if code.checked == TriState::Checked => Some(CatalogNode::Code(Code {
            editable: true,
            visible: true,
            ..code.clone()
        })),
        CatalogNode::Code(_) => None,
        CatalogNode::Category(category) => {
            let children: Vec<CatalogNode> = category.children.iter().filter_map(pruned_copy).collect();
            if children.is_empty() {
                return None;
            }
            Some(CatalogNode::Category(Category {
                id: category.id,
                origin: category.origin,
                name: category.name.clone(),
                children,
                visible: true,
                editable: true,
            }))
        }
    }
}

/// Appends `clones` to `destination` as new top-level siblings. Every node
/// gets a fresh identity and remembers the one it was copied from.
/// Returns the new top-level identities.
pub fn merge(destination: &mut CatalogTree, clones: Vec<CatalogNode>) -> Vec<NodeId> {
    if clones.is_empty() {
        return Vec::new();
    }
    let mut added = Vec::with_capacity(clones.len());
    for mut clone in clones {
        clone.walk_mut(&mut restamp);
        added.push(clone.id());
        destination.nodes_mut().push(clone);
    }
    info!("[TRANSFER] Merged {} top-level nodes", added.len());
    added
}

fn restamp(node: &mut CatalogNode) {
    let (id, origin) = match node {
        CatalogNode::Category(c) => (&mut c.id, &mut c.origin),
        CatalogNode::Code(c) => (&mut c.id, &mut c.origin),
    };
    if origin.is_none() {
        *origin = Some(*id);
    }
    *id = NodeId::fresh();
}
