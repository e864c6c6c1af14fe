// src/types.rs
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

/// Check state of a node. Stored on codes, derived for categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    #[default]
    Unchecked,
    Partial,
    Checked,
}

impl TriState {
    /// Checked or Partial.
    pub fn is_enabled(self) -> bool {
        self != TriState::Unchecked
    }
}

/// Which kind of window owns a tree. Databases are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Database,
    List,
}

/// A substitution slot inside a code payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderSpec {
    pub letter: char,
    #[serde(rename = "type")]
    pub kind: i32,
    pub comment: String,
    #[serde(default)] // Good practice for arrays
    pub args: Vec<String>,
    #[serde(default)] // Older databases have no recursive attribute
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub id: NodeId,
    /// Identity of the database node this one was copied from.
    pub origin: Option<NodeId>,
    pub name: String,
    pub body: String,
    pub comment: String,
    #[serde(default)]
    pub placeholders: Vec<PlaceholderSpec>,
    pub checked: TriState,
    pub visible: bool,
    pub editable: bool,
}

impl Code {
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        comment: impl Into<String>,
        placeholders: Vec<PlaceholderSpec>,
    ) -> Self {
        Code {
            id: NodeId::fresh(),
            origin: None,
            name: name.into(),
            body: body.into(),
            comment: comment.into(),
            placeholders,
            checked: TriState::Unchecked,
            visible: true,
            editable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: NodeId,
    pub origin: Option<NodeId>,
    pub name: String,
    pub children: Vec<CatalogNode>,
    pub visible: bool,
    pub editable: bool,
}

impl Category {
    pub fn new(name: impl Into<String>, children: Vec<CatalogNode>) -> Self {
        Category {
            id: NodeId::fresh(),
            origin: None,
            name: name.into(),
            children,
            visible: true,
            editable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogNode {
    Category(Category),
    Code(Code),
}

impl CatalogNode {
    pub fn category(name: impl Into<String>, children: Vec<CatalogNode>) -> Self {
        CatalogNode::Category(Category::new(name, children))
    }

    pub fn code(name: impl Into<String>, body: impl Into<String>) -> Self {
        CatalogNode::Code(Code::new(name, body, "", Vec::new()))
    }

    pub fn id(&self) -> NodeId {
        match self {
            CatalogNode::Category(c) => c.id,
            CatalogNode::Code(c) => c.id,
        }
    }

    pub fn origin(&self) -> Option<NodeId> {
        match self {
            CatalogNode::Category(c) => c.origin,
            CatalogNode::Code(c) => c.origin,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CatalogNode::Category(c) => &c.name,
            CatalogNode::Code(c) => &c.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            CatalogNode::Category(c) => c.name = name.into(),
            CatalogNode::Code(c) => c.name = name.into(),
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            CatalogNode::Category(c) => c.visible,
            CatalogNode::Code(c) => c.visible,
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        match self {
            CatalogNode::Category(c) => c.visible = visible,
            CatalogNode::Code(c) => c.visible = visible,
        }
    }

    pub fn is_editable(&self) -> bool {
        match self {
            CatalogNode::Category(c) => c.editable,
            CatalogNode::Code(c) => c.editable,
        }
    }

    pub fn children(&self) -> &[CatalogNode] {
        match self {
            CatalogNode::Category(c) => &c.children,
            CatalogNode::Code(_) => &[],
        }
    }

    pub fn as_code(&self) -> Option<&Code> {
        match self {
            CatalogNode::Code(c) => Some(c),
            CatalogNode::Category(_) => None,
        }
    }

    pub fn is_category(&self) -> bool {
        matches!(self, CatalogNode::Category(_))
    }

    /// Derived check state. For a category this is a pure function of its
    /// descendant codes; nested categories without codes do not count.
    pub fn check_state(&self) -> TriState {
        match self {
            CatalogNode::Code(c) => c.checked,
            CatalogNode::Category(_) => {
                let (mut any_checked, mut any_unchecked) = (false, false);
                self.for_each_code(&mut |code| match code.checked {
                    TriState::Checked => any_checked = true,
                    TriState::Unchecked => any_unchecked = true,
                    TriState::Partial => {
                        any_checked = true;
                        any_unchecked = true;
                    }
                });
                match (any_checked, any_unchecked) {
                    (true, false) => TriState::Checked,
                    (true, true) => TriState::Partial,
                    _ => TriState::Unchecked,
                }
            }
        }
    }

    /// Payload length, summed bottom-up for categories.
    pub fn size(&self) -> usize {
        match self {
            CatalogNode::Code(c) => c.body.chars().count(),
            CatalogNode::Category(c) => c.children.iter().map(CatalogNode::size).sum(),
        }
    }

    /// Pre-order walk over this node and all of its descendants.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a CatalogNode)) {
        f(self);
        if let CatalogNode::Category(c) = self {
            for child in &c.children {
                child.walk(f);
            }
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut CatalogNode)) {
        f(self);
        if let CatalogNode::Category(c) = self {
            for child in &mut c.children {
                child.walk_mut(f);
            }
        }
    }

    pub fn for_each_code<'a>(&'a self, f: &mut impl FnMut(&'a Code)) {
        self.walk(&mut |node| {
            if let CatalogNode::Code(code) = node {
                f(code);
            }
        });
    }

    pub fn for_each_code_mut(&mut self, f: &mut impl FnMut(&mut Code)) {
        self.walk_mut(&mut |node| {
            if let CatalogNode::Code(code) = node {
                f(code);
            }
        });
    }
}

// --- Render DTO handed to the window layer ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub is_category: bool,
    pub state: TriState,
    pub visible: bool,
    pub editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub placeholders: Vec<PlaceholderSpec>,
    pub children: Vec<NodeView>,
}

impl From<&CatalogNode> for NodeView {
    fn from(node: &CatalogNode) -> Self {
        let (body, comment, placeholders) = match node {
            CatalogNode::Code(c) => (
                Some(c.body.clone()),
                Some(c.comment.clone()),
                c.placeholders.clone(),
            ),
            CatalogNode::Category(_) => (None, None, Vec::new()),
        };
        NodeView {
            id: node.id(),
            name: node.name().to_string(),
            is_category: node.is_category(),
            state: node.check_state(),
            visible: node.is_visible(),
            editable: node.is_editable(),
            body,
            comment,
            placeholders,
            children: node.children().iter().map(NodeView::from).collect(),
        }
    }
}
