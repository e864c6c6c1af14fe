// src/error.rs
use crate::ids::{CatalogId, NodeId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error at byte {position}: {message}")]
    Xml { position: usize, message: String },
    #[error("Document has no root element")]
    EmptyDocument,
    #[error("{path}: missing required attribute '{attribute}'")]
    MissingAttribute { path: String, attribute: &'static str },
    #[error("{path}: code has no payload element")]
    MissingBody { path: String },
    #[error("{path}: malformed placeholder attribute '{attribute}': {value:?}")]
    MalformedPlaceholder {
        path: String,
        attribute: &'static str,
        value: String,
    },
    #[error("{0} is a read-only database")]
    ReadOnly(CatalogId),
    #[error("{0} is not open")]
    CatalogNotFound(CatalogId),
    #[error("Parent node {0} not found")]
    ParentNotFound(NodeId),
    #[error("Node {0} is not a category")]
    NotACategory(NodeId),
    #[error("Settings storage error: {0}")]
    Settings(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
