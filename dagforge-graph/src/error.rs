//! ABOUTME: Error type for graph construction failures

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected among nodes: {0:?}")]
    Cycle(Vec<String>),

    #[error("node '{node}' declares missing dependency '{dep}'")]
    MissingDependency { node: String, dep: String },

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),
}
