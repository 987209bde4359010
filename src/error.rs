use thiserror::Error;

use crate::graph::BuildError;

/// Which end of a path request an id was given for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Source,
    Target,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Source => write!(f, "source"),
            NodeRole::Target => write!(f, "target"),
        }
    }
}

/// Main error type for Warmgraph
#[derive(Error, Debug)]
pub enum WarmgraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input record during graph construction
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// A requested id does not exist in the current snapshot
    #[error("Node not found: {role} id '{id}' is not in the graph")]
    NodeNotFound { id: String, role: NodeRole },

    /// Structurally invalid parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Search or extraction exceeded its deadline
    #[error("Timeout: {0} exceeded its deadline")]
    Timeout(&'static str),

    /// Unexpected failure in the engine itself
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WarmgraphError {
    /// Short machine-readable name, used as the `error` field at the HTTP boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            WarmgraphError::Database(_) => "database",
            WarmgraphError::Io(_) => "io",
            WarmgraphError::Config(_) => "config",
            WarmgraphError::Build(_) => "build_error",
            WarmgraphError::NodeNotFound { .. } => "node_not_found",
            WarmgraphError::InvalidRequest(_) => "invalid_request",
            WarmgraphError::Timeout(_) => "timeout",
            WarmgraphError::Internal(_) => "internal_error",
        }
    }
}

/// Convenient Result type using WarmgraphError
pub type Result<T> = std::result::Result<T, WarmgraphError>;
