//! Error types for the workflow tree

use thiserror::Error;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while editing or running a workflow tree
#[derive(Debug, Error)]
pub enum FlowError {
    /// Referenced node is not part of the tree
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Move target lies inside the moved subtree
    #[error("Cannot move '{source_id}' into its own descendant '{target_id}'")]
    MoveIntoDescendant { source_id: String, target_id: String },

    /// Move rejected for a structural reason (sentinels, joins)
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// Sub-workflow expansion or tree walk found a cycle
    #[error("Cycle detected at '{0}'")]
    CycleDetected(String),

    /// Branch insert/delete would leave the composite out of bounds
    #[error("Branch count for '{node_id}' must stay within [{min}, {max}]")]
    BranchBounds {
        node_id: String,
        min: usize,
        max: usize,
    },

    /// Another run of this workflow is still active
    #[error("Instance '{0}' is already running")]
    AlreadyRunning(String),

    /// Control call on an instance that is not in a controllable state
    #[error("Instance '{0}' is not running")]
    NotRunning(String),

    /// Run requested before a workflow id was assigned
    #[error("Workflow id is not set")]
    MissingWorkflowId,

    /// Run requested while empty-branch fillers remain in the tree
    #[error("Workflow still contains placeholder node '{0}'")]
    PlaceholderPresent(String),

    /// No tracker for the given instance
    #[error("Unknown execution instance: {0}")]
    UnknownInstance(String),

    /// External execution service rejected a call
    #[error("Execution service error: {0}")]
    Service(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create a service error with a message
    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }

    /// Create a node-not-found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound(id.into())
    }
}
