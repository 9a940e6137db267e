//! Workflow-tree constants
//!
//! Single source of truth for geometry, branch bounds and timing defaults.

/// Layout geometry defaults (in canvas units)
pub mod defaults {
    /// Width of a node when none is configured
    pub const NODE_WIDTH: f64 = 80.0;
    /// Height of a node when none is configured
    pub const NODE_HEIGHT: f64 = 80.0;
    /// Gap between consecutive nodes along the flow axis
    pub const NODE_GAP: f64 = 80.0;
    /// Gap between a composite header and the first node of its branches
    pub const BRANCH_GAP: f64 = 102.0;
    /// Cross-axis indent of sub-workflow children
    pub const SUB_WORKFLOW_INDENT: f64 = 5.0;
    /// Corner radius of smooth-step connectors
    pub const EDGE_RADIUS: f64 = 5.0;
    /// Offset of control affordances from their anchor
    pub const CONTROL_OFFSET: f64 = 16.0;
}

/// Branch count bounds for composite nodes
pub mod branches {
    /// Fewest branches a fork or decision may be reduced to
    pub const MIN: usize = 2;
    /// Most branches a fork-join may hold
    pub const MAX_FORK: usize = 5;
    /// Most cases a decision may hold
    pub const MAX_DECISION: usize = 20;
    /// Prefix of auto-generated decision case names
    pub const DECISION_PREFIX: &str = "branch";
}

/// Execution polling timing (in milliseconds)
pub mod timing {
    /// Minimum interval between two poll ticks of one instance
    pub const POLL_FLOOR_MS: u64 = 1000;
    /// Delay before cleared statuses are reset to scheduled
    pub const CLEAR_DELAY_MS: u64 = 80;
    /// Retry delay of a poll tick whose fetch never completed
    pub const POLL_RETRY_MS: u64 = 5000;
}

/// Reference-name prefixes and payload field names
pub mod names {
    /// Reference-name prefix of empty-branch fillers
    pub const PLACEHOLDER_PREFIX: &str = "placeholder_";
    /// Task name written into placeholder payloads
    pub const PLACEHOLDER_NAME: &str = "placeholder";
    /// Reference name of the synthetic start sentinel
    pub const START_ID: &str = "workflow_start";
    /// Reference name of the synthetic end sentinel
    pub const END_ID: &str = "workflow_end";
    /// Suffix of synthesized join reference names
    pub const JOIN_SUFFIX: &str = "_join";
    /// Fork payload field carrying the paired join id
    pub const JOIN_REF_FIELD: &str = "__joinRef";
    /// Fork payload field carrying the joined branch indices
    pub const JOIN_ON_FIELD: &str = "__joinOn";
    /// Payload field holding user-facing aliases
    pub const ALIAS_FIELD: &str = "__alias";
    /// Prefix of inline (nested) sub-workflow reference names
    pub const NESTED_SUB_WORKFLOW_PREFIX: &str = "sub_workflow_nested_";
}

/// Undo history
pub mod history {
    /// Snapshots kept before the oldest is dropped
    pub const MAX_SNAPSHOTS: usize = 100;
    /// zstd compression level for snapshots
    pub const COMPRESSION_LEVEL: i32 = 3;
}
