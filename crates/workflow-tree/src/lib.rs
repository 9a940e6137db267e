//! Workflow Tree - editable workflow node trees with remote execution tracking
//!
//! This crate turns a flat list of task definitions into a tree of nodes
//! that can be edited, laid out and run. It supports:
//!
//! - Structural editing (insert, delete, move, branch management) that keeps
//!   forks paired with their joins and never leaves a branch empty
//! - Deterministic layout in either direction, with edge paths and controls
//! - Sub-workflow expansion for the duration of a run
//! - Polling a remote runner and projecting task status onto nodes
//! - Compressed snapshot-based undo/redo
//! - A variable table of everything a node input can reference
//!
//! # Architecture
//!
//! - `WorkflowTree`: arena of nodes plus the top-level sequence
//! - `WorkflowFlow`: owns a tree and drives edits, history and runs
//! - `ExecutionService`: seam to the remote runner
//! - `EventSink`: generic event streaming (not tied to any UI)
//!
//! # Example
//!
//! ```
//! use workflow_tree::{FlowConfig, TaskBuilder, ToolDefinition, ToolRegistry, VariableSchema, WorkflowTree};
//!
//! let tasks = vec![
//!     TaskBuilder::simple("fetch", "http").build(),
//!     TaskBuilder::fork("fan_out")
//!         .with_branch(vec![TaskBuilder::simple("left", "http").build()])
//!         .with_branch(vec![TaskBuilder::simple("right", "http").build()])
//!         .build(),
//! ];
//! let tree = WorkflowTree::build(&tasks, &FlowConfig::default());
//! assert!(tree.contains("fan_out_join"));
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(ToolDefinition::new("http", "HTTP request").with_output(VariableSchema::new("body", "Body")));
//! assert!(registry.contains("http"));
//! ```

pub mod branches;
pub mod builder;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod execution;
pub mod expansion;
pub mod flow;
pub mod geometry;
pub mod layout;
pub mod node;
pub mod registry;
pub mod tree;
pub mod types;
pub mod undo;
pub mod variables;

// Re-export key types
pub use builder::{new_task, TaskBuilder};
pub use config::{Direction, EnvVariable, FlowConfig, LayoutOptions};
pub use error::{FlowError, Result};
pub use events::{ChannelEventSink, EventError, EventSink, FlowEvent, NullEventSink, VecEventSink};
pub use execution::{
    ExecutionService, ExecutionSnapshot, ExecutionTracker, FetchOutcome, PendingFetch, PollScheduler, RemoteTask,
    TimerAction,
};
pub use flow::{RunParams, Tick, WorkflowFlow};
pub use geometry::PathCommand;
pub use layout::{layout, Control, ControlKind, Edge, EdgeKind, Layout};
pub use node::{Branch, JoinOn, Node, NodeKind, Parent};
pub use registry::{ToolDefinition, ToolRegistry, VariableSchema};
pub use tree::WorkflowTree;
pub use types::{ExecutionStatus, NodeId, Position, RawTask, Size, TaskStatus, TaskType};
pub use undo::UndoStack;
pub use variables::{Variable, VariableSource, VariableTable};
