//! Node model
//!
//! Nodes live in a flat arena owned by [`WorkflowTree`](crate::tree::WorkflowTree)
//! and reference each other by id. Composite variants own their branches as
//! ordered id lists; a fork refers to its join (and back) by id, and every
//! node keeps a non-owning [`Parent`] link to the sequence that holds it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::names;
use crate::types::{task_name, NodeId, Position, RawTask, Size, TaskStatus, TaskType};

/// Sequence that holds a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parent {
    /// Top-level sequence
    Root,
    /// Branch `index` of composite `owner`
    Branch { owner: NodeId, index: usize },
}

/// One ordered path of a composite node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    /// Case name (decisions only)
    pub name: Option<String>,
    pub nodes: Vec<NodeId>,
}

impl Branch {
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self { name: None, nodes }
    }

    pub fn named(name: impl Into<String>, nodes: Vec<NodeId>) -> Self {
        Self {
            name: Some(name.into()),
            nodes,
        }
    }

    pub fn tail(&self) -> Option<&NodeId> {
        self.nodes.last()
    }
}

/// Branches a join waits on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinOn {
    /// Every current branch
    #[default]
    All,
    /// Selected branch indices; indices past the branch count are ignored
    Indices(Vec<usize>),
}

impl JoinOn {
    /// Resolve to the branch indices that are currently valid
    pub fn resolve(&self, branch_count: usize) -> Vec<usize> {
        match self {
            Self::All => (0..branch_count).collect(),
            Self::Indices(indices) => {
                let mut valid: Vec<usize> = indices
                    .iter()
                    .copied()
                    .filter(|index| *index < branch_count)
                    .collect();
                valid.sort_unstable();
                valid.dedup();
                valid
            }
        }
    }
}

/// Variant-specific structure of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    End,
    Simple,
    ForkJoin {
        branches: Vec<Branch>,
        join_id: Option<NodeId>,
        join_on: JoinOn,
    },
    Join {
        fork_id: NodeId,
        wait_set: Vec<NodeId>,
        /// Loaded from a raw `JOIN` task rather than synthesized
        explicit: bool,
    },
    Decision {
        branches: Vec<Branch>,
    },
    SubWorkflow {
        /// Always exactly one branch
        branches: Vec<Branch>,
        /// Children come from an inline definition
        nested: bool,
    },
}

impl NodeKind {
    pub fn branches(&self) -> Option<&[Branch]> {
        match self {
            Self::ForkJoin { branches, .. }
            | Self::Decision { branches }
            | Self::SubWorkflow { branches, .. } => Some(branches),
            _ => None,
        }
    }

    pub fn branches_mut(&mut self) -> Option<&mut Vec<Branch>> {
        match self {
            Self::ForkJoin { branches, .. }
            | Self::Decision { branches }
            | Self::SubWorkflow { branches, .. } => Some(branches),
            _ => None,
        }
    }

    /// Whether the variant is laid out as a split into branches
    pub fn is_split(&self) -> bool {
        matches!(self, Self::ForkJoin { .. } | Self::Decision { .. })
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Start | Self::End)
    }

    pub fn task_type(&self) -> Option<TaskType> {
        match self {
            Self::Start | Self::End => None,
            Self::Simple => Some(TaskType::Simple),
            Self::ForkJoin { .. } => Some(TaskType::ForkJoin),
            Self::Join { .. } => Some(TaskType::Join),
            Self::Decision { .. } => Some(TaskType::Decision),
            Self::SubWorkflow { .. } => Some(TaskType::SubWorkflow),
        }
    }
}

/// Status of a node's task within one execution instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecution {
    pub status: TaskStatus,
    /// Remote task record as last reported
    pub data: Value,
}

/// A node of the workflow tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Parent,
    /// Pass-through payload; composite children are stripped out
    pub raw: RawTask,
    pub size: Size,
    /// Derived by layout, never persisted
    pub position: Position,
    pub needs_render: bool,
    pub is_placeholder: bool,
    /// Materialized by sub-workflow expansion for a run only
    pub transient: bool,
    executions: HashMap<String, NodeExecution>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, raw: RawTask, size: Size) -> Self {
        Self {
            id: id.into(),
            kind,
            parent: Parent::Root,
            raw,
            size,
            position: Position::default(),
            needs_render: true,
            is_placeholder: false,
            transient: false,
            executions: HashMap::new(),
        }
    }

    /// Tool name of the task, if any
    pub fn name(&self) -> Option<&str> {
        task_name(&self.raw)
    }

    /// User-facing title: the alias if set, else the tool name, else the id
    pub fn title(&self) -> &str {
        self.raw
            .get(names::ALIAS_FIELD)
            .and_then(|alias| alias.get("title"))
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .or_else(|| self.name())
            .unwrap_or(&self.id)
    }

    pub fn is_composite(&self) -> bool {
        self.kind.branches().is_some()
    }

    /// Ids of every direct child across all branches
    pub fn child_ids(&self) -> Vec<NodeId> {
        self.kind
            .branches()
            .map(|branches| {
                branches
                    .iter()
                    .flat_map(|branch| branch.nodes.iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn execution(&self, instance_id: &str) -> Option<&NodeExecution> {
        self.executions.get(instance_id)
    }

    pub fn execution_status(&self, instance_id: &str) -> Option<TaskStatus> {
        self.executions.get(instance_id).map(|e| e.status)
    }

    /// Record the task status for an instance; returns true when it changed
    pub fn set_execution(&mut self, instance_id: &str, status: TaskStatus, data: Value) -> bool {
        let next = NodeExecution { status, data };
        if self.executions.get(instance_id) == Some(&next) {
            return false;
        }
        self.executions.insert(instance_id.to_string(), next);
        self.needs_render = true;
        true
    }

    /// Change only the status, keeping the last reported data
    pub fn set_execution_status(&mut self, instance_id: &str, status: TaskStatus) -> bool {
        let data = self
            .executions
            .get(instance_id)
            .map(|e| e.data.clone())
            .unwrap_or(Value::Null);
        self.set_execution(instance_id, status, data)
    }

    pub fn clear_execution(&mut self, instance_id: &str) -> bool {
        let removed = self.executions.remove(instance_id).is_some();
        if removed {
            self.needs_render = true;
        }
        removed
    }
}
