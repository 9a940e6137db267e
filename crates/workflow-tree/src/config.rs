//! Configuration for tree editing, layout and execution polling

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{branches, defaults, history, timing};
use crate::error::Result;
use crate::types::Size;

/// Primary axis along which the flow is laid out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Top to bottom
    #[default]
    Vertical,
    /// Left to right
    Horizontal,
}

/// Layout options consumed by the layout engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    pub direction: Direction,
    /// Gap between consecutive nodes along the flow axis
    pub node_gap: f64,
    /// Gap between a composite header and its branches
    pub branch_gap: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            node_gap: defaults::NODE_GAP,
            branch_gap: defaults::BRANCH_GAP,
        }
    }
}

/// Complete configuration of a workflow flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowConfig {
    pub layout: LayoutOptions,
    /// Size applied to every node on build
    pub node_size: Size,
    /// Upper bound of fork-join branches
    pub max_branches: usize,
    /// Upper bound of decision cases
    pub max_decision_branches: usize,
    /// Minimum interval between poll ticks, in milliseconds
    pub poll_floor_ms: u64,
    /// Delay before a cleared run is reset, in milliseconds
    pub clear_delay_ms: u64,
    /// Delay before a poll whose fetch was abandoned is retried, in milliseconds
    pub poll_retry_ms: u64,
    /// Undo snapshots kept
    pub max_undo: usize,
    /// Environment variables exposed to the variable mapper
    pub env_variables: Vec<EnvVariable>,
}

/// One environment variable offered to node inputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVariable {
    pub name: String,
    pub display_name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "string".to_string()
}

impl EnvVariable {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            kind: default_kind(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            node_size: Size::new(defaults::NODE_WIDTH, defaults::NODE_HEIGHT),
            max_branches: branches::MAX_FORK,
            max_decision_branches: branches::MAX_DECISION,
            poll_floor_ms: timing::POLL_FLOOR_MS,
            clear_delay_ms: timing::CLEAR_DELAY_MS,
            poll_retry_ms: timing::POLL_RETRY_MS,
            max_undo: history::MAX_SNAPSHOTS,
            env_variables: vec![
                EnvVariable::new("userId", "User ID"),
                EnvVariable::new("teamId", "Team ID"),
                EnvVariable::new("workflowId", "Workflow ID"),
                EnvVariable::new("workflowInstanceId", "Workflow instance ID"),
            ],
        }
    }
}

impl FlowConfig {
    /// Parse a config document; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn poll_floor(&self) -> Duration {
        Duration::from_millis(self.poll_floor_ms)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    pub fn poll_retry(&self) -> Duration {
        Duration::from_millis(self.poll_retry_ms)
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.layout.direction = direction;
        self
    }
}
