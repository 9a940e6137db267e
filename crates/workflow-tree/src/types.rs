//! Core value types shared by the tree, layout and execution modules

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable reference name of a node (`taskReferenceName`)
pub type NodeId = String;

/// Opaque raw task payload
pub type RawTask = Map<String, Value>;

/// Width and height of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Top-left corner of a node on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Type discriminator of a raw task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Simple,
    ForkJoin,
    Join,
    Decision,
    SubWorkflow,
}

impl TaskType {
    /// Resolve the discriminator of a raw payload; unmodeled types are simple
    pub fn of(raw: &RawTask) -> Self {
        match raw.get("type").and_then(Value::as_str).unwrap_or("SIMPLE") {
            "FORK_JOIN" => Self::ForkJoin,
            "JOIN" => Self::Join,
            "SWITCH" | "DECISION" => Self::Decision,
            "SUB_WORKFLOW" => Self::SubWorkflow,
            _ => Self::Simple,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::ForkJoin => "FORK_JOIN",
            Self::Join => "JOIN",
            Self::Decision => "SWITCH",
            Self::SubWorkflow => "SUB_WORKFLOW",
        }
    }
}

/// Reference name stored in a raw payload
pub fn reference_name(raw: &RawTask) -> Option<&str> {
    raw.get("taskReferenceName").and_then(Value::as_str)
}

/// Tool name stored in a raw payload
pub fn task_name(raw: &RawTask) -> Option<&str> {
    raw.get("name").and_then(Value::as_str)
}

/// Status of one task within one execution instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    CompletedWithErrors,
    Failed,
    FailedWithTerminalError,
    Canceled,
    TimedOut,
    Skipped,
    /// Status reported by a newer server and not modeled here
    #[serde(other)]
    Unknown,
}

/// Top-level status of an execution instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    Scheduled,
    Running,
    Paused,
    Completed,
    Failed,
    TimedOut,
    Terminated,
    Canceled,
}

impl ExecutionStatus {
    /// Whether the remote run has finished for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Terminated
        )
    }

    /// Whether the instance still occupies the workflow
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawTask {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_task_type_resolution() {
        assert_eq!(TaskType::of(&raw(json!({"type": "FORK_JOIN"}))), TaskType::ForkJoin);
        assert_eq!(TaskType::of(&raw(json!({"type": "DECISION"}))), TaskType::Decision);
        assert_eq!(TaskType::of(&raw(json!({"type": "HUMAN"}))), TaskType::Simple);
        assert_eq!(TaskType::of(&raw(json!({}))), TaskType::Simple);
    }

    #[test]
    fn test_status_wire_names() {
        let status: TaskStatus = serde_json::from_value(json!("FAILED_WITH_TERMINAL_ERROR")).unwrap();
        assert_eq!(status, TaskStatus::FailedWithTerminalError);

        let unknown: TaskStatus = serde_json::from_value(json!("SOMETHING_NEW")).unwrap();
        assert_eq!(unknown, TaskStatus::Unknown);

        assert_eq!(
            serde_json::to_value(ExecutionStatus::TimedOut).unwrap(),
            json!("TIMED_OUT")
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Terminated.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
        assert!(!ExecutionStatus::Canceled.is_terminal());
        assert!(ExecutionStatus::Paused.is_active());
    }
}
