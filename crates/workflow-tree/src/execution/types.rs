//! Remote execution records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ExecutionStatus, TaskStatus};

/// Fields that change on every poll without meaning progress
pub const VOLATILE_FIELDS: &[&str] = &[
    "createTime",
    "updateTime",
    "startTime",
    "endTime",
    "workflowVersion",
    "workflowName",
    "workflowDefinition",
    "startBy",
    "triggerType",
];

/// One task record of a remote execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    #[serde(rename = "referenceTaskName", alias = "taskReferenceName")]
    pub reference_name: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Everything else the service reports (input, output, timings)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteTask {
    pub fn new(reference_name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            reference_name: reference_name.into(),
            status,
            extra: Map::new(),
        }
    }

    /// The full record as reported, for storing on the matching node
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// State of one remote execution instance as returned by a fetch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default)]
    pub tasks: Vec<RemoteTask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionSnapshot {
    pub fn new(status: ExecutionStatus, tasks: Vec<RemoteTask>) -> Self {
        Self {
            status,
            tasks,
            extra: Map::new(),
        }
    }

    /// The snapshot with volatile fields removed, for change detection
    pub fn fingerprint(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        strip_volatile(&mut value);
        if let Some(tasks) = value.get_mut("tasks").and_then(Value::as_array_mut) {
            tasks.iter_mut().for_each(strip_volatile);
        }
        value
    }

    /// Whether `other` differs in anything but volatile fields
    pub fn differs_from(&self, other: &ExecutionSnapshot) -> bool {
        self.fingerprint() != other.fingerprint()
    }

    pub fn task(&self, reference_name: &str) -> Option<&RemoteTask> {
        self.tasks.iter().find(|t| t.reference_name == reference_name)
    }
}

fn strip_volatile(value: &mut Value) {
    if let Some(object) = value.as_object_mut() {
        for field in VOLATILE_FIELDS {
            object.remove(*field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_remote_snapshot() {
        let snapshot: ExecutionSnapshot = serde_json::from_value(json!({
            "status": "RUNNING",
            "workflowId": "wf-1",
            "updateTime": 1700000000,
            "tasks": [
                {"referenceTaskName": "a", "status": "COMPLETED", "outputData": {"x": 1}},
                {"taskReferenceName": "b", "status": "IN_PROGRESS"}
            ]
        }))
        .unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Running);
        assert_eq!(snapshot.task("a").unwrap().extra["outputData"], json!({"x": 1}));
        assert_eq!(snapshot.task("b").unwrap().status, TaskStatus::InProgress);
        assert_eq!(snapshot.extra["workflowId"], json!("wf-1"));
    }

    #[test]
    fn test_volatile_fields_do_not_count_as_change() {
        let mut first = ExecutionSnapshot::new(ExecutionStatus::Running, vec![RemoteTask::new("a", TaskStatus::InProgress)]);
        first.extra.insert("updateTime".into(), json!(1));
        let mut second = first.clone();
        second.extra.insert("updateTime".into(), json!(2));
        second.tasks[0].extra.insert("startTime".into(), json!(5));
        assert!(!first.differs_from(&second));

        second.tasks[0].status = TaskStatus::Completed;
        assert!(first.differs_from(&second));
    }
}
