//! Fluent builders for raw task payloads
//!
//! Provides a small API for constructing task lists programmatically,
//! mainly for seeding new nodes from a tool palette and for tests.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::constants::names;
use crate::types::{RawTask, TaskType};

/// Generate a short random suffix for reference names
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Raw payload of an empty-branch filler
pub fn placeholder_task(reference: &str) -> RawTask {
    let mut raw = Map::new();
    raw.insert("name".into(), json!(names::PLACEHOLDER_NAME));
    raw.insert("taskReferenceName".into(), json!(reference));
    raw.insert("type".into(), json!(TaskType::Simple.as_str()));
    raw
}

/// Whether a reference name marks a placeholder
pub fn is_placeholder_ref(reference: &str) -> bool {
    reference.starts_with(names::PLACEHOLDER_PREFIX)
}

/// Fluent builder for a single raw task
///
/// # Example
///
/// ```
/// use workflow_tree::TaskBuilder;
///
/// let fork = TaskBuilder::fork("fork1")
///     .with_branch(vec![TaskBuilder::simple("b1", "http").build()])
///     .with_branch(vec![TaskBuilder::simple("b2", "http").build()])
///     .build();
/// assert_eq!(fork["forkTasks"].as_array().map(Vec::len), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    raw: RawTask,
}

impl TaskBuilder {
    fn with_type(reference: impl Into<String>, name: impl Into<String>, task_type: TaskType) -> Self {
        let mut raw = Map::new();
        raw.insert("name".into(), Value::String(name.into()));
        raw.insert("taskReferenceName".into(), Value::String(reference.into()));
        raw.insert("type".into(), json!(task_type.as_str()));
        Self { raw }
    }

    /// A leaf task calling tool `name`
    pub fn simple(reference: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_type(reference, name, TaskType::Simple)
    }

    /// A fork-join with no branches yet
    pub fn fork(reference: impl Into<String>) -> Self {
        let mut builder = Self::with_type(reference, "fork_join", TaskType::ForkJoin);
        builder.raw.insert("forkTasks".into(), json!([]));
        builder
    }

    /// An explicit join waiting on the given branch-tail references
    pub fn join(reference: impl Into<String>, join_on: &[&str]) -> Self {
        let mut builder = Self::with_type(reference, "join", TaskType::Join);
        builder.raw.insert("joinOn".into(), json!(join_on));
        builder
    }

    /// A decision with no cases yet
    pub fn decision(reference: impl Into<String>) -> Self {
        let mut builder = Self::with_type(reference, "switch", TaskType::Decision);
        builder.raw.insert("decisionCases".into(), json!({}));
        builder
    }

    /// A sub-workflow call to the registered workflow tool `name`
    pub fn sub_workflow(reference: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut builder = Self::with_type(reference, name.clone(), TaskType::SubWorkflow);
        builder
            .raw
            .insert("subWorkflowParam".into(), json!({ "name": name }));
        builder
    }

    /// Append a fork branch
    pub fn with_branch(mut self, tasks: Vec<Value>) -> Self {
        if let Some(Value::Array(branches)) = self.raw.get_mut("forkTasks") {
            branches.push(Value::Array(tasks));
        }
        self
    }

    /// Append a decision case
    pub fn with_case(mut self, name: impl Into<String>, tasks: Vec<Value>) -> Self {
        if let Some(Value::Object(cases)) = self.raw.get_mut("decisionCases") {
            cases.insert(name.into(), Value::Array(tasks));
        }
        self
    }

    /// Inline definition of a nested sub-workflow
    pub fn with_nested_tasks(mut self, tasks: Vec<Value>) -> Self {
        let param = self
            .raw
            .entry("subWorkflowParam")
            .or_insert_with(|| json!({}));
        if let Value::Object(param) = param {
            param.insert("workflowDefinition".into(), json!({ "tasks": tasks }));
        }
        self
    }

    /// Set an arbitrary pass-through field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.raw.insert(key.into(), value);
        self
    }

    /// Set the user-facing title alias
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_field(names::ALIAS_FIELD, json!({ "title": title.into() }))
    }

    pub fn build(self) -> Value {
        Value::Object(self.raw)
    }
}

/// Seed a new task for insertion from a palette
///
/// Composite types start with two placeholder-filled branches so the
/// inserted node is structurally complete.
pub fn new_task(task_type: TaskType, name: &str) -> Value {
    let reference = format!("{}_{}", name, short_id());
    let filler = || Value::Object(placeholder_task(&format!("{}{}", names::PLACEHOLDER_PREFIX, short_id())));
    match task_type {
        TaskType::ForkJoin => TaskBuilder::fork(reference)
            .with_field("name", json!(name))
            .with_branch(vec![filler()])
            .with_branch(vec![filler()])
            .build(),
        TaskType::Decision => TaskBuilder::decision(reference)
            .with_field("name", json!(name))
            .with_case("branch1", vec![filler()])
            .with_case("branch2", vec![filler()])
            .build(),
        TaskType::SubWorkflow => TaskBuilder::sub_workflow(reference, name).build(),
        TaskType::Join => TaskBuilder::join(reference, &[]).build(),
        TaskType::Simple => TaskBuilder::simple(reference, name).build(),
    }
}
