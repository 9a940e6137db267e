//! Tool registry for node metadata resolution
//!
//! Maps the tool name stored in a task payload (`name`) to the metadata the
//! core needs about it: a display name, the schema of its outputs (for the
//! variable mapper) and, for workflow tools, the task list a sub-workflow
//! call expands into.
//!
//! # Usage
//!
//! ```
//! use workflow_tree::{ToolDefinition, ToolRegistry, VariableSchema};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(
//!     ToolDefinition::new("http", "HTTP request")
//!         .with_output(VariableSchema::new("body", "Response body")),
//! );
//! assert!(registry.contains("http"));
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Schema of one addressable value (tool output or workflow input)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSchema {
    pub name: String,
    pub display_name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Value is a list
    #[serde(default)]
    pub multiple: bool,
    /// Nested properties of an object value
    #[serde(default)]
    pub properties: Vec<VariableSchema>,
}

fn default_kind() -> String {
    "string".to_string()
}

impl VariableSchema {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            kind: default_kind(),
            multiple: false,
            properties: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_property(mut self, property: VariableSchema) -> Self {
        self.properties.push(property);
        self
    }
}

/// Metadata of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub output: Vec<VariableSchema>,
    /// Task list of a workflow tool, used to expand sub-workflow calls
    #[serde(default)]
    pub workflow_tasks: Option<Vec<Value>>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            icon: None,
            output: Vec::new(),
            workflow_tasks: None,
        }
    }

    pub fn with_output(mut self, output: VariableSchema) -> Self {
        self.output.push(output);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Mark this tool as a workflow whose calls expand into `tasks`
    pub fn with_workflow_tasks(mut self, tasks: Vec<Value>) -> Self {
        self.workflow_tasks = Some(tasks);
        self
    }
}

/// Registry of tools keyed by name
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of tool definitions
    pub fn from_json(json: &str) -> Result<Self> {
        let tools: Vec<ToolDefinition> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        Ok(registry)
    }

    /// Register a tool, replacing any previous definition with the same name
    pub fn register(&mut self, tool: ToolDefinition) {
        self.entries.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Task list a call to workflow tool `name` expands into
    pub fn workflow_tasks(&self, name: &str) -> Option<&[Value]> {
        self.entries.get(name)?.workflow_tasks.as_deref()
    }

    /// List all registered tool names, sorted
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` with the same name.
    pub fn merge(&mut self, other: ToolRegistry) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDefinition::new("http", "HTTP"));
        registry.register(ToolDefinition::new("llm", "LLM").with_icon("emoji:robot"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), vec!["http", "llm"]);
        assert_eq!(registry.get("llm").unwrap().icon.as_deref(), Some("emoji:robot"));
        assert!(registry.workflow_tasks("http").is_none());
    }

    #[test]
    fn test_from_json_with_defaults() {
        let registry = ToolRegistry::from_json(
            r#"[{"name": "summarize", "displayName": "Summarize",
                 "output": [{"name": "text", "displayName": "Text"}],
                 "workflowTasks": [{"name": "llm", "taskReferenceName": "s1", "type": "SIMPLE"}]}]"#,
        )
        .unwrap();
        let tool = registry.get("summarize").unwrap();
        assert_eq!(tool.output[0].kind, "string");
        assert_eq!(
            registry.workflow_tasks("summarize").unwrap()[0]["taskReferenceName"],
            json!("s1")
        );
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = ToolRegistry::new();
        base.register(ToolDefinition::new("http", "Old"));
        let mut plugin = ToolRegistry::new();
        plugin.register(ToolDefinition::new("http", "New"));
        plugin.register(ToolDefinition::new("csv", "CSV"));

        base.merge(plugin);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get("http").unwrap().display_name, "New");
    }
}
