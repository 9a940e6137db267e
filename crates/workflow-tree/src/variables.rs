//! Variable mapper
//!
//! Builds the table of values a node input can reference: workflow inputs,
//! environment variables and the outputs of every real node in the tree.
//! Each variable is addressable two ways, as a `${...}` template and as a
//! `$.` JSON path, and the table is keyed by both.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EnvVariable;
use crate::node::{Node, NodeKind};
use crate::registry::{ToolRegistry, VariableSchema};
use crate::tree::WorkflowTree;
use crate::types::NodeId;

/// Target segment shared by workflow inputs and environment variables
pub const WORKFLOW_INPUT_TARGET: &str = "workflow.input";

const INPUT_GROUP: &str = "Workflow input";
const ENVIRONMENT_GROUP: &str = "Environment";

/// Where a variable comes from, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableSource {
    WorkflowInput,
    Environment,
    NodeOutput,
}

/// One addressable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// `${target.name}` form
    pub template: String,
    /// `$.` JSON path form
    pub json_path: String,
    pub source: VariableSource,
    /// Producing node for node outputs
    pub node_id: Option<NodeId>,
    /// Dotted path below the target
    pub name: String,
    pub label: String,
    pub group: String,
    /// `group / label`
    pub display_name: String,
    pub kind: String,
    pub multiple: bool,
}

/// Flat table of variables keyed by both address forms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    entries: BTreeMap<String, Variable>,
}

impl VariableTable {
    /// Rebuild the whole table
    ///
    /// Earlier sources win when two produce the same address: workflow
    /// inputs shadow environment variables of the same name.
    pub fn rebuild(
        tree: &WorkflowTree,
        registry: &ToolRegistry,
        inputs: &[VariableSchema],
        env: &[EnvVariable],
    ) -> Self {
        let mut table = Self::default();

        for input in inputs {
            table.add_schema(
                input,
                "",
                &Scope {
                    source: VariableSource::WorkflowInput,
                    node_id: None,
                    group: INPUT_GROUP,
                },
            );
        }
        for variable in env {
            let schema = VariableSchema::new(&variable.name, &variable.display_name).with_kind(&variable.kind);
            table.add_schema(
                &schema,
                "",
                &Scope {
                    source: VariableSource::Environment,
                    node_id: None,
                    group: ENVIRONMENT_GROUP,
                },
            );
        }
        for node in tree.nodes_in_order() {
            if !produces_output(node) {
                continue;
            }
            let Some(tool) = node.name().and_then(|name| registry.get(name)) else {
                continue;
            };
            let group = node_group(node, &tool.display_name);
            for output in &tool.output {
                table.add_schema(
                    output,
                    "",
                    &Scope {
                        source: VariableSource::NodeOutput,
                        node_id: Some(&node.id),
                        group: &group,
                    },
                );
            }
        }
        log::debug!("variable table rebuilt with {} variables", table.len());
        table
    }

    fn add_schema(&mut self, schema: &VariableSchema, prefix: &str, scope: &Scope<'_>) {
        let name = if prefix.is_empty() {
            schema.name.clone()
        } else {
            format!("{}.{}", prefix, schema.name)
        };
        let (template, json_path) = match scope.node_id {
            Some(node_id) => (
                format!("${{{}.output.{}}}", node_id, name),
                format!("$.{}[*].{}", node_id, name),
            ),
            None => (
                format!("${{{}.{}}}", WORKFLOW_INPUT_TARGET, name),
                format!("$.{}.{}", WORKFLOW_INPUT_TARGET, name),
            ),
        };
        let label = if schema.display_name.is_empty() {
            schema.name.clone()
        } else {
            schema.display_name.clone()
        };
        let variable = Variable {
            template: template.clone(),
            json_path: json_path.clone(),
            source: scope.source,
            node_id: scope.node_id.map(str::to_string),
            name: name.clone(),
            display_name: format!("{} / {}", scope.group, label),
            label,
            group: scope.group.to_string(),
            kind: schema.kind.clone(),
            multiple: schema.multiple,
        };
        self.entries.entry(json_path).or_insert_with(|| variable.clone());
        self.entries.entry(template).or_insert(variable);

        for property in &schema.properties {
            self.add_schema(property, &name, scope);
        }
    }

    /// Look a variable up by either address form
    pub fn get(&self, address: &str) -> Option<&Variable> {
        self.entries.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    /// Every distinct variable, ordered by template
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.entries
            .iter()
            .filter(|(key, variable)| **key == variable.template)
            .map(|(_, variable)| variable)
    }

    /// Outputs produced by one node
    pub fn for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Variable> + 'a {
        self.variables()
            .filter(move |variable| variable.node_id.as_deref() == Some(node_id))
    }

    /// Number of distinct variables
    pub fn len(&self) -> usize {
        self.variables().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Scope<'a> {
    source: VariableSource,
    node_id: Option<&'a str>,
    group: &'a str,
}

fn produces_output(node: &Node) -> bool {
    !node.is_placeholder
        && !node.transient
        && !matches!(node.kind, NodeKind::Start | NodeKind::End | NodeKind::Join { .. })
}

/// Alias title if the user set one, otherwise the tool's display name
fn node_group(node: &Node, tool_display_name: &str) -> String {
    let title = node.title();
    if Some(title) == node.name() && !tool_display_name.is_empty() {
        tool_display_name.to_string()
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;
    use crate::config::FlowConfig;
    use crate::registry::ToolDefinition;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(
            ToolDefinition::new("http", "HTTP request")
                .with_output(VariableSchema::new("status", "Status code").with_kind("number"))
                .with_output(
                    VariableSchema::new("body", "Body")
                        .with_kind("object")
                        .with_property(VariableSchema::new("items", "Items").multiple()),
                ),
        );
        registry
    }

    fn tree() -> WorkflowTree {
        let tasks = vec![
            TaskBuilder::simple("fetch", "http").build(),
            TaskBuilder::fork("f")
                .with_branch(vec![TaskBuilder::simple("again", "http").with_title("Retry").build()])
                .with_branch(vec![])
                .build(),
        ];
        WorkflowTree::build(&tasks, &FlowConfig::default())
    }

    #[test]
    fn test_node_outputs_keyed_by_both_forms() {
        let table = VariableTable::rebuild(&tree(), &registry(), &[], &[]);

        let status = table.get("${fetch.output.status}").unwrap();
        assert_eq!(status.json_path, "$.fetch[*].status");
        assert_eq!(status.display_name, "HTTP request / Status code");
        assert_eq!(table.get("$.fetch[*].status"), Some(status));

        let nested = table.get("${fetch.output.body.items}").unwrap();
        assert!(nested.multiple);
        assert_eq!(nested.json_path, "$.fetch[*].body.items");

        assert_eq!(table.get("${again.output.status}").unwrap().group, "Retry");
        // two nodes with three outputs each
        assert_eq!(table.len(), 6);
        assert_eq!(table.for_node("fetch").count(), 3);
    }

    #[test]
    fn test_structural_nodes_are_skipped() {
        let table = VariableTable::rebuild(&tree(), &registry(), &[], &[]);
        assert!(table.variables().all(|v| {
            let id = v.node_id.as_deref().unwrap_or_default();
            !id.starts_with("placeholder_") && id != "f_join" && id != "f"
        }));
    }

    #[test]
    fn test_workflow_input_shadows_environment() {
        let inputs = vec![VariableSchema::new("userId", "Requested user")];
        let env = FlowConfig::default().env_variables;
        let table = VariableTable::rebuild(&tree(), &ToolRegistry::new(), &inputs, &env);

        let user = table.get("${workflow.input.userId}").unwrap();
        assert_eq!(user.source, VariableSource::WorkflowInput);
        assert_eq!(user.display_name, "Workflow input / Requested user");

        let team = table.get("$.workflow.input.teamId").unwrap();
        assert_eq!(team.source, VariableSource::Environment);
        assert_eq!(team.group, "Environment");
        assert_eq!(table.len(), env.len());
    }
}
