//! Transient sub-workflow expansion
//!
//! Before a run, calls to registered workflow tools are filled in with the
//! tasks they execute so remote task statuses have nodes to land on. The
//! expanded nodes are marked transient: they are never serialized and are
//! removed again by [`WorkflowTree::restore_sub_workflows`].

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{FlowError, Result};
use crate::node::{NodeKind, Parent};
use crate::registry::ToolRegistry;
use crate::tree::WorkflowTree;
use crate::types::{reference_name, task_name, NodeId, TaskType};

impl WorkflowTree {
    /// Expand every unexpanded call to a workflow tool
    ///
    /// Fails with [`FlowError::CycleDetected`] without touching the tree when
    /// a workflow would (directly or indirectly) expand into itself. Returns
    /// the number of sub-workflows expanded.
    pub fn expand_sub_workflows(&mut self, registry: &ToolRegistry) -> Result<usize> {
        let targets = self.expandable(registry, self.nodes.keys().cloned().collect());
        self.check_targets(registry, &targets)?;

        let mut queue = targets;
        let mut expanded = 0;
        while let Some((id, name)) = queue.pop() {
            let Some(tasks) = registry.workflow_tasks(&name) else {
                continue;
            };
            let mut refs = Vec::new();
            collect_refs(tasks, &mut refs);
            if let Some(taken) = refs.iter().find(|r| self.nodes.contains_key(r.as_str())) {
                log::warn!(
                    "not expanding '{}': task reference '{}' already exists in the tree",
                    id,
                    taken
                );
                continue;
            }

            let parent = Parent::Branch {
                owner: id.clone(),
                index: 0,
            };
            let children = self.build_sequence(tasks, &parent, true);
            let mut created = children.clone();
            for child in &children {
                created.extend(self.descendants(child));
            }
            if let Some(branch) = self
                .nodes
                .get_mut(&id)
                .and_then(|n| n.kind.branches_mut())
                .and_then(|branches| branches.first_mut())
            {
                branch.nodes = children;
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.needs_render = true;
            }
            expanded += 1;
            queue.extend(self.expandable(registry, created));
        }

        if expanded > 0 {
            log::debug!("expanded {} sub-workflow call(s)", expanded);
            self.repair_all();
        }
        Ok(expanded)
    }

    /// Fail with [`FlowError::CycleDetected`] if expanding the current
    /// sub-workflow calls would recurse; never touches the tree
    pub fn check_sub_workflows(&self, registry: &ToolRegistry) -> Result<()> {
        let targets = self.expandable(registry, self.nodes.keys().cloned().collect());
        self.check_targets(registry, &targets)
    }

    fn check_targets(&self, registry: &ToolRegistry, targets: &[(NodeId, String)]) -> Result<()> {
        for (id, name) in targets {
            let mut path: Vec<String> = self
                .ancestors(id)
                .iter()
                .filter_map(|owner| self.nodes.get(owner))
                .filter(|owner| matches!(owner.kind, NodeKind::SubWorkflow { .. }))
                .filter_map(|owner| owner.name().map(str::to_string))
                .collect();
            if path.contains(name) {
                return Err(FlowError::CycleDetected(id.clone()));
            }
            path.push(name.clone());
            if let Some(tasks) = registry.workflow_tasks(name) {
                check_expansion(registry, tasks, &mut path)?;
            }
        }
        Ok(())
    }

    /// Drop every transient node; returns how many were removed
    pub fn restore_sub_workflows(&mut self) -> usize {
        let transient: HashSet<NodeId> = self
            .nodes
            .values()
            .filter(|node| node.transient)
            .map(|node| node.id.clone())
            .collect();
        if transient.is_empty() {
            return 0;
        }
        let owners: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|node| !node.transient && matches!(node.kind, NodeKind::SubWorkflow { nested: false, .. }))
            .map(|node| node.id.clone())
            .collect();
        for owner in owners {
            if let Some(node) = self.nodes.get_mut(&owner) {
                if let Some(branches) = node.kind.branches_mut() {
                    for branch in branches.iter_mut() {
                        branch.nodes.retain(|child| !transient.contains(child));
                    }
                }
                node.needs_render = true;
            }
        }
        for id in &transient {
            self.nodes.remove(id);
        }
        log::debug!("restored sub-workflows, removed {} transient node(s)", transient.len());
        transient.len()
    }

    /// Whether any sub-workflow is currently expanded
    pub fn has_expansion(&self) -> bool {
        self.nodes.values().any(|node| node.transient)
    }

    /// Empty calls to workflow tools among `candidates`, in display order
    fn expandable(&self, registry: &ToolRegistry, candidates: Vec<NodeId>) -> Vec<(NodeId, String)> {
        let candidates: HashSet<NodeId> = candidates.into_iter().collect();
        self.nodes_in_order()
            .into_iter()
            .filter(|node| candidates.contains(&node.id))
            .filter_map(|node| match &node.kind {
                NodeKind::SubWorkflow {
                    branches,
                    nested: false,
                } if branches.iter().all(|b| b.nodes.is_empty()) => {
                    let name = node.name()?;
                    registry.workflow_tasks(name)?;
                    Some((node.id.clone(), name.to_string()))
                }
                _ => None,
            })
            .collect()
    }
}

/// Walk a task list looking for a workflow tool already on `path`
fn check_expansion(registry: &ToolRegistry, tasks: &[Value], path: &mut Vec<String>) -> Result<()> {
    for task in tasks.iter().filter_map(Value::as_object) {
        for nested in child_task_lists(task) {
            check_expansion(registry, nested, path)?;
        }
        if TaskType::of(task) != TaskType::SubWorkflow {
            continue;
        }
        let Some(name) = task_name(task) else {
            continue;
        };
        if path.iter().any(|entry| entry == name) {
            return Err(FlowError::CycleDetected(
                reference_name(task).unwrap_or(name).to_string(),
            ));
        }
        if let Some(child_tasks) = registry.workflow_tasks(name) {
            path.push(name.to_string());
            check_expansion(registry, child_tasks, path)?;
            path.pop();
        }
    }
    Ok(())
}

/// Every reference name in a task list, recursively
fn collect_refs(tasks: &[Value], out: &mut Vec<String>) {
    for task in tasks.iter().filter_map(Value::as_object) {
        if let Some(reference) = reference_name(task) {
            out.push(reference.to_string());
        }
        for nested in child_task_lists(task) {
            collect_refs(nested, out);
        }
    }
}

/// Task lists nested inside a composite payload
pub(crate) fn child_task_lists(task: &serde_json::Map<String, Value>) -> Vec<&[Value]> {
    let mut lists: Vec<&[Value]> = Vec::new();
    if let Some(branches) = task.get("forkTasks").and_then(Value::as_array) {
        lists.extend(branches.iter().filter_map(|b| b.as_array().map(Vec::as_slice)));
    }
    if let Some(cases) = task.get("decisionCases").and_then(Value::as_object) {
        lists.extend(cases.values().filter_map(|c| c.as_array().map(Vec::as_slice)));
    }
    if let Some(inline) = task
        .get("subWorkflowParam")
        .and_then(|p| p.get("workflowDefinition"))
        .and_then(|d| d.get("tasks"))
        .and_then(Value::as_array)
    {
        lists.push(inline.as_slice());
    }
    lists
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;
    use crate::config::FlowConfig;
    use crate::registry::ToolDefinition;

    fn simple(id: &str) -> Value {
        TaskBuilder::simple(id, "http").build()
    }

    fn registry(tools: Vec<(&str, Vec<Value>)>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for (name, tasks) in tools {
            registry.register(ToolDefinition::new(name, name).with_workflow_tasks(tasks));
        }
        registry
    }

    fn children(tree: &WorkflowTree, id: &str) -> Vec<NodeId> {
        tree.get(id).map(|n| n.child_ids()).unwrap_or_default()
    }

    #[test]
    fn test_expand_and_restore() {
        let registry = registry(vec![("summarize", vec![simple("s1"), simple("s2")])]);
        let tasks = vec![simple("a"), TaskBuilder::sub_workflow("call", "summarize").build()];
        let mut tree = WorkflowTree::build(&tasks, &FlowConfig::default());
        let before = tree.serialize();

        tree.check_sub_workflows(&registry).unwrap();
        assert!(!tree.has_expansion());
        assert_eq!(tree.expand_sub_workflows(&registry).unwrap(), 1);
        assert_eq!(children(&tree, "call"), vec!["s1".to_string(), "s2".to_string()]);
        assert!(tree.get("s1").unwrap().transient);
        assert!(tree.has_expansion());
        assert_eq!(tree.serialize(), before);

        // Already expanded calls are left alone.
        assert_eq!(tree.expand_sub_workflows(&registry).unwrap(), 0);

        assert_eq!(tree.restore_sub_workflows(), 2);
        assert!(children(&tree, "call").is_empty());
        assert!(!tree.contains("s1"));
        assert!(!tree.has_expansion());
    }

    #[test]
    fn test_self_expansion_is_a_cycle() {
        let registry = registry(vec![(
            "loop",
            vec![simple("before"), TaskBuilder::sub_workflow("again", "loop").build()],
        )]);
        let mut tree = WorkflowTree::build(&[TaskBuilder::sub_workflow("call", "loop").build()], &FlowConfig::default());
        let count = tree.node_count();

        assert!(matches!(tree.check_sub_workflows(&registry), Err(FlowError::CycleDetected(id)) if id == "again"));
        let err = tree.expand_sub_workflows(&registry).unwrap_err();
        assert!(matches!(err, FlowError::CycleDetected(id) if id == "again"));
        assert_eq!(tree.node_count(), count);
        assert!(!tree.has_expansion());
    }

    #[test]
    fn test_indirect_cycle_inside_fork() {
        let registry = registry(vec![
            ("a", vec![TaskBuilder::fork("fa").with_branch(vec![TaskBuilder::sub_workflow("to_b", "b").build()]).with_branch(vec![simple("x")]).build()]),
            ("b", vec![TaskBuilder::sub_workflow("to_a", "a").build()]),
        ]);
        let mut tree = WorkflowTree::build(&[TaskBuilder::sub_workflow("call", "a").build()], &FlowConfig::default());
        assert!(matches!(tree.expand_sub_workflows(&registry), Err(FlowError::CycleDetected(_))));
    }

    #[test]
    fn test_nested_calls_expand_recursively() {
        let registry = registry(vec![
            ("outer", vec![simple("o1"), TaskBuilder::sub_workflow("to_inner", "inner").build()]),
            ("inner", vec![simple("i1")]),
        ]);
        let mut tree = WorkflowTree::build(&[TaskBuilder::sub_workflow("call", "outer").build()], &FlowConfig::default());
        assert_eq!(tree.expand_sub_workflows(&registry).unwrap(), 2);
        assert_eq!(children(&tree, "to_inner"), vec!["i1".to_string()]);
        assert!(tree.is_descendant("i1", "call"));

        assert_eq!(tree.restore_sub_workflows(), 3);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_colliding_expansion_is_skipped() {
        let registry = registry(vec![("tool", vec![simple("a")])]);
        let tasks = vec![simple("a"), TaskBuilder::sub_workflow("call", "tool").build()];
        let mut tree = WorkflowTree::build(&tasks, &FlowConfig::default());
        assert_eq!(tree.expand_sub_workflows(&registry).unwrap(), 0);
        assert!(children(&tree, "call").is_empty());
    }

    #[test]
    fn test_unregistered_call_is_ignored() {
        let mut tree = WorkflowTree::build(&[TaskBuilder::sub_workflow("call", "unknown").build()], &FlowConfig::default());
        assert_eq!(tree.expand_sub_workflows(&ToolRegistry::new()).unwrap(), 0);
    }
}
