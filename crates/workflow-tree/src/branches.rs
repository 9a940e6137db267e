//! Branch/join bookkeeping and the structural repair pass
//!
//! Keeps composite nodes structurally valid: sentinels in place, forks
//! paired with exactly one join, branch counts within bounds, no empty
//! branches, and join wait sets derived from current branch tails.

use serde_json::Value;

use crate::builder::{placeholder_task, short_id};
use crate::constants::{branches as bounds, names};
use crate::node::{Branch, JoinOn, Node, NodeKind, Parent};
use crate::tree::WorkflowTree;
use crate::types::{NodeId, TaskType};

impl WorkflowTree {
    /// Restore every invariant across the whole tree
    pub fn repair_all(&mut self) {
        self.ensure_sentinels();
        let composites: Vec<NodeId> = self
            .nodes_in_order()
            .into_iter()
            .filter(|node| node.is_composite())
            .map(|node| node.id.clone())
            .collect();
        for id in &composites {
            self.repair_structure(id);
        }
        self.remove_orphan_joins();
        // Outer wait sets reference inner joins, so they resolve last.
        for id in &composites {
            self.recompute_wait_set(id);
        }
    }

    /// Restore the invariants of one composite node
    pub fn repair(&mut self, id: &str) {
        self.repair_structure(id);
        self.recompute_wait_set(id);
    }

    fn repair_structure(&mut self, id: &str) {
        let Some(task_type) = self.nodes.get(id).and_then(|n| n.kind.task_type()) else {
            return;
        };
        match task_type {
            TaskType::ForkJoin => {
                self.fill_branches(id, bounds::MIN);
                self.ensure_join(id);
            }
            TaskType::Decision => self.fill_branches(id, 1),
            TaskType::SubWorkflow => {
                let mut folded = false;
                if let Some(branches) = self.nodes.get_mut(id).and_then(|n| n.kind.branches_mut()) {
                    if branches.is_empty() {
                        branches.push(Branch::default());
                    }
                    if branches.len() > 1 {
                        let rest: Vec<NodeId> = branches.drain(1..).flat_map(|b| b.nodes).collect();
                        branches[0].nodes.extend(rest);
                        folded = true;
                    }
                }
                if folded {
                    self.reindex_children(id);
                }
            }
            TaskType::Simple | TaskType::Join => {}
        }
    }

    /// Append a branch holding one placeholder
    pub fn insert_branch(&mut self, id: &str) -> bool {
        let Some(limit) = self.branch_limit(id) else {
            return false;
        };
        let Some(count) = self.nodes.get(id).and_then(|n| n.kind.branches()).map(<[Branch]>::len) else {
            return false;
        };
        if count + 1 > limit {
            log::debug!("'{}' already has {} branches", id, count);
            return false;
        }
        let name = match self.nodes.get(id).map(|n| &n.kind) {
            Some(NodeKind::Decision { branches }) => Some(next_case_name(branches)),
            _ => None,
        };
        let placeholder = self.make_placeholder(Parent::Branch {
            owner: id.to_string(),
            index: count,
        });
        if let Some(branches) = self.nodes.get_mut(id).and_then(|n| n.kind.branches_mut()) {
            branches.push(Branch {
                name,
                nodes: vec![placeholder],
            });
        }
        self.mark_render(id);
        self.repair(id);
        true
    }

    /// Remove the branch at `index` and everything in it
    pub fn delete_branch(&mut self, id: &str, index: usize) -> bool {
        if self.branch_limit(id).is_none() {
            return false;
        }
        let Some(count) = self.nodes.get(id).and_then(|n| n.kind.branches()).map(<[Branch]>::len) else {
            return false;
        };
        if index >= count || count <= bounds::MIN {
            log::debug!("cannot delete branch {} of '{}' ({} branches)", index, id, count);
            return false;
        }
        let removed = match self.nodes.get_mut(id).and_then(|n| n.kind.branches_mut()) {
            Some(branches) => branches.remove(index),
            None => return false,
        };
        for child in removed.nodes {
            self.destroy(&child);
        }
        self.reindex_children(id);
        self.mark_render(id);
        self.repair(id);
        true
    }

    /// Select which branches the paired join waits on
    pub fn set_join_on(&mut self, fork_id: &str, join_on: JoinOn) -> bool {
        match self.nodes.get_mut(fork_id).map(|n| &mut n.kind) {
            Some(NodeKind::ForkJoin { join_on: current, .. }) => *current = join_on,
            _ => return false,
        }
        self.recompute_wait_set(fork_id);
        true
    }

    /// Rename a decision case
    ///
    /// Names must start with a letter, contain only ASCII alphanumerics and
    /// be unique within the decision.
    pub fn rename_branch(&mut self, id: &str, index: usize, name: &str) -> bool {
        let valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && name.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return false;
        }
        let Some(NodeKind::Decision { branches }) = self.nodes.get_mut(id).map(|n| &mut n.kind) else {
            return false;
        };
        let taken = branches
            .iter()
            .enumerate()
            .any(|(i, b)| i != index && b.name.as_deref() == Some(name));
        match branches.get_mut(index) {
            Some(branch) if !taken => {
                branch.name = Some(name.to_string());
                true
            }
            _ => false,
        }
    }

    /// Point the paired join at the tails of the joined branches
    ///
    /// Indices past the current branch count are dropped, not remapped.
    pub fn recompute_wait_set(&mut self, fork_id: &str) -> Option<Vec<NodeId>> {
        let (join_id, indices) = match self.nodes.get(fork_id).map(|n| &n.kind) {
            Some(NodeKind::ForkJoin {
                branches,
                join_id: Some(join_id),
                join_on,
            }) => (join_id.clone(), join_on.resolve(branches.len())),
            _ => return None,
        };
        let tails = self.branch_tails(fork_id);
        let wait_set: Vec<NodeId> = indices
            .into_iter()
            .filter_map(|index| tails.get(index).cloned().flatten())
            .collect();
        if let Some(NodeKind::Join { wait_set: current, .. }) = self.nodes.get_mut(&join_id).map(|n| &mut n.kind) {
            *current = wait_set.clone();
        }
        Some(wait_set)
    }

    /// Create a detached placeholder node
    pub(crate) fn make_placeholder(&mut self, parent: Parent) -> NodeId {
        let id = self.unique_id(&format!("{}{}", names::PLACEHOLDER_PREFIX, short_id()));
        let mut node = Node::new(id.clone(), NodeKind::Simple, placeholder_task(&id), self.node_size);
        node.parent = parent;
        node.is_placeholder = true;
        self.nodes.insert(id.clone(), node);
        id
    }

    fn ensure_sentinels(&mut self) {
        for (id, kind) in [(names::START_ID, NodeKind::Start), (names::END_ID, NodeKind::End)] {
            if !self.nodes.contains_key(id) {
                let node = Node::new(id, kind, Default::default(), self.node_size);
                self.nodes.insert(id.to_string(), node);
            }
        }
        self.sequence.retain(|id| id != names::START_ID && id != names::END_ID);
        self.sequence.insert(0, names::START_ID.to_string());
        self.sequence.push(names::END_ID.to_string());
    }

    /// Pad to `min` branches and give every empty branch a placeholder
    fn fill_branches(&mut self, id: &str, min: usize) {
        let Some(branches) = self.nodes.get(id).and_then(|n| n.kind.branches()) else {
            return;
        };
        let mut missing = min.saturating_sub(branches.len());
        let is_decision = matches!(self.nodes.get(id).map(|n| &n.kind), Some(NodeKind::Decision { .. }));
        while missing > 0 {
            let name = match self.nodes.get(id).map(|n| &n.kind) {
                Some(NodeKind::Decision { branches }) => Some(next_case_name(branches)),
                _ => None,
            };
            if let Some(branches) = self.nodes.get_mut(id).and_then(|n| n.kind.branches_mut()) {
                branches.push(Branch { name, nodes: Vec::new() });
            }
            missing -= 1;
        }

        let count = self.nodes.get(id).and_then(|n| n.kind.branches()).map_or(0, <[Branch]>::len);
        for index in 0..count {
            let parent = Parent::Branch {
                owner: id.to_string(),
                index,
            };
            let nodes = self.sequence_of(&parent).cloned().unwrap_or_default();
            let real = nodes
                .iter()
                .filter(|n| self.nodes.get(*n).is_some_and(|node| !node.is_placeholder))
                .count();
            if nodes.is_empty() {
                let placeholder = self.make_placeholder(parent.clone());
                if let Some(sequence) = self.sequence_of_mut(&parent) {
                    sequence.push(placeholder);
                }
            } else if real > 0 && real < nodes.len() {
                let (keep, drop): (Vec<NodeId>, Vec<NodeId>) = nodes
                    .into_iter()
                    .partition(|n| self.nodes.get(n).is_some_and(|node| !node.is_placeholder));
                for placeholder in &drop {
                    self.nodes.remove(placeholder);
                }
                if let Some(sequence) = self.sequence_of_mut(&parent) {
                    *sequence = keep;
                }
            } else if real == 0 && nodes.len() > 1 {
                for placeholder in &nodes[1..] {
                    self.nodes.remove(placeholder);
                }
                if let Some(sequence) = self.sequence_of_mut(&parent) {
                    sequence.truncate(1);
                }
            }
        }
        if is_decision && count > self.max_decision_branches {
            log::warn!("decision '{}' holds {} cases, above the limit", id, count);
        }
    }

    /// Locate the paired join, synthesizing one when missing or mismatched
    fn ensure_join(&mut self, fork_id: &str) {
        let (join_id, parent, transient) = match self.nodes.get(fork_id) {
            Some(Node {
                kind: NodeKind::ForkJoin { join_id, .. },
                parent,
                transient,
                ..
            }) => (join_id.clone(), parent.clone(), *transient),
            _ => return,
        };

        let paired = join_id.as_ref().and_then(|j| self.nodes.get(j)).map(|join| {
            matches!(&join.kind, NodeKind::Join { fork_id: f, .. } if f == fork_id)
        });
        match (join_id, paired) {
            (Some(join_id), Some(true)) => {
                if let Some(join) = self.nodes.get_mut(&join_id) {
                    join.parent = parent;
                }
            }
            (requested, paired) => {
                // A join id taken by another node is a mismatch; forget the stored selection.
                let mismatched = paired == Some(false);
                let base = requested
                    .filter(|_| !mismatched)
                    .unwrap_or_else(|| format!("{}{}", fork_id, names::JOIN_SUFFIX));
                let id = self.unique_id(&base);
                let raw = serde_json::json!({
                    "name": "join",
                    "taskReferenceName": id,
                    "type": "JOIN",
                });
                let raw = match raw {
                    Value::Object(raw) => raw,
                    _ => Default::default(),
                };
                let mut join = Node::new(
                    id.clone(),
                    NodeKind::Join {
                        fork_id: fork_id.to_string(),
                        wait_set: Vec::new(),
                        explicit: false,
                    },
                    raw,
                    self.node_size,
                );
                join.parent = parent;
                join.transient = transient;
                self.nodes.insert(id.clone(), join);
                if let Some(NodeKind::ForkJoin { join_id, join_on, .. }) = self.nodes.get_mut(fork_id).map(|n| &mut n.kind) {
                    *join_id = Some(id.clone());
                    if mismatched {
                        *join_on = JoinOn::All;
                    }
                }
                log::debug!("synthesized join '{}' for fork '{}'", id, fork_id);
            }
        }
    }

    fn remove_orphan_joins(&mut self) {
        let orphans: Vec<NodeId> = self
            .nodes
            .values()
            .filter_map(|node| match &node.kind {
                NodeKind::Join { fork_id, .. } => {
                    let paired = matches!(
                        self.nodes.get(fork_id).map(|f| &f.kind),
                        Some(NodeKind::ForkJoin { join_id: Some(j), .. }) if *j == node.id
                    );
                    (!paired).then(|| node.id.clone())
                }
                _ => None,
            })
            .collect();
        for id in orphans {
            log::debug!("removing orphaned join '{}'", id);
            self.nodes.remove(&id);
        }
    }

    /// Re-point children at their branch index after branches shifted
    fn reindex_children(&mut self, id: &str) {
        let Some(branches) = self.nodes.get(id).and_then(|n| n.kind.branches()) else {
            return;
        };
        let moves: Vec<(NodeId, usize)> = branches
            .iter()
            .enumerate()
            .flat_map(|(index, branch)| branch.nodes.iter().map(move |child| (child.clone(), index)))
            .collect();
        for (child, index) in moves {
            self.set_parent(
                &child,
                Parent::Branch {
                    owner: id.to_string(),
                    index,
                },
            );
        }
    }

    fn mark_render(&mut self, id: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.needs_render = true;
        }
    }
}

/// Smallest `branch{n}` not used by an existing case
fn next_case_name(branches: &[Branch]) -> String {
    (1..)
        .map(|n| format!("{}{}", bounds::DECISION_PREFIX, n))
        .find(|name| branches.iter().all(|b| b.name.as_deref() != Some(name.as_str())))
        .unwrap_or_else(|| bounds::DECISION_PREFIX.to_string())
}
