//! Workflow tree: building from raw tasks, CRUD and serialization
//!
//! The tree is a flat arena of [`Node`]s keyed by reference name plus the
//! top-level sequence. Composite nodes hold their branches as id lists and
//! every node links back to the sequence containing it, so locating,
//! moving and cascade-destroying nodes never needs owning pointers.
//!
//! Every public mutation ends with the structural repair pass from
//! [`crate::branches`], so the tree invariants hold between calls.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Map, Value};

use crate::builder::is_placeholder_ref;
use crate::config::FlowConfig;
use crate::constants::names;
use crate::error::{FlowError, Result};
use crate::expansion::child_task_lists;
use crate::node::{Branch, JoinOn, Node, NodeKind, Parent};
use crate::types::{reference_name, task_name, NodeId, RawTask, Size, TaskType};

/// Editable workflow tree
#[derive(Debug, Clone)]
pub struct WorkflowTree {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) sequence: Vec<NodeId>,
    pub(crate) node_size: Size,
    pub(crate) max_branches: usize,
    pub(crate) max_decision_branches: usize,
}

/// Where new nodes go in a sequence
struct InsertionPoint {
    parent: Parent,
    index: usize,
    /// Placeholder consumed by the insertion
    replaces: Option<NodeId>,
}

impl WorkflowTree {
    /// Create a tree holding only the Start and End sentinels
    pub fn new(config: &FlowConfig) -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            sequence: Vec::new(),
            node_size: config.node_size,
            max_branches: config.max_branches,
            max_decision_branches: config.max_decision_branches,
        };
        for (id, kind) in [(names::START_ID, NodeKind::Start), (names::END_ID, NodeKind::End)] {
            let node = Node::new(id, kind, Map::new(), tree.node_size);
            tree.nodes.insert(id.to_string(), node);
            tree.sequence.push(id.to_string());
        }
        tree
    }

    /// Build a tree from an ordered task list
    pub fn build(tasks: &[Value], config: &FlowConfig) -> Self {
        let mut tree = Self::new(config);
        if let Some(reference) = tree.oversized_composite(tasks) {
            log::warn!(
                "'{}' has more branches than allowed; extra branches are kept as loaded",
                reference
            );
        }
        let ids = tree.build_sequence(tasks, &Parent::Root, false);
        tree.sequence.splice(1..1, ids);
        tree.repair_all();
        log::debug!("built workflow tree with {} nodes", tree.nodes.len());
        tree
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes including sentinels and joins
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Top-level entries, Start first and End last; joins ride with their fork
    pub fn top_level(&self) -> &[NodeId] {
        &self.sequence
    }

    pub fn start_id(&self) -> &str {
        names::START_ID
    }

    pub fn end_id(&self) -> &str {
        names::END_ID
    }

    /// Size given to nodes created by this tree
    pub fn node_size(&self) -> Size {
        self.node_size
    }

    /// Upper bound of branches for a composite, if it has one
    pub fn branch_limit(&self, id: &str) -> Option<usize> {
        match self.nodes.get(id)?.kind {
            NodeKind::ForkJoin { .. } => Some(self.max_branches),
            NodeKind::Decision { .. } => Some(self.max_decision_branches),
            _ => None,
        }
    }

    /// Every node in display order: depth-first, joins right after their fork
    pub fn nodes_in_order(&self) -> Vec<&Node> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_in_order(&self.sequence, &mut out);
        out
    }

    fn collect_in_order<'a>(&'a self, ids: &[NodeId], out: &mut Vec<&'a Node>) {
        for id in ids {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            out.push(node);
            if let Some(branches) = node.kind.branches() {
                for branch in branches {
                    self.collect_in_order(&branch.nodes, out);
                }
            }
            if let NodeKind::ForkJoin {
                join_id: Some(join_id),
                ..
            } = &node.kind
            {
                if let Some(join) = self.nodes.get(join_id) {
                    out.push(join);
                }
            }
        }
    }

    /// Ids of everything owned by `id`: branch nodes, nested joins and its own join
    pub fn descendants(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(id) else {
            return out;
        };
        if let Some(branches) = node.kind.branches() {
            for branch in branches {
                for child in &branch.nodes {
                    out.push(child.clone());
                    out.extend(self.descendants(child));
                }
            }
        }
        if let NodeKind::ForkJoin {
            join_id: Some(join_id),
            ..
        } = &node.kind
        {
            out.push(join_id.clone());
        }
        out
    }

    /// Whether `candidate` lies inside the subtree owned by `ancestor`
    pub fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut current = candidate.to_string();
        let mut seen = HashSet::new();
        while seen.insert(current.clone()) {
            let Some(node) = self.nodes.get(&current) else {
                return false;
            };
            current = match (&node.kind, &node.parent) {
                (NodeKind::Join { fork_id, .. }, _) => fork_id.clone(),
                (_, Parent::Branch { owner, .. }) => owner.clone(),
                (_, Parent::Root) => return false,
            };
            if current == ancestor {
                return true;
            }
        }
        false
    }

    /// Composite owners enclosing `id`, innermost first
    pub fn ancestors(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut parent = self.nodes.get(id).map(|n| n.parent.clone());
        while let Some(Parent::Branch { owner, .. }) = parent {
            if out.contains(&owner) {
                break;
            }
            parent = self.nodes.get(&owner).map(|n| n.parent.clone());
            out.push(owner);
        }
        out
    }

    /// Check that every node is reachable exactly once from the top level
    pub fn validate_acyclic(&self) -> Result<()> {
        let mut visited = HashSet::new();
        self.visit_once(&self.sequence, &mut visited)
    }

    fn visit_once(&self, ids: &[NodeId], visited: &mut HashSet<NodeId>) -> Result<()> {
        for id in ids {
            if !visited.insert(id.clone()) {
                return Err(FlowError::CycleDetected(id.clone()));
            }
            if let Some(branches) = self.nodes.get(id).and_then(|n| n.kind.branches()) {
                for branch in branches {
                    self.visit_once(&branch.nodes, visited)?;
                }
            }
        }
        Ok(())
    }

    /// First placeholder in display order
    pub fn first_placeholder(&self) -> Option<&NodeId> {
        self.nodes_in_order()
            .into_iter()
            .find(|node| node.is_placeholder)
            .map(|node| &node.id)
    }

    /// Sequence index of a node within its containing sequence
    pub fn locate(&self, id: &str) -> Option<(Parent, usize)> {
        let node = self.nodes.get(id)?;
        let index = self
            .sequence_of(&node.parent)?
            .iter()
            .position(|entry| entry == id)?;
        Some((node.parent.clone(), index))
    }

    pub(crate) fn sequence_of(&self, parent: &Parent) -> Option<&Vec<NodeId>> {
        match parent {
            Parent::Root => Some(&self.sequence),
            Parent::Branch { owner, index } => self
                .nodes
                .get(owner)?
                .kind
                .branches()?
                .get(*index)
                .map(|branch| &branch.nodes),
        }
    }

    pub(crate) fn sequence_of_mut(&mut self, parent: &Parent) -> Option<&mut Vec<NodeId>> {
        match parent {
            Parent::Root => Some(&mut self.sequence),
            Parent::Branch { owner, index } => self
                .nodes
                .get_mut(owner)?
                .kind
                .branches_mut()?
                .get_mut(*index)
                .map(|branch| &mut branch.nodes),
        }
    }

    // =========================================================================
    // Building
    // =========================================================================

    pub(crate) fn unique_id(&self, base: &str) -> NodeId {
        if !self.nodes.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn build_sequence(&mut self, tasks: &[Value], parent: &Parent, transient: bool) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(tasks.len());
        let mut index = 0;
        while index < tasks.len() {
            let Some(raw) = tasks[index].as_object() else {
                log::warn!("skipping non-object task at index {}", index);
                index += 1;
                continue;
            };
            let id = self.build_node(raw.clone(), parent.clone(), transient);
            if matches!(self.nodes.get(&id).map(|n| &n.kind), Some(NodeKind::ForkJoin { .. })) {
                let next = tasks.get(index + 1).and_then(Value::as_object);
                if let Some(join_raw) = next.filter(|raw| TaskType::of(raw) == TaskType::Join) {
                    self.attach_explicit_join(&id, join_raw.clone());
                    index += 1;
                }
            }
            ids.push(id);
            index += 1;
        }
        ids
    }

    /// Construct one node (and its subtree) from a raw task
    pub(crate) fn build_node(&mut self, mut raw: RawTask, parent: Parent, transient: bool) -> NodeId {
        let task_type = TaskType::of(&raw);
        let base = reference_name(&raw)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", task_name(&raw).unwrap_or("task"), crate::builder::short_id()));
        let id = self.unique_id(&base);
        if id != base {
            log::warn!("duplicate reference name '{}' renamed to '{}'", base, id);
        }
        raw.insert("taskReferenceName".into(), json!(id));

        let (kind, branch_tasks) = match task_type {
            TaskType::Simple => (NodeKind::Simple, Vec::new()),
            TaskType::Join => {
                log::warn!("join '{}' does not follow a fork; treating it as a simple task", id);
                (NodeKind::Simple, Vec::new())
            }
            TaskType::ForkJoin => {
                let (branches, join_id, join_on) = take_fork_structure(&mut raw);
                let kind = NodeKind::ForkJoin {
                    branches: branches.iter().map(|_| Branch::default()).collect(),
                    join_id,
                    join_on,
                };
                (kind, branches.into_iter().map(|tasks| (None, tasks)).collect())
            }
            TaskType::Decision => {
                let cases = take_decision_cases(&mut raw);
                let kind = NodeKind::Decision {
                    branches: cases
                        .iter()
                        .map(|(name, _)| Branch::named(name.clone(), Vec::new()))
                        .collect(),
                };
                (kind, cases.into_iter().map(|(name, tasks)| (Some(name), tasks)).collect())
            }
            TaskType::SubWorkflow => {
                let nested_tasks = take_nested_tasks(&mut raw);
                let nested = nested_tasks.is_some() || id.starts_with(names::NESTED_SUB_WORKFLOW_PREFIX);
                let kind = NodeKind::SubWorkflow {
                    branches: vec![Branch::default()],
                    nested,
                };
                (kind, vec![(None, nested_tasks.unwrap_or_default())])
            }
        };

        let mut node = Node::new(id.clone(), kind, raw, self.node_size);
        node.parent = parent;
        node.transient = transient;
        node.is_placeholder = is_placeholder_ref(&id);
        self.nodes.insert(id.clone(), node);

        for (index, (_, tasks)) in branch_tasks.iter().enumerate() {
            let child_parent = Parent::Branch {
                owner: id.clone(),
                index,
            };
            let children = self.build_sequence(tasks, &child_parent, transient);
            if let Some(branch) = self
                .nodes
                .get_mut(&id)
                .and_then(|n| n.kind.branches_mut())
                .and_then(|branches| branches.get_mut(index))
            {
                branch.nodes = children;
            }
        }
        id
    }

    fn attach_explicit_join(&mut self, fork_id: &str, raw: RawTask) {
        let refs: Vec<String> = raw
            .get("joinOn")
            .and_then(Value::as_array)
            .map(|refs| refs.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let tails = self.branch_tails(fork_id);
        let indices: Vec<usize> = tails
            .iter()
            .enumerate()
            .filter(|(_, tail)| tail.as_ref().is_some_and(|t| refs.contains(t)))
            .map(|(index, _)| index)
            .collect();
        let join_on = if refs.is_empty() || indices.len() == tails.len() {
            JoinOn::All
        } else {
            JoinOn::Indices(indices)
        };

        let base = reference_name(&raw)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", fork_id, names::JOIN_SUFFIX));
        let join_id = self.unique_id(&base);
        let mut raw = raw;
        raw.insert("taskReferenceName".into(), json!(join_id));

        let Some(fork) = self.nodes.get_mut(fork_id) else {
            return;
        };
        let parent = fork.parent.clone();
        let transient = fork.transient;
        if let NodeKind::ForkJoin {
            join_id: fork_join,
            join_on: fork_join_on,
            ..
        } = &mut fork.kind
        {
            *fork_join = Some(join_id.clone());
            *fork_join_on = join_on;
        }
        let mut join = Node::new(
            join_id.clone(),
            NodeKind::Join {
                fork_id: fork_id.to_string(),
                wait_set: Vec::new(),
                explicit: true,
            },
            raw,
            self.node_size,
        );
        join.parent = parent;
        join.transient = transient;
        self.nodes.insert(join_id, join);
    }

    /// First fork or decision in `tasks` (at any depth) whose branch count
    /// exceeds its limit
    pub(crate) fn oversized_composite(&self, tasks: &[Value]) -> Option<String> {
        for task in tasks.iter().filter_map(Value::as_object) {
            let count = match TaskType::of(task) {
                TaskType::ForkJoin => task.get("forkTasks").and_then(Value::as_array).map(Vec::len),
                TaskType::Decision => task.get("decisionCases").and_then(Value::as_object).map(Map::len),
                _ => None,
            };
            let limit = match TaskType::of(task) {
                TaskType::Decision => self.max_decision_branches,
                _ => self.max_branches,
            };
            if count.is_some_and(|count| count > limit) {
                return Some(reference_name(task).unwrap_or_default().to_string());
            }
            let nested = child_task_lists(task)
                .into_iter()
                .find_map(|list| self.oversized_composite(list));
            if nested.is_some() {
                return nested;
            }
        }
        None
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Insert raw tasks next to `target_id`
    ///
    /// Returns false when the target is missing, a composite in `tasks` has
    /// more branches than allowed, or the insertion would nest a sub-workflow
    /// inside itself.
    pub fn insert(&mut self, target_id: &str, tasks: &[Value], insert_before: bool, cascade: bool) -> bool {
        let Some(point) = self.insertion_point(target_id, insert_before) else {
            log::debug!("insert target '{}' not found", target_id);
            return false;
        };
        if let Some(reference) = self.oversized_composite(tasks) {
            log::warn!("refusing to insert '{}': too many branches", reference);
            return false;
        }
        if let Some(name) = self.recursive_sub_workflow(&point.parent, tasks) {
            log::warn!("refusing to nest sub-workflow '{}' inside itself", name);
            return false;
        }
        let ids = self.build_sequence(tasks, &point.parent, false);
        self.splice(point, ids.clone());
        if cascade {
            for id in &ids {
                self.after_insert(id);
            }
        }
        self.repair_all();
        true
    }

    /// Delete a node and everything it owns
    pub fn delete(&mut self, target_id: &str, cascade: bool) -> bool {
        let Some(node) = self.nodes.get(target_id) else {
            return false;
        };
        if node.kind.is_sentinel() || matches!(node.kind, NodeKind::Join { .. }) {
            log::debug!("'{}' cannot be deleted directly", target_id);
            return false;
        }
        let Some((parent, index)) = self.locate(target_id) else {
            return false;
        };
        if let Some(sequence) = self.sequence_of_mut(&parent) {
            sequence.remove(index);
        }
        self.destroy(target_id);
        if cascade {
            self.after_delete(&parent);
        }
        self.repair_all();
        true
    }

    /// Move `source_id` next to `target_id`
    ///
    /// Top-level moves, moves into branches and moves between branches all
    /// detach the source first, so the target index already accounts for
    /// the removal.
    pub fn move_node(&mut self, source_id: &str, target_id: &str, insert_before: bool, cascade: bool) -> Result<()> {
        let source = self.nodes.get(source_id).ok_or_else(|| FlowError::not_found(source_id))?;
        if source.kind.is_sentinel() || matches!(source.kind, NodeKind::Join { .. }) {
            return Err(FlowError::InvalidMove(format!("'{}' cannot be moved", source_id)));
        }
        if !self.nodes.contains_key(target_id) {
            return Err(FlowError::not_found(target_id));
        }
        if source_id == target_id || self.is_descendant(target_id, source_id) {
            return Err(FlowError::MoveIntoDescendant {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            });
        }
        let (from, index) = self.locate(source_id).ok_or_else(|| FlowError::not_found(source_id))?;
        if self.insertion_point(target_id, insert_before).is_none() {
            return Err(FlowError::not_found(target_id));
        }

        if let Some(sequence) = self.sequence_of_mut(&from) {
            sequence.remove(index);
        }
        let Some(point) = self.insertion_point(target_id, insert_before) else {
            // Target became unreachable by the detach; put the source back.
            if let Some(sequence) = self.sequence_of_mut(&from) {
                sequence.insert(index, source_id.to_string());
            }
            return Err(FlowError::not_found(target_id));
        };
        let to = point.parent.clone();
        self.splice(point, vec![source_id.to_string()]);
        if cascade {
            self.after_move(&from, &to);
        }
        self.repair_all();
        Ok(())
    }

    /// Replace a node's payload and re-derive its substructure
    ///
    /// Payloads holding a composite with too many branches are refused.
    pub fn update_raw(&mut self, node_id: &str, raw: &Value) -> bool {
        if let Some(reference) = self.oversized_composite(std::slice::from_ref(raw)) {
            log::warn!("refusing to update '{}': '{}' has too many branches", node_id, reference);
            return false;
        }
        let Some(raw) = raw.as_object().cloned() else {
            return false;
        };
        let Some(node) = self.nodes.get(node_id) else {
            return false;
        };
        if node.kind.is_sentinel() {
            return false;
        }
        let same_id = reference_name(&raw).map_or(true, |r| r == node_id);
        let same_type = node.kind.task_type() == Some(TaskType::of(&raw));
        let join_fork = match &node.kind {
            NodeKind::Join { fork_id, .. } => Some(fork_id.clone()),
            _ => None,
        };

        if let Some(fork_id) = join_fork {
            self.update_join(node_id, &fork_id, raw);
        } else if same_id && same_type {
            self.refresh_node(node_id, raw);
        } else {
            let Some((parent, index)) = self.locate(node_id) else {
                return false;
            };
            if let Some(sequence) = self.sequence_of_mut(&parent) {
                sequence.remove(index);
            }
            self.destroy(node_id);
            let id = self.build_node(raw, parent.clone(), false);
            if let Some(sequence) = self.sequence_of_mut(&parent) {
                sequence.insert(index, id);
            }
        }
        self.repair_all();
        true
    }

    /// Same-type payload refresh, reusing direct children that keep their id
    fn refresh_node(&mut self, node_id: &str, mut raw: RawTask) {
        raw.insert("taskReferenceName".into(), json!(node_id));
        let Some((kind, transient)) = self.nodes.get(node_id).map(|n| (n.kind.clone(), n.transient)) else {
            return;
        };
        let new_branches: Vec<(Option<String>, Vec<Value>)> = match &kind {
            NodeKind::ForkJoin { .. } => {
                let (branches, _, join_on) = take_fork_structure(&mut raw);
                if let Some(NodeKind::ForkJoin { join_on: current, .. }) = self.nodes.get_mut(node_id).map(|n| &mut n.kind) {
                    *current = join_on;
                }
                branches.into_iter().map(|tasks| (None, tasks)).collect()
            }
            NodeKind::Decision { .. } => take_decision_cases(&mut raw)
                .into_iter()
                .map(|(name, tasks)| (Some(name), tasks))
                .collect(),
            NodeKind::SubWorkflow { nested: true, .. } => {
                vec![(None, take_nested_tasks(&mut raw).unwrap_or_default())]
            }
            _ => Vec::new(),
        };
        let rebuild_children =
            kind.branches().is_some() && !matches!(kind, NodeKind::SubWorkflow { nested: false, .. });

        if rebuild_children {
            let incoming: HashMap<String, TaskType> = new_branches
                .iter()
                .flat_map(|(_, tasks)| tasks.iter())
                .filter_map(Value::as_object)
                .filter_map(|task| reference_name(task).map(|r| (r.to_string(), TaskType::of(task))))
                .collect();
            let mut reusable = HashSet::new();
            for child in self.nodes.get(node_id).map(Node::child_ids).unwrap_or_default() {
                let keep = self
                    .nodes
                    .get(&child)
                    .and_then(|n| n.kind.task_type())
                    .is_some_and(|t| incoming.get(&child) == Some(&t));
                if keep {
                    reusable.insert(child);
                } else {
                    self.destroy(&child);
                }
            }

            let mut branches = Vec::with_capacity(new_branches.len());
            for (index, (name, tasks)) in new_branches.iter().enumerate() {
                let parent = Parent::Branch {
                    owner: node_id.to_string(),
                    index,
                };
                let mut ids = Vec::with_capacity(tasks.len());
                for task in tasks.iter().filter_map(Value::as_object) {
                    let reused = reference_name(task).filter(|r| reusable.remove(*r)).map(str::to_string);
                    let id = match reused {
                        Some(id) => {
                            self.set_parent(&id, parent.clone());
                            self.refresh_node(&id, task.clone());
                            id
                        }
                        None => self.build_node(task.clone(), parent.clone(), transient),
                    };
                    ids.push(id);
                }
                branches.push(Branch { name: name.clone(), nodes: ids });
            }
            // Ids listed twice in the payload are only reused once.
            for leftover in reusable {
                self.destroy(&leftover);
            }
            if let Some(slot) = self.nodes.get_mut(node_id).and_then(|n| n.kind.branches_mut()) {
                *slot = branches;
            }
        }

        if let Some(node) = self.nodes.get_mut(node_id) {
            node.raw = raw;
            node.needs_render = true;
        }
    }

    fn update_join(&mut self, join_id: &str, fork_id: &str, mut raw: RawTask) {
        raw.insert("taskReferenceName".into(), json!(join_id));
        let refs: Option<Vec<String>> = raw.get("joinOn").and_then(Value::as_array).map(|refs| {
            refs.iter().filter_map(|r| r.as_str().map(str::to_string)).collect()
        });
        if let Some(refs) = refs {
            let tails = self.branch_tails(fork_id);
            let indices: Vec<usize> = tails
                .iter()
                .enumerate()
                .filter(|(_, tail)| tail.as_ref().is_some_and(|t| refs.contains(t)))
                .map(|(index, _)| index)
                .collect();
            let join_on = if indices.len() == tails.len() {
                JoinOn::All
            } else {
                JoinOn::Indices(indices)
            };
            if let Some(NodeKind::ForkJoin { join_on: current, .. }) = self.nodes.get_mut(fork_id).map(|n| &mut n.kind) {
                *current = join_on;
            }
        }
        if let Some(join) = self.nodes.get_mut(join_id) {
            join.raw = raw;
            join.needs_render = true;
        }
    }

    /// Where tasks inserted relative to `target_id` land
    fn insertion_point(&self, target_id: &str, insert_before: bool) -> Option<InsertionPoint> {
        let node = self.nodes.get(target_id)?;
        let (anchor, before) = match &node.kind {
            NodeKind::Start => (target_id, false),
            NodeKind::End => (target_id, true),
            NodeKind::Join { fork_id, .. } => (fork_id.as_str(), false),
            _ => (target_id, insert_before),
        };
        let (parent, index) = self.locate(anchor)?;
        if node.is_placeholder {
            return Some(InsertionPoint {
                parent,
                index,
                replaces: Some(target_id.to_string()),
            });
        }
        Some(InsertionPoint {
            parent,
            index: if before { index } else { index + 1 },
            replaces: None,
        })
    }

    fn splice(&mut self, point: InsertionPoint, ids: Vec<NodeId>) {
        let InsertionPoint { parent, index, replaces } = point;
        for id in &ids {
            self.set_parent(id, parent.clone());
        }
        if let Some(sequence) = self.sequence_of_mut(&parent) {
            let index = index.min(sequence.len());
            let remove = usize::from(replaces.is_some() && index < sequence.len());
            sequence.splice(index..index + remove, ids);
        }
        if let Some(placeholder) = replaces {
            self.destroy(&placeholder);
        }
    }

    /// Point a node (and its join) at a new containing sequence
    pub(crate) fn set_parent(&mut self, id: &str, parent: Parent) {
        let join_id = match self.nodes.get_mut(id) {
            Some(node) => {
                node.parent = parent.clone();
                node.needs_render = true;
                match &node.kind {
                    NodeKind::ForkJoin { join_id, .. } => join_id.clone(),
                    _ => None,
                }
            }
            None => None,
        };
        if let Some(join) = join_id.and_then(|j| self.nodes.get_mut(&j)) {
            join.parent = parent;
        }
    }

    /// Remove a node, its branches and its join from the arena
    pub(crate) fn destroy(&mut self, id: &str) {
        for descendant in self.descendants(id) {
            self.nodes.remove(&descendant);
        }
        self.nodes.remove(id);
    }

    /// Name of a sub-workflow in `tasks` already enclosing `parent`
    fn recursive_sub_workflow(&self, parent: &Parent, tasks: &[Value]) -> Option<String> {
        let Parent::Branch { owner, .. } = parent else {
            return None;
        };
        let mut enclosing: Vec<&str> = Vec::new();
        for id in std::iter::once(owner.clone()).chain(self.ancestors(owner)) {
            if let Some(node) = self.nodes.get(&id) {
                if matches!(node.kind, NodeKind::SubWorkflow { .. }) {
                    enclosing.extend(node.name());
                }
            }
        }
        tasks
            .iter()
            .filter_map(Value::as_object)
            .filter(|task| TaskType::of(task) == TaskType::SubWorkflow)
            .filter_map(|task| task_name(task))
            .find(|name| enclosing.contains(name))
            .map(str::to_string)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Variant hook after a node was inserted
    fn after_insert(&mut self, id: &str) {
        let kind = self.nodes.get(id).map(|n| n.kind.clone());
        match kind {
            Some(NodeKind::ForkJoin { .. }) => {
                self.repair(id);
            }
            Some(NodeKind::SubWorkflow { .. }) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    // Older payloads use a colon in generated sub-workflow names.
                    let normalized = node.name().map(|n| n.replace("sub_workflow:", "sub_workflow_"));
                    if let Some(name) = normalized {
                        node.raw.insert("name".into(), json!(name));
                    }
                }
            }
            _ => {}
        }
        self.refresh_enclosing_join(id);
    }

    /// Hook after a node was removed from `parent`
    fn after_delete(&mut self, parent: &Parent) {
        match parent {
            Parent::Root if self.sequence.len() <= 2 => {
                let placeholder = self.make_placeholder(Parent::Root);
                self.sequence.insert(1, placeholder);
            }
            Parent::Branch { owner, .. } => {
                let owner = owner.clone();
                self.recompute_wait_set(&owner);
            }
            Parent::Root => {}
        }
    }

    fn after_move(&mut self, from: &Parent, to: &Parent) {
        for parent in [from, to] {
            if let Parent::Branch { owner, .. } = parent {
                let owner = owner.clone();
                self.recompute_wait_set(&owner);
            }
        }
    }

    fn refresh_enclosing_join(&mut self, id: &str) {
        for owner in self.ancestors(id) {
            self.recompute_wait_set(&owner);
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Emit the raw task list, excluding the sentinels
    pub fn serialize(&self) -> Vec<Value> {
        self.serialize_sequence(&self.sequence)
    }

    fn serialize_sequence(&self, ids: &[NodeId]) -> Vec<Value> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if node.kind.is_sentinel() || node.transient {
                continue;
            }
            out.push(self.serialize_node(node));
            if let NodeKind::ForkJoin {
                join_id: Some(join_id),
                ..
            } = &node.kind
            {
                if let Some(join) = self.nodes.get(join_id) {
                    if matches!(join.kind, NodeKind::Join { explicit: true, .. }) {
                        out.push(self.serialize_node(join));
                    }
                }
            }
        }
        out
    }

    fn serialize_node(&self, node: &Node) -> Value {
        let mut raw = node.raw.clone();
        match &node.kind {
            NodeKind::ForkJoin {
                branches,
                join_id,
                join_on,
            } => {
                let fork_tasks: Vec<Value> = branches
                    .iter()
                    .map(|branch| Value::Array(self.serialize_sequence(&branch.nodes)))
                    .collect();
                raw.insert("forkTasks".into(), Value::Array(fork_tasks));
                if let Some(join_id) = join_id {
                    raw.insert(names::JOIN_REF_FIELD.into(), json!(join_id));
                }
                if let JoinOn::Indices(indices) = join_on {
                    raw.insert(names::JOIN_ON_FIELD.into(), json!(indices));
                }
            }
            NodeKind::Join { wait_set, .. } => {
                raw.insert("joinOn".into(), json!(wait_set));
            }
            NodeKind::Decision { branches } => {
                let mut cases = Map::new();
                for (index, branch) in branches.iter().enumerate() {
                    let name = branch.name.clone().unwrap_or_else(|| format!("branch{}", index + 1));
                    cases.insert(name, Value::Array(self.serialize_sequence(&branch.nodes)));
                }
                raw.insert("decisionCases".into(), Value::Object(cases));
            }
            NodeKind::SubWorkflow { branches, nested: true } => {
                let tasks: Vec<Value> = branches
                    .iter()
                    .flat_map(|branch| self.serialize_sequence(&branch.nodes))
                    .collect();
                put_nested_tasks(&mut raw, tasks);
            }
            _ => {}
        }
        Value::Object(raw)
    }

    /// Tail reference of each branch of a composite; a nested fork ends at its join
    pub(crate) fn branch_tails(&self, owner: &str) -> Vec<Option<NodeId>> {
        let Some(branches) = self.nodes.get(owner).and_then(|n| n.kind.branches()) else {
            return Vec::new();
        };
        branches.iter().map(|branch| self.tail_ref(branch)).collect()
    }

    pub(crate) fn tail_ref(&self, branch: &Branch) -> Option<NodeId> {
        let tail = branch.tail()?;
        match self.nodes.get(tail).map(|n| &n.kind) {
            Some(NodeKind::ForkJoin {
                join_id: Some(join_id),
                ..
            }) => Some(join_id.clone()),
            _ => Some(tail.clone()),
        }
    }
}

/// Split fork branches and join side-channel fields out of a payload
fn take_fork_structure(raw: &mut RawTask) -> (Vec<Vec<Value>>, Option<NodeId>, JoinOn) {
    let branches = match raw.get_mut("forkTasks") {
        Some(Value::Array(branches)) => std::mem::take(branches)
            .into_iter()
            .map(|branch| match branch {
                Value::Array(tasks) => tasks,
                other => vec![other],
            })
            .collect(),
        _ => Vec::new(),
    };
    let join_id = raw
        .remove(names::JOIN_REF_FIELD)
        .and_then(|v| v.as_str().map(str::to_string));
    let join_on = raw
        .remove(names::JOIN_ON_FIELD)
        .and_then(|v| serde_json::from_value::<Vec<usize>>(v).ok())
        .map_or(JoinOn::All, JoinOn::Indices);
    (branches, join_id, join_on)
}

/// Split decision cases out of a payload, keeping their order
fn take_decision_cases(raw: &mut RawTask) -> Vec<(String, Vec<Value>)> {
    match raw.get_mut("decisionCases") {
        Some(Value::Object(cases)) => std::mem::take(cases)
            .into_iter()
            .map(|(name, tasks)| match tasks {
                Value::Array(tasks) => (name, tasks),
                _ => (name, Vec::new()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Split an inline sub-workflow definition out of a payload
fn take_nested_tasks(raw: &mut RawTask) -> Option<Vec<Value>> {
    let slot = raw
        .get_mut("subWorkflowParam")?
        .get_mut("workflowDefinition")?
        .get_mut("tasks")?;
    match std::mem::replace(slot, json!([])) {
        Value::Array(tasks) => Some(tasks),
        other => {
            *slot = other;
            None
        }
    }
}

fn put_nested_tasks(raw: &mut RawTask, tasks: Vec<Value>) {
    let param = raw.entry("subWorkflowParam").or_insert_with(|| json!({}));
    let Value::Object(param) = param else {
        return;
    };
    let definition = param
        .entry("workflowDefinition")
        .or_insert_with(|| json!({}));
    if let Value::Object(definition) = definition {
        definition.insert("tasks".into(), Value::Array(tasks));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;

    fn simple(id: &str) -> Value {
        TaskBuilder::simple(id, "http").build()
    }

    fn fork(id: &str, branches: Vec<Vec<Value>>) -> Value {
        branches
            .into_iter()
            .fold(TaskBuilder::fork(id), |builder, branch| builder.with_branch(branch))
            .build()
    }

    fn tree(tasks: &[Value]) -> WorkflowTree {
        WorkflowTree::build(tasks, &FlowConfig::default())
    }

    fn branch_ids(tree: &WorkflowTree, owner: &str) -> Vec<Vec<NodeId>> {
        tree.get(owner)
            .and_then(|n| n.kind.branches())
            .map(|branches| branches.iter().map(|b| b.nodes.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_round_trip_simple_tasks() {
        let tasks = vec![
            json!({"name": "http", "taskReferenceName": "a", "type": "SIMPLE", "inputParameters": {"url": "x"}}),
            json!({"name": "llm", "taskReferenceName": "b", "type": "SIMPLE", "optional": true}),
            json!({"name": "code", "taskReferenceName": "c", "type": "SIMPLE"}),
        ];
        let tree = tree(&tasks);
        assert_eq!(tree.serialize(), tasks);
        assert_eq!(tree.top_level().len(), 5);
        assert_eq!(tree.top_level()[0], names::START_ID);
        assert_eq!(tree.top_level()[4], names::END_ID);
    }

    #[test]
    fn test_fork_example_builds_satellite_join() {
        let tasks = vec![simple("a"), fork("fork1", vec![vec![simple("b1")], vec![simple("b2")]])];
        let tree = tree(&tasks);

        assert_eq!(tree.top_level(), &[names::START_ID, "a", "fork1", names::END_ID]);
        let Some(NodeKind::ForkJoin { join_id: Some(join_id), .. }) = tree.get("fork1").map(|n| &n.kind) else {
            panic!("fork1 should have a join");
        };
        assert_eq!(join_id, "fork1_join");

        let order: Vec<&str> = tree.nodes_in_order().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec![names::START_ID, "a", "fork1", "b1", "b2", "fork1_join", names::END_ID]);

        let serialized = tree.serialize();
        assert_eq!(serialized.len(), 2);
        assert_eq!(serialized[1][names::JOIN_REF_FIELD], "fork1_join");

        let rebuilt = WorkflowTree::build(&serialized, &FlowConfig::default());
        match rebuilt.get("fork1_join").map(|n| &n.kind) {
            Some(NodeKind::Join { fork_id, wait_set, .. }) => {
                assert_eq!(fork_id, "fork1");
                assert_eq!(wait_set, &vec!["b1".to_string(), "b2".to_string()]);
            }
            other => panic!("expected join, got {:?}", other),
        }
        assert_eq!(rebuilt.serialize(), serialized);
    }

    #[test]
    fn test_explicit_join_is_absorbed_and_reemitted() {
        let tasks = vec![
            fork("f", vec![vec![simple("x")], vec![simple("y")], vec![simple("z")]]),
            TaskBuilder::join("f_done", &["x", "z"]).build(),
            simple("after"),
        ];
        let tree = tree(&tasks);
        assert_eq!(tree.top_level(), &[names::START_ID, "f", "after", names::END_ID]);
        match tree.get("f").map(|n| &n.kind) {
            Some(NodeKind::ForkJoin { join_id, join_on, .. }) => {
                assert_eq!(join_id.as_deref(), Some("f_done"));
                assert_eq!(join_on, &JoinOn::Indices(vec![0, 2]));
            }
            other => panic!("expected fork, got {:?}", other),
        }

        let out = tree.serialize();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1]["taskReferenceName"], "f_done");
        assert_eq!(out[1]["joinOn"], json!(["x", "z"]));
    }

    #[test]
    fn test_insert_after_and_before() {
        let mut tree = tree(&[simple("a"), simple("c")]);
        assert!(tree.insert("a", &[simple("b")], false, true));
        assert!(tree.insert("a", &[simple("first")], true, true));
        let refs: Vec<Value> = tree.serialize().iter().map(|t| t["taskReferenceName"].clone()).collect();
        assert_eq!(refs, vec![json!("first"), json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_insert_missing_target_returns_false() {
        let mut tree = tree(&[simple("a")]);
        assert!(!tree.insert("nope", &[simple("b")], false, true));
        assert_eq!(tree.serialize().len(), 1);
    }

    #[test]
    fn test_insert_around_sentinels() {
        let mut tree = tree(&[simple("a")]);
        assert!(tree.insert(names::START_ID, &[simple("s")], true, true));
        assert!(tree.insert(names::END_ID, &[simple("e")], false, true));
        assert_eq!(tree.top_level(), &[names::START_ID, "s", "a", "e", names::END_ID]);
    }

    #[test]
    fn test_insert_replaces_placeholder() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![]])]);
        let placeholder = branch_ids(&tree, "f")[1][0].clone();
        assert!(tree.get(&placeholder).unwrap().is_placeholder);

        assert!(tree.insert(&placeholder, &[simple("b")], false, true));
        assert_eq!(branch_ids(&tree, "f")[1], vec!["b".to_string()]);
        assert!(!tree.contains(&placeholder));
        match tree.get("f_join").map(|n| &n.kind) {
            Some(NodeKind::Join { wait_set, .. }) => assert_eq!(wait_set, &vec!["a".to_string(), "b".to_string()]),
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_after_join_lands_after_fork() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        assert!(tree.insert("f_join", &[simple("next")], true, true));
        assert_eq!(tree.top_level(), &[names::START_ID, "f", "next", names::END_ID]);
    }

    #[test]
    fn test_delete_fork_cascades() {
        let mut tree = tree(&[simple("a"), fork("f", vec![vec![simple("b1")], vec![simple("b2")]])]);
        assert!(tree.delete("f", true));
        for id in ["f", "b1", "b2", "f_join"] {
            assert!(!tree.contains(id), "{} should be destroyed", id);
        }
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_delete_refuses_sentinels_and_joins() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        assert!(!tree.delete(names::START_ID, true));
        assert!(!tree.delete("f_join", true));
        assert!(!tree.delete("missing", true));
    }

    #[test]
    fn test_delete_last_branch_node_inserts_placeholder() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        assert!(tree.delete("a", true));
        let branches = branch_ids(&tree, "f");
        assert_eq!(branches[0].len(), 1);
        assert!(tree.get(&branches[0][0]).unwrap().is_placeholder);
    }

    #[test]
    fn test_delete_everything_leaves_placeholder() {
        let mut tree = tree(&[simple("a")]);
        assert!(tree.delete("a", true));
        assert_eq!(tree.top_level().len(), 3);
        assert!(tree.first_placeholder().is_some());
    }

    #[test]
    fn test_move_within_top_level() {
        let mut tree = tree(&[simple("a"), simple("b"), simple("c")]);
        tree.move_node("a", "c", false, true).unwrap();
        assert_eq!(tree.top_level(), &[names::START_ID, "b", "c", "a", names::END_ID]);

        tree.move_node("a", "b", true, true).unwrap();
        assert_eq!(tree.top_level(), &[names::START_ID, "a", "b", "c", names::END_ID]);
    }

    #[test]
    fn test_move_into_and_between_branches() {
        let mut tree = tree(&[simple("x"), fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        tree.move_node("x", "a", false, true).unwrap();
        assert_eq!(branch_ids(&tree, "f")[0], vec!["a".to_string(), "x".to_string()]);
        assert_eq!(tree.get("x").unwrap().parent, Parent::Branch { owner: "f".into(), index: 0 });

        tree.move_node("x", "b", true, true).unwrap();
        assert_eq!(branch_ids(&tree, "f")[1], vec!["x".to_string(), "b".to_string()]);
        match tree.get("f_join").map(|n| &n.kind) {
            Some(NodeKind::Join { wait_set, .. }) => assert_eq!(wait_set, &vec!["a".to_string(), "b".to_string()]),
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_move_fork_carries_join() {
        let mut tree = tree(&[simple("a"), fork("f", vec![vec![simple("b1")], vec![simple("b2")]]), simple("z")]);
        tree.move_node("f", "z", false, true).unwrap();
        assert_eq!(tree.top_level(), &[names::START_ID, "a", "z", "f", names::END_ID]);
        let order: Vec<&str> = tree.nodes_in_order().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order[6], "f_join");
    }

    #[test]
    fn test_move_into_descendant_is_rejected() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        let before = tree.serialize();
        let err = tree.move_node("f", "a", false, true).unwrap_err();
        assert!(matches!(err, FlowError::MoveIntoDescendant { .. }));
        assert!(tree.move_node("f", "f_join", false, true).is_err());
        assert!(tree.move_node("f", "f", false, true).is_err());
        assert_eq!(tree.serialize(), before);
    }

    #[test]
    fn test_move_sentinel_is_rejected() {
        let mut tree = tree(&[simple("a")]);
        assert!(matches!(
            tree.move_node(names::END_ID, "a", true, true),
            Err(FlowError::InvalidMove(_))
        ));
    }

    #[test]
    fn test_update_raw_simple() {
        let mut tree = tree(&[simple("a")]);
        let updated = json!({"name": "http", "taskReferenceName": "a", "type": "SIMPLE", "inputParameters": {"url": "y"}});
        assert!(tree.update_raw("a", &updated));
        assert_eq!(tree.serialize(), vec![updated]);
        assert!(!tree.update_raw("missing", &json!({})));
    }

    #[test]
    fn test_update_raw_fork_reparses_branches() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        tree.get_mut("a").unwrap().set_execution_status("run", crate::types::TaskStatus::Completed);

        let updated = fork("f", vec![vec![simple("a"), simple("a2")], vec![simple("c")], vec![simple("d")]]);
        assert!(tree.update_raw("f", &updated));

        let branches = branch_ids(&tree, "f");
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0], vec!["a".to_string(), "a2".to_string()]);
        assert!(!tree.contains("b"));
        // Reused children keep their run state.
        assert_eq!(
            tree.get("a").unwrap().execution_status("run"),
            Some(crate::types::TaskStatus::Completed)
        );
        match tree.get("f_join").map(|n| &n.kind) {
            Some(NodeKind::Join { wait_set, .. }) => assert_eq!(wait_set.len(), 3),
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn test_update_raw_refuses_too_many_branches() {
        let mut tree = tree(&[fork("f", vec![vec![simple("a")], vec![simple("b")]])]);
        let before = tree.serialize();
        let wide = fork("f", (0..7).map(|i| vec![simple(&format!("w{}", i))]).collect());

        assert!(!tree.update_raw("f", &wide));
        assert_eq!(branch_ids(&tree, "f").len(), 2);
        assert!(!tree.contains("w0"));
        assert_eq!(tree.serialize(), before);
    }

    #[test]
    fn test_insert_refuses_too_many_branches() {
        let mut tree = tree(&[simple("a")]);
        let wide = fork("wide", (0..9).map(|i| vec![simple(&format!("w{}", i))]).collect());
        assert!(!tree.insert("a", &[wide.clone()], false, true));
        assert!(!tree.contains("wide"));

        // Nested inside an otherwise valid fork.
        let outer = fork("outer", vec![vec![wide], vec![simple("b")]]);
        assert!(!tree.insert("a", &[outer], false, true));
        assert!(!tree.contains("outer"));
        assert_eq!(tree.top_level(), &[names::START_ID, "a", names::END_ID]);

        let five = fork("five", (0..5).map(|i| vec![simple(&format!("v{}", i))]).collect());
        assert!(tree.insert("a", &[five], false, true));
        assert_eq!(branch_ids(&tree, "five").len(), 5);
    }

    #[test]
    fn test_update_raw_changes_type_in_place() {
        let mut tree = tree(&[simple("a"), simple("b")]);
        let as_fork = fork("a", vec![vec![simple("x")], vec![simple("y")]]);
        assert!(tree.update_raw("a", &as_fork));
        assert_eq!(tree.top_level(), &[names::START_ID, "a", "b", names::END_ID]);
        assert!(matches!(tree.get("a").unwrap().kind, NodeKind::ForkJoin { .. }));
        assert!(tree.contains("a_join"));
    }

    #[test]
    fn test_decision_round_trip_keeps_case_order() {
        let decision = TaskBuilder::decision("d")
            .with_case("zeta", vec![simple("z")])
            .with_case("alpha", vec![simple("a")])
            .build();
        let tree = tree(&[decision.clone()]);
        let names: Vec<Option<String>> = tree
            .get("d")
            .and_then(|n| n.kind.branches())
            .unwrap()
            .iter()
            .map(|b| b.name.clone())
            .collect();
        assert_eq!(names, vec![Some("zeta".to_string()), Some("alpha".to_string())]);
        assert_eq!(tree.serialize(), vec![decision]);
    }

    #[test]
    fn test_nested_sub_workflow_round_trip() {
        let sub = TaskBuilder::sub_workflow("sub_workflow_nested_1", "loop_body")
            .with_nested_tasks(vec![simple("inner")])
            .build();
        let tree = tree(&[sub.clone()]);
        assert_eq!(tree.get("inner").unwrap().parent, Parent::Branch { owner: "sub_workflow_nested_1".into(), index: 0 });
        assert_eq!(tree.serialize(), vec![sub]);
    }

    #[test]
    fn test_insert_refuses_recursive_sub_workflow() {
        let sub = TaskBuilder::sub_workflow("sub_workflow_nested_1", "loop_body")
            .with_nested_tasks(vec![simple("inner")])
            .build();
        let mut tree = tree(&[sub]);
        let again = TaskBuilder::sub_workflow("again", "loop_body").build();
        assert!(!tree.insert("inner", &[again], false, true));
        assert!(!tree.contains("again"));
    }

    #[test]
    fn test_duplicate_reference_names_are_renamed() {
        let tree = tree(&[simple("a"), simple("a")]);
        assert_eq!(tree.top_level(), &[names::START_ID, "a", "a_1", names::END_ID]);
    }

    #[test]
    fn test_is_descendant_and_ancestors() {
        let inner = fork("inner", vec![vec![simple("deep")], vec![simple("other")]]);
        let tree = tree(&[fork("outer", vec![vec![inner], vec![simple("b")]])]);
        assert!(tree.is_descendant("deep", "outer"));
        assert!(tree.is_descendant("inner_join", "outer"));
        assert!(!tree.is_descendant("outer", "deep"));
        assert_eq!(tree.ancestors("deep"), vec!["inner".to_string(), "outer".to_string()]);
        assert!(tree.validate_acyclic().is_ok());
    }
}
