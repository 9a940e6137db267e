//! Layout engine
//!
//! Places every node of a [`WorkflowTree`] on a canvas and derives the edge
//! paths and control affordances that go with them.
//!
//! Placement runs in abstract `(main, cross)` coordinates: `main` follows
//! the flow direction and `cross` is perpendicular to it. Only the final
//! mapping to `(x, y)` depends on [`Direction`], so horizontal and vertical
//! layouts share one algorithm.
//!
//! Composite branches are spread on both sides of their header: the first
//! half goes left (placed nearest the centre first), a centre branch takes
//! the middle when the count is odd, the rest goes right. Each branch is
//! pushed outward by exactly its overlap with what is already placed on its
//! side, so branches never overlap and never spread further than needed.
//!
//! Layout is a pure function of the tree; the same tree and options always
//! produce an identical [`Layout`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{Direction, LayoutOptions};
use crate::constants::{branches as bounds, defaults};
use crate::geometry::{self, PathCommand};
use crate::node::{Branch, NodeKind};
use crate::tree::WorkflowTree;
use crate::types::{NodeId, Position, Size};

/// How an edge is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    Straight,
    /// Orthogonal steps with rounded corners
    SmoothStep,
}

/// A connector between two nodes
///
/// Edges leaving a decision's branches end at the decision's merge point.
/// Their `target` is the decision itself and `merge` is set, which tells
/// them apart from the edge entering the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub path: Vec<PathCommand>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub merge: bool,
}

impl Edge {
    pub fn svg_path(&self) -> String {
        geometry::to_svg(&self.path)
    }
}

/// What a control affordance does when activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlKind {
    /// Insert a node after `node_id`
    AddNode,
    /// Append a branch to `node_id`
    AddBranch,
    /// Remove branch `index` of `node_id`
    RemoveBranch { index: usize },
}

/// A clickable affordance anchored on the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub kind: ControlKind,
    pub node_id: NodeId,
    /// Centre of the affordance
    pub position: Position,
    pub enabled: bool,
}

/// Result of laying out a tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Top-left corner of every node
    pub positions: HashMap<NodeId, Position>,
    pub canvas_size: Size,
    pub edges: Vec<Edge>,
    pub controls: Vec<Control>,
}

/// Lay out `tree`
pub fn layout(tree: &WorkflowTree, options: &LayoutOptions) -> Layout {
    let mut engine = Engine {
        tree,
        options,
        slots: HashMap::new(),
        merges: HashMap::new(),
    };
    engine.place_sequence(tree.top_level(), 0.0, 0.0);

    let mut edges = Vec::new();
    engine.sequence_edges(tree.top_level(), &mut edges);
    let mut controls = Vec::new();
    engine.controls(&mut controls);

    let to_xy = |p: Point| match options.direction {
        Direction::Vertical => Position::new(p.cross, p.main),
        Direction::Horizontal => Position::new(p.main, p.cross),
    };

    let mut positions: HashMap<NodeId, Position> = engine
        .slots
        .iter()
        .map(|(id, slot)| (id.clone(), to_xy(Point::new(slot.main, slot.cross))))
        .collect();
    let mut edges: Vec<Edge> = edges
        .into_iter()
        .map(|(source, target, points, merge)| {
            let points: Vec<Position> = points.into_iter().map(to_xy).collect();
            let kind = if points.len() > 2 {
                EdgeKind::SmoothStep
            } else {
                EdgeKind::Straight
            };
            Edge {
                source,
                target,
                kind,
                path: geometry::rounded_polyline(&points, defaults::EDGE_RADIUS),
                merge,
            }
        })
        .collect();
    let mut controls: Vec<Control> = controls
        .into_iter()
        .map(|(kind, node_id, point, enabled)| Control {
            kind,
            node_id,
            position: to_xy(point),
            enabled,
        })
        .collect();

    // Uniform shift so nothing sits at negative coordinates.
    let (min_x, min_y) = positions
        .values()
        .copied()
        .chain(controls.iter().map(|c| c.position))
        .chain(edges.iter().flat_map(|e| e.path.iter().map(PathCommand::end)))
        .fold((0.0_f64, 0.0_f64), |(x, y), p| (x.min(p.x), y.min(p.y)));
    let (dx, dy) = (-min_x, -min_y);
    for position in positions.values_mut() {
        position.x += dx;
        position.y += dy;
    }
    for edge in &mut edges {
        geometry::translate(&mut edge.path, dx, dy);
    }
    for control in &mut controls {
        control.position.x += dx;
        control.position.y += dy;
    }

    let mut width: f64 = 0.0;
    let mut height: f64 = 0.0;
    for (id, position) in &positions {
        if let Some(node) = tree.get(id) {
            width = width.max(position.x + node.size.width);
            height = height.max(position.y + node.size.height);
        }
    }
    for point in controls.iter().map(|c| c.position) {
        width = width.max(point.x);
        height = height.max(point.y);
    }
    let margin = tree.get(tree.start_id()).map_or(tree.node_size(), |n| n.size);

    Layout {
        positions,
        canvas_size: Size::new(width + margin.width, height + margin.height),
        edges,
        controls,
    }
}

impl WorkflowTree {
    /// Copy computed positions onto the nodes and clear their render flags
    pub fn apply_layout(&mut self, layout: &Layout) {
        for (id, position) in &layout.positions {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position = *position;
                node.needs_render = false;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    main: f64,
    cross: f64,
}

impl Point {
    fn new(main: f64, cross: f64) -> Self {
        Self { main, cross }
    }
}

/// Abstract placement of one node
#[derive(Debug, Clone, Copy)]
struct Slot {
    main: f64,
    cross: f64,
    main_len: f64,
    cross_len: f64,
}

impl Slot {
    fn centre(&self) -> f64 {
        self.cross + self.cross_len / 2.0
    }

    fn entry(&self) -> Point {
        Point::new(self.main, self.centre())
    }

    fn bottom(&self) -> Point {
        Point::new(self.main + self.main_len, self.centre())
    }
}

/// Extent of a placed sequence
#[derive(Debug, Clone, Copy)]
struct Span {
    /// Where the following node starts
    next: f64,
    min: f64,
    max: f64,
}

impl Span {
    fn merge(&mut self, other: Span) {
        self.next = self.next.max(other.next);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

/// Source, target, points and whether the edge ends at a decision merge
type RawEdge = (NodeId, NodeId, Vec<Point>, bool);
type RawControl = (ControlKind, NodeId, Point, bool);

struct Engine<'a> {
    tree: &'a WorkflowTree,
    options: &'a LayoutOptions,
    slots: HashMap<NodeId, Slot>,
    /// Main coordinate where a decision's branches merge
    merges: HashMap<NodeId, f64>,
}

impl Engine<'_> {
    fn extent(&self, id: &str) -> (f64, f64) {
        let size = self.tree.get(id).map_or(self.tree.node_size(), |n| n.size);
        match self.options.direction {
            Direction::Vertical => (size.height, size.width),
            Direction::Horizontal => (size.width, size.height),
        }
    }

    fn place_sequence(&mut self, ids: &[NodeId], main: f64, centre: f64) -> Span {
        let mut span = Span {
            next: main,
            min: centre,
            max: centre,
        };
        for id in ids {
            let placed = self.place_node(id, span.next, centre);
            span.next = placed.next;
            span.min = span.min.min(placed.min);
            span.max = span.max.max(placed.max);
        }
        span
    }

    fn place_node(&mut self, id: &str, main: f64, centre: f64) -> Span {
        let Some(node) = self.tree.get(id) else {
            return Span {
                next: main,
                min: centre,
                max: centre,
            };
        };
        let gap = self.options.node_gap;
        let (main_len, cross_len) = self.extent(id);
        let cross = centre - cross_len / 2.0;
        self.slots.insert(
            id.to_string(),
            Slot {
                main,
                cross,
                main_len,
                cross_len,
            },
        );
        let mut span = Span {
            next: main + main_len + gap,
            min: cross,
            max: cross + cross_len,
        };

        match &node.kind {
            NodeKind::ForkJoin {
                branches, join_id, ..
            } => {
                let start = main + main_len + self.options.branch_gap;
                let placed = self.place_branches(branches, start, centre, cross, cross_len);
                span.merge(placed);
                if let Some(join_id) = join_id {
                    let (join_len, join_cross_len) = self.extent(join_id);
                    let join_main = placed.next;
                    self.slots.insert(
                        join_id.clone(),
                        Slot {
                            main: join_main,
                            cross: centre - join_cross_len / 2.0,
                            main_len: join_len,
                            cross_len: join_cross_len,
                        },
                    );
                    span.next = join_main + join_len + gap;
                }
            }
            NodeKind::Decision { branches } => {
                let start = main + main_len + self.options.branch_gap;
                let placed = self.place_branches(branches, start, centre, cross, cross_len);
                span.merge(placed);
                self.merges.insert(id.to_string(), placed.next - gap / 2.0);
            }
            NodeKind::SubWorkflow { branches, .. } => {
                let children: Vec<NodeId> = branches.iter().flat_map(|b| b.nodes.iter().cloned()).collect();
                if let Some(first) = children.first() {
                    let (_, child_cross_len) = self.extent(first);
                    let child_centre = cross + cross_len / 2.0 + defaults::SUB_WORKFLOW_INDENT + child_cross_len / 2.0;
                    let placed = self.place_sequence(&children, main + main_len + gap, child_centre);
                    span.merge(placed);
                }
            }
            _ => {}
        }
        span
    }

    fn place_branches(&mut self, branches: &[Branch], start: f64, centre: f64, cross: f64, cross_len: f64) -> Span {
        let gap = self.options.node_gap;
        let mut span = Span {
            next: start,
            min: cross,
            max: cross + cross_len,
        };
        let count = branches.len();
        let half = count / 2;
        let middle = (count % 2 == 1).then_some(half);
        let (mut left_base, mut right_base) = (cross, cross + cross_len);

        if let Some(middle) = middle {
            let placed = self.place_sequence(&branches[middle].nodes, start, centre);
            left_base = placed.min;
            right_base = placed.max;
            span.merge(placed);
        }

        for branch in branches[..half].iter().rev() {
            let head_len = branch.nodes.first().map_or(cross_len, |head| self.extent(head).1);
            let mut placed = self.place_sequence(&branch.nodes, start, left_base - gap - head_len / 2.0);
            let overlap = (placed.max + gap - left_base).max(0.0);
            if overlap > 0.0 {
                self.shift(&branch.nodes, -overlap);
                placed.min -= overlap;
                placed.max -= overlap;
            }
            left_base = placed.min;
            span.merge(placed);
        }

        let right_start = half + usize::from(middle.is_some());
        for branch in &branches[right_start..] {
            let head_len = branch.nodes.first().map_or(cross_len, |head| self.extent(head).1);
            let mut placed = self.place_sequence(&branch.nodes, start, right_base + gap + head_len / 2.0);
            let overlap = (right_base + gap - placed.min).max(0.0);
            if overlap > 0.0 {
                self.shift(&branch.nodes, overlap);
                placed.min += overlap;
                placed.max += overlap;
            }
            right_base = placed.max;
            span.merge(placed);
        }
        span
    }

    /// Move a placed sequence and everything it owns along the cross axis
    fn shift(&mut self, ids: &[NodeId], delta: f64) {
        for id in ids {
            let owned = std::iter::once(id.clone()).chain(self.tree.descendants(id));
            for owned_id in owned {
                if let Some(slot) = self.slots.get_mut(&owned_id) {
                    slot.cross += delta;
                }
            }
        }
    }

    fn slot(&self, id: &str) -> Option<Slot> {
        self.slots.get(id).copied()
    }

    /// Point where the flow leaves a node towards its successor
    fn exit(&self, id: &str) -> Option<Point> {
        let slot = self.slot(id)?;
        match self.tree.get(id).map(|n| &n.kind) {
            Some(NodeKind::ForkJoin {
                join_id: Some(join_id),
                ..
            }) => self.exit(join_id),
            Some(NodeKind::Decision { .. }) => self
                .merges
                .get(id)
                .map(|merge| Point::new(*merge, slot.centre())),
            _ => Some(slot.bottom()),
        }
    }

    fn step(from: Point, to: Point, turn_at: f64) -> Vec<Point> {
        if from.cross == to.cross {
            vec![from, to]
        } else {
            vec![from, Point::new(turn_at, from.cross), Point::new(turn_at, to.cross), to]
        }
    }

    fn sequence_edges(&self, ids: &[NodeId], out: &mut Vec<RawEdge>) {
        for pair in ids.windows(2) {
            let (Some(from), Some(to)) = (self.exit(&pair[0]), self.slot(&pair[1]).map(|s| s.entry())) else {
                continue;
            };
            let turn_at = from.main + (to.main - from.main) / 2.0;
            out.push((pair[0].clone(), pair[1].clone(), Self::step(from, to, turn_at), false));
        }
        for id in ids {
            self.composite_edges(id, out);
        }
    }

    fn composite_edges(&self, id: &str, out: &mut Vec<RawEdge>) {
        let (Some(node), Some(slot)) = (self.tree.get(id), self.slot(id)) else {
            return;
        };
        let header = slot.bottom();
        match &node.kind {
            NodeKind::ForkJoin {
                branches, join_id, ..
            } => {
                let join = join_id.as_ref().and_then(|j| self.slot(j).map(|s| (j.clone(), s)));
                for branch in branches {
                    self.branch_head_edge(id, header, self.options.branch_gap, branch, out);
                    self.sequence_edges(&branch.nodes, out);
                    let (Some(tail), Some((join_id, join_slot))) = (branch.tail(), join.as_ref()) else {
                        continue;
                    };
                    if let Some(from) = self.exit(tail) {
                        let to = join_slot.entry();
                        let turn_at = to.main - self.options.node_gap / 2.0;
                        out.push((tail.clone(), join_id.clone(), Self::step(from, to, turn_at), false));
                    }
                }
            }
            NodeKind::Decision { branches } => {
                let merge = self.merges.get(id).map(|m| Point::new(*m, slot.centre()));
                for branch in branches {
                    self.branch_head_edge(id, header, self.options.branch_gap, branch, out);
                    self.sequence_edges(&branch.nodes, out);
                    let (Some(tail), Some(merge)) = (branch.tail(), merge) else {
                        continue;
                    };
                    if let Some(from) = self.exit(tail) {
                        let points = if from.cross == merge.cross {
                            vec![from, merge]
                        } else {
                            vec![from, Point::new(merge.main, from.cross), merge]
                        };
                        out.push((tail.clone(), id.to_string(), points, true));
                    }
                }
            }
            NodeKind::SubWorkflow { branches, .. } => {
                for branch in branches {
                    self.branch_head_edge(id, header, self.options.node_gap, branch, out);
                    self.sequence_edges(&branch.nodes, out);
                }
            }
            _ => {}
        }
    }

    fn branch_head_edge(&self, owner: &str, header: Point, gap: f64, branch: &Branch, out: &mut Vec<RawEdge>) {
        let Some(head) = branch.nodes.first() else {
            return;
        };
        if let Some(to) = self.slot(head).map(|s| s.entry()) {
            let turn_at = header.main + gap / 2.0;
            out.push((owner.to_string(), head.clone(), Self::step(header, to, turn_at), false));
        }
    }

    fn controls(&self, out: &mut Vec<RawControl>) {
        let offset = defaults::CONTROL_OFFSET;
        for node in self.tree.nodes_in_order() {
            let Some(slot) = self.slot(&node.id) else {
                continue;
            };
            match &node.kind {
                NodeKind::End => {}
                // The fork's join carries the insertion point after the whole block.
                NodeKind::ForkJoin { .. } => {}
                _ => {
                    if let Some(exit) = self.exit(&node.id) {
                        let at = Point::new(exit.main + offset, exit.cross);
                        out.push((ControlKind::AddNode, node.id.clone(), at, true));
                    }
                }
            }

            let (Some(branches), Some(limit)) = (node.kind.branches(), self.tree.branch_limit(&node.id)) else {
                continue;
            };
            let header = slot.bottom();
            out.push((
                ControlKind::AddBranch,
                node.id.clone(),
                Point::new(header.main + offset, header.cross),
                branches.len() < limit,
            ));
            for (index, branch) in branches.iter().enumerate() {
                let Some(head) = branch.nodes.first().and_then(|h| self.slot(h)) else {
                    continue;
                };
                let entry = head.entry();
                out.push((
                    ControlKind::RemoveBranch { index },
                    node.id.clone(),
                    Point::new(entry.main - offset, entry.cross),
                    branches.len() > bounds::MIN,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;
    use crate::config::FlowConfig;
    use serde_json::Value;

    fn simple(id: &str) -> Value {
        TaskBuilder::simple(id, "http").build()
    }

    fn fork(id: &str, branches: Vec<Vec<Value>>) -> Value {
        branches
            .into_iter()
            .fold(TaskBuilder::fork(id), |b, tasks| b.with_branch(tasks))
            .build()
    }

    fn tree(tasks: Vec<Value>) -> WorkflowTree {
        WorkflowTree::build(&tasks, &FlowConfig::default())
    }

    fn pos(layout: &Layout, id: &str) -> Position {
        layout.positions[id]
    }

    fn overlaps(a: Position, b: Position, size: f64) -> bool {
        a.x < b.x + size && b.x < a.x + size && a.y < b.y + size && b.y < a.y + size
    }

    #[test]
    fn test_sequence_vertical() {
        let tree = tree(vec![simple("a")]);
        let layout = layout(&tree, &LayoutOptions::default());

        assert_eq!(pos(&layout, "workflow_start"), Position::new(0.0, 0.0));
        assert_eq!(pos(&layout, "a"), Position::new(0.0, 160.0));
        assert_eq!(pos(&layout, "workflow_end"), Position::new(0.0, 320.0));
        assert_eq!(layout.canvas_size, Size::new(160.0, 480.0));
        assert_eq!(layout.edges.len(), 2);
        assert_eq!(layout.edges[0].svg_path(), "M40,80 L40,160");
        assert_eq!(layout.edges[0].kind, EdgeKind::Straight);
    }

    #[test]
    fn test_horizontal_swaps_axes() {
        let tree = tree(vec![simple("a")]);
        let options = LayoutOptions {
            direction: Direction::Horizontal,
            ..LayoutOptions::default()
        };
        let layout = layout(&tree, &options);
        assert_eq!(pos(&layout, "a"), Position::new(160.0, 0.0));
        assert_eq!(pos(&layout, "workflow_end"), Position::new(320.0, 0.0));
    }

    #[test]
    fn test_fork_branches_are_symmetric() {
        let tree = tree(vec![fork("f", vec![vec![simple("b0")], vec![simple("b1")]])]);
        let layout = layout(&tree, &LayoutOptions::default());
        let f = pos(&layout, "f");
        let (b0, b1) = (pos(&layout, "b0"), pos(&layout, "b1"));
        let join = pos(&layout, "f_join");

        assert!(b0.x < f.x && f.x < b1.x);
        assert_eq!(f.x - b0.x, b1.x - f.x);
        assert_eq!(b0.y, f.y + 80.0 + defaults::BRANCH_GAP);
        assert_eq!(join.x, f.x);
        assert!(join.y > b0.y + 80.0);
        assert!(pos(&layout, "workflow_end").y > join.y);
        // start->f, f->end, two heads, two tails
        assert_eq!(layout.edges.len(), 6);
        assert!(layout
            .edges
            .iter()
            .filter(|e| e.source == "f" && e.target != "workflow_end")
            .all(|e| e.kind == EdgeKind::SmoothStep));
    }

    #[test]
    fn test_odd_branch_count_keeps_middle_on_axis() {
        let tree = tree(vec![fork(
            "f",
            vec![vec![simple("l")], vec![simple("m")], vec![simple("r")]],
        )]);
        let layout = layout(&tree, &LayoutOptions::default());
        assert_eq!(pos(&layout, "m").x, pos(&layout, "f").x);
        assert!(pos(&layout, "l").x < pos(&layout, "m").x);
        assert!(pos(&layout, "r").x > pos(&layout, "m").x);
    }

    #[test]
    fn test_nested_branches_do_not_overlap() {
        let inner = fork("inner", vec![vec![simple("i0")], vec![simple("i1")], vec![simple("i2")]]);
        let tree = tree(vec![fork(
            "outer",
            vec![vec![simple("a")], vec![inner], vec![simple("c"), simple("d")]],
        )]);
        let layout = layout(&tree, &LayoutOptions::default());

        let ids: Vec<&NodeId> = layout.positions.keys().collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert!(
                    !overlaps(layout.positions[*a], layout.positions[*b], 80.0),
                    "{} overlaps {}",
                    a,
                    b
                );
            }
        }
        assert!(layout.positions.values().all(|p| p.x >= 0.0 && p.y >= 0.0));
    }

    #[test]
    fn test_layout_is_deterministic() {
        let tree = tree(vec![
            simple("a"),
            fork("f", vec![vec![simple("b")], vec![simple("c")]]),
            TaskBuilder::decision("d")
                .with_case("yes", vec![simple("y")])
                .with_case("no", vec![simple("n")])
                .build(),
        ]);
        let options = LayoutOptions::default();
        assert_eq!(layout(&tree, &options), layout(&tree, &options));
    }

    #[test]
    fn test_decision_merges_before_next_node() {
        let tree = tree(vec![
            TaskBuilder::decision("d")
                .with_case("yes", vec![simple("y")])
                .with_case("no", vec![simple("n")])
                .build(),
            simple("after"),
        ]);
        let layout = layout(&tree, &LayoutOptions::default());
        let branch_end = pos(&layout, "y").y + 80.0;
        assert_eq!(pos(&layout, "after").y, branch_end + 80.0);
        let into_merge: Vec<&Edge> = layout.edges.iter().filter(|e| e.merge).collect();
        assert_eq!(into_merge.len(), 2);
        assert!(into_merge.iter().all(|e| e.target == "d"));
        let into_decision: Vec<&Edge> = layout.edges.iter().filter(|e| e.target == "d" && !e.merge).collect();
        assert_eq!(into_decision.len(), 1);
        assert_eq!(into_decision[0].source, "workflow_start");
    }

    #[test]
    fn test_sub_workflow_children_are_indented() {
        let sub = TaskBuilder::sub_workflow("sub_workflow_nested_1", "inline")
            .with_nested_tasks(vec![simple("inner")])
            .build();
        let tree = tree(vec![sub]);
        let layout = layout(&tree, &LayoutOptions::default());
        let header = pos(&layout, "sub_workflow_nested_1");
        let child = pos(&layout, "inner");
        assert_eq!(child.x - header.x, 40.0 + defaults::SUB_WORKFLOW_INDENT);
        assert!(pos(&layout, "workflow_end").y > child.y);
    }

    #[test]
    fn test_controls_follow_bounds() {
        let tree = tree(vec![fork("f", vec![vec![simple("b0")], vec![simple("b1")]])]);
        let layout = layout(&tree, &LayoutOptions::default());

        let add_branch = layout
            .controls
            .iter()
            .find(|c| c.kind == ControlKind::AddBranch)
            .unwrap();
        assert!(add_branch.enabled);
        let removes: Vec<&Control> = layout
            .controls
            .iter()
            .filter(|c| matches!(c.kind, ControlKind::RemoveBranch { .. }))
            .collect();
        assert_eq!(removes.len(), 2);
        assert!(removes.iter().all(|c| !c.enabled));

        let add_nodes: Vec<&str> = layout
            .controls
            .iter()
            .filter(|c| c.kind == ControlKind::AddNode)
            .map(|c| c.node_id.as_str())
            .collect();
        assert!(!add_nodes.contains(&"f"));
        assert!(!add_nodes.contains(&"workflow_end"));
        assert!(add_nodes.contains(&"f_join"));
    }

    #[test]
    fn test_apply_layout_sets_positions() {
        let mut tree = tree(vec![simple("a")]);
        let computed = layout(&tree, &LayoutOptions::default());
        tree.apply_layout(&computed);
        let node = tree.get("a").unwrap();
        assert_eq!(node.position, Position::new(0.0, 160.0));
        assert!(!node.needs_render);
    }
}
