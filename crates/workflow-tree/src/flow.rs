//! Root object tying the tree, layout, variables, history and runs together
//!
//! [`WorkflowFlow`] is driven from a single task: every edit and every
//! execution transition goes through `&mut self`. Control calls are awaited
//! inline with their result applied before the call returns. Timers are not
//! spawned; the owner drives them with [`WorkflowFlow::run_next_timer`], or
//! takes a [`Tick`] from [`WorkflowFlow::next_tick`] and awaits its fetch
//! without holding the flow.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::builder::new_task;
use crate::config::{Direction, FlowConfig};
use crate::constants::branches as bounds;
use crate::error::{FlowError, Result};
use crate::events::{EventSink, FlowEvent, NullEventSink};
use crate::execution::{
    ExecutionService, ExecutionSnapshot, ExecutionTracker, FetchOutcome, PendingFetch, PollScheduler, TimerAction,
};
use crate::layout::{layout, Layout};
use crate::node::JoinOn;
use crate::registry::{ToolRegistry, VariableSchema};
use crate::tree::WorkflowTree;
use crate::types::{ExecutionStatus, TaskStatus, TaskType};
use crate::undo::UndoStack;
use crate::variables::VariableTable;

/// Parameters of a new run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    /// Workflow input values
    #[serde(default)]
    pub input: Value,
    /// Workflow version to run; the flow's version when unset
    #[serde(default)]
    pub version: Option<u32>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            input: Value::Object(Map::new()),
            version: None,
        }
    }
}

/// A fired timer
pub enum Tick {
    /// Poll due; await the fetch and hand it to [`WorkflowFlow::apply_fetch`]
    Fetch(PendingFetch),
    /// A cleared run went back to SCHEDULED
    Reset(String),
}

/// An editable, runnable workflow
pub struct WorkflowFlow {
    config: FlowConfig,
    tree: WorkflowTree,
    registry: ToolRegistry,
    service: Arc<dyn ExecutionService>,
    events: Arc<dyn EventSink>,
    trackers: HashMap<String, ExecutionTracker>,
    scheduler: PollScheduler,
    history: UndoStack,
    layout: Option<Layout>,
    variables: VariableTable,
    inputs: Vec<VariableSchema>,
    workflow_id: Option<String>,
    version: Option<u32>,
    active_instance: Option<String>,
}

impl WorkflowFlow {
    /// Create an empty flow that discards its events
    pub fn new(config: FlowConfig, service: Arc<dyn ExecutionService>) -> Self {
        let tree = WorkflowTree::new(&config);
        let history = UndoStack::new(config.max_undo);
        let mut flow = Self {
            config,
            tree,
            registry: ToolRegistry::new(),
            service,
            events: Arc::new(NullEventSink),
            trackers: HashMap::new(),
            scheduler: PollScheduler::new(),
            history,
            layout: None,
            variables: VariableTable::default(),
            inputs: Vec::new(),
            workflow_id: None,
            version: None,
            active_instance: None,
        };
        flow.record_history();
        flow
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.set_registry(registry);
        self
    }

    /// Identify the remote workflow definition runs are started from
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>, version: Option<u32>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self.version = version;
        self
    }

    /// Replace the tree with one built from `tasks`, starting a fresh history
    pub fn load(&mut self, tasks: &[Value]) {
        self.tree = WorkflowTree::build(tasks, &self.config);
        self.history.clear();
        self.record_history();
        self.structure_changed();
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn tree(&self) -> &WorkflowTree {
        &self.tree
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn active_instance(&self) -> Option<&str> {
        self.active_instance.as_deref()
    }

    pub fn tracker(&self, instance_id: &str) -> Option<&ExecutionTracker> {
        self.trackers.get(instance_id)
    }

    pub fn trackers(&self) -> impl Iterator<Item = &ExecutionTracker> {
        self.trackers.values()
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    /// Status of a node in the active instance
    pub fn task_status(&self, node_id: &str) -> Option<TaskStatus> {
        let instance = self.active_instance.as_deref()?;
        self.tree.get(node_id)?.execution_status(instance)
    }

    /// Current task list
    pub fn serialize(&self) -> Vec<Value> {
        self.tree.serialize()
    }

    /// Layout of the current tree, recomputed after any change
    pub fn layout(&mut self) -> &Layout {
        let computed = match self.layout.take() {
            Some(cached) => cached,
            None => {
                let computed = layout(&self.tree, &self.config.layout);
                self.tree.apply_layout(&computed);
                computed
            }
        };
        self.layout.insert(computed)
    }

    pub fn set_direction(&mut self, direction: Direction) {
        if self.config.layout.direction != direction {
            self.config.layout.direction = direction;
            self.layout = None;
            self.emit(FlowEvent::RefreshNeeded);
        }
    }

    pub fn set_registry(&mut self, registry: ToolRegistry) {
        self.registry = registry;
        self.rebuild_variables();
    }

    /// Declare the workflow's input variables
    pub fn set_inputs(&mut self, inputs: Vec<VariableSchema>) {
        self.inputs = inputs;
        self.rebuild_variables();
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Insert raw tasks next to `target_id`
    pub fn insert(&mut self, target_id: &str, tasks: &[Value], insert_before: bool) -> bool {
        let inserted = self.tree.insert(target_id, tasks, insert_before, true);
        if inserted {
            self.edited();
        }
        inserted
    }

    /// Insert a fresh task of `task_type` calling tool `name`
    pub fn insert_new(&mut self, target_id: &str, task_type: TaskType, name: &str, insert_before: bool) -> bool {
        self.insert(target_id, &[new_task(task_type, name)], insert_before)
    }

    pub fn delete(&mut self, node_id: &str) -> bool {
        let deleted = self.tree.delete(node_id, true);
        if deleted {
            self.edited();
        }
        deleted
    }

    pub fn move_node(&mut self, source_id: &str, target_id: &str, insert_before: bool) -> Result<()> {
        self.tree.move_node(source_id, target_id, insert_before, true)?;
        self.edited();
        Ok(())
    }

    /// Replace a node's payload
    pub fn update_node(&mut self, node_id: &str, raw: &Value) -> bool {
        let updated = self.tree.update_raw(node_id, raw);
        if updated {
            self.edited();
        }
        updated
    }

    /// Append a branch to a fork or decision
    pub fn add_branch(&mut self, node_id: &str) -> Result<()> {
        let error = self.bounds_error(node_id)?;
        if !self.tree.insert_branch(node_id) {
            return Err(error);
        }
        self.edited();
        Ok(())
    }

    /// Remove branch `index` of a fork or decision
    pub fn remove_branch(&mut self, node_id: &str, index: usize) -> Result<()> {
        let error = self.bounds_error(node_id)?;
        if !self.tree.delete_branch(node_id, index) {
            return Err(error);
        }
        self.edited();
        Ok(())
    }

    fn bounds_error(&self, node_id: &str) -> Result<FlowError> {
        if !self.tree.contains(node_id) {
            return Err(FlowError::not_found(node_id));
        }
        // Nodes without branches have no room for any.
        let max = self.tree.branch_limit(node_id).unwrap_or(0);
        Ok(FlowError::BranchBounds {
            node_id: node_id.to_string(),
            min: bounds::MIN,
            max,
        })
    }

    pub fn set_join_on(&mut self, fork_id: &str, join_on: JoinOn) -> bool {
        let changed = self.tree.set_join_on(fork_id, join_on);
        if changed {
            self.edited();
        }
        changed
    }

    pub fn rename_branch(&mut self, node_id: &str, index: usize, name: &str) -> bool {
        let renamed = self.tree.rename_branch(node_id, index, name);
        if renamed {
            self.edited();
        }
        renamed
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restore the previous task list; returns false when there is none
    ///
    /// The tree is rebuilt, so node run status is dropped. Refused while a
    /// run is in flight.
    pub fn undo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        match self.history.undo() {
            Some(tasks) => {
                self.restore(tasks?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool> {
        self.ensure_idle()?;
        match self.history.redo() {
            Some(tasks) => {
                self.restore(tasks?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.trackers.values().find(|t| t.is_active()) {
            Some(active) => Err(FlowError::AlreadyRunning(active.instance_id.clone())),
            None => Ok(()),
        }
    }

    fn restore(&mut self, tasks: Vec<Value>) {
        self.tree = WorkflowTree::build(&tasks, &self.config);
        self.structure_changed();
    }

    fn edited(&mut self) {
        self.record_history();
        self.structure_changed();
    }

    fn record_history(&mut self) {
        if let Err(e) = self.history.push(&self.tree.serialize()) {
            log::warn!("failed to record edit history: {}", e);
        }
    }

    fn structure_changed(&mut self) {
        self.layout = None;
        self.emit(FlowEvent::StructureChanged {
            tasks: self.tree.serialize(),
        });
        self.rebuild_variables();
    }

    fn rebuild_variables(&mut self) {
        self.variables = VariableTable::rebuild(&self.tree, &self.registry, &self.inputs, &self.config.env_variables);
        self.emit(FlowEvent::VariablesRebuilt {
            count: self.variables.len(),
        });
    }

    fn emit(&self, event: FlowEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("dropping flow event: {}", e);
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Start a run of the current tree
    ///
    /// A sub-workflow cycle is reported before anything else. Sub-workflow
    /// calls are then expanded so remote task statuses have nodes to land
    /// on; every later failure path removes the expansion again.
    pub async fn start(&mut self, params: RunParams) -> Result<String> {
        self.tree.check_sub_workflows(&self.registry)?;
        self.ensure_idle()?;
        if let Err(e) = self.tree.expand_sub_workflows(&self.registry) {
            self.restore_expansion();
            return Err(e);
        }
        self.layout = None;
        let workflow_id = match self.check_startable() {
            Ok(workflow_id) => workflow_id,
            Err(e) => {
                self.restore_expansion();
                return Err(e);
            }
        };

        if let Some(previous) = self.active_instance.take() {
            self.clear_node_status(&previous);
        }
        let version = params.version.or(self.version);
        let instance_id = match self.service.start(&workflow_id, &params.input, version).await {
            Ok(id) => id,
            Err(e) => {
                log::warn!("failed to start workflow '{}': {}", workflow_id, e);
                self.restore_expansion();
                return Err(e);
            }
        };

        let mut tracker = ExecutionTracker::new(instance_id.clone(), ExecutionStatus::Running);
        tracker.expanded = self.tree.has_expansion();
        self.trackers.insert(instance_id.clone(), tracker);
        let start_id = self.tree.start_id().to_string();
        if let Some(start) = self.tree.get_mut(&start_id) {
            start.set_execution_status(&instance_id, TaskStatus::Completed);
        }
        self.active_instance = Some(instance_id.clone());
        self.scheduler.arm(&instance_id, TimerAction::Poll, Duration::ZERO);
        log::info!("started workflow '{}' as instance '{}'", workflow_id, instance_id);
        self.emit(FlowEvent::RefreshNeeded);
        Ok(instance_id)
    }

    /// Checks run after expansion; returns the workflow id to start
    fn check_startable(&self) -> Result<String> {
        self.tree.validate_acyclic()?;
        let workflow_id = self.workflow_id.clone().ok_or(FlowError::MissingWorkflowId)?;
        if let Some(placeholder) = self.tree.first_placeholder() {
            return Err(FlowError::PlaceholderPresent(placeholder.clone()));
        }
        Ok(workflow_id)
    }

    /// Pause the active run
    pub async fn pause(&mut self) -> Result<()> {
        let id = self.active_with(&[ExecutionStatus::Running])?;
        if let Err(e) = self.service.pause(&id).await {
            self.roll_back(&id);
            return Err(e);
        }
        self.set_tracker_status(&id, ExecutionStatus::Paused);
        self.scheduler.arm(&id, TimerAction::Poll, Duration::ZERO);
        self.emit(FlowEvent::RefreshNeeded);
        Ok(())
    }

    /// Resume the active run
    pub async fn resume(&mut self) -> Result<()> {
        let id = self.active_with(&[ExecutionStatus::Paused])?;
        if let Err(e) = self.service.resume(&id).await {
            self.roll_back(&id);
            return Err(e);
        }
        self.set_tracker_status(&id, ExecutionStatus::Running);
        self.scheduler.arm(&id, TimerAction::Poll, Duration::ZERO);
        self.emit(FlowEvent::RefreshNeeded);
        Ok(())
    }

    /// Terminate the active run
    ///
    /// Polling stops first; after the service accepted the termination one
    /// last poll picks up the final task states before the run is cleared.
    pub async fn stop(&mut self) -> Result<()> {
        let id = self.active_with(&[ExecutionStatus::Running, ExecutionStatus::Paused])?;
        self.scheduler.cancel(&id);
        self.set_tracker_status(&id, ExecutionStatus::Canceled);
        if let Err(e) = self.service.terminate(&id).await {
            self.roll_back(&id);
            return Err(e);
        }
        if let Err(e) = self.poll(&id).await {
            log::warn!("final poll of '{}' failed: {}", id, e);
        }
        self.clear_execution_status(&id)
    }

    fn active_with(&self, allowed: &[ExecutionStatus]) -> Result<String> {
        let id = self
            .active_instance
            .clone()
            .ok_or_else(|| FlowError::NotRunning("no active instance".to_string()))?;
        match self.trackers.get(&id) {
            Some(tracker) if allowed.contains(&tracker.status) => Ok(id),
            Some(_) => Err(FlowError::NotRunning(id)),
            None => Err(FlowError::UnknownInstance(id)),
        }
    }

    fn set_tracker_status(&mut self, instance_id: &str, status: ExecutionStatus) {
        if let Some(tracker) = self.trackers.get_mut(instance_id) {
            tracker.status = status;
        }
    }

    fn roll_back(&mut self, instance_id: &str) {
        log::debug!("rolling back instance '{}'", instance_id);
        self.scheduler.cancel(instance_id);
        self.set_tracker_status(instance_id, ExecutionStatus::Scheduled);
        self.restore_expansion();
        self.emit(FlowEvent::RefreshNeeded);
    }

    fn restore_expansion(&mut self) {
        if self.tree.restore_sub_workflows() > 0 {
            self.layout = None;
        }
        for tracker in self.trackers.values_mut() {
            tracker.expanded = false;
        }
    }

    /// Mark unfinished tasks CANCELED, then reset the run after the clear delay
    pub fn clear_execution_status(&mut self, instance_id: &str) -> Result<()> {
        if !self.trackers.contains_key(instance_id) {
            return Err(FlowError::UnknownInstance(instance_id.to_string()));
        }
        for node in self.tree.nodes.values_mut() {
            if matches!(node.execution_status(instance_id), None | Some(TaskStatus::Scheduled)) {
                node.set_execution_status(instance_id, TaskStatus::Canceled);
            }
        }
        self.set_tracker_status(instance_id, ExecutionStatus::Canceled);
        self.scheduler
            .arm(instance_id, TimerAction::Reset, self.config.clear_delay());
        self.emit(FlowEvent::RefreshNeeded);
        Ok(())
    }

    fn reset(&mut self, instance_id: &str) {
        for node in self.tree.nodes.values_mut() {
            node.set_execution_status(instance_id, TaskStatus::Scheduled);
        }
        self.set_tracker_status(instance_id, ExecutionStatus::Scheduled);
        self.emit(FlowEvent::RefreshNeeded);
    }

    fn clear_node_status(&mut self, instance_id: &str) {
        for node in self.tree.nodes.values_mut() {
            node.clear_execution(instance_id);
        }
    }

    /// Show a past or foreign run
    ///
    /// Sub-workflow calls are expanded so the run's inner task statuses stay
    /// visible; the expansion is kept after a finished run is fetched. Other
    /// instances keep their timers; the instance is fetched once and polling
    /// continues if it is still running remotely.
    pub async fn activate_instance(&mut self, instance_id: &str) -> Result<()> {
        if let Some(previous) = self.active_instance.take() {
            if previous != instance_id {
                self.clear_node_status(&previous);
            }
        }
        let expanded = match self.tree.expand_sub_workflows(&self.registry) {
            Ok(count) => {
                if count > 0 {
                    self.layout = None;
                }
                self.tree.has_expansion()
            }
            Err(e) => {
                log::warn!("showing '{}' without sub-workflow tasks: {}", instance_id, e);
                self.restore_expansion();
                false
            }
        };
        let tracker = self
            .trackers
            .entry(instance_id.to_string())
            .or_insert_with(|| ExecutionTracker::new(instance_id, ExecutionStatus::Scheduled));
        tracker.expanded |= expanded;
        self.active_instance = Some(instance_id.to_string());
        let outcome = self.fetcher(instance_id).run().await;
        self.apply_outcome(outcome, false)
    }

    /// Delete a run remotely and forget it locally
    pub async fn delete_execution(&mut self, instance_id: &str) -> Result<()> {
        self.scheduler.cancel(instance_id);
        self.service.delete(instance_id).await?;
        let tracker = self.trackers.remove(instance_id);
        self.clear_node_status(instance_id);
        if self.active_instance.as_deref() == Some(instance_id) {
            self.active_instance = None;
        }
        if tracker.is_some_and(|t| t.expanded) {
            self.restore_expansion();
        }
        self.emit(FlowEvent::RefreshNeeded);
        Ok(())
    }

    /// One poll tick, throttled to the configured floor
    async fn poll(&mut self, instance_id: &str) -> Result<()> {
        if !self.trackers.contains_key(instance_id) {
            return Err(FlowError::UnknownInstance(instance_id.to_string()));
        }
        let outcome = self.fetcher(instance_id).run().await;
        self.apply_outcome(outcome, true)
    }

    fn fetcher(&self, instance_id: &str) -> PendingFetch {
        PendingFetch::new(instance_id, Arc::clone(&self.service), self.config.poll_floor())
    }

    /// Apply a fetch taken from [`WorkflowFlow::next_tick`]
    ///
    /// Outcomes for instances deleted in the meantime are rejected.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) -> Result<()> {
        self.apply_outcome(outcome, true)
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome, restore_when_done: bool) -> Result<()> {
        let FetchOutcome { instance_id, result } = outcome;
        let Some(tracker) = self.trackers.get(&instance_id) else {
            return Err(FlowError::UnknownInstance(instance_id));
        };
        match result {
            Ok(snapshot) => {
                self.apply_snapshot(&instance_id, snapshot, restore_when_done);
                Ok(())
            }
            Err(e) => {
                if tracker.status == ExecutionStatus::Running {
                    self.scheduler.arm(&instance_id, TimerAction::Poll, Duration::ZERO);
                } else {
                    self.cancel_poll(&instance_id);
                }
                Err(e)
            }
        }
    }

    /// Drop a pending poll; a pending reset stays
    fn cancel_poll(&mut self, instance_id: &str) {
        if self.scheduler.action(instance_id) == Some(TimerAction::Poll) {
            self.scheduler.cancel(instance_id);
        }
    }

    fn apply_snapshot(&mut self, instance_id: &str, snapshot: ExecutionSnapshot, restore_when_done: bool) {
        let Some(tracker) = self.trackers.get_mut(instance_id) else {
            return;
        };
        let changed = tracker.observe(snapshot.clone());
        let finished = tracker.apply_remote_status(snapshot.status);
        let status = tracker.status;
        let expanded = tracker.expanded;

        for task in &snapshot.tasks {
            match self.tree.get_mut(&task.reference_name) {
                Some(node) => {
                    node.set_execution(instance_id, task.status, task.to_value());
                }
                None => log::debug!("skipping remote task '{}' with no matching node", task.reference_name),
            }
        }
        if let Some(outcome) = finished {
            let end_id = self.tree.end_id().to_string();
            if let Some(end) = self.tree.get_mut(&end_id) {
                end.set_execution_status(instance_id, TaskStatus::Completed);
            }
            log::info!("instance '{}' finished as {:?}", instance_id, outcome);
            self.emit(FlowEvent::execution_finished(instance_id, outcome));
        }
        if changed {
            self.emit(FlowEvent::ExecutionUpdated {
                instance_id: instance_id.to_string(),
                snapshot,
            });
        }
        self.emit(FlowEvent::RefreshNeeded);

        if status == ExecutionStatus::Running {
            self.scheduler.arm(instance_id, TimerAction::Poll, Duration::ZERO);
            return;
        }
        self.cancel_poll(instance_id);
        if restore_when_done && status != ExecutionStatus::Paused && expanded {
            self.restore_expansion();
        }
    }

    /// Wait for the next timer and fire it
    ///
    /// A due poll is handed out as a [`PendingFetch`] that does not borrow
    /// the flow. A retry poll is armed first, so dropping the fetch before
    /// its outcome is applied delays polling by `poll_retry_ms` instead of
    /// ending it.
    pub async fn next_tick(&mut self) -> Option<Tick> {
        loop {
            let (instance_id, action) = self.scheduler.next_due().await?;
            match action {
                TimerAction::Reset => {
                    self.reset(&instance_id);
                    return Some(Tick::Reset(instance_id));
                }
                TimerAction::Poll if !self.trackers.contains_key(&instance_id) => {
                    log::debug!("dropping poll of forgotten instance '{}'", instance_id);
                }
                TimerAction::Poll => {
                    self.scheduler
                        .arm(&instance_id, TimerAction::Poll, self.config.poll_retry());
                    return Some(Tick::Fetch(self.fetcher(&instance_id)));
                }
            }
        }
    }

    /// Wait for the next timer and run it; returns the instance it fired for
    ///
    /// Safe to drop at any await point.
    pub async fn run_next_timer(&mut self) -> Option<String> {
        match self.next_tick().await? {
            Tick::Reset(instance_id) => Some(instance_id),
            Tick::Fetch(fetch) => {
                let outcome = fetch.run().await;
                let instance_id = outcome.instance_id.clone();
                if let Err(e) = self.apply_fetch(outcome) {
                    log::warn!("poll of '{}' failed: {}", instance_id, e);
                }
                Some(instance_id)
            }
        }
    }

    /// Run timers until none are left or `max` have fired
    pub async fn run_timers(&mut self, max: usize) -> usize {
        let mut fired = 0;
        while fired < max && self.run_next_timer().await.is_some() {
            fired += 1;
        }
        fired
    }
}
