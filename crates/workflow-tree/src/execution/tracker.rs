//! Local state of one execution instance

use super::types::ExecutionSnapshot;
use crate::types::ExecutionStatus;

/// Tracks one remote instance between polls
#[derive(Debug, Clone)]
pub struct ExecutionTracker {
    pub instance_id: String,
    pub status: ExecutionStatus,
    last_snapshot: Option<ExecutionSnapshot>,
    /// Terminal remote status already acted on
    outcome: Option<ExecutionStatus>,
    /// Sub-workflows were expanded for this run
    pub expanded: bool,
}

impl ExecutionTracker {
    pub fn new(instance_id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            instance_id: instance_id.into(),
            status,
            last_snapshot: None,
            outcome: None,
            expanded: false,
        }
    }

    pub fn snapshot(&self) -> Option<&ExecutionSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn outcome(&self) -> Option<ExecutionStatus> {
        self.outcome
    }

    /// Whether the instance is RUNNING or PAUSED locally
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Store a fetched snapshot; returns true when it differs from the last
    /// one in anything but volatile fields
    pub fn observe(&mut self, snapshot: ExecutionSnapshot) -> bool {
        let changed = self
            .last_snapshot
            .as_ref()
            .map_or(true, |last| last.differs_from(&snapshot));
        self.last_snapshot = Some(snapshot);
        changed
    }

    /// Fold the remote top-level status into the local one
    ///
    /// Returns the terminal status the first time a given one is seen; the
    /// tracker is then back to SCHEDULED. A local PAUSED or CANCELED is not
    /// overridden by a remote RUNNING.
    pub fn apply_remote_status(&mut self, remote: ExecutionStatus) -> Option<ExecutionStatus> {
        if remote.is_terminal() {
            if self.outcome == Some(remote) {
                return None;
            }
            self.outcome = Some(remote);
            self.status = ExecutionStatus::Scheduled;
            return Some(remote);
        }
        match remote {
            ExecutionStatus::Paused => self.status = ExecutionStatus::Paused,
            ExecutionStatus::Running
                if !matches!(self.status, ExecutionStatus::Paused | ExecutionStatus::Canceled) =>
            {
                self.status = ExecutionStatus::Running;
            }
            _ => {}
        }
        None
    }
}
