//! Events emitted by a workflow flow
//!
//! The flow reports structural edits and execution progress through an
//! [`EventSink`], so the same core can drive a UI, a log or a test.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::execution::ExecutionSnapshot;
use crate::types::ExecutionStatus;

/// Receiver of flow events
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g. channel closed)
    fn send(&self, event: FlowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by [`WorkflowFlow`](crate::WorkflowFlow)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FlowEvent {
    /// The tree changed; carries the serialized task list
    StructureChanged { tasks: Vec<Value> },

    /// Execution state changed in a way that needs a redraw
    RefreshNeeded,

    /// A poll returned a snapshot that differs from the previous one
    #[serde(rename_all = "camelCase")]
    ExecutionUpdated {
        instance_id: String,
        snapshot: ExecutionSnapshot,
    },

    /// A run reached a terminal status
    #[serde(rename_all = "camelCase")]
    ExecutionFinished {
        instance_id: String,
        status: ExecutionStatus,
    },

    /// The variable table was rebuilt
    VariablesRebuilt { count: usize },
}

impl FlowEvent {
    pub fn execution_finished(instance_id: &str, status: ExecutionStatus) -> Self {
        Self::ExecutionFinished {
            instance_id: instance_id.to_string(),
            status,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: FlowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<FlowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FlowEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<FlowEvent> {
        self.lock().clone()
    }

    /// Number of collected events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&FlowEvent) -> bool) -> usize {
        self.lock().iter().filter(|event| predicate(event)).count()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: FlowEvent) -> Result<(), EventError> {
        self.lock().push(event);
        Ok(())
    }
}

/// Forwards events into a tokio channel
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::UnboundedSender<FlowEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, event: FlowEvent) -> Result<(), EventError> {
        self.sender.send(event).map_err(|_| EventError::channel_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();
        sink.send(FlowEvent::RefreshNeeded).unwrap();
        sink.send(FlowEvent::execution_finished("run-1", ExecutionStatus::Completed))
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        match &events[1] {
            FlowEvent::ExecutionFinished { instance_id, status } => {
                assert_eq!(instance_id, "run-1");
                assert_eq!(*status, ExecutionStatus::Completed);
            }
            _ => panic!("Expected ExecutionFinished event"),
        }
        assert_eq!(sink.count(|e| matches!(e, FlowEvent::RefreshNeeded)), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        sink.send(FlowEvent::VariablesRebuilt { count: 3 }).unwrap();
    }

    #[test]
    fn test_wire_format() {
        let event = FlowEvent::execution_finished("run-1", ExecutionStatus::TimedOut);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "executionFinished", "instanceId": "run-1", "status": "TIMED_OUT"})
        );
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (sink, mut receiver) = ChannelEventSink::channel();
        sink.send(FlowEvent::RefreshNeeded).unwrap();
        assert_eq!(receiver.recv().await, Some(FlowEvent::RefreshNeeded));

        drop(receiver);
        let err = sink.send(FlowEvent::RefreshNeeded).unwrap_err();
        assert_eq!(err.message, "Channel closed");
    }
}
