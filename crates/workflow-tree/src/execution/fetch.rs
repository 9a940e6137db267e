//! Poll fetches detached from the flow
//!
//! A [`PendingFetch`] owns everything one poll tick needs, so it can be
//! awaited (or spawned) while the flow stays free for edits. Its
//! [`FetchOutcome`] is handed back to
//! [`WorkflowFlow::apply_fetch`](crate::WorkflowFlow::apply_fetch).

use std::sync::Arc;
use std::time::Duration;

use super::service::ExecutionService;
use super::types::ExecutionSnapshot;
use crate::error::Result;

/// One fetch of an instance, throttled to the poll floor
pub struct PendingFetch {
    instance_id: String,
    service: Arc<dyn ExecutionService>,
    floor: Duration,
}

impl PendingFetch {
    pub fn new(instance_id: impl Into<String>, service: Arc<dyn ExecutionService>, floor: Duration) -> Self {
        Self {
            instance_id: instance_id.into(),
            service,
            floor,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Fetch the instance; completes no earlier than the poll floor
    pub async fn run(self) -> FetchOutcome {
        let (result, _) = tokio::join!(
            self.service.fetch(&self.instance_id),
            tokio::time::sleep(self.floor)
        );
        FetchOutcome {
            instance_id: self.instance_id,
            result,
        }
    }
}

/// Result of a [`PendingFetch`]
#[derive(Debug)]
pub struct FetchOutcome {
    pub instance_id: String,
    pub result: Result<ExecutionSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::mock::MockService;
    use crate::types::ExecutionStatus;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fetch_waits_for_the_floor() {
        let service = Arc::new(MockService::new());
        service.set_snapshot("run-1", ExecutionSnapshot::new(ExecutionStatus::Running, Vec::new()));

        let fetch = PendingFetch::new("run-1", service.clone(), Duration::from_millis(1000));
        assert_eq!(fetch.instance_id(), "run-1");
        let start = Instant::now();
        let outcome = fetch.run().await;

        assert_eq!(start.elapsed(), Duration::from_millis(1000));
        assert_eq!(outcome.instance_id, "run-1");
        assert_eq!(outcome.result.unwrap().status, ExecutionStatus::Running);
        assert_eq!(service.calls(), vec!["fetch:run-1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_reports_service_errors() {
        let service = Arc::new(MockService::new());
        let outcome = PendingFetch::new("gone", service, Duration::ZERO).run().await;
        assert!(outcome.result.is_err());
    }

    #[test]
    fn test_fetch_future_can_be_spawned() {
        fn assert_spawnable<T: Send + 'static>(_: &T) {}
        let fetch = PendingFetch::new("run-1", Arc::new(MockService::new()), Duration::ZERO);
        let future = fetch.run();
        assert_spawnable(&future);
        assert!(tokio_test::block_on(future).result.is_err());
    }
}
