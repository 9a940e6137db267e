//! Per-instance timers
//!
//! Each execution instance has at most one pending timer. Arming a timer
//! replaces (and cancels) the previous one, so a stale poll can never fire
//! after a stop, a delete or a reschedule.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What to do when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Fetch the instance and apply the snapshot
    Poll,
    /// Put a cleared instance back to SCHEDULED
    Reset,
}

#[derive(Debug)]
struct Timer {
    due: Instant,
    action: TimerAction,
    token: CancellationToken,
}

/// Timers keyed by instance id
#[derive(Debug, Default)]
pub struct PollScheduler {
    timers: HashMap<String, Timer>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` for `instance_id` after `delay`
    ///
    /// Returns the token of the new timer; cancelling it drops the timer.
    pub fn arm(&mut self, instance_id: &str, action: TimerAction, delay: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let timer = Timer {
            due: Instant::now() + delay,
            action,
            token: token.clone(),
        };
        if let Some(previous) = self.timers.insert(instance_id.to_string(), timer) {
            previous.token.cancel();
        }
        log::trace!("armed {:?} for '{}' in {:?}", action, instance_id, delay);
        token
    }

    /// Cancel the pending timer of an instance; returns whether one existed
    pub fn cancel(&mut self, instance_id: &str) -> bool {
        match self.timers.remove(instance_id) {
            Some(timer) => {
                timer.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, instance_id: &str) -> bool {
        self.timers
            .get(instance_id)
            .is_some_and(|timer| !timer.token.is_cancelled())
    }

    /// Pending action of an instance
    pub fn action(&self, instance_id: &str) -> Option<TimerAction> {
        self.timers
            .get(instance_id)
            .filter(|timer| !timer.token.is_cancelled())
            .map(|timer| timer.action)
    }

    pub fn cancellation_token(&self, instance_id: &str) -> Option<CancellationToken> {
        self.timers.get(instance_id).map(|timer| timer.token.clone())
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Wait for the earliest timer and take it
    ///
    /// Timers cancelled through their token while waiting are dropped and
    /// the wait moves on to the next one. Returns `None` once no timers are
    /// left.
    pub async fn next_due(&mut self) -> Option<(String, TimerAction)> {
        loop {
            self.timers.retain(|_, timer| !timer.token.is_cancelled());
            let (id, due, token) = self
                .timers
                .iter()
                .min_by(|a, b| a.1.due.cmp(&b.1.due).then_with(|| a.0.cmp(b.0)))
                .map(|(id, timer)| (id.clone(), timer.due, timer.token.clone()))?;

            tokio::select! {
                _ = tokio::time::sleep_until(due) => {
                    if let Some(timer) = self.timers.remove(&id) {
                        return Some((id, timer.action));
                    }
                }
                _ = token.cancelled() => {
                    log::trace!("timer for '{}' cancelled while waiting", id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_earliest_timer_fires_first() {
        let mut scheduler = PollScheduler::new();
        scheduler.arm("slow", TimerAction::Poll, Duration::from_millis(500));
        scheduler.arm("fast", TimerAction::Reset, Duration::from_millis(80));

        let start = Instant::now();
        assert_eq!(scheduler.next_due().await, Some(("fast".to_string(), TimerAction::Reset)));
        assert_eq!(start.elapsed(), Duration::from_millis(80));
        assert_eq!(scheduler.next_due().await, Some(("slow".to_string(), TimerAction::Poll)));
        assert_eq!(scheduler.next_due().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_and_cancels() {
        let mut scheduler = PollScheduler::new();
        let first = scheduler.arm("run", TimerAction::Poll, Duration::from_millis(10));
        scheduler.arm("run", TimerAction::Reset, Duration::from_millis(20));

        assert!(first.is_cancelled());
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.action("run"), Some(TimerAction::Reset));
        assert_eq!(scheduler.next_due().await, Some(("run".to_string(), TimerAction::Reset)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_skips_timer() {
        let mut scheduler = PollScheduler::new();
        scheduler.arm("a", TimerAction::Poll, Duration::from_millis(10));
        scheduler.arm("b", TimerAction::Poll, Duration::from_millis(30));
        let token = scheduler.cancellation_token("a").unwrap();
        token.cancel();

        assert!(!scheduler.is_armed("a"));
        assert_eq!(scheduler.next_due().await, Some(("b".to_string(), TimerAction::Poll)));
    }

    #[test]
    fn test_cancel() {
        tokio_test::block_on(async {
            let mut scheduler = PollScheduler::new();
            let token = scheduler.arm("a", TimerAction::Poll, Duration::ZERO);
            assert!(scheduler.cancel("a"));
            assert!(token.is_cancelled());
            assert!(!scheduler.cancel("a"));
            assert!(scheduler.is_empty());
        });
    }
}
