use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use super::workflow::CheckWorkflow;

/// Time between two cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic driver of check cycles.
///
/// `init` runs a cycle right away and then one every interval. The timer
/// never waits for a cycle to finish, so a slow cycle can overlap the next
/// one. Dropping the scheduler or calling `shutdown` stops the timer and
/// cancels cycles still in flight.
pub struct MonitoringScheduler {
    workflow: Arc<CheckWorkflow>,
    period: Duration,
    timer: Option<JoinHandle<()>>,
}

impl MonitoringScheduler {
    pub fn new(workflow: CheckWorkflow) -> Self {
        Self { workflow: Arc::new(workflow), period: DEFAULT_INTERVAL, timer: None }
    }

    pub fn with_interval(mut self, period: Duration) -> Self {
        if period.is_zero() {
            warn!("Zero check interval requested, keeping {:?}", self.period);
        } else {
            self.period = period;
        }
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start the first cycle immediately and arm the periodic timer
    pub fn init(&mut self) {
        if self.is_running() {
            warn!("Monitoring scheduler already started");
            return;
        }

        let workflow = Arc::clone(&self.workflow);
        let period = self.period;
        info!(interval_seconds = period.as_secs(), "Starting monitoring scheduler");

        self.timer = Some(tokio::spawn(async move {
            // The first tick completes immediately, which gives the cold-start cycle
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycles = JoinSet::new();

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let workflow = Arc::clone(&workflow);
                        cycles.spawn(async move {
                            // Outcome is already logged by the cycle itself
                            let _ = workflow.run_cycle().await;
                        });
                    }
                    Some(finished) = cycles.join_next(), if !cycles.is_empty() => {
                        if let Err(e) = finished {
                            error!(error = %e, "Check cycle panicked");
                        }
                    }
                }
            }
        }));
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Stop the timer and cancel running cycles
    pub fn shutdown(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!("Monitoring scheduler stopped");
        }
    }
}

impl Drop for MonitoringScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::processor::OutcomeProcessor;
    use crate::monitoring::types::Outcome;
    use crate::store::{Collection, MemoryStore};
    use crate::testing::{FlakyStore, RecordingAlertSender, RecordingLogSink, ScriptedExecutor};
    use serde_json::json;

    fn scheduler(
        store: Arc<FlakyStore>,
        executor: Arc<ScriptedExecutor>,
        logs: Arc<RecordingLogSink>,
    ) -> MonitoringScheduler {
        let alerts = Arc::new(RecordingAlertSender::default());
        let processor = OutcomeProcessor::new(store.clone(), logs, alerts);
        MonitoringScheduler::new(CheckWorkflow::new(store, executor, processor))
    }

    async fn seeded_store(id: &str) -> Arc<FlakyStore> {
        let memory = MemoryStore::new();
        memory
            .insert(
                Collection::Checks,
                id,
                json!({
                    "id": id,
                    "userPhone": "5551234567",
                    "protocol": "https",
                    "url": "example.com",
                    "method": "get",
                    "successCodes": [200],
                    "timeoutSeconds": 2
                }),
            )
            .await;
        Arc::new(FlakyStore::new(memory))
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_runs_immediately_then_every_interval() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let executor = Arc::new(ScriptedExecutor::new(Outcome::response(200)));
        let mut scheduler =
            scheduler(store.clone(), executor, Arc::new(RecordingLogSink::default()));

        scheduler.init();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.list_calls(), 1, "cold start cycle");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.list_calls(), 2);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.list_calls(), 4);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_listing_does_not_stop_later_cycles() {
        let store = seeded_store("aaaaaaaaaaaaaaaaaaaa").await;
        let executor = Arc::new(ScriptedExecutor::new(Outcome::response(200)));
        let logs = Arc::new(RecordingLogSink::default());
        let mut scheduler = scheduler(store.clone(), executor.clone(), logs.clone());

        store.fail_list(true);
        scheduler.init();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(executor.probed().is_empty());

        store.fail_list(false);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(executor.probed().len(), 1);
        assert_eq!(logs.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_does_not_delay_the_next_tick() {
        let store = seeded_store("aaaaaaaaaaaaaaaaaaaa").await;
        let executor = Arc::new(
            ScriptedExecutor::new(Outcome::response(200)).with_delay(Duration::from_secs(90)),
        );
        let logs = Arc::new(RecordingLogSink::default());
        let mut scheduler = scheduler(store.clone(), executor.clone(), logs.clone());

        scheduler.init();
        tokio::time::sleep(Duration::from_secs(61)).await;

        // Both cycles are in flight, neither has finished
        assert_eq!(store.list_calls(), 2);
        assert_eq!(executor.probed().len(), 2);
        assert!(logs.entries().is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(logs.entries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_timer() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let executor = Arc::new(ScriptedExecutor::new(Outcome::response(200)));
        let mut scheduler =
            scheduler(store.clone(), executor, Arc::new(RecordingLogSink::default()));

        scheduler.init();
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.shutdown();
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_init_twice_keeps_one_timer() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let executor = Arc::new(ScriptedExecutor::new(Outcome::response(200)));
        let mut scheduler =
            scheduler(store.clone(), executor, Arc::new(RecordingLogSink::default()))
                .with_interval(Duration::from_secs(3600));

        scheduler.init();
        scheduler.init();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.list_calls(), 1);
        assert_eq!(scheduler.period(), Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_interval_is_ignored() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let executor = Arc::new(ScriptedExecutor::new(Outcome::response(200)));
        let scheduler = scheduler(store, executor, Arc::new(RecordingLogSink::default()))
            .with_interval(Duration::ZERO);
        assert_eq!(scheduler.period(), DEFAULT_INTERVAL);
    }
}
