//! One pass over every stored check.
//!
//! Each check gets its own task: read, validate, probe, process. A failure
//! in one check is logged and never touches the others.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::executor::ProbeExecutor;
use super::processor::{OutcomeProcessor, ProcessedCheck};
use super::validation::{ValidationError, validate_check_data};
use crate::store::{Collection, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not list checks: {0}")]
    Listing(#[source] StoreError),

    #[error("could not find any checks to process")]
    NoChecks,
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("could not read check {id}: {source}")]
    Read {
        id: String,
        #[source]
        source: StoreError,
    },

    #[error("check {id} skipped: {source}")]
    Invalid {
        id: String,
        #[source]
        source: ValidationError,
    },
}

/// Counts for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
}

pub struct CheckWorkflow {
    store: Arc<dyn RecordStore>,
    executor: Arc<dyn ProbeExecutor>,
    processor: OutcomeProcessor,
}

impl CheckWorkflow {
    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<dyn ProbeExecutor>,
        processor: OutcomeProcessor,
    ) -> Self {
        Self { store, executor, processor }
    }

    /// Gather every check and evaluate them concurrently
    pub async fn run_cycle(self: &Arc<Self>) -> Result<CycleSummary, CycleError> {
        let ids = match self.store.list(Collection::Checks).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Could not list checks, cycle abandoned");
                return Err(CycleError::Listing(e));
            }
        };

        if ids.is_empty() {
            warn!("Could not find any checks to process");
            return Err(CycleError::NoChecks);
        }

        let mut summary = CycleSummary { listed: ids.len(), ..CycleSummary::default() };
        debug!(checks = summary.listed, "Starting check cycle");

        let mut workers = JoinSet::new();
        for id in ids {
            let workflow = Arc::clone(self);
            workers.spawn(async move { workflow.run_check(&id).await });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(_)) => summary.processed += 1,
                Ok(Err(e)) => {
                    warn!(error = %e, "Check skipped this cycle");
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(error = %e, "Check worker panicked");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            listed = summary.listed,
            processed = summary.processed,
            skipped = summary.skipped,
            "Check cycle finished"
        );
        Ok(summary)
    }

    /// Evaluate a single check end to end
    pub async fn run_check(&self, id: &str) -> Result<ProcessedCheck, CheckError> {
        let record = self
            .store
            .read(Collection::Checks, id)
            .await
            .map_err(|source| CheckError::Read { id: id.to_string(), source })?;

        let check = validate_check_data(&record)
            .map_err(|source| CheckError::Invalid { id: id.to_string(), source })?;

        let outcome = self.executor.probe(&check).await;
        Ok(self.processor.process(check, outcome).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{CheckState, Outcome};
    use crate::store::MemoryStore;
    use crate::testing::{FlakyStore, RecordingAlertSender, RecordingLogSink, ScriptedExecutor};
    use serde_json::{Value, json};

    fn record(id: &str) -> Value {
        json!({
            "id": id,
            "userPhone": "5551234567",
            "protocol": "http",
            "url": "example.com",
            "method": "get",
            "successCodes": [200],
            "timeoutSeconds": 1
        })
    }

    struct Harness {
        store: Arc<FlakyStore>,
        executor: Arc<ScriptedExecutor>,
        logs: Arc<RecordingLogSink>,
        workflow: Arc<CheckWorkflow>,
    }

    fn harness(executor: ScriptedExecutor) -> Harness {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let executor = Arc::new(executor);
        let logs = Arc::new(RecordingLogSink::default());
        let alerts = Arc::new(RecordingAlertSender::default());
        let processor = OutcomeProcessor::new(store.clone(), logs.clone(), alerts);
        let workflow = Arc::new(CheckWorkflow::new(store.clone(), executor.clone(), processor));
        Harness { store, executor, logs, workflow }
    }

    #[tokio::test]
    async fn test_empty_listing_reports_no_checks() {
        let h = harness(ScriptedExecutor::new(Outcome::response(200)));

        let result = h.workflow.run_cycle().await;

        assert!(matches!(result, Err(CycleError::NoChecks)));
        assert!(h.executor.probed().is_empty());
        assert!(h.logs.entries().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_ends_cycle() {
        let h = harness(ScriptedExecutor::new(Outcome::response(200)));
        h.store.inner().insert(Collection::Checks, "a", record("aaaaaaaaaaaaaaaaaaaa")).await;
        h.store.fail_list(true);

        assert!(matches!(h.workflow.run_cycle().await, Err(CycleError::Listing(_))));
        assert!(h.executor.probed().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_record_is_never_probed() {
        let h = harness(ScriptedExecutor::new(Outcome::response(200)));
        let mut bad = record("bbbbbbbbbbbbbbbbbbbb");
        bad["timeoutSeconds"] = json!(9);
        h.store.inner().insert(Collection::Checks, "bbbbbbbbbbbbbbbbbbbb", bad).await;

        let err = h.workflow.run_check("bbbbbbbbbbbbbbbbbbbb").await.unwrap_err();

        assert!(matches!(err, CheckError::Invalid { .. }));
        assert!(h.executor.probed().is_empty());
        assert!(h.logs.entries().is_empty());
        assert_eq!(h.store.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_check() {
        let h = harness(ScriptedExecutor::new(Outcome::response(200)));
        let good = "aaaaaaaaaaaaaaaaaaaa";
        let unreadable = "cccccccccccccccccccc";
        let malformed = "dddddddddddddddddddd";

        h.store.inner().insert(Collection::Checks, good, record(good)).await;
        h.store.inner().insert(Collection::Checks, unreadable, record(unreadable)).await;
        h.store.inner().insert(Collection::Checks, malformed, json!({ "id": malformed })).await;
        h.store.fail_read(unreadable);

        let summary = h.workflow.run_cycle().await.unwrap();

        assert_eq!(summary, CycleSummary { listed: 3, processed: 1, skipped: 2 });
        assert_eq!(h.executor.probed(), vec![good.to_string()]);
        assert_eq!(h.logs.entries_for(good).len(), 1);

        let stored = h.store.read(Collection::Checks, good).await.unwrap();
        assert_eq!(stored["state"], "up");
    }

    #[tokio::test]
    async fn test_each_processed_check_logs_once_per_cycle() {
        let h = harness(ScriptedExecutor::new(Outcome::timeout()));
        let ids = ["aaaaaaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbbbbbb", "cccccccccccccccccccc"];
        for id in ids {
            h.store.inner().insert(Collection::Checks, id, record(id)).await;
        }
        h.store.fail_updates(true);

        let summary = h.workflow.run_cycle().await.unwrap();

        assert_eq!(summary.processed, 3);
        for id in ids {
            assert_eq!(h.logs.entries_for(id).len(), 1, "{id} should log exactly once");
        }
    }

    #[tokio::test]
    async fn test_outcomes_are_applied_per_check() {
        let h = harness(ScriptedExecutor::new(Outcome::response(200)));
        let healthy = "aaaaaaaaaaaaaaaaaaaa";
        let failing = "bbbbbbbbbbbbbbbbbbbb";
        h.store.inner().insert(Collection::Checks, healthy, record(healthy)).await;
        h.store.inner().insert(Collection::Checks, failing, record(failing)).await;
        h.executor.script(failing, Outcome::network_error("connection refused"));

        let summary = h.workflow.run_cycle().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(h.store.read(Collection::Checks, healthy).await.unwrap()["state"], "up");
        assert_eq!(h.store.read(Collection::Checks, failing).await.unwrap()["state"], "down");
    }

    #[tokio::test]
    async fn test_run_check_returns_processing_result() {
        let h = harness(ScriptedExecutor::new(Outcome::response(500)));
        let id = "aaaaaaaaaaaaaaaaaaaa";
        h.store.inner().insert(Collection::Checks, id, record(id)).await;

        let processed = h.workflow.run_check(id).await.unwrap();

        assert_eq!(processed.state, CheckState::Down);
        assert!(!processed.alert);
        assert!(processed.persisted);
    }

    #[tokio::test]
    async fn test_missing_record_is_a_read_error() {
        let h = harness(ScriptedExecutor::new(Outcome::response(200)));
        let err = h.workflow.run_check("gone").await.unwrap_err();
        assert!(matches!(err, CheckError::Read { source, .. } if source.is_not_found()));
    }
}
