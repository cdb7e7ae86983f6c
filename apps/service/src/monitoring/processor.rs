//! Turns a probe outcome into a state change, a persisted record, a log line
//! and, on a real transition, an alert.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::types::{Check, CheckState, LogEntry, Outcome};
use crate::alert::AlertSender;
use crate::logs::LogSink;
use crate::store::{Collection, RecordStore};

/// What happened while processing one outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedCheck {
    pub check_id: String,
    pub previous_state: CheckState,
    pub state: CheckState,
    /// The alert rule held for this evaluation
    pub alert: bool,
    pub persisted: bool,
    pub logged: bool,
    /// `Some(delivered)` when an alert was attempted
    pub alert_delivered: Option<bool>,
}

/// `up` only for a response whose code is one of the check's success codes
pub fn evaluate_state(check: &Check, outcome: &Outcome) -> CheckState {
    match outcome.response_code {
        Some(code) if !outcome.error && check.accepts(code) => CheckState::Up,
        _ => CheckState::Down,
    }
}

/// Alert on a change of state, except on the first evaluation of a check
pub fn should_alert(check: &Check, new_state: CheckState) -> bool {
    check.has_been_checked() && check.state != new_state
}

pub fn alert_message(check: &Check, state: CheckState) -> String {
    format!(
        "Alert: Your check for {} {}://{} is currently {}",
        check.method.as_http(),
        check.protocol,
        check.url,
        state
    )
}

pub struct OutcomeProcessor {
    store: Arc<dyn RecordStore>,
    logs: Arc<dyn LogSink>,
    alerts: Arc<dyn AlertSender>,
}

impl OutcomeProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        logs: Arc<dyn LogSink>,
        alerts: Arc<dyn AlertSender>,
    ) -> Self {
        Self { store, logs, alerts }
    }

    pub async fn process(&self, check: Check, outcome: Outcome) -> ProcessedCheck {
        self.process_at(check, outcome, Utc::now().timestamp_millis()).await
    }

    /// Process an outcome evaluated at `now` (milliseconds since epoch).
    ///
    /// Persisting, logging and alerting are attempted in that order and none
    /// of them depends on another succeeding.
    pub async fn process_at(&self, check: Check, outcome: Outcome, now: i64) -> ProcessedCheck {
        let state = evaluate_state(&check, &outcome);
        let alert = should_alert(&check, state);

        let updated = Check { state, last_checked: Some(now), ..check.clone() };

        let persisted = self.persist(&updated).await;
        let logged = self.append_log(check.clone(), outcome, state, alert, now).await;

        let alert_delivered = if alert {
            Some(self.send_alert(&updated).await)
        } else {
            debug!(
                check_id = %check.id,
                state = %state,
                "Check outcome unchanged, no alert needed"
            );
            None
        };

        ProcessedCheck {
            check_id: check.id,
            previous_state: check.state,
            state,
            alert,
            persisted,
            logged,
            alert_delivered,
        }
    }

    async fn persist(&self, updated: &Check) -> bool {
        let record = match serde_json::to_value(updated) {
            Ok(record) => record,
            Err(e) => {
                error!(check_id = %updated.id, error = %e, "Failed to serialize check data");
                return false;
            }
        };

        match self.store.update(Collection::Checks, &updated.id, &record).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    check_id = %updated.id,
                    error = %e,
                    "Failed to save check data while processing check outcome"
                );
                false
            }
        }
    }

    async fn append_log(
        &self,
        check: Check,
        outcome: Outcome,
        state: CheckState,
        alert: bool,
        time: i64,
    ) -> bool {
        let check_id = check.id.clone();
        let entry = LogEntry { check, outcome, state, alert, time };

        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                error!(check_id = %check_id, error = %e, "Failed to serialize log entry");
                return false;
            }
        };

        match self.logs.append(&check_id, &line).await {
            Ok(()) => true,
            Err(e) => {
                warn!(check_id = %check_id, error = %e, "Failed to append check log entry");
                false
            }
        }
    }

    async fn send_alert(&self, check: &Check) -> bool {
        let message = alert_message(check, check.state);

        match self.alerts.send(&check.user_phone, &message).await {
            Ok(()) => {
                info!(
                    check_id = %check.id,
                    message = %message,
                    "User was alerted to a status change in their check"
                );
                true
            }
            Err(e) => {
                error!(
                    check_id = %check.id,
                    error = %e,
                    "Failed to alert user who had a status change in their check"
                );
                false
            }
        }
    }
}
