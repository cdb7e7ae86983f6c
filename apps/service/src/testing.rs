//! Test doubles for the engine's collaborators.
//!
//! Compiled for unit tests and behind the `test-support` feature for the
//! integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::alert::{AlertError, AlertSender};
use crate::logs::{LogError, LogSink};
use crate::monitoring::{Check, Outcome, ProbeExecutor};
use crate::store::{Collection, MemoryStore, RecordStore, StoreError};

/// [`MemoryStore`] with switchable failures and call counters
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_list: AtomicBool,
    fail_updates: AtomicBool,
    failing_reads: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner, ..Self::default() }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_read(&self, key: impl Into<String>) {
        self.failing_reads.lock().unwrap_or_else(PoisonError::into_inner).insert(key.into());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn read(&self, collection: Collection, key: &str) -> Result<Value, StoreError> {
        let failing =
            self.failing_reads.lock().unwrap_or_else(PoisonError::into_inner).contains(key);
        if failing {
            return Err(StoreError::Unavailable(format!("read of {key} refused")));
        }
        self.inner.read(collection, key).await
    }

    async fn update(
        &self,
        collection: Collection,
        key: &str,
        record: &Value,
    ) -> Result<(), StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("updates refused".to_string()));
        }
        self.inner.update(collection, key, record).await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("listing refused".to_string()));
        }
        self.inner.list(collection).await
    }
}

/// Keeps every appended `(stream, entry)` pair
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    entries: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingLogSink {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn entries_for(&self, stream_id: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(stream, _)| stream == stream_id)
            .map(|(_, entry)| entry)
            .collect()
    }
}

#[async_trait]
impl LogSink for RecordingLogSink {
    async fn append(&self, stream_id: &str, entry: &str) -> Result<(), LogError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LogError::Unavailable("appends refused".to_string()));
        }
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((stream_id.to_string(), entry.to_string()));
        Ok(())
    }
}

/// Keeps every `(phone, message)` it was asked to send
#[derive(Debug, Default)]
pub struct RecordingAlertSender {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingAlertSender {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Alerts handed to the sender, including ones that failed
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl AlertSender for RecordingAlertSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AlertError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((phone.to_string(), message.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(AlertError::Unavailable("sending refused".to_string()));
        }
        Ok(())
    }
}

/// Probe that answers from a script instead of the network
#[derive(Debug)]
pub struct ScriptedExecutor {
    default: Outcome,
    per_check: Mutex<HashMap<String, Outcome>>,
    delay: Option<Duration>,
    probed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(default: Outcome) -> Self {
        Self { default, per_check: Mutex::default(), delay: None, probed: Mutex::default() }
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(&self, check_id: impl Into<String>, outcome: Outcome) {
        self.per_check
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(check_id.into(), outcome);
    }

    /// Ids of every check probed so far, in call order
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ProbeExecutor for ScriptedExecutor {
    async fn probe(&self, check: &Check) -> Outcome {
        self.probed.lock().unwrap_or_else(PoisonError::into_inner).push(check.id.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.per_check
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&check.id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
