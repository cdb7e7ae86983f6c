//! Uptime check worker.
//!
//! Every interval the worker reads all user-defined checks from the record
//! store, probes each target, records whether it is up or down and texts
//! the owner when that changes.

pub mod alert;
pub mod config;
pub mod logs;
pub mod monitoring;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::Config;
pub use monitoring::MonitoringScheduler;
