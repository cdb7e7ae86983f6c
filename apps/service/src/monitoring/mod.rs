/// Monitoring engine - periodically re-evaluates every stored check
///
/// This module is responsible for:
/// - Validating stored check records
/// - Probing HTTP/HTTPS targets under a deadline
/// - Deriving up/down state, persisting it, logging it and alerting on changes
/// - Scheduling the periodic cycles
pub mod completion;
pub mod executor;
pub mod processor;
pub mod scheduler;
pub mod types;
pub mod validation;
pub mod workflow;

pub use executor::{HttpExecutor, ProbeExecutor};
pub use processor::{OutcomeProcessor, ProcessedCheck};
pub use scheduler::MonitoringScheduler;
pub use types::{Check, CheckMethod, CheckState, LogEntry, Outcome, Protocol};
pub use validation::{ValidationError, validate_check_data};
pub use workflow::{CheckError, CheckWorkflow, CycleError, CycleSummary};
