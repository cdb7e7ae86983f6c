use std::error::Error as StdError;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, redirect};
use tracing::{debug, warn};

use super::completion::OutcomeSlot;
use super::types::{Check, Outcome};

const USER_AGENT: &str = concat!("uptime-service/", env!("CARGO_PKG_VERSION"));

/// Performs the network probe for one check
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    /// Probe the check's target and classify the result. Always yields exactly one outcome.
    async fn probe(&self, check: &Check) -> Outcome;
}

/// HTTP/HTTPS probe.
///
/// The deadline is enforced here rather than by the client, and redirects
/// are reported as-is so a 301 is an outcome of its own.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeExecutor for HttpExecutor {
    async fn probe(&self, check: &Check) -> Outcome {
        let endpoint = match check.endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(
                    check_id = %check.id,
                    url = %check.url,
                    error = %e,
                    "Check target is not a valid URL"
                );
                return Outcome::network_error(format!("invalid url: {e}"));
            }
        };

        let start = Instant::now();
        let (slot, receiver) = OutcomeSlot::new();

        let request = self.client.request(check.method.as_http(), endpoint.clone());
        let response_slot = slot.clone();
        let request_task = tokio::spawn(async move {
            let outcome = match request.send().await {
                Ok(response) => Outcome::response(response.status().as_u16()),
                Err(e) => Outcome::network_error(error_chain(&e)),
            };
            response_slot.fill(outcome);
        });

        let deadline = check.timeout();
        let deadline_slot = slot.clone();
        let deadline_task = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            deadline_slot.fill(Outcome::timeout());
        });

        let outcome = receiver
            .await
            .unwrap_or_else(|_| Outcome::network_error("probe ended without an outcome"));

        // Whichever source lost is cancelled so it cannot report later
        request_task.abort();
        deadline_task.abort();

        debug!(
            check_id = %check.id,
            endpoint = %endpoint,
            latency_ms = start.elapsed().as_millis() as u64,
            outcome = ?outcome,
            "Probe finished"
        );

        outcome
    }
}

/// Render an error with its causes, `outer: inner: root`
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
