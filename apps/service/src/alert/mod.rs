//! Outbound alerts to check owners.

pub mod twilio;

pub use twilio::{TwilioCredentials, TwilioSender};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Longest SMS body accepted by the provider
pub const MAX_MESSAGE_LENGTH: usize = 1600;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("invalid phone number: {0:?}")]
    InvalidPhone(String),

    #[error("invalid alert message: {0}")]
    InvalidMessage(&'static str),

    #[error("network error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("SMS provider rejected the message with status {0}")]
    Rejected(u16),

    #[error("alert sender unavailable: {0}")]
    Unavailable(String),
}

/// Delivers a text message to a phone number. No retries, no delivery guarantee.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AlertError>;
}

/// Sender used when no SMS provider is configured: the alert only reaches the log
#[derive(Debug, Clone, Default)]
pub struct LogAlertSender;

#[async_trait]
impl AlertSender for LogAlertSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AlertError> {
        info!(phone = %phone, message = %message, "SMS provider not configured, alert logged only");
        Ok(())
    }
}

/// Checks shared by every real sender before anything leaves the process
pub(crate) fn validate_alert(phone: &str, message: &str) -> Result<(String, String), AlertError> {
    let phone = phone.trim();
    if phone.chars().count() != 10 {
        return Err(AlertError::InvalidPhone(phone.to_string()));
    }

    let message = message.trim();
    if message.is_empty() {
        return Err(AlertError::InvalidMessage("message is empty"));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AlertError::InvalidMessage("message is longer than 1600 characters"));
    }

    Ok((phone.to_string(), message.to_string()))
}
