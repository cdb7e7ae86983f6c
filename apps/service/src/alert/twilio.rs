//! SMS alerts through the Twilio messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AlertError, AlertSender, validate_alert};

pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Account details needed to send messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    /// Sending number in E.164 form, e.g. `+15555555555`
    pub from_phone: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone)]
pub struct TwilioSender {
    client: Client,
    credentials: TwilioCredentials,
}

impl TwilioSender {
    pub fn new(credentials: TwilioCredentials) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, credentials })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.credentials.api_base.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

#[async_trait]
impl AlertSender for TwilioSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AlertError> {
        let (phone, message) = validate_alert(phone, message)?;
        let to = format!("+1{phone}");

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&[
                ("From", self.credentials.from_phone.as_str()),
                ("To", to.as_str()),
                ("Body", message.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, to = %to, "Twilio responded");

        match status {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            other => Err(AlertError::Rejected(other.as_u16())),
        }
    }
}
