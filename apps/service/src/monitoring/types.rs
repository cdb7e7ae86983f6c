use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Detail recorded on an outcome whose probe ran past its deadline
pub const TIMEOUT_DETAIL: &str = "timeout";

/// Up/down classification of a check, persisted between cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    /// Also the state of a check that has never been evaluated
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// Scheme used to reach a check's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// HTTP method a check is probed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl CheckMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Wire form of the method (upper case)
    pub fn as_http(&self) -> reqwest::Method {
        match self {
            CheckMethod::Get => reqwest::Method::GET,
            CheckMethod::Post => reqwest::Method::POST,
            CheckMethod::Put => reqwest::Method::PUT,
            CheckMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for CheckMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMethod::Get => write!(f, "get"),
            CheckMethod::Post => write!(f, "post"),
            CheckMethod::Put => write!(f, "put"),
            CheckMethod::Delete => write!(f, "delete"),
        }
    }
}

/// A validated, normalized check record.
///
/// `extra` carries whatever other fields the API layer stored on the record
/// so that writing the check back does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    /// 20 character opaque identifier
    pub id: String,

    /// Owner's 10 digit phone number, where alerts go
    pub user_phone: String,

    pub protocol: Protocol,

    /// Host plus optional path and query, without the scheme
    pub url: String,

    pub method: CheckMethod,

    /// Response codes that count as "up"
    pub success_codes: Vec<u16>,

    /// Probe deadline, 1 to 5 seconds
    pub timeout_seconds: u64,

    #[serde(default)]
    pub state: CheckState,

    /// Milliseconds since epoch of the last evaluation, `None` if never evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Check {
    /// Full probe target, `protocol://url`
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}", self.protocol, self.url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn accepts(&self, response_code: u16) -> bool {
        self.success_codes.contains(&response_code)
    }

    pub fn has_been_checked(&self) -> bool {
        self.last_checked.is_some()
    }
}

/// Classified result of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
}

impl Outcome {
    /// The target answered, whatever the status
    pub fn response(response_code: u16) -> Self {
        Self { error: false, error_detail: None, response_code: Some(response_code) }
    }

    /// The request never produced a response
    pub fn network_error(detail: impl Into<String>) -> Self {
        Self { error: true, error_detail: Some(detail.into()), response_code: None }
    }

    /// The deadline fired first
    pub fn timeout() -> Self {
        Self::network_error(TIMEOUT_DETAIL)
    }

    pub fn is_timeout(&self) -> bool {
        self.error && self.error_detail.as_deref() == Some(TIMEOUT_DETAIL)
    }
}

/// One line of a check's log stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The check as it was read at the start of the evaluation
    pub check: Check,
    pub outcome: Outcome,
    /// State computed from `outcome`
    pub state: CheckState,
    pub alert: bool,
    /// Evaluation time, milliseconds since epoch
    pub time: i64,
}
