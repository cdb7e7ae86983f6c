use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt, fs, path};

use logger::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::alert::TwilioCredentials;
use crate::alert::twilio::DEFAULT_API_BASE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("could not write config file: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("could not parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("no config directory available (neither XDG_CONFIG_HOME nor HOME is set)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: Storage,
    pub scheduler: Scheduler,
    pub logging: Logging,
    pub twilio: Twilio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Root of the record store
    pub data_dir: path::PathBuf,
    /// Root of the per-check log streams
    pub logs_dir: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub format: LogFormat,
}

/// SMS provider settings. Alerts are only logged unless all three credentials are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Twilio {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_phone: Option<String>,
    pub api_base: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self { data_dir: ".data".into(), logs_dir: ".logs".into() }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { interval_seconds: 60 }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: LogFormat::default() }
    }
}

impl Default for Twilio {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_phone: None,
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

impl Twilio {
    /// Complete credentials, if every required value is present and non-empty
    pub fn credentials(&self) -> Option<TwilioCredentials> {
        let present = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

        Some(TwilioCredentials {
            account_sid: present(&self.account_sid)?,
            auth_token: present(&self.auth_token)?,
            from_phone: present(&self.from_phone)?,
            api_base: self.api_base.clone(),
        })
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/worker.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/worker.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let secret = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Storage")?;
        write_1(f, "Data Directory", &self.storage.data_dir.display())?;
        write_1(f, "Logs Directory", &self.storage.logs_dir.display())?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Interval (s)", &self.scheduler.interval_seconds)?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;
        write_title_1(f, "Twilio")?;
        write_1(f, "Account SID", &secret(&self.twilio.account_sid))?;
        write_1(f, "Auth Token", &secret(&self.twilio.auth_token))?;
        write_1(f, "From Phone", &self.twilio.from_phone.as_deref().unwrap_or("<unset>"))?;
        write_1(f, "API Base", &self.twilio.api_base)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/worker.toml
    ///  or the specified path, with the name worker.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        std::fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }

    /// Let secrets from the environment win over the file
    pub fn apply_env_overrides(&mut self) {
        let from_env = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(sid) = from_env("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = Some(sid);
        }
        if let Some(token) = from_env("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = Some(token);
        }
        if let Some(phone) = from_env("TWILIO_PHONE") {
            self.twilio.from_phone = Some(phone);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_seconds must be at least 1".into(),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.logging.level).map_err(|_| {
            ConfigError::Invalid(format!("unknown log level {:?}", self.logging.level))
        })
    }
}
