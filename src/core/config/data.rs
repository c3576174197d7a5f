use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the flow-execution service (runs and streams)
    pub base_url: Option<String>,
    /// Base URL of the flow catalog; defaults to `base_url`
    pub catalog_url: Option<String>,
    /// Bearer token sent to the catalog service
    pub access_token: Option<String>,
    /// Flow used when none is given on the command line
    pub default_flow: Option<String>,
    /// Request streamed output (defaults to on)
    pub stream: Option<bool>,
    /// Upper bound on one turn, in seconds
    pub request_timeout_secs: Option<u64>,
    /// Delay between animation steps, in milliseconds
    pub frame_interval_ms: Option<u64>,
}

/// Keys accepted by `flowtalk set` / `flowtalk unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    CatalogUrl,
    AccessToken,
    DefaultFlow,
    Stream,
    RequestTimeout,
    FrameInterval,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::BaseUrl,
        ConfigKey::CatalogUrl,
        ConfigKey::AccessToken,
        ConfigKey::DefaultFlow,
        ConfigKey::Stream,
        ConfigKey::RequestTimeout,
        ConfigKey::FrameInterval,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::CatalogUrl => "catalog-url",
            ConfigKey::AccessToken => "access-token",
            ConfigKey::DefaultFlow => "default-flow",
            ConfigKey::Stream => "stream",
            ConfigKey::RequestTimeout => "request-timeout",
            ConfigKey::FrameInterval => "frame-interval",
        }
    }
}

impl TryFrom<&str> for ConfigKey {
    type Error = ConfigValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| ConfigValueError::UnknownKey(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValueError {
    UnknownKey(String),
    InvalidValue { key: ConfigKey, value: String },
}

impl fmt::Display for ConfigValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValueError::UnknownKey(key) => {
                let known: Vec<_> = ConfigKey::ALL.iter().map(|key| key.as_str()).collect();
                write!(
                    f,
                    "Unknown config key '{key}'. Known keys: {}",
                    known.join(", ")
                )
            }
            ConfigValueError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{value}' for {}", key.as_str())
            }
        }
    }
}

impl std::error::Error for ConfigValueError {}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigValueError> {
        let invalid = || ConfigValueError::InvalidValue {
            key,
            value: value.to_string(),
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        match key {
            ConfigKey::BaseUrl => self.base_url = Some(trimmed.to_string()),
            ConfigKey::CatalogUrl => self.catalog_url = Some(trimmed.to_string()),
            ConfigKey::AccessToken => self.access_token = Some(trimmed.to_string()),
            ConfigKey::DefaultFlow => self.default_flow = Some(trimmed.to_string()),
            ConfigKey::Stream => self.stream = Some(parse_switch(trimmed).ok_or_else(invalid)?),
            ConfigKey::RequestTimeout => {
                let secs = trimmed.parse::<u64>().map_err(|_| invalid())?;
                if secs == 0 {
                    return Err(invalid());
                }
                self.request_timeout_secs = Some(secs);
            }
            ConfigKey::FrameInterval => {
                let millis = trimmed.parse::<u64>().map_err(|_| invalid())?;
                if millis == 0 {
                    return Err(invalid());
                }
                self.frame_interval_ms = Some(millis);
            }
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::CatalogUrl => self.catalog_url = None,
            ConfigKey::AccessToken => self.access_token = None,
            ConfigKey::DefaultFlow => self.default_flow = None,
            ConfigKey::Stream => self.stream = None,
            ConfigKey::RequestTimeout => self.request_timeout_secs = None,
            ConfigKey::FrameInterval => self.frame_interval_ms = None,
        }
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
