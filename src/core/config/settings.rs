//! Effective settings for one run: the config file merged with environment
//! overrides and defaults.

use std::time::Duration;

use crate::core::config::data::Config;
use crate::core::constants::{DEFAULT_FRAME_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::utils::url::resolve_base_url;

pub const ENV_BASE_URL: &str = "FLOWTALK_BASE_URL";
pub const ENV_CATALOG_URL: &str = "FLOWTALK_CATALOG_URL";
pub const ENV_ACCESS_TOKEN: &str = "FLOWTALK_ACCESS_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub base_url: String,
    pub catalog_url: String,
    pub access_token: Option<String>,
    pub default_flow: Option<String>,
    pub stream: bool,
    pub request_timeout: Duration,
    pub frame_interval: Duration,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Config::default().resolve_with_env(|_| None)
    }
}

impl Config {
    pub fn resolve(&self) -> FlowSettings {
        self.resolve_with_env(|name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary environment lookup. Environment values
    /// win over the file; blank values count as unset.
    pub fn resolve_with_env<F>(&self, env: F) -> FlowSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str, file_value: &Option<String>| -> Option<String> {
            env(name)
                .filter(|value| !value.trim().is_empty())
                .or_else(|| file_value.clone())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = resolve_base_url(lookup(ENV_BASE_URL, &self.base_url).as_deref());
        let catalog_url = match lookup(ENV_CATALOG_URL, &self.catalog_url) {
            Some(url) => resolve_base_url(Some(&url)),
            None => base_url.clone(),
        };

        let request_timeout = self
            .request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        // tokio intervals reject a zero period
        let frame_interval = self
            .frame_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_FRAME_INTERVAL)
            .max(Duration::from_millis(1));

        FlowSettings {
            base_url,
            catalog_url,
            access_token: lookup(ENV_ACCESS_TOKEN, &self.access_token),
            default_flow: self
                .default_flow
                .as_ref()
                .map(|flow| flow.trim().to_string())
                .filter(|flow| !flow.is_empty()),
            stream: self.stream.unwrap_or(true),
            request_timeout,
            frame_interval,
        }
    }
}
