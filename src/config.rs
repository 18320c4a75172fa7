//! Session configuration

use std::time::Duration;

use crate::{
    api,
    ws::{ConnectionOptions, ReconnectPolicy, DEFAULT_HEARTBEAT_INTERVAL},
};

/// env var of api base url
pub const ENV_API_URL: &str = "HOOKFEED_API_URL";
/// env var of websocket base url
pub const ENV_WS_URL: &str = "HOOKFEED_WS_URL";
/// env var of access token
pub const ENV_TOKEN: &str = "HOOKFEED_TOKEN";
/// env var enabling placeholder items
pub const ENV_DEMO_DATA: &str = "HOOKFEED_DEMO_DATA";

/// Settings of a [Session](crate::Session)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// REST api base url
    pub api_url: String,
    /// base of push channel urls, derived from `api_url` when `None`
    pub ws_url: Option<String>,
    /// bearer token for api and channel
    pub token: Option<String>,
    /// REST request timeout
    pub timeout: Duration,
    /// show placeholder items when the api is unreachable
    pub demo_data: bool,
    /// push channel retry behavior
    pub reconnect: ReconnectPolicy,
    /// push channel heartbeat interval
    pub heartbeat_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: api::DEFAULT_BASE_URL.to_string(),
            ws_url: None,
            token: None,
            timeout: api::DEFAULT_TIMEOUT,
            demo_data: false,
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl Config {
    /// Defaults overridden by `HOOKFEED_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();

        if let Some(url) = var(ENV_API_URL) {
            config.api_url = url;
        }
        config.ws_url = var(ENV_WS_URL);
        config.token = var(ENV_TOKEN);
        if let Some(flag) = var(ENV_DEMO_DATA) {
            config.demo_data = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        log::debug!(
            "Config loaded, api {}, demo data {}",
            config.api_url,
            config.demo_data
        );

        config
    }

    /// base url push channel urls are built from
    pub fn channel_base(&self) -> &str {
        self.ws_url.as_deref().unwrap_or(&self.api_url)
    }

    /// Options for the push channel connection
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            reconnect: self.reconnect,
            heartbeat_interval: self.heartbeat_interval,
            ..ConnectionOptions::default()
        }
    }
}
