//! Client configuration with environment overrides.

use crate::channel::{CONNECT_RETRY_DELAY, RECONNECT_DELAY};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the downloader backend.
    pub base_url: String,
    /// Page size for snapshot loads.
    pub page_size: u32,
    /// Push topic carrying progress batches.
    pub progress_topic: String,
    /// Delay before retrying a failed connect attempt.
    pub connect_retry_delay: Duration,
    /// Delay before reconnecting after an unexpected close.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            page_size: 5,
            progress_topic: "/topic/progress".to_string(),
            connect_retry_delay: CONNECT_RETRY_DELAY,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `DOWNDECK_*` environment variables where set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(base_url) = env_string("DOWNDECK_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(page_size) = env_parse::<u32>("DOWNDECK_PAGE_SIZE") {
            config.page_size = page_size;
        }
        if let Some(topic) = env_string("DOWNDECK_PROGRESS_TOPIC") {
            config.progress_topic = topic;
        }
        if let Some(secs) = env_parse::<u64>("DOWNDECK_CONNECT_RETRY_SECS") {
            config.connect_retry_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("DOWNDECK_RECONNECT_SECS") {
            config.reconnect_delay = Duration::from_secs(secs);
        }
        config
    }
}

fn env_string(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse().ok()
}
