//! Configuration for the update engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update engine configuration.
///
/// Loaded by the application shell from its settings file; every field has
/// a working default so a missing section behaves like a stock install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Release feed endpoint returning the latest release descriptor.
    pub feed_url: String,
    /// Per-release manifest URL pattern; `{version}` is replaced with the
    /// target version (without `v` prefix).
    pub manifest_url_pattern: String,
    /// User-Agent header sent on all update requests.
    pub user_agent: String,
    /// Retry attempts for transient feed failures.
    pub feed_retry_attempts: u32,
    /// Initial backoff before the first feed retry, in milliseconds.
    /// Doubles on each subsequent attempt.
    pub feed_retry_backoff_ms: u64,
    /// Connect timeout for feed and manifest requests, in seconds.
    pub connect_timeout_secs: u64,
    /// Total request timeout for feed and manifest requests, in seconds.
    pub request_timeout_secs: u64,
    /// Total timeout for artifact downloads, in seconds.
    pub download_timeout_secs: u64,
    /// Minimum interval between progress samples, in milliseconds.
    pub progress_sample_ms: u64,
    /// Delay before relaunching after a completed update, in milliseconds.
    /// Gives the final notification time to render.
    pub restart_delay_ms: u64,
    /// Interval between automatic background checks, in hours.
    pub auto_check_interval_hours: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://releases.wordpond.app/latest.json".to_owned(),
            manifest_url_pattern:
                "https://releases.wordpond.app/v{version}/release-{version}.json".to_owned(),
            user_agent: concat!("wordpond/", env!("CARGO_PKG_VERSION"), " (self-update)")
                .to_owned(),
            feed_retry_attempts: 3,
            feed_retry_backoff_ms: 1000,
            connect_timeout_secs: 15,
            request_timeout_secs: 30,
            download_timeout_secs: 300,
            progress_sample_ms: 500,
            restart_delay_ms: 2000,
            auto_check_interval_hours: 4,
        }
    }
}

impl UpdateConfig {
    /// Resolve the manifest URL for a target version.
    pub fn manifest_url(&self, version: &str) -> String {
        self.manifest_url_pattern.replace("{version}", version)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Download timeout as a [`Duration`].
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Progress sample interval as a [`Duration`].
    pub fn progress_sample_interval(&self) -> Duration {
        Duration::from_millis(self.progress_sample_ms)
    }

    /// Pre-restart delay as a [`Duration`].
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_release_policy() {
        let config = UpdateConfig::default();
        assert_eq!(config.feed_retry_attempts, 3);
        assert_eq!(config.feed_retry_backoff_ms, 1000);
        assert_eq!(config.progress_sample_ms, 500);
        assert_eq!(config.restart_delay_ms, 2000);
        assert_eq!(config.auto_check_interval_hours, 4);
        assert_eq!(config.download_timeout_secs, 300);
    }

    #[test]
    fn manifest_url_substitutes_version() {
        let config = UpdateConfig::default();
        let url = config.manifest_url("3.0.5");
        assert_eq!(
            url,
            "https://releases.wordpond.app/v3.0.5/release-3.0.5.json"
        );
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: UpdateConfig =
            serde_json::from_str(r#"{"feed_url":"https://example.com/feed"}"#).unwrap();
        assert_eq!(config.feed_url, "https://example.com/feed");
        assert_eq!(config.feed_retry_attempts, 3);
    }
}
