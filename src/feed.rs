//! Release feed client.
//!
//! Queries the remote release feed for the latest published version,
//! compares it against the running version, and normalizes the result into
//! an [`Update`] record.
//!
//! # Retry policy
//!
//! - **Transient errors** (DNS, connect, timeout, dropped connection):
//!   retry up to the configured attempt count with exponential backoff
//!   (1s, 2s, 4s by default).
//! - **Permanent errors** (non-2xx status, malformed payload): surface
//!   immediately without retrying.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::version;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Descriptor of an available release, produced once per check.
#[derive(Debug, Clone)]
pub struct Update {
    /// The newer version (without `v` prefix).
    pub version: String,
    /// The version currently running.
    pub current_version: String,
    /// When the release was published, if the feed carries it.
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Release notes body, if any.
    pub release_notes: Option<String>,
}

/// Raw release descriptor as published by the feed.
#[derive(Debug, Deserialize)]
struct FeedRelease {
    tag_name: Option<String>,
    name: Option<String>,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    body: Option<String>,
}

impl FeedRelease {
    /// Candidate version tag: `tag_name` preferred, `name` as fallback.
    fn version_tag(&self) -> Option<&str> {
        self.tag_name.as_deref().or(self.name.as_deref())
    }
}

/// Client for the release feed endpoint.
pub struct ReleaseFeed {
    http: reqwest::Client,
    config: UpdateConfig,
}

impl ReleaseFeed {
    /// Create a feed client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: UpdateConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpdateError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create a feed client reusing an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: UpdateConfig) -> Self {
        Self { http, config }
    }

    /// Fetch the latest release and compare against `current_version`.
    ///
    /// Returns `Ok(None)` when the published version is not newer than the
    /// running one — an up-to-date install is not an error.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Network`] after exhausting retries on transport
    ///   failures
    /// - [`UpdateError::Feed`] on non-2xx status or malformed payload
    pub async fn fetch_latest(&self, current_version: &str) -> Result<Option<Update>> {
        let mut backoff = std::time::Duration::from_millis(self.config.feed_retry_backoff_ms);
        let mut attempt = 0u32;

        let release = loop {
            match self.fetch_release().await {
                Ok(release) => break release,
                Err(e) if e.is_retryable() && attempt < self.config.feed_retry_attempts => {
                    attempt += 1;
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "feed fetch failed transiently, retrying: {e}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        };

        let Some(tag) = release.version_tag() else {
            return Err(UpdateError::Feed(
                "release descriptor has neither tag_name nor name".to_owned(),
            ));
        };
        let latest = version::strip_prefix(tag).to_owned();

        debug!(current = current_version, latest = latest.as_str(), "feed check");

        if !version::is_newer(&latest, current_version) {
            info!("already up to date ({current_version})");
            return Ok(None);
        }

        info!("new version available: {latest}");
        Ok(Some(Update {
            version: latest,
            current_version: current_version.to_owned(),
            published_at: release.published_at,
            release_notes: release.body,
        }))
    }

    /// Issue one GET against the feed endpoint.
    async fn fetch_release(&self) -> Result<FeedRelease> {
        let response = self
            .http
            .get(&self.config.feed_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpdateError::Network(format!("feed request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Feed(format!(
                "feed returned status {status}"
            )));
        }

        response
            .json::<FeedRelease>()
            .await
            .map_err(|e| UpdateError::Feed(format!("malformed feed payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn version_tag_prefers_tag_name() {
        let release = FeedRelease {
            tag_name: Some("v3.0.5".to_owned()),
            name: Some("Release 3.0.5".to_owned()),
            published_at: None,
            body: None,
        };
        assert_eq!(release.version_tag(), Some("v3.0.5"));
    }

    #[test]
    fn version_tag_falls_back_to_name() {
        let release = FeedRelease {
            tag_name: None,
            name: Some("3.0.5".to_owned()),
            published_at: None,
            body: None,
        };
        assert_eq!(release.version_tag(), Some("3.0.5"));
    }

    #[test]
    fn feed_release_parses_github_shape() {
        let json = r#"{
            "tag_name": "v3.0.5",
            "name": "WordPond 3.0.5",
            "published_at": "2025-06-01T12:00:00Z",
            "body": "Bug fixes",
            "assets": [{"name": "wordpond-setup.exe"}]
        }"#;
        let release: FeedRelease = serde_json::from_str(json).unwrap();
        assert_eq!(release.version_tag(), Some("v3.0.5"));
        assert!(release.published_at.is_some());
        assert_eq!(release.body.as_deref(), Some("Bug fixes"));
    }
}
