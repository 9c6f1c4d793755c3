//! Streaming download engine with throughput sampling.
//!
//! Streams an artifact in chunks, accumulating into one contiguous buffer,
//! and reports progress through a [`ProgressCallback`] at a bounded cadence
//! (one sample per interval, not per chunk) to keep callback pressure off
//! the UI thread.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::progress::{ProgressCallback, ProgressEvent};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::time::Instant;
use tracing::{debug, info};

/// Streaming artifact downloader.
pub struct Downloader {
    http: reqwest::Client,
    sample_interval: std::time::Duration,
}

impl Downloader {
    /// Create a downloader from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &UpdateConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.download_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpdateError::Network(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            sample_interval: config.progress_sample_interval(),
        })
    }

    /// Download `url` into memory, reporting progress through `callback`.
    ///
    /// Progress semantics:
    /// - `Started` is emitted once, with the total size when the server
    ///   sends a `Content-Length` header
    /// - `Progress` is emitted at most once per sample interval, carrying
    ///   instantaneous throughput; the percentage is present only when the
    ///   total size is known, and is always within `[0, 100]`
    /// - `Finished` or `Failed` is emitted exactly once at the end
    ///
    /// Chunks are concatenated in arrival order into one contiguous buffer.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Download`] on a non-2xx response or a stream
    /// failure mid-transfer.
    pub async fn fetch(&self, url: &str, callback: Option<&ProgressCallback>) -> Result<Bytes> {
        match self.fetch_inner(url, callback).await {
            Ok(bytes) => {
                emit(callback, ProgressEvent::Finished);
                Ok(bytes)
            }
            Err(e) => {
                emit(
                    callback,
                    ProgressEvent::Failed {
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    async fn fetch_inner(&self, url: &str, callback: Option<&ProgressCallback>) -> Result<Bytes> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::Download(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Download(format!(
                "server returned status {status}"
            )));
        }

        let total_bytes = response.content_length();
        debug!(url, total_bytes, "download started");
        emit(callback, ProgressEvent::Started { total_bytes });

        let mut stream = response.bytes_stream();
        let mut buffer = BytesMut::with_capacity(total_bytes.unwrap_or(0) as usize);
        let mut sampler = ThroughputSampler::new(self.sample_interval, total_bytes);

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| UpdateError::Download(format!("stream failed: {e}")))?;
            buffer.extend_from_slice(&chunk);

            if let Some(event) = sampler.sample(buffer.len() as u64) {
                emit(callback, event);
            }
        }

        if let Some(total) = total_bytes
            && buffer.len() as u64 != total
        {
            return Err(UpdateError::Download(format!(
                "truncated download: got {} of {total} bytes",
                buffer.len()
            )));
        }

        info!(url, bytes = buffer.len(), "download complete");
        Ok(buffer.freeze())
    }
}

fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

/// Rate-limited progress sampler.
///
/// Emits one `Progress` event per interval with throughput computed over
/// the bytes received since the previous sample.
struct ThroughputSampler {
    interval: std::time::Duration,
    total_bytes: Option<u64>,
    last_sample: Instant,
    bytes_at_last_sample: u64,
}

impl ThroughputSampler {
    fn new(interval: std::time::Duration, total_bytes: Option<u64>) -> Self {
        Self {
            interval,
            total_bytes,
            last_sample: Instant::now(),
            bytes_at_last_sample: 0,
        }
    }

    fn sample(&mut self, bytes_received: u64) -> Option<ProgressEvent> {
        let elapsed = self.last_sample.elapsed();
        if elapsed < self.interval {
            return None;
        }

        let delta = bytes_received.saturating_sub(self.bytes_at_last_sample);
        let bytes_per_sec = (delta as f64 / elapsed.as_millis().max(1) as f64) * 1000.0;

        let percent = self.total_bytes.filter(|&t| t > 0).map(|total| {
            (bytes_received as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        });

        self.last_sample = Instant::now();
        self.bytes_at_last_sample = bytes_received;

        Some(ProgressEvent::Progress {
            percent,
            bytes_received,
            bytes_per_sec,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Duration;

    #[test]
    fn sampler_holds_until_interval_elapses() {
        let mut sampler = ThroughputSampler::new(Duration::from_secs(3600), Some(1000));
        assert!(sampler.sample(100).is_none());
        assert!(sampler.sample(900).is_none());
    }

    #[test]
    fn sampler_emits_after_interval_with_percent_and_speed() {
        let mut sampler = ThroughputSampler::new(Duration::ZERO, Some(1000));
        std::thread::sleep(Duration::from_millis(5));

        let event = sampler.sample(500).unwrap();
        let ProgressEvent::Progress {
            percent,
            bytes_received,
            bytes_per_sec,
        } = event
        else {
            panic!("expected Progress event");
        };
        assert_eq!(bytes_received, 500);
        assert!((percent.unwrap() - 50.0).abs() < f64::EPSILON);
        assert!(bytes_per_sec > 0.0);
    }

    #[test]
    fn sampler_omits_percent_when_total_unknown() {
        let mut sampler = ThroughputSampler::new(Duration::ZERO, None);
        std::thread::sleep(Duration::from_millis(5));

        let event = sampler.sample(500).unwrap();
        let ProgressEvent::Progress { percent, .. } = event else {
            panic!("expected Progress event");
        };
        assert!(percent.is_none());
    }

    #[test]
    fn sampler_percent_never_exceeds_bounds() {
        let mut sampler = ThroughputSampler::new(Duration::ZERO, Some(100));
        std::thread::sleep(Duration::from_millis(5));

        // Server lied about Content-Length; percent must still clamp.
        let event = sampler.sample(250).unwrap();
        let ProgressEvent::Progress { percent, .. } = event else {
            panic!("expected Progress event");
        };
        assert!((percent.unwrap() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sampler_speed_measures_delta_not_total() {
        let mut sampler = ThroughputSampler::new(Duration::ZERO, Some(10_000));
        std::thread::sleep(Duration::from_millis(5));
        let _first = sampler.sample(5000).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        let event = sampler.sample(5100).unwrap();
        let ProgressEvent::Progress { bytes_per_sec, .. } = event else {
            panic!("expected Progress event");
        };
        // Only 100 bytes arrived since the last sample; at ~5ms elapsed the
        // instantaneous rate must be far below the naive 5100/elapsed figure.
        assert!(bytes_per_sec < 5100.0 * 200.0 / 2.0);
    }
}
