//! Progress event types for update downloads and installation.
//!
//! Provides callback-based progress reporting that decouples the update
//! pipeline from UI presentation (tray menu, settings panel, notifications).

/// Progress events emitted while downloading an update artifact.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The download has started.
    Started {
        /// Total size in bytes, if known from the `Content-Length` header.
        total_bytes: Option<u64>,
    },

    /// Periodic progress sample (at most one per sample interval).
    Progress {
        /// Completion percentage in `[0, 100]`, when total size is known.
        percent: Option<f64>,
        /// Bytes received so far.
        bytes_received: u64,
        /// Instantaneous throughput in bytes per second.
        bytes_per_sec: f64,
    },

    /// The download completed successfully.
    Finished,

    /// The download failed.
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

/// Callback type for receiving progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Format a byte count as a human-readable size (`1.5 MB`).
///
/// Used in notification bodies ("downloading 1.2 MB patch...").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_owned();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Format a throughput value as a human-readable speed (`850.00 KB/s`).
pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0) as u64))
}
