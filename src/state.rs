//! Persistent update-check state.
//!
//! Tracks the last check timestamp and any release the user dismissed, so
//! the 4-hour background timer knows when a check is due and silent checks
//! do not renotify about a skipped version. The in-flight `UpdateSession`
//! is deliberately not persisted; only this small record survives restarts.
//! Stored as `update-check.json` in the app's config directory.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persistent check state for the update engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckState {
    /// Unix epoch seconds of the last completed check, if any.
    pub last_check: Option<u64>,
    /// Release version the user chose to skip.
    pub dismissed_release: Option<String>,
}

impl CheckState {
    /// Load state from `path`. Returns the default state if the file is
    /// missing or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(bytes) = std::fs::read(path) else {
            return Self::default();
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    /// Persist the current state to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                UpdateError::State(format!(
                    "cannot create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| UpdateError::State(format!("cannot serialize check state: {e}")))?;

        std::fs::write(path, json).map_err(|e| {
            UpdateError::State(format!("cannot write check state to {}: {e}", path.display()))
        })?;

        Ok(())
    }

    /// Record that a check completed at the current time.
    pub fn mark_checked(&mut self) {
        self.last_check = Some(now_epoch_secs());
    }

    /// Returns `true` if the last check was more than `hours` ago, or no
    /// check has been recorded yet.
    pub fn check_is_stale(&self, hours: u64) -> bool {
        let Some(last) = self.last_check else {
            return true;
        };
        let elapsed_hours = now_epoch_secs().saturating_sub(last) / 3600;
        elapsed_hours >= hours
    }

    /// Returns `true` if the user dismissed `version`.
    pub fn is_dismissed(&self, version: &str) -> bool {
        self.dismissed_release.as_deref() == Some(version)
    }
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
