//! Host runtime capabilities the update engine depends on.
//!
//! The orchestrator never touches the process table, the installation
//! directory, or the notification center directly; the application shell
//! provides an implementation of [`HostRuntime`] wired to the real desktop
//! runtime. Tests substitute an in-memory implementation.

use crate::error::Result;
use std::path::PathBuf;

/// Capabilities of the hosting application runtime.
#[async_trait::async_trait]
pub trait HostRuntime: Send + Sync {
    /// The version of the currently installed application.
    ///
    /// Called again after a patch is applied to verify the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the installed version cannot be determined.
    fn installed_version(&self) -> Result<String>;

    /// Directory containing the installed artifacts that patches target.
    fn install_dir(&self) -> PathBuf;

    /// Relaunch the application.
    ///
    /// # Errors
    ///
    /// Returns [`crate::UpdateError::Restart`] on failure. Non-fatal: the
    /// update is already installed when this is called.
    async fn relaunch(&self) -> Result<()>;

    /// Deliver a user-visible notification. Fire-and-forget: implementors
    /// log delivery failures rather than returning them.
    async fn notify(&self, title: &str, body: &str);

    /// Install a downloaded full package (run the platform installer).
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be installed.
    async fn install_full_package(&self, package: &[u8], filename: &str) -> Result<()>;

    /// Run the host runtime's native full-update mechanism.
    ///
    /// Used as the last-resort full path when a release ships no manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the native updater fails.
    async fn native_full_update(&self) -> Result<()>;
}
