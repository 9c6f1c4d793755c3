//! Binary patch application and verification.
//!
//! Applies a downloaded patch to the installed artifact and verifies the
//! result before declaring success. The diff mechanism itself is a
//! collaborator: the production bsdiff engine lives outside this crate and
//! is plugged in through [`PatchAlgorithm`].
//!
//! Installation is backup-and-replace: the old artifact is renamed aside,
//! the patched artifact moved into place, and the backup restored if the
//! move fails. Verification failure is terminal for the incremental path;
//! the orchestrator falls back to a full update instead of retrying.

use crate::error::{Result, UpdateError};
use crate::host::HostRuntime;
use crate::manifest::PatchEntry;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// A binary diff engine capable of rebuilding a new artifact from the
/// installed one plus a patch.
pub trait PatchAlgorithm: Send + Sync {
    /// Algorithm identifier matched against the manifest's `algorithm`
    /// field (e.g. `"bsdiff"`).
    fn name(&self) -> &str;

    /// Rebuild the new artifact from `old` and `patch`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::PatchApply`] if the patch is malformed or
    /// does not apply to `old`.
    fn apply(&self, old: &[u8], patch: &[u8]) -> Result<Vec<u8>>;
}

/// Applies patches to the installation and verifies the outcome.
pub struct PatchExecutor {
    algorithm: Box<dyn PatchAlgorithm>,
}

impl PatchExecutor {
    /// Create an executor backed by the given diff engine.
    pub fn new(algorithm: Box<dyn PatchAlgorithm>) -> Self {
        Self { algorithm }
    }

    /// Apply `patch_bytes` to the installed artifact named by `entry` and
    /// verify the result.
    ///
    /// Verification is two-stage:
    /// 1. the rebuilt artifact's SHA-256 must match `expected_hash` when the
    ///    manifest provides one
    /// 2. after installation, the host-reported version must equal
    ///    `target_version`
    ///
    /// # Errors
    ///
    /// - [`UpdateError::PatchApply`] when the target is missing, the
    ///   algorithm does not match, or the diff engine rejects the patch
    /// - [`UpdateError::Verification`] when either verification stage fails
    pub async fn apply(
        &self,
        host: &dyn HostRuntime,
        entry: &PatchEntry,
        patch_bytes: &[u8],
        expected_hash: Option<&str>,
        target_version: &str,
    ) -> Result<()> {
        if entry.algorithm != self.algorithm.name() {
            return Err(UpdateError::PatchApply(format!(
                "unsupported patch algorithm '{}' (engine supports '{}')",
                entry.algorithm,
                self.algorithm.name()
            )));
        }

        let target = host.install_dir().join(&entry.target_file);
        let old = std::fs::read(&target).map_err(|e| {
            UpdateError::PatchApply(format!(
                "cannot read patch target {}: {e}",
                target.display()
            ))
        })?;

        debug!(
            target = %target.display(),
            old_bytes = old.len(),
            patch_bytes = patch_bytes.len(),
            "applying patch"
        );
        let patched = self.algorithm.apply(&old, patch_bytes)?;

        if let Some(expected) = expected_hash {
            verify_digest(&patched, expected)?;
        }

        replace_artifact(&target, &patched)?;

        let installed = host.installed_version()?;
        if installed != target_version {
            return Err(UpdateError::Verification(format!(
                "installed version is {installed}, expected {target_version}"
            )));
        }

        info!("patch applied and verified: v{target_version}");
        Ok(())
    }
}

/// Check the artifact's SHA-256 against a hex digest from the manifest.
fn verify_digest(artifact: &[u8], expected_hex: &str) -> Result<()> {
    let digest = Sha256::digest(artifact);
    let actual = hex_encode(&digest);
    if !actual.eq_ignore_ascii_case(expected_hex) {
        return Err(UpdateError::Verification(format!(
            "artifact digest mismatch: got {actual}, manifest says {expected_hex}"
        )));
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    bytes.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Replace the installed artifact with the patched bytes.
///
/// Renames the old artifact as a backup, writes the new one in place, and
/// restores the backup if the write fails. The backup is removed on success.
fn replace_artifact(target: &Path, patched: &[u8]) -> Result<()> {
    let backup = target.with_extension("old");

    if target.exists() {
        std::fs::rename(target, &backup).map_err(|e| {
            UpdateError::PatchApply(format!(
                "cannot backup {} -> {}: {e}",
                target.display(),
                backup.display()
            ))
        })?;
    }

    if let Err(e) = std::fs::write(target, patched) {
        // Put the old artifact back so the install stays usable.
        if backup.exists() {
            let _ = std::fs::rename(&backup, target);
        }
        return Err(UpdateError::PatchApply(format!(
            "cannot install patched artifact to {}: {e}",
            target.display()
        )));
    }

    set_executable(target)?;
    let _ = std::fs::remove_file(&backup);

    Ok(())
}

/// Set executable permission on Unix platforms.
fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            UpdateError::PatchApply(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    let _ = path; // Suppress unused warning on Windows.
    Ok(())
}
