//! Update backend selection.
//!
//! The orchestrator installs through exactly one backend per attempt: the
//! patch backend when an applicable patch exists, otherwise the full-package
//! backend (manifest full file when available, the host runtime's native
//! updater when not). Fallback after an incremental failure is an explicit
//! re-selection, not a stashed object.

use crate::manifest::{FileEntry, IncrementalUpdate, PatchEntry};

/// Which update path a session is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    /// Binary patch against the running version.
    Incremental,
    /// Complete package download.
    Full,
}

impl std::fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// The concrete mechanism used to install an update.
#[derive(Debug, Clone)]
pub enum UpdateBackend {
    /// Download the selected patch and apply it to the installation.
    Patch(PatchEntry),
    /// Download the complete package listed in the manifest.
    FullPackage(FileEntry),
    /// Delegate to the host runtime's native updater (no manifest).
    HostNative,
}

impl UpdateBackend {
    /// Select the preferred backend for a resolved update: the patch when
    /// one is applicable, otherwise the full path.
    pub fn select(update: &IncrementalUpdate) -> Self {
        match &update.selected_patch {
            Some(patch) => Self::Patch(patch.clone()),
            None => Self::full_package(update),
        }
    }

    /// Select the full-package backend, ignoring any applicable patch.
    /// Used for the one-shot fallback after an incremental failure.
    pub fn full_package(update: &IncrementalUpdate) -> Self {
        match update.manifest.as_ref().and_then(|m| m.full_file()) {
            Some(file) => Self::FullPackage(file.clone()),
            None => Self::HostNative,
        }
    }

    /// The update method this backend implements.
    pub fn method(&self) -> UpdateMethod {
        match self {
            Self::Patch(_) => UpdateMethod::Incremental,
            Self::FullPackage(_) | Self::HostNative => UpdateMethod::Full,
        }
    }
}
