//! WordPond incremental self-update engine.
//!
//! Checks a remote release feed for newer versions, decides between a small
//! binary patch and a full package download, streams the artifact with
//! progress reporting, applies and verifies the patch, and restarts the
//! application — falling back safely to the full path at every stage.
//!
//! # Architecture
//!
//! One sequential cycle per check, driven by [`UpdateOrchestrator`]:
//! - **Feed client**: is there a newer version? ([`feed`])
//! - **Manifest resolver**: is there a patch for my version? ([`manifest`])
//! - **Download engine**: fetch the patch or full package ([`download`])
//! - **Patch executor**: apply and verify ([`patch`])
//! - **Host runtime**: notifications and relaunch ([`host`])
//!
//! The application shell owns the orchestrator and invokes it on a
//! background timer and on user-initiated checks; there is no CLI surface.

pub mod backend;
pub mod config;
pub mod download;
pub mod error;
pub mod feed;
pub mod host;
pub mod manifest;
pub mod orchestrator;
pub mod patch;
pub mod progress;
pub mod state;
pub mod version;

pub use backend::{UpdateBackend, UpdateMethod};
pub use config::UpdateConfig;
pub use download::Downloader;
pub use error::{Result, UpdateError};
pub use feed::{ReleaseFeed, Update};
pub use host::HostRuntime;
pub use manifest::{IncrementalUpdate, ManifestResolver, PatchEntry, ReleaseManifest};
pub use orchestrator::{UpdateOrchestrator, UpdateSession, UpdateStatus};
pub use patch::{PatchAlgorithm, PatchExecutor};
pub use progress::{ProgressCallback, ProgressEvent};
pub use state::CheckState;
