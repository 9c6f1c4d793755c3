//! Release manifest wire format and resolver.
//!
//! Each release ships a JSON manifest produced at build time, listing the
//! downloadable artifacts (full packages and binary patches). The resolver
//! fetches the manifest for a target version and decides whether a patch
//! applicable to the running version exists.
//!
//! Manifest fetch failures never propagate: a release without a manifest is
//! still installable through the full-package path, so the resolver degrades
//! to `incremental_available == false` instead of failing.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::feed::Update;
use crate::progress::format_bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Artifact kind within a release manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Complete installer package.
    Full,
    /// Binary patch against a specific predecessor version.
    Patch,
}

/// A downloadable artifact listed in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Artifact filename.
    pub name: String,
    /// Artifact kind.
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the artifact.
    pub hash: String,
    /// Absolute download URL.
    pub download_url: String,
}

/// A binary patch listed in the manifest.
///
/// A patch is applicable only when `from_version` equals the running
/// version exactly; patches are diffed against one specific predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchEntry {
    /// Patch filename.
    pub name: String,
    /// The exact version this patch was diffed against.
    pub from_version: String,
    /// The version this patch produces.
    pub to_version: String,
    /// Patch size in bytes.
    pub size: u64,
    /// Patch size as a percentage of the full package (0-100).
    pub compression_ratio: u8,
    /// Absolute download URL.
    pub download_url: String,
    /// Installed file the patch applies to.
    pub target_file: String,
    /// Diff algorithm identifier (e.g. `"bsdiff"`).
    pub algorithm: String,
}

/// Per-release manifest, produced out-of-band at release-build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    /// The release version this manifest describes.
    pub version: String,
    /// When the release was built.
    pub build_time: chrono::DateTime<chrono::Utc>,
    /// Downloadable artifacts, in manifest order.
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Binary patches, in manifest order.
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
}

impl ReleaseManifest {
    /// The full-package entry, if the manifest lists one.
    pub fn full_file(&self) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.kind == FileKind::Full)
    }

    /// First patch (in manifest order) applicable to `running_version`.
    pub fn patch_for(&self, running_version: &str) -> Option<&PatchEntry> {
        self.patches
            .iter()
            .find(|p| p.from_version == running_version)
    }
}

/// An [`Update`] enriched with patch-applicability results.
#[derive(Debug, Clone)]
pub struct IncrementalUpdate {
    /// The underlying release descriptor.
    pub update: Update,
    /// The release manifest, when one could be fetched.
    pub manifest: Option<ReleaseManifest>,
    /// The patch selected for the running version, if any.
    pub selected_patch: Option<PatchEntry>,
    /// Download saved by patching instead of a full download, 0-100.
    pub estimated_savings_percent: Option<u8>,
}

impl IncrementalUpdate {
    /// Wrap an update with no manifest (full-package path only).
    pub fn full_only(update: Update) -> Self {
        Self {
            update,
            manifest: None,
            selected_patch: None,
            estimated_savings_percent: None,
        }
    }

    /// Returns `true` iff a patch applicable to the running version exists.
    pub fn incremental_available(&self) -> bool {
        self.selected_patch.is_some()
    }

    /// Human-readable download summary for the update dialog.
    pub fn summary(&self) -> String {
        match (&self.selected_patch, self.estimated_savings_percent) {
            (Some(patch), Some(savings)) => format!(
                "Incremental update to v{}: {} patch, {savings}% smaller than the full package",
                self.update.version,
                format_bytes(patch.size)
            ),
            (Some(patch), None) => format!(
                "Incremental update to v{}: {} patch",
                self.update.version,
                format_bytes(patch.size)
            ),
            (None, _) => match self.manifest.as_ref().and_then(|m| m.full_file()) {
                Some(full) => format!(
                    "Full update to v{}: {} download",
                    self.update.version,
                    format_bytes(full.size)
                ),
                None => format!("Full update to v{}", self.update.version),
            },
        }
    }
}

/// Fetches per-release manifests and selects applicable patches.
pub struct ManifestResolver {
    http: reqwest::Client,
    config: UpdateConfig,
}

impl ManifestResolver {
    /// Create a resolver from the given configuration.
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

    /// Create a resolver reusing an existing HTTP client.
    pub fn with_client(http: reqwest::Client, config: UpdateConfig) -> Self {
        Self { http, config }
    }

    /// Resolve patch applicability for `update`.
    ///
    /// Never fails: any fetch or parse problem degrades to an
    /// [`IncrementalUpdate`] with `incremental_available() == false`, so the
    /// caller falls back to the full-package path. A missing manifest must
    /// never block the update flow.
    pub async fn resolve(&self, update: Update) -> IncrementalUpdate {
        let manifest = match self.fetch_manifest(&update.version).await {
            Ok(m) => m,
            Err(e) => {
                warn!("manifest unavailable for v{}: {e}", update.version);
                return IncrementalUpdate::full_only(update);
            }
        };

        let selected_patch = manifest.patch_for(&update.current_version).cloned();
        let estimated_savings_percent = selected_patch
            .as_ref()
            .and_then(|patch| manifest.full_file().map(|full| (patch, full)))
            .and_then(|(patch, full)| estimated_savings(patch.size, full.size));

        match (&selected_patch, estimated_savings_percent) {
            (Some(patch), savings) => info!(
                from = update.current_version.as_str(),
                to = update.version.as_str(),
                patch_bytes = patch.size,
                savings_percent = savings,
                "incremental update available"
            ),
            (None, _) => debug!(
                "no patch from v{} in manifest for v{}",
                update.current_version, update.version
            ),
        }

        IncrementalUpdate {
            update,
            manifest: Some(manifest),
            selected_patch,
            estimated_savings_percent,
        }
    }

    async fn fetch_manifest(&self, version: &str) -> Result<ReleaseManifest> {
        let url = self.config.manifest_url(version);
        debug!(url = url.as_str(), "fetching release manifest");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| UpdateError::Network(format!("manifest request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Manifest(format!(
                "manifest returned status {status}"
            )));
        }

        response
            .json::<ReleaseManifest>()
            .await
            .map_err(|e| UpdateError::Manifest(format!("malformed manifest: {e}")))
    }
}

/// Percentage of the full download saved by the patch, rounded to the
/// nearest integer. `None` when the full size is 0 (malformed manifest).
fn estimated_savings(patch_bytes: u64, full_bytes: u64) -> Option<u8> {
    if full_bytes == 0 {
        return None;
    }
    let ratio = 1.0 - (patch_bytes as f64 / full_bytes as f64);
    Some((ratio * 100.0).round().clamp(0.0, 100.0) as u8)
}
