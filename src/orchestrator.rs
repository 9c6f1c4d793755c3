//! Update orchestrator state machine.
//!
//! Ties the feed client, manifest resolver, download engine, and patch
//! executor into one sequential cycle:
//!
//! `Idle → Checking → {Available, UpToDate, Error}`
//! `Available → Downloading → Installing → restart-pending`
//!
//! # Fallback policy
//!
//! Any failure on the incremental path (patch download, apply, or verify)
//! triggers exactly one fallback to the full-package path: progress resets
//! to 0, the method switches to `Full`, the user is told, and the flow
//! restarts with the full artifact (or the host's native updater when the
//! release ships no manifest). The fallback itself is never retried; errors
//! from the full path surface to the caller.
//!
//! # Concurrency
//!
//! Re-entrancy locks make concurrent `check_for_update` or `install_update`
//! calls silent no-ops; at most one cycle is active at a time. Within a
//! cycle, steps run strictly sequentially.

use crate::backend::{UpdateBackend, UpdateMethod};
use crate::config::UpdateConfig;
use crate::download::Downloader;
use crate::error::{Result, UpdateError};
use crate::feed::ReleaseFeed;
use crate::host::HostRuntime;
use crate::manifest::{IncrementalUpdate, ManifestResolver};
use crate::patch::{PatchAlgorithm, PatchExecutor};
use crate::progress::{ProgressCallback, ProgressEvent, format_bytes};
use crate::state::CheckState;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Where a session is in its update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No cycle in progress.
    Idle,
    /// Querying the release feed.
    Checking,
    /// A newer release was found and is ready to install.
    Available,
    /// Downloading the patch or full package.
    Downloading,
    /// Artifact downloaded, not yet applied.
    Downloaded,
    /// Applying and verifying the update.
    Installing,
    /// The running version is the latest.
    UpToDate,
    /// The last cycle failed.
    Error,
}

/// Mutable session state for one running application.
///
/// Owned by the orchestrator, reset to `Idle` after each cycle, never
/// persisted across restarts.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    /// Current position in the state machine.
    pub status: UpdateStatus,
    /// Overall cycle progress, 0-100.
    pub progress_percent: f64,
    /// Last sampled download throughput in bytes per second.
    pub download_speed: f64,
    /// Which path the cycle is using.
    pub method: UpdateMethod,
    /// User-facing description of the last failure, if any.
    pub last_error: Option<String>,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self {
            status: UpdateStatus::Idle,
            progress_percent: 0.0,
            download_speed: 0.0,
            method: UpdateMethod::Incremental,
            last_error: None,
        }
    }
}

/// Drives the whole update cycle and owns the session state.
pub struct UpdateOrchestrator {
    config: UpdateConfig,
    feed: ReleaseFeed,
    resolver: ManifestResolver,
    downloader: Downloader,
    executor: PatchExecutor,
    host: Arc<dyn HostRuntime>,
    session: Arc<Mutex<UpdateSession>>,
    current: Mutex<Option<IncrementalUpdate>>,
    check_state: Mutex<CheckState>,
    state_path: Option<PathBuf>,
    checking: AtomicBool,
    installing: AtomicBool,
}

impl UpdateOrchestrator {
    /// Create an orchestrator with the given host runtime and diff engine.
    ///
    /// `state_path` is where the persistent check state lives; `None`
    /// disables persistence (useful for tests and portable installs).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be constructed.
    pub fn new(
        config: UpdateConfig,
        host: Arc<dyn HostRuntime>,
        algorithm: Box<dyn PatchAlgorithm>,
        state_path: Option<PathBuf>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpdateError::Network(format!("cannot build HTTP client: {e}")))?;

        let check_state = state_path
            .as_deref()
            .map(CheckState::load_from)
            .unwrap_or_default();

        Ok(Self {
            feed: ReleaseFeed::with_client(http.clone(), config.clone()),
            resolver: ManifestResolver::with_client(http, config.clone()),
            downloader: Downloader::new(&config)?,
            executor: PatchExecutor::new(algorithm),
            host,
            session: Arc::new(Mutex::new(UpdateSession::default())),
            current: Mutex::new(None),
            check_state: Mutex::new(check_state),
            state_path,
            checking: AtomicBool::new(false),
            installing: AtomicBool::new(false),
            config,
        })
    }

    /// Snapshot of the current session state.
    pub fn session(&self) -> UpdateSession {
        self.lock_session().clone()
    }

    /// The update found by the last check, if still pending.
    pub fn current_update(&self) -> Option<IncrementalUpdate> {
        self.lock_current().clone()
    }

    /// Returns `true` when the background timer should run a check
    /// (last check older than the configured interval).
    pub fn auto_check_due(&self) -> bool {
        self.lock_check_state()
            .check_is_stale(self.config.auto_check_interval_hours)
    }

    /// Record that the user skipped `version`; silent checks will not
    /// renotify about it.
    pub fn dismiss_version(&self, version: &str) {
        let mut state = self.lock_check_state();
        state.dismissed_release = Some(version.to_owned());
        self.persist_check_state(&state);
    }

    /// Check the feed for a newer release and resolve patch applicability.
    ///
    /// Returns the found update, or `None` when up to date. A concurrent
    /// call while a check is in flight is a silent no-op returning the
    /// currently known result without issuing a second feed request.
    ///
    /// With `silent` set (background timer), no notifications are sent and
    /// a release the user dismissed is reported as no update.
    ///
    /// # Errors
    ///
    /// Propagates feed failures after the client's retries are exhausted.
    /// Manifest failures never propagate (the full path stays available).
    pub async fn check_for_update(&self, silent: bool) -> Result<Option<IncrementalUpdate>> {
        if self
            .checking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("update check already in flight");
            return Ok(self.current_update());
        }

        let result = self.run_check(silent).await;
        self.checking.store(false, Ordering::SeqCst);
        result
    }

    async fn run_check(&self, silent: bool) -> Result<Option<IncrementalUpdate>> {
        self.transition(UpdateStatus::Checking);
        let current_version = match self.host.installed_version() {
            Ok(version) => version,
            Err(e) => {
                self.fail(&e);
                if !silent {
                    self.host.notify("Update check failed", e.friendly_message()).await;
                }
                return Err(e);
            }
        };

        let update = match self.feed.fetch_latest(&current_version).await {
            Ok(update) => update,
            Err(e) => {
                self.fail(&e);
                if !silent {
                    self.host.notify("Update check failed", e.friendly_message()).await;
                }
                return Err(e);
            }
        };

        self.mark_checked();

        let Some(update) = update else {
            self.transition(UpdateStatus::UpToDate);
            if !silent {
                self.host
                    .notify("Up to date", "You are running the latest version.")
                    .await;
            }
            return Ok(None);
        };

        if silent && self.lock_check_state().is_dismissed(&update.version) {
            info!("v{} was dismissed by the user, skipping", update.version);
            self.transition(UpdateStatus::UpToDate);
            return Ok(None);
        }

        let resolved = self.resolver.resolve(update).await;
        let method = UpdateBackend::select(&resolved).method();

        {
            let mut session = self.lock_session();
            session.status = UpdateStatus::Available;
            session.method = method;
            session.last_error = None;
        }

        if !silent {
            self.host
                .notify(
                    &format!("Update available: v{}", resolved.update.version),
                    &resolved.summary(),
                )
                .await;
        }

        *self.lock_current() = Some(resolved.clone());
        Ok(Some(resolved))
    }

    /// Install the update found by the last check.
    ///
    /// Requires a pending update (status `Available`); otherwise, and when
    /// an install is already running, this is a silent no-op. On success a
    /// restart is scheduled after a short delay so the final notification
    /// can render; a restart failure is reported but the installed update
    /// is not rolled back.
    ///
    /// # Errors
    ///
    /// Propagates full-path failures. Incremental-path failures are
    /// consumed by the one-shot fallback to the full path.
    pub async fn install_update(self: &Arc<Self>) -> Result<()> {
        if self
            .installing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("install already in progress");
            return Ok(());
        }

        let result = self.run_install().await;
        self.installing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_install(self: &Arc<Self>) -> Result<()> {
        let Some(update) = self.current_update() else {
            debug!("install requested with no pending update");
            return Ok(());
        };
        if self.lock_session().status != UpdateStatus::Available {
            debug!("install requested outside Available state");
            return Ok(());
        }

        let backend = UpdateBackend::select(&update);
        let outcome = match backend {
            UpdateBackend::Patch(ref patch) => {
                match self.install_incremental(&update, patch).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        // One-shot fallback: any incremental failure switches
                        // to the full path, which is not itself retried.
                        warn!("incremental update failed, falling back to full: {e}");
                        self.host
                            .notify(
                                "Switching to full update",
                                "Incremental update failed. Downloading the full package...",
                            )
                            .await;
                        {
                            let mut session = self.lock_session();
                            session.progress_percent = 0.0;
                            session.download_speed = 0.0;
                            session.method = UpdateMethod::Full;
                        }
                        self.install_full(&update, UpdateBackend::full_package(&update))
                            .await
                    }
                }
            }
            full => self.install_full(&update, full).await,
        };

        match outcome {
            Ok(()) => {
                {
                    let mut session = self.lock_session();
                    session.progress_percent = 100.0;
                    session.status = UpdateStatus::Installing;
                }
                let version = update.update.version.clone();
                self.host
                    .notify(
                        "Update installed",
                        &format!("WordPond v{version} is ready. Restarting..."),
                    )
                    .await;
                *self.lock_current() = None;
                self.schedule_restart();
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                self.host.notify("Update failed", e.friendly_message()).await;
                Err(e)
            }
        }
    }

    /// Incremental path: download the patch (session progress 10-70),
    /// then apply and verify (70 → 90 → 100). The leading 10% and trailing
    /// 30% are reserved for the pre/post steps around the raw download.
    async fn install_incremental(
        &self,
        update: &IncrementalUpdate,
        patch: &crate::manifest::PatchEntry,
    ) -> Result<()> {
        {
            let mut session = self.lock_session();
            session.status = UpdateStatus::Downloading;
            session.method = UpdateMethod::Incremental;
            session.progress_percent = 10.0;
        }
        self.host
            .notify(
                "Downloading patch",
                &format!("Downloading incremental patch ({})...", format_bytes(patch.size)),
            )
            .await;

        let callback = self.progress_callback(10.0, 70.0);
        let patch_bytes = self
            .downloader
            .fetch(&patch.download_url, Some(&callback))
            .await?;

        {
            let mut session = self.lock_session();
            session.status = UpdateStatus::Downloaded;
            session.progress_percent = 70.0;
        }
        self.host
            .notify("Applying patch", "Applying the patch to the current version...")
            .await;

        self.transition(UpdateStatus::Installing);

        // The manifest's full-file digest describes the rebuilt artifact
        // when the patch targets that same file.
        let expected_hash = update
            .manifest
            .as_ref()
            .and_then(|m| m.full_file())
            .filter(|full| full.name == patch.target_file)
            .map(|full| full.hash.clone());

        self.executor
            .apply(
                self.host.as_ref(),
                patch,
                &patch_bytes,
                expected_hash.as_deref(),
                &update.update.version,
            )
            .await?;

        self.lock_session().progress_percent = 90.0;
        info!(
            "incremental update to v{} complete ({}% download saved)",
            update.update.version,
            update.estimated_savings_percent.unwrap_or(0)
        );
        Ok(())
    }

    /// Full path: download the complete package from the manifest, or
    /// delegate to the host's native updater when there is no manifest.
    async fn install_full(&self, update: &IncrementalUpdate, backend: UpdateBackend) -> Result<()> {
        {
            let mut session = self.lock_session();
            session.status = UpdateStatus::Downloading;
            session.method = UpdateMethod::Full;
        }

        match backend {
            UpdateBackend::FullPackage(file) => {
                self.host
                    .notify(
                        "Downloading update",
                        &format!("Downloading full package ({})...", format_bytes(file.size)),
                    )
                    .await;

                let callback = self.progress_callback(0.0, 90.0);
                let package = self
                    .downloader
                    .fetch(&file.download_url, Some(&callback))
                    .await?;

                self.transition(UpdateStatus::Downloaded);
                self.transition(UpdateStatus::Installing);
                self.host.install_full_package(&package, &file.name).await?;
            }
            UpdateBackend::HostNative => {
                info!("no manifest available, delegating to the native updater");
                self.transition(UpdateStatus::Installing);
                self.host.native_full_update().await?;
            }
            UpdateBackend::Patch(_) => {
                // Backends are selected by this orchestrator; a patch
                // backend can never reach the full path.
                return Err(UpdateError::Download(
                    "patch backend routed to full path".to_owned(),
                ));
            }
        }

        info!("full update to v{} complete", update.update.version);
        Ok(())
    }

    /// Schedule the application relaunch after the configured delay.
    ///
    /// Runs detached so the final notification can render first. A relaunch
    /// failure is logged and reported; the installed update stays in place.
    fn schedule_restart(self: &Arc<Self>) {
        let orchestrator = Arc::clone(self);
        let delay = self.config.restart_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = orchestrator.host.relaunch().await {
                error!("relaunch failed: {e}");
                orchestrator
                    .host
                    .notify("Restart failed", e.friendly_message())
                    .await;
            }
        });
    }

    /// Force the session back to `Idle`, clearing progress and errors.
    /// Callable from any state; used after a completed cycle or a
    /// user-initiated cancel.
    pub fn reset_update_state(&self) {
        *self.lock_session() = UpdateSession::default();
        *self.lock_current() = None;
    }

    /// Build a download callback mapping raw progress onto the
    /// `[floor, ceiling]` slice of the session progress bar.
    fn progress_callback(&self, floor: f64, ceiling: f64) -> ProgressCallback {
        let session = Arc::clone(&self.session);
        Box::new(move |event| {
            if let ProgressEvent::Progress {
                percent,
                bytes_per_sec,
                ..
            } = event
            {
                let Ok(mut guard) = session.lock() else {
                    return;
                };
                guard.download_speed = bytes_per_sec;
                if let Some(p) = percent {
                    guard.progress_percent = floor + p / 100.0 * (ceiling - floor);
                }
            }
        })
    }

    fn transition(&self, status: UpdateStatus) {
        debug!(?status, "session transition");
        self.lock_session().status = status;
    }

    fn fail(&self, error: &UpdateError) {
        let mut session = self.lock_session();
        session.status = UpdateStatus::Error;
        session.last_error = Some(error.friendly_message().to_owned());
    }

    fn mark_checked(&self) {
        let mut state = self.lock_check_state();
        state.mark_checked();
        self.persist_check_state(&state);
    }

    fn persist_check_state(&self, state: &CheckState) {
        if let Some(path) = &self.state_path
            && let Err(e) = state.save_to(path)
        {
            warn!("cannot persist check state: {e}");
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, UpdateSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<IncrementalUpdate>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_check_state(&self) -> std::sync::MutexGuard<'_, CheckState> {
        self.check_state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
