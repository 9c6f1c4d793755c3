//! Error types for the update pipeline.

/// Top-level error type for the update engine.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Transport-level failure (DNS, connect, TLS, dropped connection).
    /// The only retryable class.
    #[error("network error: {0}")]
    Network(String),

    /// Release feed returned a non-2xx status or an unparseable payload.
    #[error("feed error: {0}")]
    Feed(String),

    /// Release manifest could not be fetched or parsed.
    ///
    /// Callers normally never see this: the manifest resolver degrades to
    /// "no incremental update" instead of propagating it.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Artifact download failed mid-stream or the response was not streamable.
    #[error("download error: {0}")]
    Download(String),

    /// Binary patch could not be applied to the installed artifact.
    #[error("patch apply error: {0}")]
    PatchApply(String),

    /// Patched artifact failed integrity or version verification.
    #[error("verification error: {0}")]
    Verification(String),

    /// Application relaunch failed after a completed update.
    /// Non-fatal: the update itself is already installed.
    #[error("restart error: {0}")]
    Restart(String),

    /// Persistent state read/write error.
    #[error("state error: {0}")]
    State(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Returns `true` for transient transport failures that the feed client
    /// may retry with backoff. HTTP status and parse errors are permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Map the error to one of the small set of user-visible messages.
    ///
    /// Raw error text is never shown to the user; notifications carry one of
    /// these instead.
    pub fn friendly_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Network connection failed. Check your network settings.",
            Self::Feed(msg) | Self::Manifest(msg) => {
                if msg.contains("403") || msg.contains("429") {
                    "Update service is rate-limited. Try again later."
                } else {
                    "Update service is temporarily unavailable."
                }
            }
            Self::Download(_) => "Download failed. Check your network settings.",
            Self::PatchApply(_) | Self::Verification(_) => {
                "Incremental update failed. Falling back to a full update."
            }
            Self::Restart(_) => "Update installed. Please restart the application manually.",
            Self::State(_) | Self::Io(_) => "Update failed due to a local system error.",
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
