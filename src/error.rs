//! Error types for the mastering and burn pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning, staging, burning, or verifying discs
#[derive(Error, Debug)]
pub enum Error {
    /// A source track carries unusable metadata (zero duration, unreadable probe)
    #[error("Invalid track {path}: {reason}")]
    InvalidTrack { path: PathBuf, reason: String },

    /// A single track is longer than an entire disc; planning cannot continue
    #[error("Track '{title}' ({frames} frames) exceeds disc capacity of {capacity} frames")]
    TrackExceedsCapacity {
        title: String,
        frames: u64,
        capacity: u64,
    },

    /// Session configuration is internally inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external transcoder failed or produced malformed output
    #[error("Transcode failed for '{title}': {cause}")]
    Transcode { title: String, cause: String },

    /// Assembled image disagrees with the plan; indicates a planner or capacity defect
    #[error("Image staging consistency failure: {0}")]
    Staging(String),

    /// The burner device could not be acquired within the configured timeout
    #[error("Timed out after {waited_secs}s waiting for device {device}")]
    DeviceTimeout { device: String, waited_secs: u64 },

    /// The burner process failed
    #[error("Burn failed on disc {disc}: {cause}")]
    Burn { disc: u32, cause: String },

    /// Post-burn verification did not match the plan
    #[error("Verification failed on disc {disc}: {cause}")]
    Verify { disc: u32, cause: String },

    /// The run was cancelled cooperatively; not a failure
    #[error("Cancelled")]
    Cancelled,

    /// A broken invariant inside the pipeline itself
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a failed burn job may go back to `Pending` for another attempt.
    ///
    /// Staging consistency failures are internal defects and never retried;
    /// cancellation is not a failure at all.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transcode { .. }
                | Error::DeviceTimeout { .. }
                | Error::Burn { .. }
                | Error::Verify { .. }
        )
    }
}
