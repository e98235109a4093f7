//! Control-side error types.

use std::time::Duration;

use cadence_common::{CommandError, ConfigError};
use cadence_shm::SegmentError;
use thiserror::Error;

/// Errors surfaced by the back end, front end, and standalone runner.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Segment lifecycle or layout failure.
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// Command rejected at enqueue time.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid standalone configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A bounded wait elapsed before the condition held.
    #[error("timed out after {waited:?}")]
    Timeout {
        /// Total time spent waiting.
        waited: Duration,
    },

    /// Burst requested on a segment whose back end is wall-clock paced.
    #[error("segment '{id}' is not in bursting mode")]
    NotBursting {
        /// Segment id.
        id: String,
    },

    /// A standalone with this id is already registered in this process.
    #[error("standalone '{id}' is already running")]
    AlreadyRunning {
        /// Standalone / segment id.
        id: String,
    },

    /// No standalone with this id is registered in this process.
    #[error("standalone '{id}' is not running")]
    NotRunning {
        /// Standalone / segment id.
        id: String,
    },

    /// Real-time setup (memory locking, scheduler) failed.
    #[error("rt setup failed: {0}")]
    RtSetup(String),
}

/// Convenience alias for control-side results.
pub type ControlResult<T> = Result<T, ControlError>;
