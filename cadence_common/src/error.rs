//! Enqueue-time error taxonomy.
//!
//! All command-path errors are returned synchronously to the front
//! end; they never reach the back-end tick, which must always advance.

use thiserror::Error;

/// Errors rejecting a command at enqueue time. The queue is left
/// unchanged in every case.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Resolved target iteration would not advance the queue, or the
    /// spec itself is ill-formed (zero/negative speed).
    #[error("invalid time spec for dof {dof}: {detail}")]
    InvalidTimeSpec {
        /// DOF the command addressed.
        dof: usize,
        /// Human-readable rejection reason.
        detail: String,
    },

    /// Command references a DOF outside the configured set.
    #[error("unknown dof {dof} (segment has {dof_count} dofs)")]
    UnknownDof {
        /// DOF the command addressed.
        dof: usize,
        /// Number of DOFs the segment was created with.
        dof_count: usize,
    },

    /// The DOF's pending ring is full.
    #[error("command queue full for dof {dof} (capacity {capacity})")]
    QueueFull {
        /// DOF the command addressed.
        dof: usize,
        /// Fixed queue capacity.
        capacity: usize,
    },
}
