//! Workspace-wide constants.
//!
//! These constants define the fundamental sizing parameters of the
//! cadence shared segment. They are the single source of truth - all
//! other crates import from here.

/// Maximum number of degrees of freedom one segment can host.
///
/// The segment layout reserves one command queue per DOF up front, so
/// this bounds the per-segment memory footprint. The active DOF count
/// of a segment is configured at creation and may be lower.
pub const MAX_DOFS: usize = 32;

/// Per-DOF command queue capacity (pending commands).
///
/// Enqueues beyond this bound are rejected with `QueueFull` rather
/// than silently dropped.
pub const QUEUE_CAPACITY: usize = 64;

/// Default observation history capacity (retained ticks).
pub const DEFAULT_HISTORY_CAPACITY: usize = 4096;

/// CPU cache line size in bytes.
///
/// Used for alignment of the shared segment header to prevent false
/// sharing between the back-end writer and front-end readers.
pub const CACHE_LINE_SIZE: usize = 64;

/// Iteration value of the "not yet started" sentinel observation.
pub const NOT_STARTED_ITERATION: i64 = -1;
