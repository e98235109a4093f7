//! # Cadence Shared Segment
//!
//! The synchronization surface between front ends and the back end:
//! per-DOF command queues in, bounded observation history out, plus
//! run-control flags and frequency metadata - all inside one
//! memory-mapped, history-preserving segment.
//!
//! ## Ownership model
//!
//! - The back end is the only writer of history, iteration counter
//!   and run flags.
//! - Front ends are the only writers of command queues; concurrent
//!   enqueues are serialized by a per-queue lock in the segment.
//! - Readers never block the writer and never observe a partially
//!   written observation (per-slot seqlock publication).
//!
//! ## Lifecycle
//!
//! Segments are created, attached and destroyed through an explicit
//! [`SegmentRegistry`] rather than process-global named lookup; the
//! segment id is the key, the registry's base directory is the scope.
//!
//! ```no_run
//! use cadence_shm::{SegmentConfig, SegmentRegistry};
//!
//! # fn main() -> Result<(), cadence_shm::SegmentError> {
//! let registry = SegmentRegistry::new();
//! let segment = registry.create("arm_left", &SegmentConfig::new(2, 4096, 1000.0))?;
//! // ... hand to a back end, attach front ends ...
//! registry.destroy("arm_left")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod history;
pub mod layout;
pub mod queue;
pub mod registry;
pub mod segment;

pub use error::{SegmentError, SegmentResult};
pub use history::HistoryIter;
pub use layout::SegmentFlags;
pub use registry::{SegmentConfig, SegmentInfo, SegmentRegistry, is_process_alive};
pub use segment::Segment;

/// Initialize tracing for the control processes.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
