//! Observations: the immutable record of one back-end tick.

use crate::consts::NOT_STARTED_ITERATION;
use crate::state::States;
use serde::{Deserialize, Serialize};

/// One completed back-end iteration.
///
/// Written exactly once per tick by the back end, published atomically
/// in the shared segment history, immutable once written. All DOFs in
/// one observation reflect the same iteration - readers never see a
/// torn mix of ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Iteration index, monotonic from 0.
    pub iteration: i64,
    /// Observed back-end tick frequency in Hz at this iteration.
    pub frequency: f64,
    /// Desired state per DOF, as computed from the command queues.
    pub desired: States,
    /// Observed state per DOF, as reported by the sink driver.
    pub observed: States,
}

impl Observation {
    /// Sentinel returned before the back end has completed any tick.
    pub fn not_started(dofs: usize) -> Self {
        Self {
            iteration: NOT_STARTED_ITERATION,
            frequency: 0.0,
            desired: States::zeroed(dofs),
            observed: States::zeroed(dofs),
        }
    }

    /// True for the "not yet started" sentinel.
    pub fn is_not_started(&self) -> bool {
        self.iteration == NOT_STARTED_ITERATION
    }
}
