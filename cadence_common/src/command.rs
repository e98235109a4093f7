//! Commands and command modes.

use crate::state::State;
use serde::{Deserialize, Serialize};

/// How a new command composes with a DOF's pending commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Run after all previously queued commands for the DOF finished.
    Queue,
    /// Discard all pending commands for the DOF (and cancel the one
    /// currently executing) and run from the current state.
    Overwrite,
}

/// A resolved command, as stored in a DOF queue.
///
/// The time specification has already been resolved to an absolute
/// `target_iteration`, so consumers only deal in iterations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Segment-wide unique id, monotonic in allocation order.
    pub id: u64,
    /// DOF this command addresses.
    pub dof: usize,
    /// State the DOF must reach.
    pub target: State,
    /// Back-end iteration at which `target` must be reached.
    pub target_iteration: i64,
    /// Queue or overwrite.
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_copied_by_value() {
        let a = Command {
            id: 7,
            dof: 1,
            target: State::new(12.5),
            target_iteration: 300,
            mode: Mode::Queue,
        };
        let b = a;
        assert_eq!(a, b);
    }
}
