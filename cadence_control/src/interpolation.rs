//! Iteration-based linear interpolation between a start point and a
//! command target.
//!
//! All trajectories are piecewise linear in iteration space: the wall
//! clock never enters the computation, so clocked and bursting back
//! ends produce bit-identical trajectories for the same command
//! sequence.

use cadence_common::State;

/// Desired value at `current_iteration`, on the line from
/// `(start_iteration, start)` to `(target_iteration, target)`.
///
/// At or past the target iteration the target is returned exactly,
/// never an extrapolation. A degenerate span (`target_iteration <=
/// start_iteration`) also snaps to the target.
#[inline]
pub fn interpolate(
    start: State,
    start_iteration: i64,
    target: State,
    target_iteration: i64,
    current_iteration: i64,
) -> State {
    if current_iteration >= target_iteration || target_iteration <= start_iteration {
        return target;
    }
    let elapsed = (current_iteration - start_iteration) as f64;
    let span = (target_iteration - start_iteration) as f64;
    start.lerp(target, elapsed / span)
}
