//! Time specifications and their resolution.
//!
//! A [`TimeSpec`] describes *when* a queued command must complete:
//! over a wall-clock duration, at a target speed, at an absolute
//! back-end iteration, or at an iteration relative to the previous
//! command in the same queue. Every variant is resolved to a single
//! canonical form - an absolute target iteration - at enqueue time,
//! so the interpolator never branches on the original variant.

use crate::error::CommandError;
use crate::state::State;
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// When a command must complete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimeSpec {
    /// Reach the target state over the given wall-clock duration.
    Duration(Duration),
    /// Reach the target state at the given speed, in state units per
    /// second. Zero, negative or non-finite speeds are rejected.
    Speed {
        /// Travel speed in state units per second.
        units_per_sec: f64,
    },
    /// Reach the target state at a back-end iteration.
    Iteration {
        /// Absolute iteration index, or offset when `relative`.
        value: i64,
        /// Offset from the previous command's resolved target in the
        /// same queue instead of an absolute index.
        relative: bool,
        /// Re-anchor the relative base to the current iteration.
        ///
        /// Marks the first command of a repeated burst so the chain
        /// does not extend the stale tail of the previous repetition.
        reset: bool,
    },
    /// Apply at the next tick (one iteration).
    Direct,
}

impl TimeSpec {
    /// Duration spec from milliseconds.
    pub const fn duration_ms(ms: u64) -> Self {
        Self::Duration(Duration::from_millis(ms))
    }

    /// Duration spec from microseconds.
    pub const fn duration_us(us: u64) -> Self {
        Self::Duration(Duration::from_micros(us))
    }

    /// Speed spec in state units per second.
    pub const fn speed(units_per_sec: f64) -> Self {
        Self::Speed { units_per_sec }
    }

    /// Absolute iteration spec.
    pub const fn absolute_iteration(value: i64) -> Self {
        Self::Iteration {
            value,
            relative: false,
            reset: false,
        }
    }

    /// Relative iteration spec (offset from the queue tail).
    pub const fn relative_iteration(value: i64) -> Self {
        Self::Iteration {
            value,
            relative: true,
            reset: false,
        }
    }

    /// Mark an iteration spec as resetting the relative base to the
    /// current iteration. No-op for the other variants.
    pub const fn reset(self) -> Self {
        match self {
            Self::Iteration {
                value, relative, ..
            } => Self::Iteration {
                value,
                relative,
                reset: true,
            },
            other => other,
        }
    }

    /// Resolve to an absolute target iteration.
    ///
    /// The resolved value is what the shared segment stores; ordering
    /// validation against the rest of the queue happens at the
    /// enqueue site, which knows the command mode.
    pub fn resolve(&self, ctx: &ResolveContext, target: State) -> Result<i64, CommandError> {
        match *self {
            Self::Duration(duration) => {
                let ticks = (duration.as_secs_f64() * ctx.frequency_hz).round() as i64;
                Ok(ctx.base(false) + ticks.max(1))
            }
            Self::Speed { units_per_sec } => {
                if !units_per_sec.is_finite() || units_per_sec <= 0.0 {
                    return Err(CommandError::InvalidTimeSpec {
                        dof: ctx.dof,
                        detail: format!("speed must be finite and positive, got {units_per_sec}"),
                    });
                }
                let distance = ctx.start_value().distance(target);
                if !distance.is_finite() {
                    return Err(CommandError::InvalidTimeSpec {
                        dof: ctx.dof,
                        detail: "non-finite travel distance".to_string(),
                    });
                }
                let ticks = (distance / units_per_sec * ctx.frequency_hz).round() as i64;
                Ok(ctx.base(false) + ticks.max(1))
            }
            Self::Iteration {
                value,
                relative,
                reset,
            } => {
                if relative {
                    Ok(ctx.base(reset) + value)
                } else {
                    Ok(value)
                }
            }
            Self::Direct => Ok(ctx.base(false) + 1),
        }
    }
}

/// Inputs a [`TimeSpec`] resolves against.
///
/// Built by the shared segment under the DOF queue lock, so the tail
/// snapshot cannot move while the resolution runs.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext {
    /// DOF the command addresses (for error reporting).
    pub dof: usize,
    /// Last completed back-end iteration (`-1` before the first tick).
    pub current_iteration: i64,
    /// Target iteration and target value of the queue tail, if the
    /// queue holds pending commands.
    pub tail: Option<(i64, State)>,
    /// Interpolation start value when the queue is empty: the last
    /// desired state the back end published.
    pub last_desired: State,
    /// Back-end tick frequency in Hz.
    pub frequency_hz: f64,
}

impl ResolveContext {
    /// Iteration the spec counts from: the queue tail when commands
    /// are pending, otherwise (or on `reset`) the current iteration.
    fn base(&self, reset: bool) -> i64 {
        if reset {
            return self.current_iteration;
        }
        match self.tail {
            Some((iteration, _)) => iteration,
            None => self.current_iteration,
        }
    }

    /// Value the command starts from, used for speed travel distance.
    fn start_value(&self) -> State {
        match self.tail {
            Some((_, state)) => state,
            None => self.last_desired,
        }
    }
}
