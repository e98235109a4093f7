//! Per-DOF state value objects.
//!
//! A [`State`] is one scalar target (or reading) for one degree of
//! freedom; a [`States`] is the per-DOF vector for a whole segment.
//! States are immutable-once-built values, compared and copied by
//! value. Vector-valued actuators are expressed as multiple DOFs.

use crate::consts::MAX_DOFS;
use serde::{Deserialize, Serialize};

/// One scalar state for one degree of freedom.
///
/// The default state (`0.0`) is what the back end holds before any
/// command has executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[repr(transparent)]
pub struct State(f64);

impl State {
    /// Build a state from a raw value.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Raw value accessor.
    pub const fn get(&self) -> f64 {
        self.0
    }

    /// Linear interpolation towards `target`.
    ///
    /// `ratio` is expected in `[0, 1]`; `ratio == 1.0` returns the
    /// target bit-for-bit (no residual interpolation error).
    pub fn lerp(&self, target: State, ratio: f64) -> State {
        if ratio >= 1.0 {
            return target;
        }
        State(self.0 + (target.0 - self.0) * ratio)
    }

    /// Absolute value distance to another state.
    ///
    /// Used by speed commands to derive the travel duration.
    pub fn distance(&self, other: State) -> f64 {
        (other.0 - self.0).abs()
    }
}

impl From<f64> for State {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// Per-DOF state vector, sized by the segment's configured DOF count.
///
/// Backed by a fixed-capacity vector so the back-end tick never
/// allocates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct States {
    values: heapless::Vec<State, MAX_DOFS>,
}

impl States {
    /// A vector of `dofs` default states.
    ///
    /// # Panics
    /// Panics if `dofs > MAX_DOFS`; DOF counts are validated at
    /// segment creation.
    pub fn zeroed(dofs: usize) -> Self {
        let mut values = heapless::Vec::new();
        for _ in 0..dofs {
            values.push(State::default()).expect("dofs <= MAX_DOFS");
        }
        Self { values }
    }

    /// Number of DOFs in this vector.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the vector holds no DOF.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// State of one DOF.
    pub fn get(&self, dof: usize) -> State {
        self.values[dof]
    }

    /// Set the state of one DOF.
    pub fn set(&mut self, dof: usize, state: State) {
        self.values[dof] = state;
    }

    /// Iterate over the per-DOF states in DOF order.
    pub fn iter(&self) -> impl Iterator<Item = State> + '_ {
        self.values.iter().copied()
    }
}
