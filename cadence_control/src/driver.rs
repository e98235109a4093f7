//! Sink driver abstraction.
//!
//! The back end never talks to hardware directly: each tick it pushes
//! a desired state vector into a [`Driver`] and reads the observed
//! state vector back. Real deployments implement the trait over their
//! bus; tests and demos use [`SimDriver`].

use cadence_common::{DriverBounds, State, States};

/// One hardware (or simulated) sink for desired states.
///
/// Implementations must be cheap per call: both methods run inside the
/// back-end tick, so a slow driver directly eats the cycle budget.
pub trait Driver: Send {
    /// Push the desired state vector to the device.
    fn set(&mut self, desired: &States);

    /// Read the observed state vector back from the device.
    fn read(&mut self) -> States;
}

/// Pass-through driver for tests and bring-up.
///
/// Clamps each desired value into the configured bounds and echoes
/// the result back as the observed state on the next read.
pub struct SimDriver {
    bounds: DriverBounds,
    current: States,
}

impl SimDriver {
    /// Create a driver for `dofs` degrees of freedom, all starting at
    /// zero.
    pub fn new(dofs: usize, bounds: DriverBounds) -> Self {
        Self {
            bounds,
            current: States::zeroed(dofs),
        }
    }

    /// Create an unbounded driver.
    pub fn unbounded(dofs: usize) -> Self {
        Self::new(dofs, DriverBounds::default())
    }
}

impl Driver for SimDriver {
    fn set(&mut self, desired: &States) {
        for dof in 0..self.current.len() {
            let value = desired.get(dof).get().clamp(self.bounds.min, self.bounds.max);
            self.current.set(dof, State::new(value));
        }
    }

    fn read(&mut self) -> States {
        self.current.clone()
    }
}
