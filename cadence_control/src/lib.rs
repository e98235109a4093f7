//! # Cadence Control
//!
//! Back end, front end, and standalone runner for cadence segments.
//!
//! The back end consumes per-DOF command queues and publishes one
//! observation per tick; trajectories are interpolated in iteration
//! space, so a wall-clock paced loop and a front-end paced (bursting)
//! loop produce identical values. The front end enqueues commands,
//! reads the observation history, and paces bursting back ends. The
//! [`Standalone`] runner bundles a back end with a [`Driver`] and a
//! loop thread.
//!
//! ```no_run
//! use cadence_common::{Mode, StandaloneConfig, State, TimeSpec};
//! use cadence_control::{FrontEnd, SimDriver, Standalone};
//! use cadence_shm::SegmentRegistry;
//!
//! # fn main() -> Result<(), cadence_control::ControlError> {
//! let registry = SegmentRegistry::new();
//! let config = StandaloneConfig {
//!     segment_id: "arm_left".into(),
//!     frequency_hz: 1000.0,
//!     dofs: 2,
//!     history_capacity: 4096,
//!     bursting: false,
//!     driver_bounds: Default::default(),
//! };
//! let _standalone = Standalone::start(&registry, &config, SimDriver::unbounded(2))?;
//!
//! let frontend = FrontEnd::attach(&registry, "arm_left")?;
//! frontend.add_command(
//!     0,
//!     State::new(1.5),
//!     TimeSpec::duration_ms(2000),
//!     Mode::Queue,
//! )?;
//! let observation = frontend.pulse_and_wait()?;
//! assert_eq!(observation.desired.get(0).get(), 1.5);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod controller;
pub mod driver;
pub mod error;
pub mod frequency;
pub mod frontend;
pub mod interpolation;
mod rt;
pub mod standalone;

pub use backend::BackEnd;
pub use controller::DofController;
pub use driver::{Driver, SimDriver};
pub use error::{ControlError, ControlResult};
pub use frequency::{FrequencyManager, FrequencyMeasure};
pub use frontend::{FrontEnd, WaitPolicy};
pub use standalone::{
    Standalone, StopToken, please_stop, standalone_is_running, start_standalone, stop_standalone,
};
