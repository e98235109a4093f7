//! Cadence Common Library
//!
//! Shared value types for the cadence workspace: per-DOF states, time
//! specifications, commands, observations, and the command-path error
//! taxonomy. These types are the vocabulary exchanged between front
//! ends and the back end through the shared segment.
//!
//! # Module Structure
//!
//! - [`consts`] - Workspace-wide limits and layout constants
//! - [`state`] - [`State`] / [`States`] value objects
//! - [`time_spec`] - [`TimeSpec`] and its resolution to target iterations
//! - [`command`] - [`Command`] and [`Mode`]
//! - [`observation`] - [`Observation`] produced once per back-end tick
//! - [`error`] - Enqueue-time error taxonomy
//! - [`config`] - TOML-loadable standalone configuration

pub mod command;
pub mod config;
pub mod consts;
pub mod error;
pub mod observation;
pub mod state;
pub mod time_spec;

pub use command::{Command, Mode};
pub use config::{ConfigError, DriverBounds, StandaloneConfig};
pub use consts::{MAX_DOFS, QUEUE_CAPACITY};
pub use error::CommandError;
pub use observation::Observation;
pub use state::{State, States};
pub use time_spec::{ResolveContext, TimeSpec};
