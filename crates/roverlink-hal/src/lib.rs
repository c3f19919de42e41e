//! `roverlink-hal` – Hardware Abstraction Layer
//!
//! The protocol server never touches GPIO or I²C directly.  It talks to the
//! traits in this crate so the same code runs against real drivers on the
//! rover and against simulated ones on a workstation or in CI.
//!
//! # Modules
//!
//! - [`indicator`] – [`Indicator`]: discrete on/off outputs (built-in LED,
//!   status light).
//! - [`imu`] – [`ImuSensor`]: the 6-DOF motion sensor the sampling producer
//!   polls.
//! - [`registry`] – [`HardwareRegistry`]: resolves indicators by identifier.
//! - [`sim`] – simulated drivers and the [`SimRegistry`] builder.

pub mod imu;
pub mod indicator;
pub mod registry;
pub mod sim;

pub use imu::ImuSensor;
pub use indicator::{Indicator, BUILTIN_LED, STATUS_LIGHT};
pub use registry::HardwareRegistry;
pub use sim::{SimImu, SimIndicator, SimRegistry};
