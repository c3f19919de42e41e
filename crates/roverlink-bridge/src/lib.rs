//! `roverlink-bridge` – shared state between the sampling producer and the
//! servers.
//!
//! # Modules
//!
//! - [`telemetry`] – [`TelemetryBridge`]: single-slot, latest-wins holder for
//!   the newest IMU sample and the newest operator command.
//! - [`clock`] – [`MonotonicClock`]: milliseconds since process start, the
//!   time base of every `timestamp` field on the wire.

pub mod clock;
pub mod telemetry;

pub use clock::MonotonicClock;
pub use telemetry::TelemetryBridge;
