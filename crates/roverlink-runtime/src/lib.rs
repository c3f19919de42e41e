//! `roverlink-runtime` – process-level plumbing for the rover.
//!
//! # Modules
//!
//! - [`rover`] – [`Rover`]: builds the shared [`TelemetryBridge`], stream
//!   manager and servers, and runs them with the IMU [`Sampler`] until a
//!   shutdown signal.
//! - [`sampler`] – [`Sampler`]: the fixed-period telemetry producer with the
//!   status-light heartbeat.
//! - [`telemetry`] – [`init_tracing`]: the global `tracing` subscriber with
//!   optional OTLP span export (`OTEL_EXPORTER_OTLP_ENDPOINT`).
//!
//! [`TelemetryBridge`]: roverlink_bridge::TelemetryBridge

pub mod rover;
pub mod sampler;
pub mod telemetry;

pub use rover::{Rover, RoverSettings};
pub use sampler::Sampler;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
