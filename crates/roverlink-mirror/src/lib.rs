//! `roverlink-mirror` – read-mostly HTTP view of the rover.
//!
//! An `axum` router served on its own port (default `8080`) for browsers
//! and `curl`, independent of the line-protocol RPC listener.
//!
//! | Path | Response |
//! |---|---|
//! | `/` | `200 text/plain` greeting |
//! | `/led-on`, `/led-off` | drives the built-in LED, `200 Ok` |
//! | `/all-imu-data` | `200 application/json`, all seven channels |
//! | `/specific-imu-data?parameter=<key>` | `200` selected channels, `400` for a missing or unknown key |
//! | anything else | `404 File Not Found` |
//!
//! JSON bodies use the camelCase channel names (`accX`, `gyroZ`, ...).
//! The mirror consumes the bridge's freshness flag: a request served
//! from a sample it has already seen is logged at `debug`.

pub mod routes;
pub mod server;

pub use routes::{GREETING, ImuQuery, MirrorState, NOT_FOUND_BODY, router};
pub use server::{DEFAULT_PORT, MirrorServer};
