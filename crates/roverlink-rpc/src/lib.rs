//! `roverlink-rpc` – the rover's line-oriented RPC protocol.
//!
//! A control client opens a TCP connection and sends one request per line,
//! `METHOD` or `METHOD:PARAMS`.  Every request gets exactly one response
//! line, `<len>:<json>`.  After `StreamImuData` the server additionally
//! pushes `STREAM:<len>:<json>` frames at the requested rate until the
//! client disconnects or sends `StopImuStream`, which produces a final
//! `STREAM_END:<len>:<json>` frame.
//!
//! # Modules
//!
//! - [`codec`] – line decoding and frame encoding.
//! - [`response`] – [`Response`], the JSON document every handler returns.
//! - [`dispatcher`] – [`Method`] table and [`Dispatcher`].
//! - [`handlers`] – one handler per method, sharing a [`Handlers`] context.
//! - [`stream`] – [`StreamManager`], the single-session push state machine.
//! - [`transport`] – [`FrameSink`], the write side of a client connection.
//! - [`server`] – [`RpcServer`], the accept loop and the streaming ticker.
//! - [`error`] – [`RpcError`].
//!
//! # Example session
//!
//! ```text
//! > GetSpecificImuData:accx
//! < 47:{"acc_x":0.12,"success":true,"timestamp":10512}
//! > StreamImuData:{"rate":5}
//! < 77:{"message":"IMU streaming started","rate":5,"success":true,"timestamp":10530}
//! < STREAM:<len>:{"acc_x":0.12,...,"success":true,"timestamp":10730}
//! ```

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod response;
pub mod server;
pub mod stream;
pub mod transport;

pub use codec::{Frame, FrameKind, Request};
pub use dispatcher::{Dispatcher, Method};
pub use error::RpcError;
pub use handlers::Handlers;
pub use response::Response;
pub use server::{DEFAULT_PORT, MAX_LINE_BYTES, RpcServer};
pub use stream::{DEFAULT_RATE_HZ, MAX_RATE_HZ, STREAM_END_TIMEOUT, StreamManager, TickOutcome};
pub use transport::{ChannelSink, FrameSink};
