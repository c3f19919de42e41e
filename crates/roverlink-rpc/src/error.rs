//! Error taxonomy of the RPC layer.
//!
//! Most variants are recoverable: the dispatcher turns them into a
//! `success:false` response and the connection carries on.  Only transport
//! failures end a connection (see [`RpcError::to_response`]).

use std::io;

use roverlink_types::RoverError;
use thiserror::Error;

use crate::response::Response;

/// Errors surfaced while decoding, dispatching or answering a request.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Method name is not in the dispatch table.
    #[error("Unknown method: {method}")]
    UnknownMethod { method: String },

    /// `GetSpecificImuData` key does not name a telemetry channel.
    #[error("Unknown parameter: {key}")]
    UnknownParameter { key: String },

    /// `SendJoystickData` arrived without a payload.
    #[error("Empty joystick data")]
    EmptyPayload,

    /// `SendJoystickData` payload is not a JSON object.
    #[error("JSON parsing failed")]
    MalformedPayload {
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A request line ran past the per-line cap; its bytes were discarded.
    #[error("Request line exceeds {limit} bytes")]
    RequestTooLong { limit: usize },

    /// `StopImuStream` with no session running.
    #[error("No active stream")]
    NoActiveStream,

    /// A hardware driver rejected the command.
    #[error("{0}")]
    Hardware(#[from] RoverError),

    /// A received frame does not follow `[STREAM[_END]:]<len>:<json>`.
    #[error("malformed frame: {reason}")]
    Protocol { reason: String },

    /// Socket read or write failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The connection's writer has shut down.
    #[error("connection closed")]
    ConnectionClosed,
}

impl RpcError {
    /// Build the client-facing response for a recoverable error, stamping
    /// `timestamp` where the protocol includes it.
    ///
    /// Returns `None` for transport-level failures, which are never reported
    /// in-band.
    pub fn to_response(&self, now_ms: u64) -> Option<Response> {
        let text = self.to_string();
        match self {
            Self::UnknownMethod { .. } | Self::RequestTooLong { .. } | Self::Hardware(_) => {
                Some(Response::failure().error(text))
            }
            Self::UnknownParameter { .. } => {
                Some(Response::failure().error(text).timestamp(now_ms))
            }
            Self::EmptyPayload | Self::MalformedPayload { .. } | Self::NoActiveStream => {
                Some(Response::failure().message(text).timestamp(now_ms))
            }
            Self::Protocol { .. } | Self::Transport(_) | Self::ConnectionClosed => None,
        }
    }

    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }
}
