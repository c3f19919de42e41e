//! Method table and request routing.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{Request, decode_line, encode_response};
use crate::error::RpcError;
use crate::handlers::{FollowUp, Handlers, Reply};
use crate::response::Response;
use crate::transport::FrameSink;

/// Every method the rover answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    TurnLedOn,
    TurnLedOff,
    GetAllImuData,
    GetSpecificImuData,
    SendJoystickData,
    StreamImuData,
    StopImuStream,
}

const METHOD_TABLE: [(&str, Method); 7] = [
    ("TurnLedOn", Method::TurnLedOn),
    ("TurnLedOff", Method::TurnLedOff),
    ("GetAllImuData", Method::GetAllImuData),
    ("GetSpecificImuData", Method::GetSpecificImuData),
    ("SendJoystickData", Method::SendJoystickData),
    ("StreamImuData", Method::StreamImuData),
    ("StopImuStream", Method::StopImuStream),
];

impl Method {
    pub const ALL: [Method; 7] = [
        Method::TurnLedOn,
        Method::TurnLedOff,
        Method::GetAllImuData,
        Method::GetSpecificImuData,
        Method::SendJoystickData,
        Method::StreamImuData,
        Method::StopImuStream,
    ];

    /// Exact, case-sensitive lookup.
    pub fn parse(name: &str) -> Option<Self> {
        METHOD_TABLE
            .iter()
            .find(|(wire, _)| *wire == name)
            .map(|(_, method)| *method)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::TurnLedOn => "TurnLedOn",
            Method::TurnLedOff => "TurnLedOff",
            Method::GetAllImuData => "GetAllImuData",
            Method::GetSpecificImuData => "GetSpecificImuData",
            Method::SendJoystickData => "SendJoystickData",
            Method::StreamImuData => "StreamImuData",
            Method::StopImuStream => "StopImuStream",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes decoded requests to [`Handlers`] and writes the answers.
pub struct Dispatcher {
    handlers: Handlers,
}

impl Dispatcher {
    pub fn new(handlers: Handlers) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Process one received line on behalf of `conn`.
    ///
    /// Blank lines are ignored and yield `Ok(None)`.  Otherwise exactly one
    /// response frame is written to `conn` and also returned; recoverable
    /// failures become `success:false` responses.  A stream requested by the
    /// line starts only after its acknowledgement has been queued, so the
    /// acknowledgement always precedes the first `STREAM` frame.
    ///
    /// # Errors
    ///
    /// Only transport failures writing to `conn` are returned.
    pub async fn handle_line(
        &self,
        conn: &Arc<dyn FrameSink>,
        line: &str,
    ) -> Result<Option<Response>, RpcError> {
        let Some(request) = decode_line(line) else {
            return Ok(None);
        };
        debug!(peer = %conn.peer(), method = %request.method, params = %request.params, "request received");

        let Reply {
            response,
            follow_up,
        } = match self.dispatch(&request).await {
            Ok(reply) => reply,
            Err(e) => match e.to_response(self.handlers.clock().now_ms()) {
                Some(response) => {
                    warn!(peer = %conn.peer(), method = %request.method, error = %e, "request failed");
                    response.into()
                }
                None => return Err(e),
            },
        };

        conn.write_line(encode_response(&response)).await?;

        if let Some(FollowUp::StartStream { rate_hz }) = follow_up {
            let now = self.handlers.clock().now_ms();
            self.handlers.streams().start(Arc::clone(conn), rate_hz, now);
        }
        Ok(Some(response))
    }

    /// Answer a request line that was dropped for exceeding `limit` bytes.
    ///
    /// # Errors
    ///
    /// Only transport failures writing to `conn` are returned.
    pub async fn reject_oversized(
        &self,
        conn: &Arc<dyn FrameSink>,
        limit: usize,
    ) -> Result<Response, RpcError> {
        let err = RpcError::RequestTooLong { limit };
        warn!(peer = %conn.peer(), limit, "request line too long; discarded");
        let response = err
            .to_response(self.handlers.clock().now_ms())
            .unwrap_or_else(|| Response::failure().error(err.to_string()));
        conn.write_line(encode_response(&response)).await?;
        Ok(response)
    }

    /// Route `request` to its handler without writing anything.
    pub async fn dispatch(&self, request: &Request) -> Result<Reply, RpcError> {
        let method = Method::parse(&request.method).ok_or_else(|| RpcError::UnknownMethod {
            method: request.method.clone(),
        })?;
        let h = &self.handlers;
        match method {
            Method::TurnLedOn => h.led(true),
            Method::TurnLedOff => h.led(false),
            Method::GetAllImuData => Ok(h.all_imu()),
            Method::GetSpecificImuData => h.specific_imu(&request.params),
            Method::SendJoystickData => h.joystick(&request.params),
            Method::StreamImuData => Ok(h.stream_imu(&request.params)),
            Method::StopImuStream => h.stop_stream().await,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
