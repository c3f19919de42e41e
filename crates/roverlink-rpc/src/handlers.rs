//! One handler per RPC method.
//!
//! Handlers only build [`Response`] documents; writing them is the
//! dispatcher's job.  Stream initiation needs its session to start *after*
//! the acknowledgement is on the wire, so it returns that as a follow-up in
//! its [`Reply`].

use std::sync::Arc;

use roverlink_bridge::{MonotonicClock, TelemetryBridge};
use roverlink_hal::{BUILTIN_LED, HardwareRegistry};
use roverlink_types::{ControlCommand, ImuSelector};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::RpcError;
use crate::response::Response;
use crate::stream::{DEFAULT_RATE_HZ, MAX_RATE_HZ, StreamManager};

/// Work the dispatcher performs once the response has been queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Bind a stream session to the requesting connection.
    StartStream { rate_hz: u32 },
}

/// A handler's result.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response: Response,
    pub follow_up: Option<FollowUp>,
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self {
            response,
            follow_up: None,
        }
    }
}

/// Shared context of every handler.
pub struct Handlers {
    bridge: Arc<TelemetryBridge>,
    hardware: Arc<HardwareRegistry>,
    streams: Arc<StreamManager>,
    clock: MonotonicClock,
    default_rate_hz: u32,
}

impl Handlers {
    pub fn new(
        bridge: Arc<TelemetryBridge>,
        hardware: Arc<HardwareRegistry>,
        streams: Arc<StreamManager>,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            bridge,
            hardware,
            streams,
            clock,
            default_rate_hz: DEFAULT_RATE_HZ,
        }
    }

    /// Override the stream rate used when `StreamImuData` names none
    /// (builder-style).
    pub fn with_default_rate(mut self, rate_hz: u32) -> Self {
        self.default_rate_hz = rate_hz.clamp(1, MAX_RATE_HZ);
        self
    }

    pub fn bridge(&self) -> &Arc<TelemetryBridge> {
        &self.bridge
    }

    pub fn streams(&self) -> &Arc<StreamManager> {
        &self.streams
    }

    pub fn clock(&self) -> MonotonicClock {
        self.clock
    }

    // -----------------------------------------------------------------------
    // TurnLedOn / TurnLedOff
    // -----------------------------------------------------------------------

    pub fn led(&self, on: bool) -> Result<Reply, RpcError> {
        self.hardware.set_indicator(BUILTIN_LED, on)?;
        let state = if on { "ON" } else { "OFF" };
        info!("LED turned {state}");
        Ok(Response::ok().message(format!("LED turned {state}")).into())
    }

    // -----------------------------------------------------------------------
    // GetAllImuData / GetSpecificImuData
    // -----------------------------------------------------------------------

    pub fn all_imu(&self) -> Reply {
        Response::full_telemetry(&self.bridge.snapshot(), self.clock.now_ms()).into()
    }

    /// Empty `params` selects every channel.
    pub fn specific_imu(&self, params: &str) -> Result<Reply, RpcError> {
        let key = params.trim();
        if key.is_empty() {
            return Ok(self.all_imu());
        }
        let selector = ImuSelector::parse(key).ok_or_else(|| RpcError::UnknownParameter {
            key: key.to_string(),
        })?;
        let response = Response::ok()
            .telemetry(&self.bridge.snapshot(), selector.fields())
            .timestamp(self.clock.now_ms());
        Ok(response.into())
    }

    // -----------------------------------------------------------------------
    // SendJoystickData
    // -----------------------------------------------------------------------

    /// Absent or mistyped fields take their neutral default; only an empty
    /// or non-object payload is rejected, and then the stored command is
    /// left untouched.
    pub fn joystick(&self, params: &str) -> Result<Reply, RpcError> {
        let command = parse_joystick(params, self.clock.now_ms())?;
        debug!(
            left_x = command.left_x,
            left_y = command.left_y,
            right_x = command.right_x,
            right_y = command.right_y,
            left_button = command.left_button,
            right_button = command.right_button,
            "joystick data received"
        );
        self.bridge.replace_command(command);
        Ok(Response::ok()
            .message("Joystick data received")
            .timestamp(self.clock.now_ms())
            .into())
    }

    // -----------------------------------------------------------------------
    // StreamImuData / StopImuStream
    // -----------------------------------------------------------------------

    pub fn stream_imu(&self, params: &str) -> Reply {
        let rate_hz = parse_rate(params).unwrap_or(self.default_rate_hz);
        let response = Response::ok()
            .message("IMU streaming started")
            .with("rate", rate_hz)
            .timestamp(self.clock.now_ms());
        Reply {
            response,
            follow_up: Some(FollowUp::StartStream { rate_hz }),
        }
    }

    pub async fn stop_stream(&self) -> Result<Reply, RpcError> {
        if !self.streams.stop(self.clock.now_ms()).await {
            return Err(RpcError::NoActiveStream);
        }
        Ok(Response::ok()
            .message("IMU streaming stopped")
            .timestamp(self.clock.now_ms())
            .into())
    }
}

fn parse_joystick(params: &str, now_ms: u64) -> Result<ControlCommand, RpcError> {
    if params.trim().is_empty() {
        return Err(RpcError::EmptyPayload);
    }
    let doc: Value = serde_json::from_str(params)
        .map_err(|e| RpcError::MalformedPayload { source: Some(e) })?;
    let fields = doc
        .as_object()
        .ok_or(RpcError::MalformedPayload { source: None })?;

    Ok(ControlCommand {
        left_x: axis(fields, "left_x"),
        left_y: axis(fields, "left_y"),
        right_x: axis(fields, "right_x"),
        right_y: axis(fields, "right_y"),
        left_button: button(fields, "left_button"),
        right_button: button(fields, "right_button"),
        timestamp: now_ms,
    })
}

fn axis(fields: &Map<String, Value>, key: &str) -> i32 {
    fields
        .get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(0)
}

fn button(fields: &Map<String, Value>, key: &str) -> bool {
    fields.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Requested stream rate, if `params` is a JSON object with a positive
/// integer `rate`.  Rates above [`MAX_RATE_HZ`] are capped.
fn parse_rate(params: &str) -> Option<u32> {
    if params.trim().is_empty() {
        return None;
    }
    let doc: Value = serde_json::from_str(params).ok()?;
    let rate = doc.get("rate")?.as_u64().filter(|r| *r > 0)?;
    Some(u32::try_from(rate).unwrap_or(u32::MAX).min(MAX_RATE_HZ))
}
