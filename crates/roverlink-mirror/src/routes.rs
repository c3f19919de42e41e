//! Route table and handlers of the mirror.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use roverlink_bridge::TelemetryBridge;
use roverlink_hal::{BUILTIN_LED, HardwareRegistry};
use roverlink_types::{ImuField, ImuSelector, TelemetrySample};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Greeting served at `/`.
pub const GREETING: &str = "hello from rover!";

/// Body of every 404.
pub const NOT_FOUND_BODY: &str = "File Not Found";

/// What the mirror reads and drives.
#[derive(Clone)]
pub struct MirrorState {
    pub bridge: Arc<TelemetryBridge>,
    pub hardware: Arc<HardwareRegistry>,
}

impl MirrorState {
    pub fn new(bridge: Arc<TelemetryBridge>, hardware: Arc<HardwareRegistry>) -> Self {
        Self { bridge, hardware }
    }

    fn sample(&self) -> TelemetrySample {
        let (sample, fresh) = self.bridge.latest_sample();
        if !fresh {
            debug!("no new IMU sample since the last mirror read");
        }
        sample
    }

    fn drive_led(&self, on: bool) -> Response {
        match self.hardware.set_indicator(BUILTIN_LED, on) {
            Ok(()) => {
                info!("LED toggled {}", if on { "ON" } else { "OFF" });
                (StatusCode::OK, "Ok").into_response()
            }
            Err(e) => {
                warn!(error = %e, "mirror could not drive LED");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

/// `?parameter=<key>` of `/specific-imu-data`; other query keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ImuQuery {
    pub parameter: Option<String>,
}

/// Build the mirror's router over `state`.
pub fn router(state: MirrorState) -> Router {
    Router::new()
        .route("/", get(greet))
        .route("/led-on", get(led_on))
        .route("/led-off", get(led_off))
        .route("/all-imu-data", get(all_imu_data))
        .route("/specific-imu-data", get(specific_imu_data))
        .fallback(not_found)
        .with_state(state)
}

async fn greet() -> &'static str {
    GREETING
}

async fn led_on(State(state): State<MirrorState>) -> Response {
    state.drive_led(true)
}

async fn led_off(State(state): State<MirrorState>) -> Response {
    state.drive_led(false)
}

async fn all_imu_data(State(state): State<MirrorState>) -> Json<Value> {
    Json(channels(&state.sample(), &ImuField::ALL))
}

async fn specific_imu_data(
    State(state): State<MirrorState>,
    Query(query): Query<ImuQuery>,
) -> Response {
    let selector = query
        .parameter
        .as_deref()
        .filter(|key| !key.is_empty())
        .and_then(ImuSelector::parse);
    let Some(selector) = selector else {
        warn!(parameter = ?query.parameter, "unsupported IMU data request");
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    };
    Json(channels(&state.sample(), selector.fields())).into_response()
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

fn channels(sample: &TelemetrySample, fields: &[ImuField]) -> Value {
    let map: Map<String, Value> = fields
        .iter()
        .map(|field| {
            (
                field.mirror_key().to_string(),
                Value::from(field.read_decimal(sample)),
            )
        })
        .collect();
    Value::Object(map)
}
