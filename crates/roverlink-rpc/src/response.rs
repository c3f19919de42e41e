//! [`Response`] – the JSON document carried by every response and stream
//! frame.
//!
//! Every document has a boolean `success`; the remaining keys depend on the
//! method.  Keys are fixed by the protocol:
//!
//! | Key | Used by |
//! |---|---|
//! | `acc_x` … `temperature` | telemetry queries and stream frames |
//! | `timestamp` | everything except LED control and unknown-method errors |
//! | `message` | LED control, joystick ingestion, stream start/stop |
//! | `error` | unknown method, unknown parameter, hardware faults |
//! | `rate` | stream start |

use roverlink_types::{ImuField, TelemetrySample};
use serde_json::{Map, Value};

/// A response document under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Response(Map<String, Value>);

impl Response {
    /// A document with `success: true`.
    pub fn ok() -> Self {
        Self::with_success(true)
    }

    /// A document with `success: false`.
    pub fn failure() -> Self {
        Self::with_success(false)
    }

    fn with_success(success: bool) -> Self {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(success));
        Self(map)
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn message(self, text: impl Into<String>) -> Self {
        self.with("message", text.into())
    }

    pub fn error(self, text: impl Into<String>) -> Self {
        self.with("error", text.into())
    }

    pub fn timestamp(self, now_ms: u64) -> Self {
        self.with("timestamp", now_ms)
    }

    /// Copy the given telemetry channels out of `sample` under their wire
    /// keys.
    pub fn telemetry(mut self, sample: &TelemetrySample, fields: &[ImuField]) -> Self {
        for field in fields {
            self.0
                .insert(field.wire_key().to_string(), Value::from(field.read_decimal(sample)));
        }
        self
    }

    /// The full telemetry document: all seven channels, `timestamp`, and
    /// `success: true`.
    pub fn full_telemetry(sample: &TelemetrySample, now_ms: u64) -> Self {
        Self::ok()
            .telemetry(sample, &ImuField::ALL)
            .timestamp(now_ms)
    }

    pub fn is_success(&self) -> bool {
        self.0.get("success").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Keys present in the document.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Serialise to compact JSON.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_and_failure_set_success() {
        assert!(Response::ok().is_success());
        assert!(!Response::failure().is_success());
    }

    #[test]
    fn full_telemetry_has_every_channel() {
        let sample = TelemetrySample {
            acc_x: 1.0,
            temperature: 21.5,
            ..TelemetrySample::default()
        };
        let doc = Response::full_telemetry(&sample, 99);
        let mut keys: Vec<&str> = doc.keys().collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "acc_x",
                "acc_y",
                "acc_z",
                "gyro_x",
                "gyro_y",
                "gyro_z",
                "success",
                "temperature",
                "timestamp"
            ]
        );
        assert_eq!(doc.get("acc_x"), Some(&json!(1.0)));
        assert_eq!(doc.get("temperature"), Some(&json!(21.5)));
        assert_eq!(doc.get("timestamp"), Some(&json!(99)));
    }

    #[test]
    fn channel_values_keep_their_short_decimal_form() {
        let sample = TelemetrySample {
            acc_x: 0.1,
            gyro_y: 0.3,
            ..TelemetrySample::default()
        };
        let json = Response::full_telemetry(&sample, 0).to_json();
        assert!(json.contains(r#""acc_x":0.1,"#), "{json}");
        assert!(json.contains(r#""gyro_y":0.3,"#), "{json}");
    }

    #[test]
    fn to_json_is_compact_object() {
        let json = Response::ok().message("LED turned ON").to_json();
        assert!(!json.contains('\n'), "frames must stay on one line");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, json!({"message": "LED turned ON", "success": true}));
    }
}
