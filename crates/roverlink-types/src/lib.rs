use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One reading of the 6-DOF IMU plus its die temperature.
///
/// Field names double as the JSON keys used on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Linear acceleration, m/s².
    pub acc_x: f32,
    pub acc_y: f32,
    pub acc_z: f32,
    /// Angular rate, rad/s.
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    /// Sensor temperature, °C.
    pub temperature: f32,
}

/// One scalar channel of a [`TelemetrySample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImuField {
    AccX,
    AccY,
    AccZ,
    GyroX,
    GyroY,
    GyroZ,
    Temperature,
}

impl ImuField {
    /// Every channel, in wire order.
    pub const ALL: [ImuField; 7] = [
        ImuField::AccX,
        ImuField::AccY,
        ImuField::AccZ,
        ImuField::GyroX,
        ImuField::GyroY,
        ImuField::GyroZ,
        ImuField::Temperature,
    ];

    /// JSON key used by the RPC protocol (`acc_x`, …).
    pub fn wire_key(self) -> &'static str {
        match self {
            ImuField::AccX => "acc_x",
            ImuField::AccY => "acc_y",
            ImuField::AccZ => "acc_z",
            ImuField::GyroX => "gyro_x",
            ImuField::GyroY => "gyro_y",
            ImuField::GyroZ => "gyro_z",
            ImuField::Temperature => "temperature",
        }
    }

    /// JSON key used by the HTTP mirror (`accX`, …).
    pub fn mirror_key(self) -> &'static str {
        match self {
            ImuField::AccX => "accX",
            ImuField::AccY => "accY",
            ImuField::AccZ => "accZ",
            ImuField::GyroX => "gyroX",
            ImuField::GyroY => "gyroY",
            ImuField::GyroZ => "gyroZ",
            ImuField::Temperature => "temperature",
        }
    }

    /// Read this channel out of `sample`.
    pub fn read(self, sample: &TelemetrySample) -> f32 {
        match self {
            ImuField::AccX => sample.acc_x,
            ImuField::AccY => sample.acc_y,
            ImuField::AccZ => sample.acc_z,
            ImuField::GyroX => sample.gyro_x,
            ImuField::GyroY => sample.gyro_y,
            ImuField::GyroZ => sample.gyro_z,
            ImuField::Temperature => sample.temperature,
        }
    }

    /// Read this channel widened to `f64` through its shortest `f32`
    /// decimal form, so `0.1` stays `0.1` once serialised.
    pub fn read_decimal(self, sample: &TelemetrySample) -> f64 {
        let value = self.read(sample);
        value
            .to_string()
            .parse()
            .unwrap_or_else(|_| f64::from(value))
    }
}

/// A client-facing selection of telemetry channels, as named by the
/// `GetSpecificImuData` parameter and the mirror's `?parameter=` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImuSelector {
    Acc,
    Gyro,
    Single(ImuField),
}

const SELECTOR_TABLE: [(&str, ImuSelector); 9] = [
    ("acc", ImuSelector::Acc),
    ("gyro", ImuSelector::Gyro),
    ("accx", ImuSelector::Single(ImuField::AccX)),
    ("accy", ImuSelector::Single(ImuField::AccY)),
    ("accz", ImuSelector::Single(ImuField::AccZ)),
    ("gyrox", ImuSelector::Single(ImuField::GyroX)),
    ("gyroy", ImuSelector::Single(ImuField::GyroY)),
    ("gyroz", ImuSelector::Single(ImuField::GyroZ)),
    ("temperature", ImuSelector::Single(ImuField::Temperature)),
];

impl ImuSelector {
    /// Resolve a selector key (exact, case-sensitive).  `None` for unknown
    /// keys.
    pub fn parse(key: &str) -> Option<Self> {
        SELECTOR_TABLE
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, selector)| *selector)
    }

    /// The channels this selector covers.
    pub fn fields(self) -> &'static [ImuField] {
        match self {
            ImuSelector::Acc => &FIELDS[0..3],
            ImuSelector::Gyro => &FIELDS[3..6],
            ImuSelector::Single(field) => std::slice::from_ref(&FIELDS[field as usize]),
        }
    }
}

static FIELDS: [ImuField; 7] = ImuField::ALL;

/// Latest control input received from the operator's twin-stick controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub left_x: i32,
    pub left_y: i32,
    pub right_x: i32,
    pub right_y: i32,
    pub left_button: bool,
    pub right_button: bool,
    /// Monotonic milliseconds at which the command was accepted.
    pub timestamp: u64,
}

/// Global error type spanning hardware faults, transport failures, and
/// configuration problems.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl RoverError {
    /// Shorthand for a [`RoverError::HardwareFault`] raised by `component`.
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        Self::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}
