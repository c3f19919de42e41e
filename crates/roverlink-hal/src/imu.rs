//! `ImuSensor` trait for the 6-DOF accelerometer/gyroscope.

use roverlink_types::{RoverError, TelemetrySample};

/// A motion sensor that can be polled for a complete [`TelemetrySample`].
///
/// Only the sampling producer owns the sensor, hence `&mut self`.
pub trait ImuSensor: Send {
    /// Stable identifier for this sensor, e.g. `"lsm6dsox"`.
    fn id(&self) -> &str;

    /// Read acceleration, angular rate and temperature in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] when the bus transaction fails.
    fn read(&mut self) -> Result<TelemetrySample, RoverError>;
}
