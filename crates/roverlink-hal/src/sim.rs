//! In-process simulated drivers for running the stack without a rover.
//!
//! # Example
//!
//! ```rust
//! use roverlink_hal::{SimRegistry, BUILTIN_LED};
//!
//! let registry = SimRegistry::new()
//!     .with_builtin_led()
//!     .with_status_light()
//!     .build();
//!
//! registry.set_indicator(BUILTIN_LED, true).expect("sim LED must accept commands");
//! assert_eq!(registry.indicator_state(BUILTIN_LED), Some(true));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use roverlink_types::{RoverError, TelemetrySample};
use tracing::debug;

use crate::imu::ImuSensor;
use crate::indicator::{BUILTIN_LED, Indicator, STATUS_LIGHT};
use crate::registry::HardwareRegistry;

// ────────────────────────────────────────────────────────────────────────────
// Simulated indicator
// ────────────────────────────────────────────────────────────────────────────

/// A simulated on/off output that records its state.  Always succeeds.
pub struct SimIndicator {
    id: String,
    on: AtomicBool,
}

impl SimIndicator {
    /// Create a new simulated indicator, initially off.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            on: AtomicBool::new(false),
        }
    }

    /// Create a new simulated indicator ready to be registered.
    pub fn shared(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(id))
    }
}

impl Indicator for SimIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&self, on: bool) -> Result<(), RoverError> {
        self.on.store(on, Ordering::SeqCst);
        debug!(indicator = %self.id, on, "sim indicator set");
        Ok(())
    }

    fn state(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated IMU
// ────────────────────────────────────────────────────────────────────────────

/// Standard gravity, m/s².
const GRAVITY: f32 = 9.806_65;

/// Phase advance per read, radians.
const PHASE_STEP: f32 = 0.05;

/// A simulated IMU resting on a gently rocking chassis.
///
/// Each [`read`][ImuSensor::read] advances a phase counter and returns smooth
/// sinusoidal motion around 1 g on the Z axis, so consecutive samples differ
/// and streaming clients can see data move.
pub struct SimImu {
    id: String,
    step: u64,
    fixed: Option<TelemetrySample>,
}

impl SimImu {
    /// Create a simulated IMU producing synthetic motion.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step: 0,
            fixed: None,
        }
    }

    /// Create a simulated IMU that returns `sample` on every read.
    pub fn fixed(id: impl Into<String>, sample: TelemetrySample) -> Self {
        Self {
            id: id.into(),
            step: 0,
            fixed: Some(sample),
        }
    }

    fn synthesize(&self) -> TelemetrySample {
        let t = self.step as f32 * PHASE_STEP;
        TelemetrySample {
            acc_x: 0.2 * t.sin(),
            acc_y: 0.2 * t.cos(),
            acc_z: GRAVITY + 0.05 * (2.0 * t).sin(),
            gyro_x: 0.01 * (0.5 * t).cos(),
            gyro_y: -0.01 * (0.5 * t).sin(),
            gyro_z: 0.002 * t.sin(),
            temperature: 25.0 + 0.5 * (t / 50.0).sin(),
        }
    }
}

impl ImuSensor for SimImu {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&mut self) -> Result<TelemetrySample, RoverError> {
        let sample = self.fixed.unwrap_or_else(|| self.synthesize());
        self.step = self.step.wrapping_add(1);
        Ok(sample)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRegistry builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that constructs a [`HardwareRegistry`] pre-populated with
/// simulated indicators.
#[derive(Default)]
pub struct SimRegistry {
    indicators: Vec<Arc<dyn Indicator>>,
}

impl SimRegistry {
    /// Create an empty [`SimRegistry`] builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simulated [`BUILTIN_LED`].
    pub fn with_builtin_led(self) -> Self {
        self.with_indicator(SimIndicator::shared(BUILTIN_LED))
    }

    /// Register a simulated [`STATUS_LIGHT`].
    pub fn with_status_light(self) -> Self {
        self.with_indicator(SimIndicator::shared(STATUS_LIGHT))
    }

    /// Register a custom indicator driver, e.g. one a test wants to assert on
    /// or one that injects faults.
    pub fn with_indicator(mut self, indicator: Arc<dyn Indicator>) -> Self {
        self.indicators.push(indicator);
        self
    }

    /// Consume the builder and return a fully configured [`HardwareRegistry`].
    pub fn build(self) -> HardwareRegistry {
        let mut registry = HardwareRegistry::new();
        for indicator in self.indicators {
            registry.register_indicator(indicator);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_imu_rests_near_one_g() {
        let mut imu = SimImu::new("sim_imu");
        for _ in 0..100 {
            let sample = imu.read().unwrap();
            assert!((sample.acc_z - GRAVITY).abs() < 0.1);
            assert!(sample.temperature > 24.0 && sample.temperature < 26.0);
        }
    }

    #[test]
    fn sim_imu_samples_change_between_reads() {
        let mut imu = SimImu::new("sim_imu");
        let first = imu.read().unwrap();
        let second = imu.read().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn fixed_sim_imu_repeats_sample() {
        let sample = TelemetrySample {
            acc_x: 1.5,
            ..TelemetrySample::default()
        };
        let mut imu = SimImu::fixed("fixed", sample);
        assert_eq!(imu.read().unwrap(), sample);
        assert_eq!(imu.read().unwrap(), sample);
        assert_eq!(imu.id(), "fixed");
    }

    #[test]
    fn sim_registry_builds_both_lights() {
        let registry = SimRegistry::new().with_builtin_led().with_status_light().build();
        assert_eq!(registry.indicator_state(BUILTIN_LED), Some(false));
        assert_eq!(registry.indicator_state(STATUS_LIGHT), Some(false));
        assert!(registry.indicator("ghost").is_none());
    }
}
