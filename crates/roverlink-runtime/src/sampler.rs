//! [`Sampler`] – the telemetry producer.
//!
//! Reads the IMU on a fixed period and publishes each sample into the
//! [`TelemetryBridge`].  Every `blink_every` successful samples the status
//! light is toggled so an operator can see sampling is alive.  A failed read
//! is logged and skipped; consumers keep seeing the previous sample.

use std::sync::Arc;
use std::time::Duration;

use roverlink_bridge::TelemetryBridge;
use roverlink_hal::{HardwareRegistry, ImuSensor, STATUS_LIGHT};
use roverlink_types::RoverError;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

/// Default sampling period.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(20);

/// Default number of samples between status-light toggles.
pub const DEFAULT_BLINK_EVERY: u32 = 5;

pub struct Sampler {
    sensor: Box<dyn ImuSensor>,
    bridge: Arc<TelemetryBridge>,
    hardware: Arc<HardwareRegistry>,
    period: Duration,
    blink_every: u32,
    taken: u64,
    failures: u64,
}

impl Sampler {
    pub fn new(
        sensor: Box<dyn ImuSensor>,
        bridge: Arc<TelemetryBridge>,
        hardware: Arc<HardwareRegistry>,
    ) -> Self {
        Self {
            sensor,
            bridge,
            hardware,
            period: DEFAULT_SAMPLE_PERIOD,
            blink_every: DEFAULT_BLINK_EVERY,
            taken: 0,
            failures: 0,
        }
    }

    /// Override the sampling period (builder-style).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    /// Override how many samples pass between status toggles; `0` disables
    /// blinking (builder-style).
    pub fn with_blink_every(mut self, samples: u32) -> Self {
        self.blink_every = samples;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Successful samples so far.
    pub fn samples_taken(&self) -> u64 {
        self.taken
    }

    /// Failed reads so far.
    pub fn read_failures(&self) -> u64 {
        self.failures
    }

    /// Take and publish one sample.
    ///
    /// # Errors
    ///
    /// Returns the sensor's error; nothing is published in that case.
    pub fn sample_once(&mut self) -> Result<(), RoverError> {
        let sample = match self.sensor.read() {
            Ok(sample) => sample,
            Err(e) => {
                self.failures += 1;
                return Err(e);
            }
        };
        self.bridge.publish_sample(sample);
        self.taken += 1;
        trace!(sensor = self.sensor.id(), n = self.taken, "sample published");

        if self.blink_every > 0 && self.taken % u64::from(self.blink_every) == 0 {
            self.toggle_status();
        }
        Ok(())
    }

    /// Sample until `shutdown` turns `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            sensor = self.sensor.id(),
            period_ms = self.period.as_millis() as u64,
            "IMU sampling started"
        );
        let mut ticks = interval(self.period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                _ = ticks.tick() => {
                    if let Err(e) = self.sample_once() {
                        warn!(sensor = self.sensor.id(), error = %e, "IMU read failed; keeping previous sample");
                    }
                }
            }
        }

        if self.hardware.indicator_state(STATUS_LIGHT) == Some(true)
            && let Err(e) = self.hardware.set_indicator(STATUS_LIGHT, false)
        {
            debug!(error = %e, "could not switch status light off");
        }
        info!(taken = self.taken, failures = self.failures, "IMU sampling stopped");
    }

    fn toggle_status(&self) {
        let Some(lit) = self.hardware.indicator_state(STATUS_LIGHT) else {
            return;
        };
        if let Err(e) = self.hardware.set_indicator(STATUS_LIGHT, !lit) {
            debug!(error = %e, "status light toggle failed");
        }
    }
}
