//! Single-slot telemetry handoff.
//!
//! The sampling producer overwrites the slot on every period; readers always
//! get the newest complete sample.  There is no queue and no backpressure:
//! a sample that nobody read before the next one arrived is simply lost.
//!
//! A freshness flag records whether a sample has been published since the
//! last [`TelemetryBridge::latest_sample`] call.  Request handlers that just
//! want "the current value" use [`TelemetryBridge::snapshot`], which leaves
//! the flag alone.

use std::sync::{Mutex, MutexGuard, PoisonError};

use roverlink_types::{ControlCommand, TelemetrySample};
use tracing::trace;

#[derive(Default)]
struct SampleSlot {
    sample: TelemetrySample,
    fresh: bool,
    published: u64,
}

/// Shared state object handed by [`Arc`][std::sync::Arc] to the producer,
/// the RPC server and the HTTP mirror.
///
/// Both slots are replaced as whole values under their own mutex, so a
/// reader can never observe fields from two different updates.  Locks are
/// held only for the copy in or out.
#[derive(Default)]
pub struct TelemetryBridge {
    sample: Mutex<SampleSlot>,
    command: Mutex<ControlCommand>,
}

impl TelemetryBridge {
    /// Create a bridge holding an all-zero sample and a neutral command.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Telemetry slot
    // -----------------------------------------------------------------------

    /// Replace the current sample and mark it fresh.
    pub fn publish_sample(&self, sample: TelemetrySample) {
        let mut slot = lock(&self.sample);
        slot.sample = sample;
        slot.fresh = true;
        slot.published = slot.published.wrapping_add(1);
        trace!(published = slot.published, "sample published");
    }

    /// Return the current sample and whether it is new since the previous
    /// call, clearing the freshness flag.
    pub fn latest_sample(&self) -> (TelemetrySample, bool) {
        let mut slot = lock(&self.sample);
        let fresh = std::mem::replace(&mut slot.fresh, false);
        (slot.sample, fresh)
    }

    /// Return the current sample without consuming freshness.
    pub fn snapshot(&self) -> TelemetrySample {
        lock(&self.sample).sample
    }

    /// Total number of samples published since construction.
    pub fn samples_published(&self) -> u64 {
        lock(&self.sample).published
    }

    // -----------------------------------------------------------------------
    // Command slot
    // -----------------------------------------------------------------------

    /// Replace the stored operator command.
    pub fn replace_command(&self, command: ControlCommand) {
        *lock(&self.command) = command;
    }

    /// Return the most recently stored operator command.
    pub fn latest_command(&self) -> ControlCommand {
        *lock(&self.command)
    }
}

/// Slots hold plain `Copy` values assigned in one statement, so a panic in
/// another holder cannot leave them half-written; recover from poisoning.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn uniform(v: f32) -> TelemetrySample {
        TelemetrySample {
            acc_x: v,
            acc_y: v,
            acc_z: v,
            gyro_x: v,
            gyro_y: v,
            gyro_z: v,
            temperature: v,
        }
    }

    #[test]
    fn starts_zeroed_and_stale() {
        let bridge = TelemetryBridge::new();
        let (sample, fresh) = bridge.latest_sample();
        assert_eq!(sample, TelemetrySample::default());
        assert!(!fresh);
        assert_eq!(bridge.latest_command(), ControlCommand::default());
    }

    #[test]
    fn latest_sample_consumes_freshness() {
        let bridge = TelemetryBridge::new();
        bridge.publish_sample(uniform(1.0));

        let (sample, fresh) = bridge.latest_sample();
        assert_eq!(sample, uniform(1.0));
        assert!(fresh);

        let (sample, fresh) = bridge.latest_sample();
        assert_eq!(sample, uniform(1.0));
        assert!(!fresh, "second read without a publish must be stale");
    }

    #[test]
    fn snapshot_does_not_consume_freshness() {
        let bridge = TelemetryBridge::new();
        bridge.publish_sample(uniform(2.0));
        assert_eq!(bridge.snapshot(), uniform(2.0));
        assert!(bridge.latest_sample().1);
    }

    #[test]
    fn newest_sample_wins() {
        let bridge = TelemetryBridge::new();
        bridge.publish_sample(uniform(1.0));
        bridge.publish_sample(uniform(2.0));
        bridge.publish_sample(uniform(3.0));
        assert_eq!(bridge.snapshot(), uniform(3.0));
        assert_eq!(bridge.samples_published(), 3);
    }

    #[test]
    fn command_slot_replaces_whole_value() {
        let bridge = TelemetryBridge::new();
        let cmd = ControlCommand {
            left_x: 10,
            right_button: true,
            timestamp: 42,
            ..ControlCommand::default()
        };
        bridge.replace_command(cmd);
        assert_eq!(bridge.latest_command(), cmd);
    }

    #[test]
    fn readers_never_see_torn_samples() {
        let bridge = Arc::new(TelemetryBridge::new());
        let writer = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                for i in 0..5_000 {
                    bridge.publish_sample(uniform(i as f32));
                }
            })
        };

        for _ in 0..5_000 {
            let s = bridge.snapshot();
            let fields = [s.acc_y, s.acc_z, s.gyro_x, s.gyro_y, s.gyro_z, s.temperature];
            assert!(fields.iter().all(|f| *f == s.acc_x), "torn sample: {s:?}");
        }
        writer.join().unwrap();
    }
}
