//! Generic `Indicator` trait for discrete on/off outputs (the built-in LED,
//! the status light, …).

use roverlink_types::RoverError;

/// Identifier of the board's built-in LED, driven by `TurnLedOn`/`TurnLedOff`.
pub const BUILTIN_LED: &str = "builtin_led";

/// Identifier of the status light blinked by the sampling producer.
pub const STATUS_LIGHT: &str = "status_light";

/// A discrete on/off output.
///
/// Indicators are shared between the protocol server, the HTTP mirror and the
/// sampling producer, so state changes go through `&self` and implementations
/// keep their own synchronisation.
pub trait Indicator: Send + Sync {
    /// Stable identifier for this indicator, e.g. `"builtin_led"`.
    fn id(&self) -> &str;

    /// Drive the output to `on`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the output cannot be driven.
    fn set_state(&self, on: bool) -> Result<(), RoverError>;

    /// Return the last state the output was driven to.
    fn state(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockIndicator {
        id: String,
        on: AtomicBool,
    }

    impl Indicator for MockIndicator {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_state(&self, on: bool) -> Result<(), RoverError> {
            self.on.store(on, Ordering::SeqCst);
            Ok(())
        }

        fn state(&self) -> bool {
            self.on.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn mock_indicator_toggle() {
        let led = MockIndicator {
            id: BUILTIN_LED.to_string(),
            on: AtomicBool::new(false),
        };
        assert_eq!(led.id(), "builtin_led");
        assert!(!led.state());

        led.set_state(true).unwrap();
        assert!(led.state());

        led.set_state(false).unwrap();
        assert!(!led.state());
    }
}
