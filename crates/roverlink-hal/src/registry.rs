//! [`HardwareRegistry`] – resolves indicator drivers by identifier.
//!
//! Request handlers and the HTTP mirror address outputs by name
//! ([`BUILTIN_LED`][crate::BUILTIN_LED], [`STATUS_LIGHT`][crate::STATUS_LIGHT])
//! so a board with different wiring only needs a different registry.

use std::collections::HashMap;
use std::sync::Arc;

use roverlink_types::RoverError;
use tracing::debug;

use crate::indicator::Indicator;

/// Central indicator registry.
///
/// Cheap to share: drivers are stored behind [`Arc`] and the registry itself
/// is usually wrapped in one as well.
#[derive(Default)]
pub struct HardwareRegistry {
    indicators: HashMap<String, Arc<dyn Indicator>>,
}

impl HardwareRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an indicator driver.  Any previously registered driver with
    /// the same `id` is replaced.
    pub fn register_indicator(&mut self, indicator: Arc<dyn Indicator>) {
        self.indicators.insert(indicator.id().to_string(), indicator);
    }

    /// Look up an indicator by identifier.
    pub fn indicator(&self, id: &str) -> Option<Arc<dyn Indicator>> {
        self.indicators.get(id).cloned()
    }

    /// Drive indicator `id` to `on`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] when `id` is not registered or
    /// the driver rejects the command.
    pub fn set_indicator(&self, id: &str, on: bool) -> Result<(), RoverError> {
        let indicator = self
            .indicators
            .get(id)
            .ok_or_else(|| RoverError::hardware(id, format!("indicator '{id}' is not registered")))?;
        indicator.set_state(on)?;
        debug!(indicator = id, on, "indicator driven");
        Ok(())
    }

    /// Return the last state of indicator `id`, or `None` when unregistered.
    pub fn indicator_state(&self, id: &str) -> Option<bool> {
        self.indicators.get(id).map(|i| i.state())
    }
}
