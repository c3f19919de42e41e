use std::time::{Duration, Instant};

/// Monotonic millisecond clock anchored at construction time.
///
/// `Copy`, so every component can hold its own handle; all handles cloned
/// from the same origin agree on "now".
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock at zero.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since [`start`][Self::start].
    pub fn now_ms(&self) -> u64 {
        duration_ms(self.origin.elapsed())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
