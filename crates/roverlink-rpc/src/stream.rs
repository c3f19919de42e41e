//! [`StreamManager`] – the single push-streaming session.
//!
//! ```text
//!            start()                     tick(): subscriber gone / write failed
//!   Idle ─────────────▶ Active ─────────────────────────────────────▶ Idle
//!     ▲                  │  ▲ │
//!     │   stop()         │  │ │ tick(): due → STREAM frame
//!     └── STREAM_END ◀───┘  └─┘
//! ```
//!
//! At most one session exists.  `start` while Active silently displaces the
//! previous subscriber.  A session whose connection closed is only noticed
//! on the next tick; no frame is sent to it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use roverlink_bridge::TelemetryBridge;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::encode_stream;
use crate::response::Response;
use crate::transport::FrameSink;

/// Stream rate used when the client does not ask for one.
pub const DEFAULT_RATE_HZ: u32 = 10;

/// Highest accepted stream rate; one frame per millisecond.
pub const MAX_RATE_HZ: u32 = 1000;

/// How long [`StreamManager::stop`] waits for queue space for the
/// `STREAM_END` frame before giving up on a subscriber that stopped reading.
pub const STREAM_END_TIMEOUT: Duration = Duration::from_millis(500);

/// State of the active session.
struct StreamSession {
    sink: Arc<dyn FrameSink>,
    rate_hz: u32,
    last_frame_ms: u64,
}

impl StreamSession {
    fn interval_ms(&self) -> u64 {
        u64::from(1000 / self.rate_hz.clamp(1, MAX_RATE_HZ))
    }
}

/// What a single [`StreamManager::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session.
    Idle,
    /// Session active, interval not yet elapsed.
    NotDue,
    /// A `STREAM` frame was queued.
    FrameSent,
    /// The subscriber's queue was full; this frame was skipped.
    FrameDropped,
    /// The subscriber was gone; the session was dropped.
    Disconnected,
}

/// Owner of the at-most-one streaming session.
pub struct StreamManager {
    bridge: Arc<TelemetryBridge>,
    session: Mutex<Option<StreamSession>>,
}

impl StreamManager {
    pub fn new(bridge: Arc<TelemetryBridge>) -> Self {
        Self {
            bridge,
            session: Mutex::new(None),
        }
    }

    /// Bind a new session to `sink`, replacing any existing one.
    ///
    /// The first frame is due one interval after `now_ms`.  Returns the
    /// connection id of the displaced subscriber, if there was one.
    pub fn start(&self, sink: Arc<dyn FrameSink>, rate_hz: u32, now_ms: u64) -> Option<Uuid> {
        let rate_hz = rate_hz.clamp(1, MAX_RATE_HZ);
        let connection = sink.id();
        let peer = sink.peer().to_string();
        let previous = self.lock().replace(StreamSession {
            sink,
            rate_hz,
            last_frame_ms: now_ms,
        });

        let displaced = previous.map(|s| s.sink.id());
        if let Some(old) = displaced {
            info!(%old, new = %connection, "previous stream subscriber displaced");
        }
        info!(peer = %peer, rate_hz, "IMU streaming started");
        displaced
    }

    /// `true` while a session exists.
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// Rate of the active session.
    pub fn active_rate(&self) -> Option<u32> {
        self.lock().as_ref().map(|s| s.rate_hz)
    }

    /// Connection id of the active subscriber.
    pub fn subscriber(&self) -> Option<Uuid> {
        self.lock().as_ref().map(|s| s.sink.id())
    }

    /// Advance the session at time `now_ms`.
    ///
    /// Never waits on the network: frames are offered to the subscriber's
    /// queue and skipped when it is full.  The offer happens under the
    /// session lock so no frame can follow a concurrent `stop`.
    pub fn tick(&self, now_ms: u64) -> TickOutcome {
        let mut slot = self.lock();
        let Some(session) = slot.as_mut() else {
            return TickOutcome::Idle;
        };
        if !session.sink.is_connected() {
            info!(peer = %session.sink.peer(), "streaming client disconnected");
            *slot = None;
            return TickOutcome::Disconnected;
        }
        if now_ms.saturating_sub(session.last_frame_ms) < session.interval_ms() {
            return TickOutcome::NotDue;
        }
        session.last_frame_ms = now_ms;

        let frame = encode_stream(&Response::full_telemetry(&self.bridge.snapshot(), now_ms), false);
        match session.sink.offer_line(frame) {
            Ok(true) => TickOutcome::FrameSent,
            Ok(false) => {
                debug!(peer = %session.sink.peer(), "stream queue full; frame skipped");
                TickOutcome::FrameDropped
            }
            Err(e) => {
                warn!(peer = %session.sink.peer(), error = %e, "stream write failed; ending session");
                *slot = None;
                TickOutcome::Disconnected
            }
        }
    }

    /// End the active session with a `STREAM_END` frame carrying a final
    /// telemetry document.
    ///
    /// Returns `false` when there was no session.  A subscriber that is
    /// already gone, or whose queue stays full for [`STREAM_END_TIMEOUT`],
    /// still counts as stopped.
    pub async fn stop(&self, now_ms: u64) -> bool {
        let Some(session) = self.lock().take() else {
            return false;
        };

        let frame = encode_stream(&Response::full_telemetry(&self.bridge.snapshot(), now_ms), true);
        match timeout(STREAM_END_TIMEOUT, session.sink.write_line(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(peer = %session.sink.peer(), error = %e, "STREAM_END not delivered");
            }
            Err(_) => {
                warn!(peer = %session.sink.peer(), "subscriber not draining; STREAM_END dropped");
            }
        }
        info!(peer = %session.sink.peer(), "IMU streaming stopped");
        true
    }

    fn lock(&self) -> MutexGuard<'_, Option<StreamSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
