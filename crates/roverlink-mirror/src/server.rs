//! [`MirrorServer`] – binds the mirror's [`router`] to a TCP listener.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`MirrorServer::with_port`]).
//! Shutdown is graceful: the listener stops accepting and in-flight
//! requests are answered before [`MirrorServer::serve`] returns.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use roverlink_types::RoverError;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::routes::{MirrorState, router};

/// Default TCP port for the HTTP mirror.
pub const DEFAULT_PORT: u16 = 8080;

// ---------------------------------------------------------------------------
// MirrorServer
// ---------------------------------------------------------------------------

/// HTTP mirror of the rover's telemetry and LED.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use roverlink_bridge::TelemetryBridge;
/// use roverlink_hal::SimRegistry;
/// use roverlink_mirror::{MirrorServer, MirrorState};
///
/// #[tokio::main]
/// async fn main() {
///     let state = MirrorState::new(
///         Arc::new(TelemetryBridge::new()),
///         Arc::new(SimRegistry::new().with_builtin_led().build()),
///     );
///     let (_stop, shutdown) = tokio::sync::watch::channel(false);
///     MirrorServer::new(state)
///         .run(shutdown)
///         .await
///         .expect("mirror server failed");
/// }
/// ```
pub struct MirrorServer {
    state: MirrorState,
    bind_address: IpAddr,
    port: u16,
}

impl MirrorServer {
    /// Create a server for `state` on the [`DEFAULT_PORT`].
    pub fn new(state: MirrorState) -> Self {
        Self {
            state,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the listening address (builder-style).
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind and serve until `shutdown` turns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] if the TCP listener cannot bind.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), RoverError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Bind the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] if the TCP listener cannot bind.
    pub async fn bind(&self) -> Result<TcpListener, RoverError> {
        let addr = SocketAddr::new(self.bind_address, self.port);
        TcpListener::bind(addr).await.map_err(|e| {
            RoverError::Transport(format!("[roverlink-mirror] bind error on {addr}: {e}"))
        })
    }

    /// Serve an already bound listener until `shutdown` turns `true`.
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            info!("HTTP mirror listening on http://{addr}");
        }

        let stopped = async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        };
        if let Err(e) = axum::serve(listener, router(self.state))
            .with_graceful_shutdown(stopped)
            .await
        {
            warn!(error = %e, "HTTP mirror failed");
        }
        info!("HTTP mirror stopped");
    }
}
