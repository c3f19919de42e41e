//! [`Rover`] – wires the bridge, hardware, sampler and both servers.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use roverlink_bridge::{MonotonicClock, TelemetryBridge};
use roverlink_hal::{HardwareRegistry, ImuSensor};
use roverlink_mirror::{MirrorServer, MirrorState};
use roverlink_rpc::{DEFAULT_RATE_HZ, Dispatcher, Handlers, RpcServer, StreamManager};
use roverlink_types::RoverError;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::sampler::{DEFAULT_SAMPLE_PERIOD, Sampler};

/// Runtime knobs, usually filled from the CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoverSettings {
    pub bind_address: IpAddr,
    pub rpc_port: u16,
    pub http_port: u16,
    pub http_mirror: bool,
    pub sample_period: Duration,
    pub stream_poll: Duration,
    pub default_stream_rate_hz: u32,
}

impl Default for RoverSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rpc_port: roverlink_rpc::DEFAULT_PORT,
            http_port: roverlink_mirror::DEFAULT_PORT,
            http_mirror: true,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            stream_poll: roverlink_rpc::server::DEFAULT_STREAM_POLL,
            default_stream_rate_hz: DEFAULT_RATE_HZ,
        }
    }
}

/// The assembled rover.
///
/// # Example
///
/// ```rust,no_run
/// use roverlink_hal::{SimImu, SimRegistry};
/// use roverlink_runtime::{Rover, RoverSettings};
///
/// #[tokio::main]
/// async fn main() {
///     let hardware = SimRegistry::new().with_builtin_led().with_status_light().build();
///     let (_stop, shutdown) = tokio::sync::watch::channel(false);
///     Rover::new(hardware, RoverSettings::default())
///         .run(Box::new(SimImu::new("sim-imu")), shutdown)
///         .await
///         .expect("rover failed");
/// }
/// ```
pub struct Rover {
    bridge: Arc<TelemetryBridge>,
    hardware: Arc<HardwareRegistry>,
    streams: Arc<StreamManager>,
    clock: MonotonicClock,
    settings: RoverSettings,
}

impl Rover {
    pub fn new(hardware: HardwareRegistry, settings: RoverSettings) -> Self {
        let bridge = Arc::new(TelemetryBridge::new());
        let streams = Arc::new(StreamManager::new(Arc::clone(&bridge)));
        Self {
            bridge,
            hardware: Arc::new(hardware),
            streams,
            clock: MonotonicClock::start(),
            settings,
        }
    }

    pub fn bridge(&self) -> &Arc<TelemetryBridge> {
        &self.bridge
    }

    pub fn hardware(&self) -> &Arc<HardwareRegistry> {
        &self.hardware
    }

    pub fn streams(&self) -> &Arc<StreamManager> {
        &self.streams
    }

    pub fn settings(&self) -> &RoverSettings {
        &self.settings
    }

    /// Bind both listeners, then run until `shutdown` turns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] when a listener cannot bind.
    /// Nothing is started in that case.
    pub async fn run(
        self,
        sensor: Box<dyn ImuSensor>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), RoverError> {
        let rpc_listener = self.rpc_server().bind().await?;
        let mirror_listener = if self.settings.http_mirror {
            Some(self.mirror_server().bind().await?)
        } else {
            None
        };
        self.serve(sensor, rpc_listener, mirror_listener, shutdown).await;
        Ok(())
    }

    /// Run on already bound listeners until `shutdown` turns `true`.
    pub async fn serve(
        self,
        sensor: Box<dyn ImuSensor>,
        rpc_listener: TcpListener,
        mirror_listener: Option<TcpListener>,
        shutdown: watch::Receiver<bool>,
    ) {
        let sampler = Sampler::new(sensor, Arc::clone(&self.bridge), Arc::clone(&self.hardware))
            .with_period(self.settings.sample_period);

        let mut tasks: Vec<(&str, JoinHandle<()>)> = vec![
            ("sampler", tokio::spawn(sampler.run(shutdown.clone()))),
            (
                "rpc",
                tokio::spawn(self.rpc_server().serve(rpc_listener, shutdown.clone())),
            ),
        ];
        match mirror_listener {
            Some(listener) => tasks.push((
                "mirror",
                tokio::spawn(self.mirror_server().serve(listener, shutdown.clone())),
            )),
            None => info!("HTTP mirror disabled"),
        }

        for (name, task) in tasks {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "rover task failed");
            }
        }
        info!("rover stopped");
    }

    fn rpc_server(&self) -> RpcServer {
        let handlers = Handlers::new(
            Arc::clone(&self.bridge),
            Arc::clone(&self.hardware),
            Arc::clone(&self.streams),
            self.clock,
        )
        .with_default_rate(self.settings.default_stream_rate_hz);
        RpcServer::new(Dispatcher::new(handlers))
            .with_bind_address(self.settings.bind_address)
            .with_port(self.settings.rpc_port)
            .with_stream_poll(self.settings.stream_poll)
    }

    fn mirror_server(&self) -> MirrorServer {
        MirrorServer::new(MirrorState::new(
            Arc::clone(&self.bridge),
            Arc::clone(&self.hardware),
        ))
        .with_bind_address(self.settings.bind_address)
        .with_port(self.settings.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_server_defaults() {
        let settings = RoverSettings::default();
        assert_eq!(settings.rpc_port, 50051);
        assert_eq!(settings.http_port, 8080);
        assert!(settings.http_mirror);
        assert_eq!(settings.sample_period, Duration::from_millis(20));
        assert_eq!(settings.stream_poll, Duration::from_millis(5));
        assert_eq!(settings.default_stream_rate_hz, 10);
    }
}
