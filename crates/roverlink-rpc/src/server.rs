//! [`RpcServer`] – TCP accept loop and streaming ticker.
//!
//! Listens on `0.0.0.0:50051` (configurable via [`RpcServer::with_port`] and
//! [`RpcServer::with_bind_address`]).  Connections are served one at a time
//! to completion; further clients wait in the listen backlog.  A client
//! that stops reading is dropped once a socket write stalls for the write
//! timeout, so it cannot hold the server or its shutdown.  The stream
//! ticker runs as its own task so pushes keep flowing at their cadence while
//! the connection loop waits for input.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use roverlink_bridge::MonotonicClock;
use roverlink_types::RoverError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::stream::StreamManager;
use crate::transport::{ChannelSink, FrameSink};

/// Default TCP port of the RPC listener.
pub const DEFAULT_PORT: u16 = 50051;

/// Default period of the streaming ticker.
pub const DEFAULT_STREAM_POLL: Duration = Duration::from_millis(5);

/// Longest accepted request line, terminator included.  Longer lines are
/// discarded and answered with a `success:false` error.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Default bound on writing one frame to a client socket.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames a connection's writer task may have queued before producers wait
/// (responses) or skip (stream frames).
const WRITER_QUEUE_DEPTH: usize = 64;

const DEFAULT_BIND_ATTEMPTS: u32 = 5;
const DEFAULT_BIND_BACKOFF: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// RpcServer
// ---------------------------------------------------------------------------

/// Line-protocol server in front of a [`Dispatcher`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use roverlink_bridge::{MonotonicClock, TelemetryBridge};
/// use roverlink_hal::SimRegistry;
/// use roverlink_rpc::{Dispatcher, Handlers, RpcServer, StreamManager};
///
/// #[tokio::main]
/// async fn main() {
///     let bridge = Arc::new(TelemetryBridge::new());
///     let streams = Arc::new(StreamManager::new(Arc::clone(&bridge)));
///     let hardware = Arc::new(SimRegistry::new().with_builtin_led().build());
///     let handlers = Handlers::new(bridge, hardware, streams, MonotonicClock::start());
///
///     let (_stop, shutdown) = tokio::sync::watch::channel(false);
///     RpcServer::new(Dispatcher::new(handlers))
///         .with_port(50051)
///         .run(shutdown)
///         .await
///         .expect("rpc server failed");
/// }
/// ```
pub struct RpcServer {
    dispatcher: Arc<Dispatcher>,
    bind_address: IpAddr,
    port: u16,
    stream_poll: Duration,
    write_timeout: Duration,
    bind_attempts: u32,
    bind_backoff: Duration,
}

impl RpcServer {
    /// Create a server on `0.0.0.0:`[`DEFAULT_PORT`].
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            stream_poll: DEFAULT_STREAM_POLL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            bind_attempts: DEFAULT_BIND_ATTEMPTS,
            bind_backoff: DEFAULT_BIND_BACKOFF,
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

    /// Override the streaming ticker period (builder-style).
    pub fn with_stream_poll(mut self, period: Duration) -> Self {
        self.stream_poll = period.max(Duration::from_millis(1));
        self
    }

    /// Override how long one frame may take to reach a client socket
    /// before the connection is dropped (builder-style).
    pub fn with_write_timeout(mut self, limit: Duration) -> Self {
        self.write_timeout = limit.max(Duration::from_millis(1));
        self
    }

    /// Override how often and how far apart binding is retried
    /// (builder-style).
    pub fn with_bind_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.bind_attempts = attempts.max(1);
        self.bind_backoff = backoff;
        self
    }

    /// Return the configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Return the configured address.
    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    /// Bind the listener, retrying with a fixed back-off.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] once every attempt has failed.
    pub async fn bind(&self) -> Result<TcpListener, RoverError> {
        let addr = SocketAddr::new(self.bind_address, self.port);
        let mut attempt = 1;
        loop {
            match TcpListener::bind(addr).await {
                Ok(listener) => return Ok(listener),
                Err(e) if attempt < self.bind_attempts => {
                    warn!(%addr, attempt, error = %e, "RPC bind failed; retrying");
                    sleep(self.bind_backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RoverError::Transport(format!(
                        "[roverlink-rpc] bind error on {addr} after {attempt} attempts: {e}"
                    )));
                }
            }
        }
    }

    /// Bind and serve until `shutdown` turns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Transport`] if the listener cannot bind.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), RoverError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Serve an already bound listener until `shutdown` turns `true`.
    ///
    /// An active stream is ended with `STREAM_END` before returning.
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        match listener.local_addr() {
            Ok(addr) => info!(%addr, "RPC server listening"),
            Err(e) => warn!(error = %e, "RPC server listening on unknown address"),
        }

        let handlers = self.dispatcher.handlers();
        let ticker = tokio::spawn(run_stream_ticker(
            Arc::clone(handlers.streams()),
            handlers.clock(),
            self.stream_poll,
            shutdown.clone(),
        ));

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        serve_connection(
                            &self.dispatcher,
                            stream,
                            peer,
                            self.write_timeout,
                            shutdown.clone(),
                        )
                        .await;
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        let handlers = self.dispatcher.handlers();
        handlers.streams().stop(handlers.clock().now_ms()).await;
        if let Err(e) = ticker.await {
            warn!(error = %e, "stream ticker task failed");
        }
        info!("RPC server stopped");
    }
}

// ---------------------------------------------------------------------------
// Per-connection handling
// ---------------------------------------------------------------------------

async fn serve_connection(
    dispatcher: &Dispatcher,
    stream: TcpStream,
    peer: SocketAddr,
    write_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(%peer, "client connected");
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "could not disable Nagle");
    }

    let (read_half, write_half) = stream.into_split();
    let (sink, queue) = ChannelSink::pair(peer.to_string(), WRITER_QUEUE_DEPTH);
    let conn: Arc<dyn FrameSink> = Arc::new(sink);
    let (close_tx, close_rx) = oneshot::channel();
    let mut writer = tokio::spawn(run_writer(write_half, queue, close_rx, peer, write_timeout));
    let mut writer_done = false;

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                let handlers = dispatcher.handlers();
                if handlers.streams().subscriber() == Some(conn.id()) {
                    handlers.streams().stop(handlers.clock().now_ms()).await;
                }
                break;
            }
            joined = &mut writer => {
                writer_done = true;
                if let Err(e) = joined {
                    warn!(%peer, error = %e, "writer task failed");
                }
                break;
            }
            read = read_request_line(&mut reader, &mut buf, MAX_LINE_BYTES) => {
                let handled = match read {
                    Ok(RequestLine::Line(line)) => dispatcher.handle_line(&conn, &line).await.map(drop),
                    Ok(RequestLine::Oversized) => {
                        dispatcher.reject_oversized(&conn, MAX_LINE_BYTES).await.map(drop)
                    }
                    Ok(RequestLine::Closed) => break,
                    Err(e) => {
                        warn!(%peer, error = %e, "read failed");
                        break;
                    }
                };
                if let Err(e) = handled {
                    warn!(%peer, error = %e, "response write failed");
                    break;
                }
            }
        }
    }

    let _ = close_tx.send(());
    if !writer_done && let Err(e) = writer.await {
        warn!(%peer, error = %e, "writer task failed");
    }
    info!(%peer, "client disconnected");
}

/// One received request line.
#[derive(Debug, PartialEq, Eq)]
enum RequestLine {
    /// Line without its terminator; invalid UTF-8 is replaced, not rejected.
    Line(String),
    /// The line ran past the cap; everything up to its newline was discarded.
    Oversized,
    /// The peer closed the connection.
    Closed,
}

/// Read one `\n`-terminated line of at most `limit` bytes, terminator
/// included.  A final line without a terminator is still returned.
async fn read_request_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<RequestLine>
where
    R: AsyncBufRead + Unpin,
{
    let cap = limit as u64;
    buf.clear();
    let n = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(RequestLine::Closed);
    }
    if n == limit && buf.last() != Some(&b'\n') {
        loop {
            buf.clear();
            let n = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
            if n == 0 || buf.last() == Some(&b'\n') {
                break;
            }
        }
        buf.clear();
        return Ok(RequestLine::Oversized);
    }

    let text = String::from_utf8_lossy(buf.as_slice());
    let text = text.strip_suffix('\n').unwrap_or(&text);
    let text = text.strip_suffix('\r').unwrap_or(text);
    Ok(RequestLine::Line(text.to_owned()))
}

/// Owns the socket's write half.  Exits on a write error, on a write that
/// does not complete within `write_timeout`, or once `close` fires and the
/// frames already queued have been flushed.  Its exit closes the queue,
/// which marks every [`ChannelSink`] of the connection as disconnected.
async fn run_writer(
    mut socket: OwnedWriteHalf,
    mut queue: mpsc::Receiver<String>,
    mut close: oneshot::Receiver<()>,
    peer: SocketAddr,
    write_timeout: Duration,
) {
    loop {
        tokio::select! {
            line = queue.recv() => {
                let Some(line) = line else { break };
                if let Err(e) = write_frame(&mut socket, &line, write_timeout).await {
                    debug!(%peer, error = %e, "socket write failed");
                    break;
                }
            }
            _ = &mut close => {
                while let Ok(line) = queue.try_recv() {
                    if write_frame(&mut socket, &line, write_timeout).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
    queue.close();
    let _ = timeout(write_timeout, socket.shutdown()).await;
}

async fn write_frame(
    socket: &mut OwnedWriteHalf,
    line: &str,
    write_timeout: Duration,
) -> std::io::Result<()> {
    let write = async {
        socket.write_all(line.as_bytes()).await?;
        socket.flush().await
    };
    timeout(write_timeout, write).await.map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::TimedOut, "peer stopped reading")
    })?
}

// ---------------------------------------------------------------------------
// Streaming ticker
// ---------------------------------------------------------------------------

async fn run_stream_ticker(
    streams: Arc<StreamManager>,
    clock: MonotonicClock,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = ticks.tick() => {
                streams.tick(clock.now_ms());
            }
        }
    }
    debug!("stream ticker stopped");
}

/// Resolves once shutdown is signalled or the signalling side is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use roverlink_bridge::TelemetryBridge;
    use roverlink_hal::SimRegistry;

    use super::*;
    use crate::handlers::Handlers;

    fn server() -> RpcServer {
        let bridge = Arc::new(TelemetryBridge::new());
        let streams = Arc::new(StreamManager::new(Arc::clone(&bridge)));
        let hardware = Arc::new(SimRegistry::new().with_builtin_led().build());
        let handlers = Handlers::new(bridge, hardware, streams, MonotonicClock::start());
        RpcServer::new(Dispatcher::new(handlers))
    }

    #[test]
    fn default_port_is_50051() {
        let server = server();
        assert_eq!(server.port(), DEFAULT_PORT);
        assert_eq!(server.bind_address(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn builders_override_defaults() {
        let server = server()
            .with_port(6000)
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_stream_poll(Duration::ZERO);
        assert_eq!(server.port(), 6000);
        assert_eq!(server.bind_address(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(server.stream_poll, Duration::from_millis(1));
    }

    #[tokio::test]
    async fn bind_gives_up_after_bounded_attempts() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = server()
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(port)
            .with_bind_retry(2, Duration::from_millis(1))
            .bind()
            .await
            .unwrap_err();
        assert!(matches!(err, RoverError::Transport(msg) if msg.contains("after 2 attempts")));
    }

    #[test]
    fn write_timeout_has_a_floor() {
        let server = server().with_write_timeout(Duration::ZERO);
        assert_eq!(server.write_timeout, Duration::from_millis(1));
        assert_eq!(self::server().write_timeout, DEFAULT_WRITE_TIMEOUT);
    }

    async fn read_all(raw: &[u8], limit: usize) -> Vec<RequestLine> {
        let mut reader = BufReader::new(raw);
        let mut buf = Vec::new();
        let mut lines = Vec::new();
        loop {
            let line = read_request_line(&mut reader, &mut buf, limit).await.unwrap();
            let closed = line == RequestLine::Closed;
            lines.push(line);
            if closed {
                return lines;
            }
        }
    }

    fn line(text: &str) -> RequestLine {
        RequestLine::Line(text.to_string())
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_fatal() {
        let lines = read_all(b"Turn\xffLed\nGetAllImuData\r\n", 64).await;
        assert_eq!(
            lines,
            [line("Turn\u{FFFD}Led"), line("GetAllImuData"), RequestLine::Closed]
        );
    }

    #[tokio::test]
    async fn oversized_line_is_discarded_up_to_its_newline() {
        let mut raw = vec![b'A'; 40];
        raw.extend_from_slice(b"\nTurnLedOn\n");
        let lines = read_all(&raw, 16).await;
        assert_eq!(lines, [RequestLine::Oversized, line("TurnLedOn"), RequestLine::Closed]);
    }

    #[tokio::test]
    async fn line_filling_the_cap_exactly_is_accepted() {
        let lines = read_all(b"TurnLedOn\n", 10).await;
        assert_eq!(lines, [line("TurnLedOn"), RequestLine::Closed]);
    }

    #[tokio::test]
    async fn unterminated_last_line_is_still_delivered() {
        let lines = read_all(b"GetAllImuData", 64).await;
        assert_eq!(lines, [line("GetAllImuData"), RequestLine::Closed]);
    }

    #[tokio::test]
    async fn shutdown_signal_resolves_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        shutdown_requested(&mut rx).await;
    }
}
