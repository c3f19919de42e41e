//! The write side of a client connection.
//!
//! Each accepted connection gets a writer task that owns the socket's write
//! half.  Everything else (request handlers, the stream ticker) writes by
//! queueing lines on that task's channel through a [`FrameSink`], so no lock
//! is ever held across a socket write.
//!
//! A connection counts as connected while its writer task is alive; once
//! the task exits (peer gone, write error, server closed the connection)
//! the channel closes and [`FrameSink::is_connected`] turns `false`.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::error::RpcError;

/// Outgoing-frame capability of one client connection.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Identity of the connection, stable for its whole lifetime.
    fn id(&self) -> Uuid;

    /// Human-readable peer description for logs.
    fn peer(&self) -> &str;

    /// `false` once the connection can no longer carry frames.
    fn is_connected(&self) -> bool;

    /// Queue an encoded frame, waiting for queue space.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] when the connection is gone.
    async fn write_line(&self, line: String) -> Result<(), RpcError>;

    /// Queue an encoded frame without waiting.  Returns `Ok(false)` when the
    /// queue is full and the frame was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] when the connection is gone.
    fn offer_line(&self, line: String) -> Result<bool, RpcError>;
}

/// [`FrameSink`] backed by the bounded channel of a connection writer task.
pub struct ChannelSink {
    id: Uuid,
    peer: String,
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    /// Wrap the sending half of a writer task's queue.
    pub fn new(peer: impl Into<String>, tx: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: peer.into(),
            tx,
        }
    }

    /// Create a sink together with the receiving end of its queue.
    ///
    /// Dropping the receiver makes the sink report a closed connection,
    /// which is how the server and tests model a disconnect.
    pub fn pair(peer: impl Into<String>, depth: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self::new(peer, tx), rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    fn id(&self) -> Uuid {
        self.id
    }

    fn peer(&self) -> &str {
        &self.peer
    }

    fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn write_line(&self, line: String) -> Result<(), RpcError> {
        self.tx
            .send(line)
            .await
            .map_err(|_| RpcError::ConnectionClosed)
    }

    fn offer_line(&self, line: String) -> Result<bool, RpcError> {
        match self.tx.try_send(line) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Closed(_)) => Err(RpcError::ConnectionClosed),
        }
    }
}
