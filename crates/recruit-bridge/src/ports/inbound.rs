//! Inbound port: the reply queue as seen by the dispatcher.

use async_trait::async_trait;
use bytes::Bytes;

/// Yields raw reply bodies from this service's reply queue.
///
/// `None` means the queue is closed and drained; the dispatcher stops.
#[async_trait]
pub trait ReplySource: Send {
    async fn next_frame(&mut self) -> Option<Bytes>;
}

/// Plain channel of bodies, used by tests and loopback wiring.
#[async_trait]
impl ReplySource for tokio::sync::mpsc::Receiver<Bytes> {
    async fn next_frame(&mut self) -> Option<Bytes> {
        self.recv().await
    }
}
