//! Duplex byte channels between the transport and the session layer.
//!
//! Two unbounded FIFO queues of [`BufferCell`]s, one per direction, each
//! used single-producer/single-consumer. The channels belong to the
//! transport's whole lifecycle, not to any one socket: reconnects reuse
//! them, and only full shutdown completes the writers.
//!
//! The queues are unbounded by construction; if a peer stalls, memory
//! growth is the session layer's signal to slow down.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::buffer::BufferCell;

/// Error returned when writing to a completed channel.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The receiving side is gone; the transport has fully shut down.
    #[error("byte channel closed")]
    Closed,
}

/// Sending half of a byte channel.
#[derive(Clone, Debug)]
pub struct ByteSender {
    tx: mpsc::UnboundedSender<BufferCell>,
}

impl ByteSender {
    /// Enqueue a cell without blocking, transferring its ownership.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after full shutdown. The rejected
    /// cell is released.
    pub fn write(&self, cell: BufferCell) -> Result<(), ChannelError> {
        self.tx.send(cell).map_err(|_| ChannelError::Closed)
    }

    /// Complete the writer: pending reads drain the remainder, then
    /// observe closure.
    pub fn complete(self) { drop(self.tx); }
}

/// Receiving half of a byte channel.
#[derive(Debug)]
pub struct ByteReceiver {
    rx: mpsc::UnboundedReceiver<BufferCell>,
}

impl ByteReceiver {
    /// Dequeue the next cell, waiting if the channel is empty.
    ///
    /// Returns `None` once the writer has completed and the queue has
    /// drained.
    pub async fn read(&mut self) -> Option<BufferCell> { self.rx.recv().await }

    /// Dequeue without waiting; `None` means empty or closed.
    pub fn try_read(&mut self) -> Option<BufferCell> { self.rx.try_recv().ok() }
}

/// Create one direction of the duplex pair.
#[must_use]
pub fn byte_channel() -> (ByteSender, ByteReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ByteSender { tx }, ByteReceiver { rx })
}
