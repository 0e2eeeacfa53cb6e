//! Caller-facing handle to a running transport.

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};

use super::{
    event::Event,
    status::{ConnectionStatus, TerminationReason},
};
use crate::{
    buffer::BufferCell,
    channel::{ByteReceiver, ByteSender, ChannelError},
    error::TransportError,
};

/// Handle returned by [`Transport::create`](super::Transport::create).
///
/// Carries the outbound writer, the inbound reader, the terminated
/// one-shot, and the status observable. No socket I/O has happened when the
/// handle is created; call [`connect`](Self::connect) to start.
pub struct TransportHandle {
    pub(super) outbound: ByteSender,
    pub(super) inbound: ByteReceiver,
    pub(super) events: mpsc::UnboundedSender<Event>,
    pub(super) status: watch::Receiver<ConnectionStatus>,
    pub(super) terminated: Option<oneshot::Receiver<TerminationReason>>,
    pub(super) final_reason: Option<TerminationReason>,
    pub(super) max_frame_size: u32,
}

impl TransportHandle {
    /// Request a connection, bounded by `timeout`.
    ///
    /// On failure the transport keeps retrying on its own (within the
    /// reconnect budget); the error returned here is the first attempt's
    /// reason, and later attempts are visible only through
    /// [`status`](Self::status).
    ///
    /// # Errors
    ///
    /// Returns the failure reported by the first connect attempt;
    /// [`TransportError::ReconnectExhausted`] when the request lands after
    /// the reconnect budget was already spent; or
    /// [`TransportError::Cancelled`] when the transport shut down before
    /// answering.
    pub async fn connect(&self, timeout: Duration) -> Result<(), TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let deadline = Instant::now() + timeout;
        self.events
            .send(Event::Connect {
                deadline,
                reply: Some(reply_tx),
            })
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TransportError::Cancelled)?
    }

    /// Request full shutdown. Await [`wait_terminated`](Self::wait_terminated)
    /// for the outcome.
    pub fn close(&self) { let _ = self.events.send(Event::Close); }

    /// Enqueue an outbound cell; ownership transfers to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after full shutdown.
    pub fn write(&self, cell: BufferCell) -> Result<(), ChannelError> {
        self.outbound.write(cell)
    }

    /// The outbound writer, for callers that hold it separately.
    #[must_use]
    pub fn outbound(&self) -> &ByteSender { &self.outbound }

    /// Dequeue the next inbound cell.
    ///
    /// Returns `None` once the transport has fully shut down and the
    /// channel has drained.
    pub async fn read(&mut self) -> Option<BufferCell> { self.inbound.read().await }

    /// The inbound reader, for feeding a decoder in a dedicated task.
    pub fn inbound_mut(&mut self) -> &mut ByteReceiver { &mut self.inbound }

    /// Current status. Best effort: may lag the state machine by a message.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus { *self.status.borrow() }

    /// Wait until the status satisfies `predicate`, returning the matching
    /// value.
    ///
    /// Intermediate values can be skipped; only use this to wait for stable
    /// states.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Cancelled`] when the transport goes away
    /// before the predicate matches.
    pub async fn wait_for_status(
        &mut self,
        predicate: impl FnMut(&ConnectionStatus) -> bool,
    ) -> Result<ConnectionStatus, TransportError> {
        self.status
            .wait_for(predicate)
            .await
            .map(|status| *status)
            .map_err(|_| TransportError::Cancelled)
    }

    /// Wait for the terminal outcome. Subsequent calls return the same
    /// reason.
    pub async fn wait_terminated(&mut self) -> TerminationReason {
        if let Some(reason) = self.final_reason {
            return reason;
        }
        let reason = match self.terminated.take() {
            Some(receiver) => receiver.await.unwrap_or(TerminationReason::Error),
            None => TerminationReason::Error,
        };
        self.final_reason = Some(reason);
        reason
    }

    /// The scratch-buffer size the transport reads with; inbound cells are
    /// never larger than this.
    #[must_use]
    pub fn max_frame_size(&self) -> u32 { self.max_frame_size }
}
