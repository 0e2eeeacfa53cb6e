//! Internal events for the transport state machine's mailbox.
//!
//! All mutation happens on the actor task; the I/O loops, connect tasks,
//! and caller handles influence it only by posting these events. Events
//! from the loops carry the generation that spawned them so a message from
//! a superseded socket cannot disturb its successor.

use std::io;

use tokio::{sync::oneshot, time::Instant};

use crate::{error::TransportError, stream::BoxedSessionStream};

/// Reply channel for a caller-initiated connect.
pub(super) type ConnectReply = oneshot::Sender<Result<(), TransportError>>;

pub(super) enum Event {
    /// Begin a connect attempt bounded by `deadline`. Scheduled reconnects
    /// post this with no reply channel.
    Connect {
        deadline: Instant,
        reply: Option<ConnectReply>,
    },
    /// A connect task finished.
    ConnectResult {
        generation: u64,
        result: Result<BoxedSessionStream, TransportError>,
    },
    /// The read loop stopped: end-of-stream when `error` is `None`.
    ReadFinished {
        generation: u64,
        error: Option<io::Error>,
    },
    /// The write loop failed to put bytes on the socket.
    WriteError { generation: u64, error: io::Error },
    /// Caller-requested shutdown.
    Close,
}
