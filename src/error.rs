//! Canonical error types for the transport layer.
//!
//! Codec failures have their own taxonomy in [`crate::codec::error`]; this
//! module covers everything from DNS resolution to terminal reconnect
//! exhaustion. I/O loop errors are reported to the state machine as events
//! and surface here only when they decide the fate of the transport.

use std::io;

use thiserror::Error;

/// Errors surfaced by transport operations.
///
/// `Cancelled` is an expected outcome during reconnect and shutdown; callers
/// should not treat it as a fault.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS resolution failed, or produced no address of the requested family.
    #[error("DNS resolution failed for {host}: {source}")]
    Dns {
        /// Host name that failed to resolve.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// No address accepted the connection before the deadline.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// The configured stream layer failed to wrap the connected socket.
    #[error("stream layering failed: {0}")]
    Tls(#[source] io::Error),

    /// The socket read side failed.
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// The socket write side failed.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// A channel endpoint was used after full shutdown closed it.
    #[error("transport channel closed")]
    ChannelClosed,

    /// The reconnect budget ran out before a connection was re-established.
    #[error("reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The operation was abandoned because the transport is shutting down.
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Build a connect error carrying a human-readable reason.
    pub(crate) fn connect_reason(kind: io::ErrorKind, reason: &'static str) -> Self {
        Self::Connect(io::Error::new(kind, reason))
    }
}
