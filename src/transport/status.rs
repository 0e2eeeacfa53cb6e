//! Observable connection status and terminal outcome types.

use std::fmt;

/// Best-effort observable state of the transport.
///
/// Status may lag the state machine by a message; it is a hint for
/// diagnostics, not a synchronisation primitive. The authoritative signals
/// are channel completion and the terminated one-shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connect has been requested yet.
    NotStarted,
    /// A connect attempt is in progress.
    Connecting,
    /// The socket is established and the I/O loops are running.
    Connected,
    /// The socket was torn down; a reconnect may follow.
    Aborted,
    /// The transport terminated after an error or exhausted reconnects.
    Failed,
    /// The transport terminated at the caller's request.
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not started",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Why the transport terminated; carried by the terminated one-shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationReason {
    /// The caller closed an established connection.
    Normal,
    /// An unrecoverable internal fault.
    Error,
    /// The reconnect budget ran out without re-establishing a connection.
    CouldNotConnect,
    /// The transport was abandoned before reaching a connected state.
    Aborted,
}

impl TerminationReason {
    /// The status the transport settles on for this outcome.
    #[must_use]
    pub fn final_status(self) -> ConnectionStatus {
        match self {
            Self::Normal => ConnectionStatus::Disconnected,
            Self::Error | Self::CouldNotConnect => ConnectionStatus::Failed,
            Self::Aborted => ConnectionStatus::Aborted,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::CouldNotConnect => "could not connect",
            Self::Aborted => "aborted",
        })
    }
}
