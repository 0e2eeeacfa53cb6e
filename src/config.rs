//! Transport configuration and socket options.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpSocket;

use crate::stream::StreamLayer;

/// Smallest accepted frame size in bytes.
pub const MIN_FRAME_SIZE: u32 = 64;

/// Largest accepted frame size in bytes (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

const DEFAULT_FRAME_SIZE: u32 = 64 * 1024;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_LINGER: Duration = Duration::from_secs(2);

/// Address family restriction applied to DNS results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddressFamily {
    /// Accept whatever the resolver returns.
    #[default]
    Unspecified,
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
}

impl AddressFamily {
    pub(crate) fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Unspecified => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

/// Immutable connection configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tether::config::TransportConfig;
///
/// let config = TransportConfig::new("broker.example", 1883)
///     .max_frame_size(128 * 1024)
///     .max_reconnect_attempts(5)
///     .reconnect_interval(Duration::from_secs(2));
/// assert_eq!(config.max_frame_size_value(), 128 * 1024);
/// ```
#[derive(Clone)]
pub struct TransportConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) address_family: AddressFamily,
    pub(crate) max_frame_size: u32,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) reconnect_interval: Duration,
    pub(crate) socket_options: Option<SocketOptions>,
    pub(crate) stream_layer: Option<Arc<dyn StreamLayer>>,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("address_family", &self.address_family)
            .field("max_frame_size", &self.max_frame_size)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("socket_options", &self.socket_options)
            .field(
                "stream_layer",
                &self.stream_layer.as_ref().map(|_| "Some(<layer>)"),
            )
            .finish()
    }
}

impl TransportConfig {
    /// Configuration for `host:port` with defaults for everything else.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            address_family: AddressFamily::Unspecified,
            max_frame_size: DEFAULT_FRAME_SIZE,
            max_reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            socket_options: None,
            stream_layer: None,
        }
    }

    /// Restrict DNS results to one address family.
    #[must_use]
    pub fn address_family(mut self, family: AddressFamily) -> Self {
        self.address_family = family;
        self
    }

    /// Set the read scratch-buffer size, clamped between [`MIN_FRAME_SIZE`]
    /// and [`MAX_FRAME_SIZE`].
    #[must_use]
    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size.clamp(MIN_FRAME_SIZE, MAX_FRAME_SIZE);
        self
    }

    /// Set the reconnect budget; zero disables reconnection entirely.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the delay between reconnect attempts; also bounds each attempt's
    /// connect deadline. Clamped to at least one millisecond.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Replace the default socket tuning with explicit options.
    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket_options = Some(options);
        self
    }

    /// Layer the connected socket, typically with TLS.
    #[must_use]
    pub fn stream_layer(mut self, layer: Arc<dyn StreamLayer>) -> Self {
        self.stream_layer = Some(layer);
        self
    }

    /// The configured scratch-buffer size.
    #[must_use]
    pub fn max_frame_size_value(&self) -> u32 { self.max_frame_size }

    /// The configured reconnect budget.
    #[must_use]
    pub fn max_reconnect_attempts_value(&self) -> u32 { self.max_reconnect_attempts }

    /// The configured inter-attempt delay.
    #[must_use]
    pub fn reconnect_interval_value(&self) -> Duration { self.reconnect_interval }

    /// Socket options for the next connect attempt: the caller's overrides
    /// (or the defaults), with any kernel buffer the caller left unpinned
    /// derived as twice the frame size.
    #[must_use]
    pub fn effective_socket_options(&self) -> SocketOptions {
        self.socket_options
            .unwrap_or_default()
            .or_buffers(self.max_frame_size.saturating_mul(2))
    }
}

/// Pre-connect TCP tuning.
///
/// The defaults suit an MQTT client: Nagle's algorithm off so small
/// control packets leave immediately, and a two-second linger so tearing a
/// connection down cannot stall disposal. Kernel buffer sizes start
/// unpinned; the transport derives them from its frame size unless the
/// caller pins them here.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use tether::config::SocketOptions;
///
/// let tuned = SocketOptions::default()
///     .keepalive_after(Some(Duration::from_secs(30)))
///     .send_buffer(64 * 1024);
/// assert_ne!(tuned, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: bool,
    linger: Option<Duration>,
    keepalive_after: Option<Duration>,
    send_buffer: Option<u32>,
    recv_buffer: Option<u32>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            nodelay: true,
            linger: Some(DEFAULT_LINGER),
            keepalive_after: None,
            send_buffer: None,
            recv_buffer: None,
        }
    }
}

impl SocketOptions {
    /// Toggle Nagle's algorithm. Disabled by default so acknowledgements
    /// and pings are not held back for coalescing.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Bound how long a closing socket may block to flush unsent bytes.
    /// `None` restores the operating system default.
    #[must_use]
    pub fn linger(mut self, timeout: Option<Duration>) -> Self {
        self.linger = timeout;
        self
    }

    /// Send TCP keepalive probes once the connection has idled for `idle`.
    /// Off by default: liveness is normally the MQTT ping's job.
    #[must_use]
    pub fn keepalive_after(mut self, idle: Option<Duration>) -> Self {
        self.keepalive_after = idle;
        self
    }

    /// Pin the kernel send buffer to `bytes`.
    #[must_use]
    pub fn send_buffer(mut self, bytes: u32) -> Self {
        self.send_buffer = Some(bytes);
        self
    }

    /// Pin the kernel receive buffer to `bytes`.
    #[must_use]
    pub fn recv_buffer(mut self, bytes: u32) -> Self {
        self.recv_buffer = Some(bytes);
        self
    }

    /// Fill in any kernel buffer the caller left unpinned.
    pub(crate) fn or_buffers(mut self, bytes: u32) -> Self {
        self.send_buffer = self.send_buffer.or(Some(bytes));
        self.recv_buffer = self.recv_buffer.or(Some(bytes));
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        socket.set_nodelay(self.nodelay)?;
        socket.set_linger(self.linger)?;
        if let Some(bytes) = self.send_buffer {
            socket.set_send_buffer_size(bytes)?;
        }
        if let Some(bytes) = self.recv_buffer {
            socket.set_recv_buffer_size(bytes)?;
        }
        self.apply_keepalive(socket)
    }

    fn apply_keepalive(&self, socket: &TcpSocket) -> io::Result<()> {
        let Some(idle) = self.keepalive_after else {
            return socket.set_keepalive(false);
        };
        socket.set_keepalive(true)?;
        SockRef::from(socket).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
    }
}
