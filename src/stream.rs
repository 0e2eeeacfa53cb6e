//! The stream seam between the transport and optional TLS.
//!
//! The transport owns plain TCP establishment; anything layered on top —
//! TLS with caller-controlled certificate verification, a proxy tunnel, a
//! test shim — plugs in as a [`StreamLayer`]. Handshake configuration is
//! the caller's concern; the transport only sees the wrapped stream.

use std::io;

use futures::future::BoxFuture;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// A bidirectional byte stream the transport can drive.
///
/// Blanket-implemented for every suitable type; `TcpStream` and TLS client
/// streams qualify.
pub trait SessionStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> SessionStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A boxed stream as held by the transport's read and write loops.
pub type BoxedSessionStream = Box<dyn SessionStream>;

/// Wraps a freshly connected TCP stream, typically with TLS.
///
/// The wrap future runs under the connect deadline; a handshake that
/// outlives it counts as a connect failure.
pub trait StreamLayer: Send + Sync {
    /// Wrap `stream`, performing any handshake required.
    fn layer(&self, stream: TcpStream) -> BoxFuture<'static, io::Result<BoxedSessionStream>>;
}
