//! Socket establishment: DNS resolution, option application, and
//! deadline-bounded connects.

use std::{io, net::SocketAddr, sync::Arc};

use log::debug;
use tokio::{
    net::{TcpSocket, TcpStream, lookup_host},
    time::{Instant, timeout_at},
};

use crate::{
    config::{AddressFamily, SocketOptions, TransportConfig},
    error::TransportError,
    stream::{BoxedSessionStream, StreamLayer},
};

/// Everything a connect task needs, detached from the actor's state.
pub(super) struct ConnectSpec {
    host: String,
    port: u16,
    family: AddressFamily,
    options: SocketOptions,
    layer: Option<Arc<dyn StreamLayer>>,
}

impl ConnectSpec {
    pub(super) fn from_config(config: &TransportConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            family: config.address_family,
            options: config.effective_socket_options(),
            layer: config.stream_layer.clone(),
        }
    }
}

/// Resolve, connect, and layer a stream, all under one deadline.
pub(super) async fn establish(
    spec: &ConnectSpec,
    deadline: Instant,
) -> Result<BoxedSessionStream, TransportError> {
    let addrs = resolve(spec, deadline).await?;
    let stream = connect_any(spec, &addrs, deadline).await?;
    match &spec.layer {
        None => Ok(Box::new(stream)),
        Some(layer) => timeout_at(deadline, layer.layer(stream))
            .await
            .map_err(|_| {
                TransportError::Tls(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "stream layering timed out",
                ))
            })?
            .map_err(TransportError::Tls),
    }
}

/// Resolve the host, keeping only addresses of the requested family.
///
/// Resolution failure and an empty result both count as connect failures
/// for the reconnect policy.
async fn resolve(spec: &ConnectSpec, deadline: Instant) -> Result<Vec<SocketAddr>, TransportError> {
    let resolved = timeout_at(deadline, lookup_host((spec.host.as_str(), spec.port)))
        .await
        .map_err(|_| TransportError::Dns {
            host: spec.host.clone(),
            source: io::Error::new(io::ErrorKind::TimedOut, "DNS resolution timed out"),
        })?
        .map_err(|e| TransportError::Dns {
            host: spec.host.clone(),
            source: e,
        })?;
    let addrs: Vec<SocketAddr> = resolved
        .filter(|addr| spec.family.matches(addr))
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Dns {
            host: spec.host.clone(),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses matched the requested family",
            ),
        });
    }
    Ok(addrs)
}

/// Try each resolved address in order until one connects or the deadline
/// expires.
async fn connect_any(
    spec: &ConnectSpec,
    addrs: &[SocketAddr],
    deadline: Instant,
) -> Result<TcpStream, TransportError> {
    let mut last_error: Option<io::Error> = None;
    for &addr in addrs {
        if Instant::now() >= deadline {
            break;
        }
        let socket = match if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        } {
            Ok(socket) => socket,
            Err(e) => return Err(TransportError::Connect(e)),
        };
        spec.options.apply(&socket).map_err(TransportError::Connect)?;
        match timeout_at(deadline, socket.connect(addr)).await {
            Ok(Ok(stream)) => {
                debug!("socket connected: host={}, addr={addr}", spec.host);
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!("address rejected connect: addr={addr}, error={e}");
                last_error = Some(e);
            }
            Err(_) => {
                last_error = Some(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect deadline expired",
                ));
                break;
            }
        }
    }
    Err(TransportError::Connect(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::TimedOut, "connect deadline expired")
    })))
}
