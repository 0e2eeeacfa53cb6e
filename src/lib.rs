//! Asynchronous MQTT 3.1.1 client transport.
//!
//! `tether` provides the two hard pieces under an MQTT client: the wire
//! codec that frames control packets out of an arbitrarily chunked byte
//! stream, and the connection lifecycle actor that owns a TCP (optionally
//! layered) socket, pumps bytes through a pair of in-process channels, and
//! reconnects transparently up to a configured budget.
//!
//! Session logic — CONNECT/CONNACK correlation, acknowledgement tracking,
//! QoS retries, keep-alive pings — sits above this crate. It talks to the
//! transport exclusively through [`TransportHandle`]: encoded packets go
//! down the outbound channel as [`BufferCell`]s, raw reads come up the
//! inbound channel, and [`codec::PacketDecoder`] turns those into typed
//! [`packet::Packet`]s.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use tether::{
//!     buffer::BufferPool,
//!     codec::{PacketDecoder, encoder},
//!     config::TransportConfig,
//!     packet::{Connect, Packet},
//!     transport::Transport,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig::new("broker.example", 1883);
//! let pool = BufferPool::new(config.max_frame_size_value() as usize);
//! let mut handle = Transport::spawn(config);
//! handle.connect(Duration::from_secs(5)).await?;
//!
//! // Send a CONNECT.
//! let packet = Packet::Connect(Connect::new("tether-client", 30));
//! let mut cell = pool.rent();
//! let written = encoder::encode(&packet, cell.as_mut_slice())?;
//! cell.set_len(written);
//! handle.write(cell)?;
//!
//! // Decode whatever the server sends back.
//! let mut decoder = PacketDecoder::default();
//! if let Some(cell) = handle.read().await {
//!     for packet in decoder.try_decode(cell.bytes())?.packets {
//!         println!("received {packet:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod packet;
pub mod reconnect;
pub mod stream;
pub mod transport;

pub use buffer::{BufferCell, BufferPool};
pub use channel::{ByteReceiver, ByteSender, ChannelError};
pub use codec::{DecodeError, EncodeError, PacketDecoder};
pub use config::{AddressFamily, SocketOptions, TransportConfig};
pub use error::TransportError;
pub use packet::{Packet, QoS};
pub use transport::{ConnectionStatus, TerminationReason, Transport, TransportHandle};
