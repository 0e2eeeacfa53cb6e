//! MQTT 3.1.1 wire codec.
//!
//! Framing splits into three pieces: the remaining-length varint
//! ([`varint`]), a stateful streaming decoder that tolerates arbitrary
//! chunking of the byte stream ([`PacketDecoder`]), and an encoder that
//! serialises typed packets into caller-provided buffers ([`encoder`]).
//!
//! The decoder never frames anything the transport reads; the transport
//! moves bytes and the session layer above feeds them here. A feed may
//! complete zero, one, or several packets:
//!
//! ```
//! use tether::codec::{PacketDecoder, encoder};
//! use tether::packet::Packet;
//!
//! let mut buf = [0u8; 4];
//! let estimates = [encoder::estimate(&Packet::PingReq), encoder::estimate(&Packet::PingResp)];
//! let written = encoder::encode_many(&estimates, &mut buf).expect("buffer sized");
//!
//! let mut decoder = PacketDecoder::default();
//! let outcome = decoder.try_decode(&buf[..written]).expect("well formed");
//! assert_eq!(outcome.packets, vec![Packet::PingReq, Packet::PingResp]);
//! ```

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod varint;

pub use decoder::{FeedOutcome, PacketDecoder};
pub use encoder::{Estimated, encode, encode_many, estimate};
pub use error::{DecodeError, EncodeError};
pub use varint::{MAX_REMAINING_LENGTH, VarintDecode};

#[cfg(test)]
mod tests;
