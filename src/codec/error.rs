//! Error types for the wire codec.
//!
//! Running out of bytes is not an error at this layer: the decoder reports
//! it through [`FeedOutcome`](crate::codec::FeedOutcome) and the varint
//! codec through [`VarintDecode::NeedMore`](crate::codec::VarintDecode).
//! Everything here is a hard failure.

use thiserror::Error;

/// Failures raised while decoding bytes into packets.
///
/// Any of these poisons the decoder that produced it; the connection should
/// be closed rather than resynchronised, because a corrupt remaining length
/// makes every subsequent frame boundary suspect.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A remaining-length varint carried a continuation flag on its fourth
    /// byte.
    #[error("malformed remaining-length encoding")]
    MalformedVarint,

    /// A packet body violated its type-specific layout.
    #[error("malformed {packet} packet: {detail}")]
    MalformedPacket {
        /// Packet type being decoded.
        packet: &'static str,
        /// What went wrong.
        detail: &'static str,
    },

    /// The fixed header announced a body larger than the configured maximum.
    #[error("announced packet body of {size} bytes exceeds the {max} byte maximum")]
    OversizedPacket {
        /// Body size announced by the remaining length.
        size: usize,
        /// Configured maximum packet size.
        max: usize,
    },

    /// The fixed header carried a packet type nibble MQTT 3.1.1 reserves.
    #[error("reserved packet type {0}")]
    InvalidPacketType(u8),

    /// The decoder already failed; feed no further bytes to it.
    #[error("decoder poisoned by an earlier error")]
    Poisoned,
}

impl DecodeError {
    pub(crate) fn malformed(packet: &'static str, detail: &'static str) -> Self {
        Self::MalformedPacket { packet, detail }
    }
}

/// Failures raised while encoding packets.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The value does not fit the 1–4 byte remaining-length encoding.
    #[error("remaining length {value} exceeds the MQTT maximum")]
    ValueTooLarge {
        /// Value that overflowed the encoding.
        value: usize,
    },

    /// The destination buffer cannot hold the encoded frames.
    #[error("destination buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall {
        /// Bytes the frames require.
        need: usize,
        /// Bytes the destination provides.
        have: usize,
    },

    /// A topic, filter, or other length-prefixed string exceeds 65 535 bytes.
    #[error("string of {len} bytes exceeds the 16-bit length prefix")]
    StringTooLong {
        /// Byte length of the offending string.
        len: usize,
    },

    /// A QoS 1 or 2 PUBLISH or an acknowledgement was built without a
    /// packet identifier.
    #[error("packet requires a packet identifier but none was set")]
    MissingPacketId,
}
