//! Stateful streaming packet decoder.
//!
//! Bytes arrive from the transport in whatever chunks the socket produced;
//! packet boundaries fall wherever they fall. The decoder accumulates input
//! across feeds and emits every packet that completes, in order. Partial
//! fixed headers and partial bodies both persist until the next feed.

use bytes::{Buf, Bytes, BytesMut};

use super::{
    error::DecodeError,
    varint::{self, MAX_REMAINING_LENGTH, VarintDecode},
};
use crate::packet::{
    ConnAck,
    Connect,
    ConnectReturnCode,
    LastWill,
    Packet,
    PacketType,
    Publish,
    QoS,
    SubAck,
    Subscribe,
    SubscribeReturnCode,
    Unsubscribe,
};

/// Result of feeding bytes to a [`PacketDecoder`].
#[derive(Debug, Default)]
pub struct FeedOutcome {
    /// Whether any complete header or body was consumed by this feed.
    pub consumed: bool,
    /// Packets completed by this feed, in wire order.
    pub packets: Vec<Packet>,
}

#[derive(Clone, Copy)]
enum DecodeState {
    AwaitingHeader,
    AwaitingBody {
        packet_type: PacketType,
        flags: u8,
        remaining: usize,
    },
    Poisoned,
}

/// Streaming MQTT 3.1.1 decoder.
///
/// The decoder copies what it keeps: callers may reuse or free the fed
/// buffer as soon as [`try_decode`](Self::try_decode) returns.
///
/// # Examples
///
/// ```
/// use tether::codec::PacketDecoder;
/// use tether::packet::Packet;
///
/// let mut decoder = PacketDecoder::default();
/// // A PINGRESP split across two feeds.
/// let first = decoder.try_decode(&[0xD0]).expect("well formed");
/// assert!(first.packets.is_empty());
/// let second = decoder.try_decode(&[0x00]).expect("well formed");
/// assert_eq!(second.packets, vec![Packet::PingResp]);
/// ```
pub struct PacketDecoder {
    acc: BytesMut,
    state: DecodeState,
    max_packet_size: usize,
}

impl Default for PacketDecoder {
    fn default() -> Self { Self::new(MAX_REMAINING_LENGTH as usize) }
}

impl PacketDecoder {
    /// Create a decoder that rejects bodies larger than `max_packet_size`.
    #[must_use]
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            acc: BytesMut::new(),
            state: DecodeState::AwaitingHeader,
            max_packet_size,
        }
    }

    /// Bytes currently buffered awaiting a complete packet.
    #[must_use]
    pub fn buffered(&self) -> usize { self.acc.len() }

    /// Feed bytes and collect every packet they complete.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] on a malformed remaining length, a reserved
    /// packet type, an oversized body, or a body that violates its packet
    /// layout. Any error poisons the decoder; further feeds return
    /// [`DecodeError::Poisoned`].
    pub fn try_decode(&mut self, input: &[u8]) -> Result<FeedOutcome, DecodeError> {
        if matches!(self.state, DecodeState::Poisoned) {
            return Err(DecodeError::Poisoned);
        }
        self.acc.extend_from_slice(input);

        let mut outcome = FeedOutcome::default();
        loop {
            match self.state {
                DecodeState::AwaitingHeader => {
                    if !self.take_header(&mut outcome)? {
                        break;
                    }
                }
                DecodeState::AwaitingBody {
                    packet_type,
                    flags,
                    remaining,
                } => {
                    if self.acc.len() < remaining {
                        break;
                    }
                    let body = self.acc.split_to(remaining).freeze();
                    let packet = decode_body(packet_type, flags, body)
                        .map_err(|e| self.poison(e))?;
                    outcome.consumed = true;
                    outcome.packets.push(packet);
                    self.state = DecodeState::AwaitingHeader;
                }
                DecodeState::Poisoned => unreachable!("poisoned decoders return early"),
            }
        }
        Ok(outcome)
    }

    /// Consume a fixed header and remaining length if one is complete.
    ///
    /// Returns `false` when more bytes are needed; the accumulator is left
    /// exactly as it was, including the header byte.
    fn take_header(&mut self, outcome: &mut FeedOutcome) -> Result<bool, DecodeError> {
        let Some(&first) = self.acc.first() else {
            return Ok(false);
        };
        let (value, consumed) = match varint::try_decode(&self.acc[1..]) {
            Ok(VarintDecode::NeedMore) => return Ok(false),
            Ok(VarintDecode::Done { value, consumed }) => (value, consumed),
            Err(e) => return Err(self.poison(e)),
        };
        let packet_type =
            PacketType::try_from(first >> 4).map_err(|e| self.poison(e))?;
        let remaining = value as usize;
        if remaining > self.max_packet_size {
            return Err(self.poison(DecodeError::OversizedPacket {
                size: remaining,
                max: self.max_packet_size,
            }));
        }
        self.acc.advance(1 + consumed);
        outcome.consumed = true;
        self.state = DecodeState::AwaitingBody {
            packet_type,
            flags: first & 0x0F,
            remaining,
        };
        Ok(true)
    }

    fn poison(&mut self, error: DecodeError) -> DecodeError {
        self.state = DecodeState::Poisoned;
        self.acc.clear();
        error
    }
}

fn decode_body(packet_type: PacketType, flags: u8, body: Bytes) -> Result<Packet, DecodeError> {
    match packet_type {
        PacketType::Connect => decode_connect(flags, body),
        PacketType::ConnAck => decode_connack(flags, body),
        PacketType::Publish => decode_publish(flags, body),
        PacketType::PubAck => {
            decode_ack(flags, body, "PUBACK", 0).map(|packet_id| Packet::PubAck { packet_id })
        }
        PacketType::PubRec => {
            decode_ack(flags, body, "PUBREC", 0).map(|packet_id| Packet::PubRec { packet_id })
        }
        PacketType::PubRel => {
            decode_ack(flags, body, "PUBREL", 0x02).map(|packet_id| Packet::PubRel { packet_id })
        }
        PacketType::PubComp => {
            decode_ack(flags, body, "PUBCOMP", 0).map(|packet_id| Packet::PubComp { packet_id })
        }
        PacketType::Subscribe => decode_subscribe(flags, body),
        PacketType::SubAck => decode_suback(flags, body),
        PacketType::Unsubscribe => decode_unsubscribe(flags, body),
        PacketType::UnsubAck => {
            decode_ack(flags, body, "UNSUBACK", 0).map(|packet_id| Packet::UnsubAck { packet_id })
        }
        PacketType::PingReq => decode_empty(flags, body, "PINGREQ").map(|()| Packet::PingReq),
        PacketType::PingResp => decode_empty(flags, body, "PINGRESP").map(|()| Packet::PingResp),
        PacketType::Disconnect => {
            decode_empty(flags, body, "DISCONNECT").map(|()| Packet::Disconnect)
        }
    }
}

fn require_flags(flags: u8, expected: u8, packet: &'static str) -> Result<(), DecodeError> {
    if flags == expected {
        Ok(())
    } else {
        Err(DecodeError::malformed(packet, "reserved flag bits set"))
    }
}

fn read_u8(body: &mut Bytes, packet: &'static str) -> Result<u8, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::malformed(packet, "body truncated"));
    }
    Ok(body.get_u8())
}

fn read_u16(body: &mut Bytes, packet: &'static str) -> Result<u16, DecodeError> {
    if body.len() < 2 {
        return Err(DecodeError::malformed(packet, "body truncated"));
    }
    Ok(body.get_u16())
}

fn read_prefixed_bytes(body: &mut Bytes, packet: &'static str) -> Result<Bytes, DecodeError> {
    let len = read_u16(body, packet)? as usize;
    if body.len() < len {
        return Err(DecodeError::malformed(packet, "length prefix runs past body"));
    }
    Ok(body.split_to(len))
}

fn read_string(body: &mut Bytes, packet: &'static str) -> Result<String, DecodeError> {
    let raw = read_prefixed_bytes(body, packet)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| DecodeError::malformed(packet, "string is not valid UTF-8"))
}

fn require_drained(body: &Bytes, packet: &'static str) -> Result<(), DecodeError> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::malformed(packet, "trailing bytes after body"))
    }
}

fn decode_connect(flags: u8, mut body: Bytes) -> Result<Packet, DecodeError> {
    const PACKET: &str = "CONNECT";
    require_flags(flags, 0, PACKET)?;
    let protocol = read_prefixed_bytes(&mut body, PACKET)?;
    if protocol.as_ref() != b"MQTT" {
        return Err(DecodeError::malformed(PACKET, "unknown protocol name"));
    }
    if read_u8(&mut body, PACKET)? != 4 {
        return Err(DecodeError::malformed(PACKET, "unsupported protocol level"));
    }
    let connect_flags = read_u8(&mut body, PACKET)?;
    if connect_flags & 0x01 != 0 {
        return Err(DecodeError::malformed(PACKET, "reserved connect flag set"));
    }
    let keep_alive = read_u16(&mut body, PACKET)?;
    let client_id = read_string(&mut body, PACKET)?;

    let will = if connect_flags & 0x04 != 0 {
        let qos = QoS::try_from((connect_flags >> 3) & 0x03)
            .map_err(|_| DecodeError::malformed(PACKET, "invalid will QoS"))?;
        let topic = read_string(&mut body, PACKET)?;
        let payload = read_prefixed_bytes(&mut body, PACKET)?;
        Some(LastWill {
            topic,
            payload,
            qos,
            retain: connect_flags & 0x20 != 0,
        })
    } else if connect_flags & 0x38 != 0 {
        return Err(DecodeError::malformed(PACKET, "will flags without a will"));
    } else {
        None
    };

    let username = if connect_flags & 0x80 != 0 {
        Some(read_string(&mut body, PACKET)?)
    } else {
        None
    };
    let password = if connect_flags & 0x40 != 0 {
        if username.is_none() {
            return Err(DecodeError::malformed(PACKET, "password without user name"));
        }
        Some(read_prefixed_bytes(&mut body, PACKET)?)
    } else {
        None
    };
    require_drained(&body, PACKET)?;

    Ok(Packet::Connect(Connect {
        client_id,
        clean_session: connect_flags & 0x02 != 0,
        keep_alive,
        will,
        username,
        password,
    }))
}

fn decode_connack(flags: u8, mut body: Bytes) -> Result<Packet, DecodeError> {
    const PACKET: &str = "CONNACK";
    require_flags(flags, 0, PACKET)?;
    let ack_flags = read_u8(&mut body, PACKET)?;
    if ack_flags & !0x01 != 0 {
        return Err(DecodeError::malformed(PACKET, "reserved ack flag bits set"));
    }
    let return_code = ConnectReturnCode::try_from(read_u8(&mut body, PACKET)?)?;
    require_drained(&body, PACKET)?;
    Ok(Packet::ConnAck(ConnAck {
        session_present: ack_flags & 0x01 != 0,
        return_code,
    }))
}

fn decode_publish(flags: u8, mut body: Bytes) -> Result<Packet, DecodeError> {
    const PACKET: &str = "PUBLISH";
    let qos = QoS::try_from((flags >> 1) & 0x03)?;
    let topic = read_string(&mut body, PACKET)?;
    let packet_id = if qos == QoS::AtMostOnce {
        None
    } else {
        Some(read_u16(&mut body, PACKET)?)
    };
    Ok(Packet::Publish(Publish {
        dup: flags & 0x08 != 0,
        qos,
        retain: flags & 0x01 != 0,
        topic,
        packet_id,
        payload: body,
    }))
}

fn decode_ack(
    flags: u8,
    mut body: Bytes,
    packet: &'static str,
    expected_flags: u8,
) -> Result<u16, DecodeError> {
    require_flags(flags, expected_flags, packet)?;
    let packet_id = read_u16(&mut body, packet)?;
    require_drained(&body, packet)?;
    Ok(packet_id)
}

fn decode_subscribe(flags: u8, mut body: Bytes) -> Result<Packet, DecodeError> {
    const PACKET: &str = "SUBSCRIBE";
    require_flags(flags, 0x02, PACKET)?;
    let packet_id = read_u16(&mut body, PACKET)?;
    let mut filters = Vec::new();
    while !body.is_empty() {
        let filter = read_string(&mut body, PACKET)?;
        let qos = QoS::try_from(read_u8(&mut body, PACKET)?)
            .map_err(|_| DecodeError::malformed(PACKET, "invalid requested QoS"))?;
        filters.push((filter, qos));
    }
    if filters.is_empty() {
        return Err(DecodeError::malformed(PACKET, "no topic filters"));
    }
    Ok(Packet::Subscribe(Subscribe { packet_id, filters }))
}

fn decode_suback(flags: u8, mut body: Bytes) -> Result<Packet, DecodeError> {
    const PACKET: &str = "SUBACK";
    require_flags(flags, 0, PACKET)?;
    let packet_id = read_u16(&mut body, PACKET)?;
    let mut return_codes = Vec::with_capacity(body.len());
    while !body.is_empty() {
        return_codes.push(match body.get_u8() {
            0 => SubscribeReturnCode::Success(QoS::AtMostOnce),
            1 => SubscribeReturnCode::Success(QoS::AtLeastOnce),
            2 => SubscribeReturnCode::Success(QoS::ExactlyOnce),
            0x80 => SubscribeReturnCode::Failure,
            _ => return Err(DecodeError::malformed(PACKET, "unknown return code")),
        });
    }
    if return_codes.is_empty() {
        return Err(DecodeError::malformed(PACKET, "no return codes"));
    }
    Ok(Packet::SubAck(SubAck {
        packet_id,
        return_codes,
    }))
}

fn decode_unsubscribe(flags: u8, mut body: Bytes) -> Result<Packet, DecodeError> {
    const PACKET: &str = "UNSUBSCRIBE";
    require_flags(flags, 0x02, PACKET)?;
    let packet_id = read_u16(&mut body, PACKET)?;
    let mut filters = Vec::new();
    while !body.is_empty() {
        filters.push(read_string(&mut body, PACKET)?);
    }
    if filters.is_empty() {
        return Err(DecodeError::malformed(PACKET, "no topic filters"));
    }
    Ok(Packet::Unsubscribe(Unsubscribe { packet_id, filters }))
}

fn decode_empty(flags: u8, body: Bytes, packet: &'static str) -> Result<(), DecodeError> {
    require_flags(flags, 0, packet)?;
    require_drained(&body, packet)
}
