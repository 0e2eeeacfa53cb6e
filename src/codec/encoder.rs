//! Packet serialisation into caller-provided buffers.
//!
//! The caller estimates first, sizes a destination buffer from the
//! estimates, then encodes. [`estimate`] is exact by contract: the encoder
//! trusts it when laying out frames and the unit tests hold the two to
//! byte-for-byte agreement.

use super::{
    error::EncodeError,
    varint,
};
use crate::packet::{Connect, Packet, Publish, QoS, Subscribe, SubscribeReturnCode, Unsubscribe};

/// A packet paired with its exact body length.
///
/// Produced only by [`estimate`], so the length can be trusted by
/// [`encode_many`].
#[derive(Clone, Copy, Debug)]
pub struct Estimated<'a> {
    packet: &'a Packet,
    body_len: usize,
}

impl<'a> Estimated<'a> {
    /// The packet being encoded.
    #[must_use]
    pub fn packet(&self) -> &'a Packet { self.packet }

    /// Exact body length in bytes, excluding the fixed header and the
    /// remaining-length varint.
    #[must_use]
    pub fn body_len(&self) -> usize { self.body_len }

    /// Total wire length of the frame.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::ValueTooLarge`] when the body exceeds the
    /// remaining-length encoding.
    pub fn frame_len(&self) -> Result<usize, EncodeError> {
        let body = u32::try_from(self.body_len).map_err(|_| EncodeError::ValueTooLarge {
            value: self.body_len,
        })?;
        varint::encode(body)?;
        Ok(1 + varint::encoded_len(body) + self.body_len)
    }
}

/// Compute the exact body length of `packet`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use tether::codec::encoder;
/// use tether::packet::{Packet, Publish, QoS};
///
/// let publish = Packet::Publish(Publish {
///     dup: false,
///     qos: QoS::AtLeastOnce,
///     retain: false,
///     topic: "topic1".into(),
///     packet_id: Some(1),
///     payload: Bytes::from_static(&[1, 2, 3]),
/// });
/// // 2 + 6 topic bytes, 2 packet identifier bytes, 3 payload bytes.
/// assert_eq!(encoder::estimate(&publish).body_len(), 13);
/// ```
#[must_use]
pub fn estimate(packet: &Packet) -> Estimated<'_> {
    let body_len = match packet {
        Packet::Connect(connect) => connect_body_len(connect),
        Packet::ConnAck(_) => 2,
        Packet::Publish(publish) => publish_body_len(publish),
        Packet::PubAck { .. }
        | Packet::PubRec { .. }
        | Packet::PubRel { .. }
        | Packet::PubComp { .. }
        | Packet::UnsubAck { .. } => 2,
        Packet::Subscribe(subscribe) => {
            2 + subscribe
                .filters
                .iter()
                .map(|(filter, _)| 2 + filter.len() + 1)
                .sum::<usize>()
        }
        Packet::SubAck(suback) => 2 + suback.return_codes.len(),
        Packet::Unsubscribe(unsubscribe) => {
            2 + unsubscribe
                .filters
                .iter()
                .map(|filter| 2 + filter.len())
                .sum::<usize>()
        }
        Packet::PingReq | Packet::PingResp | Packet::Disconnect => 0,
    };
    Estimated { packet, body_len }
}

fn connect_body_len(connect: &Connect) -> usize {
    let mut len = 10 + 2 + connect.client_id.len();
    if let Some(will) = &connect.will {
        len += 2 + will.topic.len() + 2 + will.payload.len();
    }
    if let Some(username) = &connect.username {
        len += 2 + username.len();
    }
    if let Some(password) = &connect.password {
        len += 2 + password.len();
    }
    len
}

fn publish_body_len(publish: &Publish) -> usize {
    let packet_id = if publish.qos == QoS::AtMostOnce { 0 } else { 2 };
    2 + publish.topic.len() + packet_id + publish.payload.len()
}

/// Encode `packets` into `dst`, returning the number of bytes written.
///
/// Frames are laid down in order: fixed header, remaining-length varint,
/// body. Nothing observable is written unless the whole batch fits.
///
/// # Errors
///
/// Returns [`EncodeError::BufferTooSmall`] when `dst` cannot hold every
/// frame, and layout errors ([`EncodeError::StringTooLong`],
/// [`EncodeError::MissingPacketId`], [`EncodeError::ValueTooLarge`]) when a
/// packet cannot be expressed on the wire.
///
/// # Examples
///
/// ```
/// use tether::codec::encoder;
/// use tether::packet::Packet;
///
/// let packets = [Packet::PingReq, Packet::Disconnect];
/// let estimates: Vec<_> = packets.iter().map(encoder::estimate).collect();
/// let mut buf = [0u8; 8];
/// let written = encoder::encode_many(&estimates, &mut buf).expect("buffer sized");
/// assert_eq!(&buf[..written], &[0xC0, 0x00, 0xE0, 0x00]);
/// ```
pub fn encode_many(packets: &[Estimated<'_>], dst: &mut [u8]) -> Result<usize, EncodeError> {
    let mut need = 0;
    for estimated in packets {
        need += estimated.frame_len()?;
    }
    if dst.len() < need {
        return Err(EncodeError::BufferTooSmall {
            need,
            have: dst.len(),
        });
    }

    let mut writer = Writer { dst, at: 0 };
    for estimated in packets {
        encode_frame(estimated, &mut writer)?;
    }
    Ok(writer.at)
}

/// Encode a single packet into `dst`.
///
/// # Errors
///
/// As [`encode_many`].
pub fn encode(packet: &Packet, dst: &mut [u8]) -> Result<usize, EncodeError> {
    encode_many(&[estimate(packet)], dst)
}

struct Writer<'a> {
    dst: &'a mut [u8],
    at: usize,
}

impl Writer<'_> {
    fn put_u8(&mut self, byte: u8) {
        self.dst[self.at] = byte;
        self.at += 1;
    }

    fn put_u16(&mut self, value: u16) {
        self.dst[self.at..self.at + 2].copy_from_slice(&value.to_be_bytes());
        self.at += 2;
    }

    fn put_slice(&mut self, bytes: &[u8]) {
        self.dst[self.at..self.at + bytes.len()].copy_from_slice(bytes);
        self.at += bytes.len();
    }

    fn put_string(&mut self, value: &str) -> Result<(), EncodeError> {
        self.put_prefixed(value.as_bytes())
    }

    fn put_prefixed(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| EncodeError::StringTooLong { len: bytes.len() })?;
        self.put_u16(len);
        self.put_slice(bytes);
        Ok(())
    }
}

fn encode_frame(estimated: &Estimated<'_>, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
    let packet = estimated.packet;
    writer.put_u8(fixed_header(packet)?);
    let body = u32::try_from(estimated.body_len).map_err(|_| EncodeError::ValueTooLarge {
        value: estimated.body_len,
    })?;
    writer.put_slice(varint::encode(body)?.as_slice());

    match packet {
        Packet::Connect(connect) => encode_connect(connect, writer)?,
        Packet::ConnAck(connack) => {
            writer.put_u8(u8::from(connack.session_present));
            writer.put_u8(connack.return_code as u8);
        }
        Packet::Publish(publish) => encode_publish(publish, writer)?,
        Packet::PubAck { packet_id }
        | Packet::PubRec { packet_id }
        | Packet::PubRel { packet_id }
        | Packet::PubComp { packet_id }
        | Packet::UnsubAck { packet_id } => writer.put_u16(*packet_id),
        Packet::Subscribe(subscribe) => encode_subscribe(subscribe, writer)?,
        Packet::SubAck(suback) => {
            writer.put_u16(suback.packet_id);
            for code in &suback.return_codes {
                writer.put_u8(match code {
                    SubscribeReturnCode::Success(qos) => *qos as u8,
                    SubscribeReturnCode::Failure => 0x80,
                });
            }
        }
        Packet::Unsubscribe(unsubscribe) => encode_unsubscribe(unsubscribe, writer)?,
        Packet::PingReq | Packet::PingResp | Packet::Disconnect => {}
    }
    Ok(())
}

fn fixed_header(packet: &Packet) -> Result<u8, EncodeError> {
    let type_nibble = (packet.packet_type() as u8) << 4;
    let flags = match packet {
        Packet::Publish(publish) => {
            if publish.qos != QoS::AtMostOnce && publish.packet_id.is_none() {
                return Err(EncodeError::MissingPacketId);
            }
            (u8::from(publish.dup) << 3) | ((publish.qos as u8) << 1) | u8::from(publish.retain)
        }
        Packet::PubRel { .. } | Packet::Subscribe(_) | Packet::Unsubscribe(_) => 0x02,
        _ => 0,
    };
    Ok(type_nibble | flags)
}

fn encode_connect(connect: &Connect, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
    writer.put_string("MQTT")?;
    writer.put_u8(4);

    let mut flags = 0u8;
    if connect.clean_session {
        flags |= 0x02;
    }
    if let Some(will) = &connect.will {
        flags |= 0x04 | ((will.qos as u8) << 3);
        if will.retain {
            flags |= 0x20;
        }
    }
    if connect.username.is_some() {
        flags |= 0x80;
    }
    if connect.password.is_some() {
        flags |= 0x40;
    }
    writer.put_u8(flags);
    writer.put_u16(connect.keep_alive);

    writer.put_string(&connect.client_id)?;
    if let Some(will) = &connect.will {
        writer.put_string(&will.topic)?;
        writer.put_prefixed(&will.payload)?;
    }
    if let Some(username) = &connect.username {
        writer.put_string(username)?;
    }
    if let Some(password) = &connect.password {
        writer.put_prefixed(password)?;
    }
    Ok(())
}

fn encode_publish(publish: &Publish, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
    writer.put_string(&publish.topic)?;
    if publish.qos != QoS::AtMostOnce {
        let packet_id = publish.packet_id.ok_or(EncodeError::MissingPacketId)?;
        writer.put_u16(packet_id);
    }
    writer.put_slice(&publish.payload);
    Ok(())
}

fn encode_subscribe(subscribe: &Subscribe, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
    writer.put_u16(subscribe.packet_id);
    for (filter, qos) in &subscribe.filters {
        writer.put_string(filter)?;
        writer.put_u8(*qos as u8);
    }
    Ok(())
}

fn encode_unsubscribe(unsubscribe: &Unsubscribe, writer: &mut Writer<'_>) -> Result<(), EncodeError> {
    writer.put_u16(unsubscribe.packet_id);
    for filter in &unsubscribe.filters {
        writer.put_string(filter)?;
    }
    Ok(())
}
