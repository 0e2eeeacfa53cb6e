//! Typed MQTT 3.1.1 control packets.
//!
//! These types model the packets a client transport moves across the wire.
//! Wire-level framing lives in [`crate::codec`]; nothing here knows about
//! remaining-length varints or fixed headers beyond the type nibble.

use bytes::Bytes;

use crate::codec::error::DecodeError;

/// MQTT control packet type (the high nibble of the fixed header).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Client request to connect to a server.
    Connect = 1,
    /// Connect acknowledgement.
    ConnAck = 2,
    /// Publish message.
    Publish = 3,
    /// Publish acknowledgement (QoS 1).
    PubAck = 4,
    /// Publish received (QoS 2, part 1).
    PubRec = 5,
    /// Publish release (QoS 2, part 2).
    PubRel = 6,
    /// Publish complete (QoS 2, part 3).
    PubComp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgement.
    SubAck = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgement.
    UnsubAck = 11,
    /// Ping request.
    PingReq = 12,
    /// Ping response.
    PingResp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Connect),
            2 => Ok(Self::ConnAck),
            3 => Ok(Self::Publish),
            4 => Ok(Self::PubAck),
            5 => Ok(Self::PubRec),
            6 => Ok(Self::PubRel),
            7 => Ok(Self::PubComp),
            8 => Ok(Self::Subscribe),
            9 => Ok(Self::SubAck),
            10 => Ok(Self::Unsubscribe),
            11 => Ok(Self::UnsubAck),
            12 => Ok(Self::PingReq),
            13 => Ok(Self::PingResp),
            14 => Ok(Self::Disconnect),
            other => Err(DecodeError::InvalidPacketType(other)),
        }
    }
}

/// Quality-of-service level for a published message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce = 0,
    /// Acknowledged delivery (PUBACK).
    AtLeastOnce = 1,
    /// Assured delivery (PUBREC/PUBREL/PUBCOMP).
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(DecodeError::malformed("PUBLISH", "invalid QoS level")),
        }
    }
}

/// CONNACK return codes defined by MQTT 3.1.1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted = 0,
    /// The server does not support this protocol revision.
    UnacceptableProtocolVersion = 1,
    /// The client identifier was rejected.
    IdentifierRejected = 2,
    /// The service is unavailable.
    ServerUnavailable = 3,
    /// The user name or password is malformed.
    BadCredentials = 4,
    /// The client is not authorised to connect.
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::UnacceptableProtocolVersion),
            2 => Ok(Self::IdentifierRejected),
            3 => Ok(Self::ServerUnavailable),
            4 => Ok(Self::BadCredentials),
            5 => Ok(Self::NotAuthorized),
            _ => Err(DecodeError::malformed("CONNACK", "unknown return code")),
        }
    }
}

/// Per-filter result carried by a SUBACK packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeReturnCode {
    /// The subscription was accepted at the given maximum QoS.
    Success(QoS),
    /// The subscription was refused.
    Failure,
}

/// Will message registered at connect time and published by the server on an
/// ungraceful disconnect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastWill {
    /// Topic the will is published to.
    pub topic: String,
    /// Will payload.
    pub payload: Bytes,
    /// QoS the will is published at.
    pub qos: QoS,
    /// Whether the will is retained.
    pub retain: bool,
}

/// CONNECT packet fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connect {
    /// Client identifier presented to the server.
    pub client_id: String,
    /// Request a clean session (discard server-side state).
    pub clean_session: bool,
    /// Keep-alive interval in seconds; zero disables the mechanism.
    pub keep_alive: u16,
    /// Optional will message.
    pub will: Option<LastWill>,
    /// Optional user name.
    pub username: Option<String>,
    /// Optional password; only valid when a user name is present.
    pub password: Option<Bytes>,
}

impl Connect {
    /// Build a minimal clean-session CONNECT for the given client identifier.
    #[must_use]
    pub fn new(client_id: impl Into<String>, keep_alive: u16) -> Self {
        Self {
            client_id: client_id.into(),
            clean_session: true,
            keep_alive,
            will: None,
            username: None,
            password: None,
        }
    }
}

/// CONNACK packet fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnAck {
    /// Whether the server resumed a stored session.
    pub session_present: bool,
    /// Outcome of the connect request.
    pub return_code: ConnectReturnCode,
}

/// PUBLISH packet fields.
///
/// The packet identifier is `None` exactly when `qos` is
/// [`QoS::AtMostOnce`]; the encoder rejects any other combination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publish {
    /// Duplicate-delivery flag.
    pub dup: bool,
    /// Delivery QoS, taken from the fixed-header flag bits on decode.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
    /// Topic name the message is published to.
    pub topic: String,
    /// Packet identifier for QoS 1 and 2 deliveries.
    pub packet_id: Option<u16>,
    /// Application payload.
    pub payload: Bytes,
}

/// SUBSCRIBE packet fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
    /// Identifier correlating the eventual SUBACK.
    pub packet_id: u16,
    /// Requested `(topic filter, maximum QoS)` pairs; never empty on the wire.
    pub filters: Vec<(String, QoS)>,
}

/// SUBACK packet fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubAck {
    /// Identifier of the SUBSCRIBE being acknowledged.
    pub packet_id: u16,
    /// One result per requested filter, in request order.
    pub return_codes: Vec<SubscribeReturnCode>,
}

/// UNSUBSCRIBE packet fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsubscribe {
    /// Identifier correlating the eventual UNSUBACK.
    pub packet_id: u16,
    /// Topic filters to remove; never empty on the wire.
    pub filters: Vec<String>,
}

/// A fully decoded MQTT 3.1.1 control packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    /// Client connect request.
    Connect(Connect),
    /// Connect acknowledgement.
    ConnAck(ConnAck),
    /// Application message.
    Publish(Publish),
    /// QoS 1 acknowledgement.
    PubAck {
        /// Identifier of the PUBLISH being acknowledged.
        packet_id: u16,
    },
    /// QoS 2 receipt.
    PubRec {
        /// Identifier of the PUBLISH being acknowledged.
        packet_id: u16,
    },
    /// QoS 2 release.
    PubRel {
        /// Identifier of the exchange being released.
        packet_id: u16,
    },
    /// QoS 2 completion.
    PubComp {
        /// Identifier of the completed exchange.
        packet_id: u16,
    },
    /// Subscription request.
    Subscribe(Subscribe),
    /// Subscription acknowledgement.
    SubAck(SubAck),
    /// Unsubscription request.
    Unsubscribe(Unsubscribe),
    /// Unsubscription acknowledgement.
    UnsubAck {
        /// Identifier of the UNSUBSCRIBE being acknowledged.
        packet_id: u16,
    },
    /// Keep-alive probe.
    PingReq,
    /// Keep-alive response.
    PingResp,
    /// Graceful disconnect notice.
    Disconnect,
}

impl Packet {
    /// The control packet type nibble for this packet.
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Connect(_) => PacketType::Connect,
            Self::ConnAck(_) => PacketType::ConnAck,
            Self::Publish(_) => PacketType::Publish,
            Self::PubAck { .. } => PacketType::PubAck,
            Self::PubRec { .. } => PacketType::PubRec,
            Self::PubRel { .. } => PacketType::PubRel,
            Self::PubComp { .. } => PacketType::PubComp,
            Self::Subscribe(_) => PacketType::Subscribe,
            Self::SubAck(_) => PacketType::SubAck,
            Self::Unsubscribe(_) => PacketType::Unsubscribe,
            Self::UnsubAck { .. } => PacketType::UnsubAck,
            Self::PingReq => PacketType::PingReq,
            Self::PingResp => PacketType::PingResp,
            Self::Disconnect => PacketType::Disconnect,
        }
    }
}
