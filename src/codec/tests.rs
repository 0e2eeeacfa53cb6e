//! Unit tests for the codec: encode/decode agreement, split-feed
//! behaviour, and malformed-input handling.

use bytes::Bytes;
use proptest::prelude::*;
use rstest::rstest;

use super::{PacketDecoder, encoder, error::DecodeError, varint};
use crate::packet::{
    ConnAck,
    Connect,
    ConnectReturnCode,
    Packet,
    Publish,
    QoS,
    SubAck,
    Subscribe,
    SubscribeReturnCode,
    Unsubscribe,
};

fn publish(topic: &str, packet_id: u16, payload: &'static [u8]) -> Packet {
    Packet::Publish(Publish {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: topic.to_owned(),
        packet_id: Some(packet_id),
        payload: Bytes::from_static(payload),
    })
}

fn encode_all(packets: &[Packet]) -> Vec<u8> {
    let estimates: Vec<_> = packets.iter().map(encoder::estimate).collect();
    let need: usize = estimates
        .iter()
        .map(|e| e.frame_len().expect("frame length fits"))
        .sum();
    let mut buf = vec![0u8; need];
    let written = encoder::encode_many(&estimates, &mut buf).expect("buffer sized to estimates");
    assert_eq!(written, need, "estimate and encoder disagree on length");
    buf
}

#[test]
fn connect_encodes_to_reference_bytes() {
    let bytes = encode_all(&[Packet::Connect(Connect::new("tether", 60))]);
    let expected = [
        0x10, 0x12, // CONNECT, remaining length 18
        0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, // variable header
        0x00, 0x06, b't', b'e', b't', b'h', b'e', b'r', // client identifier
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn qos1_publish_encodes_to_reference_bytes() {
    let bytes = encode_all(&[publish("topic1", 1, &[0x01, 0x02, 0x03])]);
    let expected = [
        0x32, 0x0D, // PUBLISH QoS 1, remaining length 13
        0x00, 0x06, b't', b'o', b'p', b'i', b'c', b'1', // topic
        0x00, 0x01, // packet identifier
        0x01, 0x02, 0x03, // payload
    ];
    assert_eq!(bytes, expected);
}

#[rstest]
#[case(Packet::PingReq, &[0xC0, 0x00])]
#[case(Packet::PingResp, &[0xD0, 0x00])]
#[case(Packet::Disconnect, &[0xE0, 0x00])]
#[case(Packet::PubAck { packet_id: 7 }, &[0x40, 0x02, 0x00, 0x07])]
#[case(Packet::PubRel { packet_id: 7 }, &[0x62, 0x02, 0x00, 0x07])]
fn small_packets_encode_to_reference_bytes(#[case] packet: Packet, #[case] expected: &[u8]) {
    assert_eq!(encode_all(&[packet]), expected);
}

#[rstest]
#[case(Packet::Connect(Connect {
    client_id: "sensor-1".into(),
    clean_session: false,
    keep_alive: 30,
    will: Some(crate::packet::LastWill {
        topic: "status".into(),
        payload: Bytes::from_static(b"gone"),
        qos: QoS::AtLeastOnce,
        retain: true,
    }),
    username: Some("user".into()),
    password: Some(Bytes::from_static(b"secret")),
}))]
#[case(Packet::ConnAck(ConnAck {
    session_present: true,
    return_code: ConnectReturnCode::Accepted,
}))]
#[case(publish("a/b", 9, &[0xFF]))]
#[case(Packet::Publish(Publish {
    dup: true,
    qos: QoS::AtMostOnce,
    retain: true,
    topic: "qos0".into(),
    packet_id: None,
    payload: Bytes::new(),
}))]
#[case(Packet::Subscribe(Subscribe {
    packet_id: 3,
    filters: vec![("topic1".into(), QoS::AtLeastOnce), ("a/+".into(), QoS::ExactlyOnce)],
}))]
#[case(Packet::SubAck(SubAck {
    packet_id: 3,
    return_codes: vec![
        SubscribeReturnCode::Success(QoS::AtLeastOnce),
        SubscribeReturnCode::Failure,
    ],
}))]
#[case(Packet::Unsubscribe(Unsubscribe {
    packet_id: 4,
    filters: vec!["topic1".into(), "a/+".into()],
}))]
#[case(Packet::UnsubAck { packet_id: 4 })]
#[case(Packet::PubRec { packet_id: 5 })]
#[case(Packet::PubComp { packet_id: 5 })]
fn encoded_packets_decode_back(#[case] packet: Packet) {
    let bytes = encode_all(std::slice::from_ref(&packet));
    let mut decoder = PacketDecoder::default();
    let outcome = decoder.try_decode(&bytes).expect("well formed");
    assert_eq!(outcome.packets, vec![packet]);
    assert_eq!(decoder.buffered(), 0);
}

#[test]
fn split_publish_survives_any_boundary() {
    let bytes = encode_all(&[publish("topic1", 1, &[0x01, 0x02, 0x03])]);
    for split in 1..bytes.len() {
        let mut decoder = PacketDecoder::default();
        let first = decoder.try_decode(&bytes[..split]).expect("well formed");
        let second = decoder.try_decode(&bytes[split..]).expect("well formed");
        let mut packets = first.packets;
        packets.extend(second.packets);
        assert_eq!(
            packets,
            vec![publish("topic1", 1, &[0x01, 0x02, 0x03])],
            "split at byte {split}",
        );
    }
}

#[test]
fn mixed_sequence_decodes_in_one_feed() {
    let expected = vec![
        publish("topic1", 1, &[0x01, 0x02, 0x03]),
        publish("topic2", 2, &[0x04, 0x05, 0x06]),
        Packet::PingResp,
        publish("topic3", 3, &[0x07, 0x08, 0x09]),
    ];
    let bytes = encode_all(&expected);
    let mut decoder = PacketDecoder::default();
    let outcome = decoder.try_decode(&bytes).expect("well formed");
    assert!(outcome.consumed);
    assert_eq!(outcome.packets, expected);
}

#[test]
fn byte_at_a_time_feed_matches_single_feed() {
    let expected = vec![
        publish("topic1", 1, &[0x01, 0x02, 0x03]),
        Packet::PingResp,
        Packet::SubAck(SubAck {
            packet_id: 1,
            return_codes: vec![SubscribeReturnCode::Success(QoS::AtLeastOnce)],
        }),
    ];
    let bytes = encode_all(&expected);
    let mut decoder = PacketDecoder::default();
    let mut packets = Vec::new();
    for byte in &bytes {
        packets.extend(
            decoder
                .try_decode(std::slice::from_ref(byte))
                .expect("well formed")
                .packets,
        );
    }
    assert_eq!(packets, expected);
}

#[test]
fn lone_header_byte_is_not_an_error() {
    let mut decoder = PacketDecoder::default();
    let outcome = decoder.try_decode(&[0x30]).expect("incomplete, not malformed");
    assert!(!outcome.consumed);
    assert!(outcome.packets.is_empty());
    assert_eq!(decoder.buffered(), 1);
}

#[test]
fn partial_varint_leaves_decoder_ready() {
    let mut decoder = PacketDecoder::default();
    // PUBLISH header plus a continuation byte: nothing to emit yet.
    let outcome = decoder.try_decode(&[0x30, 0x80]).expect("incomplete");
    assert!(outcome.packets.is_empty());

    // 0x01 completes the varint: remaining length 128. Supply the body.
    let mut body = vec![0x01];
    let mut payload = vec![0x00, 0x04, b't', b'e', b's', b't'];
    payload.extend(std::iter::repeat_n(0xAB, 128 - payload.len()));
    body.extend(&payload);
    let outcome = decoder.try_decode(&body).expect("well formed");
    assert_eq!(outcome.packets.len(), 1);
    assert_eq!(decoder.buffered(), 0);
}

#[test]
fn malformed_varint_poisons_the_decoder() {
    let mut decoder = PacketDecoder::default();
    let err = decoder
        .try_decode(&[0x30, 0x80, 0x80, 0x80, 0x80])
        .expect_err("fourth continuation byte is malformed");
    assert_eq!(err, DecodeError::MalformedVarint);
    assert_eq!(
        decoder.try_decode(&[0xC0, 0x00]).expect_err("poisoned"),
        DecodeError::Poisoned,
    );
}

#[test]
fn announced_body_beyond_cap_is_rejected_before_arrival() {
    let mut decoder = PacketDecoder::new(64);
    // PUBLISH announcing a 1000 byte body.
    let err = decoder
        .try_decode(&[0x30, 0xE8, 0x07])
        .expect_err("body exceeds the cap");
    assert_eq!(err, DecodeError::OversizedPacket { size: 1000, max: 64 });
}

#[test]
fn truncated_length_prefix_is_malformed() {
    // SUBACK announcing a 1 byte body: packet identifier cannot fit.
    let mut decoder = PacketDecoder::default();
    let err = decoder
        .try_decode(&[0x90, 0x01, 0x00])
        .expect_err("body shorter than its layout");
    assert_eq!(
        err,
        DecodeError::malformed("SUBACK", "body truncated"),
    );
}

#[test]
fn reserved_packet_type_is_rejected() {
    let mut decoder = PacketDecoder::default();
    let err = decoder
        .try_decode(&[0x00, 0x00])
        .expect_err("type nibble 0 is reserved");
    assert_eq!(err, DecodeError::InvalidPacketType(0));
}

#[test]
fn subscribe_with_wrong_flags_is_rejected() {
    // SUBSCRIBE must carry flag nibble 0b0010.
    let bytes = [0x80, 0x0B, 0x00, 0x01, 0x00, 0x06, b't', b'o', b'p', b'i', b'c', b'1', 0x01];
    let mut decoder = PacketDecoder::default();
    let err = decoder.try_decode(&bytes).expect_err("reserved flags");
    assert_eq!(
        err,
        DecodeError::malformed("SUBSCRIBE", "reserved flag bits set"),
    );
}

#[test]
fn buffer_too_small_reports_requirements() {
    let packet = publish("topic1", 1, &[0x01, 0x02, 0x03]);
    let estimates = [encoder::estimate(&packet)];
    let mut buf = [0u8; 4];
    let err = encoder::encode_many(&estimates, &mut buf).expect_err("buffer undersized");
    assert_eq!(
        err,
        crate::codec::EncodeError::BufferTooSmall { need: 15, have: 4 },
    );
}

#[test]
fn qos1_publish_without_packet_id_is_rejected() {
    let packet = Packet::Publish(Publish {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: "t".into(),
        packet_id: None,
        payload: Bytes::new(),
    });
    let mut buf = [0u8; 32];
    assert_eq!(
        encoder::encode(&packet, &mut buf).expect_err("identifier required"),
        crate::codec::EncodeError::MissingPacketId,
    );
}

proptest! {
    #[test]
    fn varint_round_trips(value in 0u32..=varint::MAX_REMAINING_LENGTH) {
        let encoded = varint::encode(value).expect("value in range");
        prop_assert_eq!(
            varint::try_decode(encoded.as_slice()).expect("well formed"),
            varint::VarintDecode::Done { value, consumed: encoded.len() },
        );
    }

    #[test]
    fn publish_round_trips_across_arbitrary_splits(
        topic in "[a-z0-9/]{1,24}",
        packet_id in 1u16..,
        payload in proptest::collection::vec(any::<u8>(), 0..256),
        split_seed in any::<usize>(),
    ) {
        let packet = Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic,
            packet_id: Some(packet_id),
            payload: Bytes::from(payload),
        });
        let bytes = encode_all(std::slice::from_ref(&packet));
        let split = 1 + split_seed % (bytes.len() - 1);

        let mut decoder = PacketDecoder::default();
        let mut packets = decoder.try_decode(&bytes[..split]).expect("well formed").packets;
        packets.extend(decoder.try_decode(&bytes[split..]).expect("well formed").packets);
        prop_assert_eq!(packets, vec![packet]);
    }
}
