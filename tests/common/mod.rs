//! Shared helpers for the transport integration suites.

use std::time::Duration;

use bytes::Bytes;
use tether::{
    buffer::{BufferCell, BufferPool},
    codec::encoder,
    packet::{Packet, Publish, QoS},
    transport::TransportHandle,
};
use tokio::net::TcpListener;

/// Generous bound for anything that should complete quickly on loopback.
pub const TICK: Duration = Duration::from_secs(5);

/// Initialise test logging once per process; repeat calls are no-ops.
pub fn init_logging() { let _ = env_logger::builder().is_test(true).try_init(); }

/// Bind a loopback listener on an ephemeral port.
pub async fn loopback_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

/// A QoS 1 PUBLISH with the given identity.
pub fn publish(topic: &str, packet_id: u16, payload: &'static [u8]) -> Packet {
    Packet::Publish(Publish {
        dup: false,
        qos: QoS::AtLeastOnce,
        retain: false,
        topic: topic.to_owned(),
        packet_id: Some(packet_id),
        payload: Bytes::from_static(payload),
    })
}

/// Encode packets into a fresh vector sized from the estimates.
pub fn encode_to_vec(packets: &[Packet]) -> Vec<u8> {
    let estimates: Vec<_> = packets.iter().map(encoder::estimate).collect();
    let need: usize = estimates
        .iter()
        .map(|e| e.frame_len().expect("frame fits"))
        .sum();
    let mut buf = vec![0u8; need];
    let written = encoder::encode_many(&estimates, &mut buf).expect("buffer sized");
    assert_eq!(written, need);
    buf
}

/// Rent a cell from `pool` and fill it with the encoding of `packet`.
pub fn encode_into_cell(pool: &BufferPool, packet: &Packet) -> BufferCell {
    let mut cell = pool.rent();
    let written = encoder::encode(packet, cell.as_mut_slice()).expect("cell sized to pool");
    cell.set_len(written);
    cell
}

/// Read inbound cells until `decoder` produces at least one packet.
pub async fn next_packets(
    handle: &mut TransportHandle,
    decoder: &mut tether::codec::PacketDecoder,
) -> Vec<Packet> {
    loop {
        let cell = handle
            .read()
            .await
            .expect("inbound channel open while waiting for packets");
        let outcome = decoder.try_decode(cell.bytes()).expect("well-formed bytes");
        if !outcome.packets.is_empty() {
            return outcome.packets;
        }
    }
}
