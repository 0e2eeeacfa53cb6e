//! End-to-end lifecycle scenarios against in-test TCP listeners: byte
//! exchange, forced kicks, reconnect exhaustion, and mid-handshake drops.
//! The reconnect cases double as shutdown-signal hygiene checks, since a
//! successor generation's loops must keep running after the predecessor's
//! token was cancelled.

mod common;

use std::time::Duration;

use common::{TICK, encode_into_cell, encode_to_vec, loopback_listener, next_packets, publish};
use tether::{
    buffer::BufferPool,
    codec::PacketDecoder,
    config::TransportConfig,
    packet::{ConnAck, Connect, ConnectReturnCode, Packet},
    transport::{ConnectionStatus, TerminationReason, Transport},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time::timeout,
};

const FRAME_SIZE: u32 = 4096;

fn test_config(port: u16, attempts: u32, interval_ms: u64) -> TransportConfig {
    TransportConfig::new("127.0.0.1", port)
        .max_frame_size(FRAME_SIZE)
        .max_reconnect_attempts(attempts)
        .reconnect_interval(Duration::from_millis(interval_ms))
}

async fn accept(listener: &TcpListener) -> tokio::net::TcpStream {
    let (conn, _) = timeout(TICK, listener.accept())
        .await
        .expect("client connects promptly")
        .expect("accept succeeds");
    conn
}

#[tokio::test]
async fn bytes_flow_both_ways_and_close_is_normal() {
    common::init_logging();
    let (listener, port) = loopback_listener().await;
    let pool = BufferPool::new(FRAME_SIZE as usize);
    let mut handle = Transport::spawn(test_config(port, 0, 100));
    handle
        .connect(Duration::from_secs(1))
        .await
        .expect("listener accepts");

    let mut conn = accept(&listener).await;

    // Outbound: one PUBLISH, byte-exact on the server side.
    let packet = publish("topic1", 1, &[0x01, 0x02, 0x03]);
    handle
        .write(encode_into_cell(&pool, &packet))
        .expect("channel open");
    let expected = encode_to_vec(std::slice::from_ref(&packet));
    let mut received = vec![0u8; expected.len()];
    timeout(TICK, conn.read_exact(&mut received))
        .await
        .expect("bytes arrive")
        .expect("socket readable");
    assert_eq!(received, expected);

    // Inbound: the server pushes a CONNACK, the decoder recovers it.
    let connack = Packet::ConnAck(ConnAck {
        session_present: false,
        return_code: ConnectReturnCode::Accepted,
    });
    conn.write_all(&encode_to_vec(std::slice::from_ref(&connack)))
        .await
        .expect("socket writable");
    let mut decoder = PacketDecoder::default();
    let packets = timeout(TICK, next_packets(&mut handle, &mut decoder))
        .await
        .expect("inbound bytes arrive");
    assert_eq!(packets, vec![connack]);

    handle.close();
    let reason = timeout(TICK, handle.wait_terminated())
        .await
        .expect("terminates promptly");
    assert_eq!(reason, TerminationReason::Normal);
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn forced_kick_reconnects_and_traffic_resumes() {
    common::init_logging();
    let (listener, port) = loopback_listener().await;
    let pool = BufferPool::new(FRAME_SIZE as usize);
    let mut handle = Transport::spawn(test_config(port, 5, 100));
    handle
        .connect(Duration::from_secs(1))
        .await
        .expect("listener accepts");

    // Kick: drop the server side of the first connection.
    let conn1 = accept(&listener).await;
    drop(conn1);

    // The transport notices, tears down, and redials on its own.
    timeout(TICK, handle.wait_for_status(|s| *s != ConnectionStatus::Connected))
        .await
        .expect("kick is observed")
        .expect("transport alive");
    let mut conn2 = accept(&listener).await;
    timeout(TICK, handle.wait_for_status(|s| *s == ConnectionStatus::Connected))
        .await
        .expect("reconnect completes")
        .expect("transport alive");

    // A publish enqueued after the kick lands on the new socket.
    let packet = publish("topic1", 7, &[0x0A, 0x0B]);
    handle
        .write(encode_into_cell(&pool, &packet))
        .expect("channel preserved across the reconnect");
    let expected = encode_to_vec(std::slice::from_ref(&packet));
    let mut received = vec![0u8; expected.len()];
    timeout(TICK, conn2.read_exact(&mut received))
        .await
        .expect("bytes arrive on the new socket")
        .expect("socket readable");
    assert_eq!(received, expected);

    // The subscribed topic keeps delivering: server-side pushes still
    // reach the session layer through the preserved inbound channel.
    let delivery = publish("topic1", 8, &[0x0C]);
    conn2
        .write_all(&encode_to_vec(std::slice::from_ref(&delivery)))
        .await
        .expect("socket writable");
    let mut decoder = PacketDecoder::default();
    let packets = timeout(TICK, next_packets(&mut handle, &mut decoder))
        .await
        .expect("delivery arrives");
    assert_eq!(packets, vec![delivery]);

    handle.close();
    assert_eq!(
        timeout(TICK, handle.wait_terminated()).await.expect("terminates"),
        TerminationReason::Normal,
    );
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn exhausted_reconnects_terminate_with_could_not_connect() {
    common::init_logging();
    let (listener, port) = loopback_listener().await;
    let mut handle = Transport::spawn(test_config(port, 1, 50));
    handle
        .connect(Duration::from_secs(1))
        .await
        .expect("listener accepts");

    // Shut the server down entirely, then kick the client.
    let conn = accept(&listener).await;
    drop(conn);
    drop(listener);

    let reason = timeout(TICK, handle.wait_terminated())
        .await
        .expect("budget of one attempt drains quickly");
    assert_eq!(reason, TerminationReason::CouldNotConnect);
    assert_eq!(handle.status(), ConnectionStatus::Failed);
}

#[tokio::test]
async fn server_absent_then_present() {
    common::init_logging();
    // Absent: nothing listens on the port and the budget is zero.
    let (listener, port) = loopback_listener().await;
    drop(listener);
    let mut handle = Transport::spawn(test_config(port, 0, 50));
    handle
        .connect(Duration::from_secs(1))
        .await
        .expect_err("nothing is listening");
    timeout(TICK, handle.wait_terminated())
        .await
        .expect("zero budget terminates at once");
    assert_eq!(handle.status(), ConnectionStatus::Failed);

    // Present: a server appears on the same port; a fresh transport
    // connects first try.
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("port is free again");
    let mut handle = Transport::spawn(test_config(port, 0, 50));
    handle
        .connect(Duration::from_secs(1))
        .await
        .expect("listener accepts");
    assert_eq!(handle.status(), ConnectionStatus::Connected);

    let _conn = accept(&listener).await;
    handle.close();
    assert_eq!(
        timeout(TICK, handle.wait_terminated()).await.expect("terminates"),
        TerminationReason::Normal,
    );
}

#[tokio::test]
async fn mid_handshake_drop_clears_pending_state() {
    common::init_logging();
    let (listener, port) = loopback_listener().await;
    let pool = BufferPool::new(FRAME_SIZE as usize);
    let mut handle = Transport::spawn(test_config(port, 5, 100));

    let connect_packet = Packet::Connect(Connect::new("tether-test", 30));
    let connect_bytes = encode_to_vec(std::slice::from_ref(&connect_packet));

    handle
        .connect(Duration::from_secs(1))
        .await
        .expect("listener accepts");

    // Attempt one: dropped before the handshake even starts.
    let conn1 = accept(&listener).await;
    drop(conn1);

    // Attempt two: the server takes the CONNECT, then vanishes without a
    // CONNACK.
    let mut conn2 = accept(&listener).await;
    timeout(TICK, handle.wait_for_status(|s| *s == ConnectionStatus::Connected))
        .await
        .expect("second attempt connects")
        .expect("transport alive");
    handle
        .write(encode_into_cell(&pool, &connect_packet))
        .expect("channel open");
    let mut received = vec![0u8; connect_bytes.len()];
    timeout(TICK, conn2.read_exact(&mut received))
        .await
        .expect("CONNECT arrives")
        .expect("socket readable");
    assert_eq!(received, connect_bytes);
    drop(conn2);

    // Attempt three: the handshake completes.
    let mut conn3 = accept(&listener).await;
    timeout(TICK, handle.wait_for_status(|s| *s == ConnectionStatus::Connected))
        .await
        .expect("third attempt connects")
        .expect("transport alive");
    handle
        .write(encode_into_cell(&pool, &connect_packet))
        .expect("channel open");
    let mut received = vec![0u8; connect_bytes.len()];
    timeout(TICK, conn3.read_exact(&mut received))
        .await
        .expect("CONNECT arrives again")
        .expect("socket readable");
    assert_eq!(received, connect_bytes);

    let connack = Packet::ConnAck(ConnAck {
        session_present: false,
        return_code: ConnectReturnCode::Accepted,
    });
    conn3
        .write_all(&encode_to_vec(std::slice::from_ref(&connack)))
        .await
        .expect("socket writable");
    let mut decoder = PacketDecoder::default();
    let packets = timeout(TICK, next_packets(&mut handle, &mut decoder))
        .await
        .expect("CONNACK arrives");
    assert_eq!(packets, vec![connack]);

    handle.close();
    assert_eq!(
        timeout(TICK, handle.wait_terminated()).await.expect("terminates"),
        TerminationReason::Normal,
    );
    assert_eq!(pool.outstanding(), 0);
}
