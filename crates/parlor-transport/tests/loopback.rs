//! Integration tests over real loopback sockets.
//!
//! Each test binds port 0 so the OS picks a free port, then connects a
//! plain `TcpStream` as the remote side.

use std::time::Duration;

use parlor_protocol::{ConnectionKind, LobbyEvent, LobbyRequest};
use parlor_transport::{
    spawn_writer, Connection, ConnectionId, Listener, Outbound, PollResult,
    SocketMultiplexer, TransportError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const SHORT: Duration = Duration::from_millis(100);

/// Helper: a connected (server side, client side) pair of streams.
async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = Listener::bind("127.0.0.1:0").await.expect("should bind");
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.expect("should connect");
    let (_, server, _) = listener.accept().await.expect("should accept");
    (server, client)
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_announces_kind_then_exchanges_messages() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut conn = Connection::connect(addr, ConnectionKind::Client, SHORT * 10)
            .await
            .unwrap();
        conn.send(&LobbyRequest::Logout).await.unwrap();
        conn.recv::<LobbyEvent>().await.unwrap()
    });

    let (id, mut stream, _) = listener.accept().await.unwrap();
    let mut kind = [0u8; 1];
    stream.read_exact(&mut kind).await.unwrap();
    assert_eq!(ConnectionKind::try_from(kind[0]).unwrap(), ConnectionKind::Client);

    let mut server = Connection::new(id, stream, SHORT * 10);
    assert_eq!(server.recv::<LobbyRequest>().await.unwrap(), LobbyRequest::Logout);
    server.send(&LobbyEvent::LoggedOut).await.unwrap();

    assert_eq!(client.await.unwrap(), LobbyEvent::LoggedOut);
}

#[tokio::test]
async fn test_recv_times_out_without_closing() {
    let (server, mut client) = socket_pair().await;
    let mut conn = Connection::new(ConnectionId::next(), server, SHORT);

    let err = conn.recv::<LobbyRequest>().await.unwrap_err();
    assert!(matches!(err, TransportError::TimedOut));
    assert!(!err.is_fatal());

    // The connection still works after a timeout.
    let frame = parlor_protocol::WireMessage::encode(&LobbyRequest::ListRooms)
        .unwrap()
        .to_frame();
    client.write_all(&frame).await.unwrap();
    assert_eq!(conn.recv::<LobbyRequest>().await.unwrap(), LobbyRequest::ListRooms);
}

#[tokio::test]
async fn test_recv_reports_closed_peer() {
    let (server, client) = socket_pair().await;
    drop(client);
    let mut conn = Connection::new(ConnectionId::next(), server, SHORT);
    assert!(matches!(
        conn.recv::<LobbyRequest>().await,
        Err(TransportError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_recv_rejects_unknown_tag() {
    let (server, mut client) = socket_pair().await;
    client.write_all(&[1, 0, 0x7F]).await.unwrap();
    let mut conn = Connection::new(ConnectionId::next(), server, SHORT);
    let err = conn.recv::<LobbyRequest>().await.unwrap_err();
    assert!(matches!(err, TransportError::Protocol(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_writer_task_sends_in_order_then_closes() {
    let (server, client) = socket_pair().await;
    let (_reader, writer) =
        Connection::new(ConnectionId::next(), server, SHORT).into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = spawn_writer::<LobbyEvent>(writer, rx);

    for name in ["ann", "bob", "cat"] {
        tx.send(Outbound::Send(LobbyEvent::UserOnline { username: name.into() }))
            .unwrap();
    }
    tx.send(Outbound::Close).unwrap();
    handle.await.unwrap();

    let mut remote = Connection::new(ConnectionId::next(), client, SHORT * 10);
    for name in ["ann", "bob", "cat"] {
        assert_eq!(
            remote.recv::<LobbyEvent>().await.unwrap(),
            LobbyEvent::UserOnline { username: name.into() }
        );
    }
    assert!(matches!(
        remote.recv::<LobbyEvent>().await,
        Err(TransportError::ConnectionClosed)
    ));
}

// ---------------------------------------------------------------------------
// SocketMultiplexer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_poll_reports_data_ready() {
    let (quiet_server, _quiet_client) = socket_pair().await;
    let (busy_server, mut busy_client) = socket_pair().await;
    let quiet = ConnectionId::next();
    let busy = ConnectionId::next();

    let mut mux = SocketMultiplexer::new();
    mux.add_socket(quiet, quiet_server);
    mux.add_socket(busy, busy_server);

    busy_client.write_all(&[0x00]).await.unwrap();

    assert_eq!(mux.poll().await, PollResult::DataReady);
    assert_eq!(mux.ready_sockets(), &[busy]);

    let mut byte = [0u8; 1];
    let n = mux.socket(busy).unwrap().try_read(&mut byte).unwrap();
    assert_eq!((n, byte[0]), (1, 0x00));
}

#[tokio::test]
async fn test_poll_reports_expired_deadline_once() {
    let (server, _client) = socket_pair().await;
    let mut mux = SocketMultiplexer::new();
    mux.add_socket(ConnectionId::next(), server);
    mux.set_expire_time(Some(SHORT));

    assert_eq!(mux.poll().await, PollResult::TimeExpired);

    // One-shot: with no deadline and no data, poll now blocks.
    let again = tokio::time::timeout(SHORT * 2, mux.poll()).await;
    assert!(again.is_err(), "poll should still be waiting");
}

#[tokio::test]
async fn test_awake_from_another_task_interrupts_poll() {
    let (server, _client) = socket_pair().await;
    let mut mux = SocketMultiplexer::new();
    mux.add_socket(ConnectionId::next(), server);

    let interrupter = mux.interrupter();
    tokio::spawn(async move {
        tokio::time::sleep(SHORT).await;
        interrupter.awake();
    });

    let result = tokio::time::timeout(SHORT * 20, mux.poll())
        .await
        .expect("awake should unblock poll");
    assert_eq!(result, PollResult::NoAction);
}

#[tokio::test]
async fn test_awake_before_poll_is_not_lost() {
    let mut mux = SocketMultiplexer::new();
    mux.interrupter().awake();
    let result = tokio::time::timeout(SHORT, mux.poll()).await.unwrap();
    assert_eq!(result, PollResult::NoAction);
}

#[tokio::test]
async fn test_removed_socket_is_not_watched() {
    let (server, mut client) = socket_pair().await;
    let id = ConnectionId::next();
    let mut mux = SocketMultiplexer::new();
    mux.add_socket(id, server);
    assert!(mux.remove_socket(id));
    assert!(mux.is_empty());

    // Writing to a closed socket may fail; either way poll must not
    // report it.
    let _ = client.write_all(&[0x01]).await;
    mux.set_expire_time(Some(SHORT));
    assert_eq!(mux.poll().await, PollResult::TimeExpired);
}

#[tokio::test]
async fn test_take_socket_returns_stream() {
    let (server, mut client) = socket_pair().await;
    let id = ConnectionId::next();
    let mut mux = SocketMultiplexer::new();
    mux.add_socket(id, server);

    client.write_all(b"x").await.unwrap();
    assert_eq!(mux.poll().await, PollResult::DataReady);

    let mut stream = mux.take_socket(id).unwrap();
    assert!(mux.ready_sockets().is_empty());
    let mut byte = [0u8; 1];
    stream.read_exact(&mut byte).await.unwrap();
    assert_eq!(&byte, b"x");
}
