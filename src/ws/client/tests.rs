use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{
        self,
        handshake::server::{ErrorResponse, Request, Response},
        protocol::{frame::coding::CloseCode, CloseFrame},
    },
    WebSocketStream,
};

use super::*;

type ServerSide = WebSocketStream<TcpStream>;

struct TestServer {
    url: String,
    accepted: mpsc::UnboundedReceiver<ServerSide>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/events/", listener.local_addr().unwrap());
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(s) => s,
                    Err(_) => break,
                };
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });

        Self { url, accepted }
    }

    async fn next_client(&mut self) -> ServerSide {
        timeout(Duration::from_secs(5), self.accepted.recv())
            .await
            .expect("no client connected in time")
            .unwrap()
    }
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws/events/", addr)
}

fn fast_options() -> ConnectionOptions {
    ConnectionOptions {
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        },
        heartbeat_interval: Duration::from_secs(30),
        ..ConnectionOptions::default()
    }
}

/// Listener that accepts tcp connections but never answers the handshake.
async fn silent_server() -> (String, mpsc::UnboundedReceiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/events/", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if tx.send(stream).is_err() {
                break;
            }
        }
    });

    (url, rx)
}

fn record(conn: &Connection) -> mpsc::UnboundedReceiver<ConnectionEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        conn.on(kind, move |e: &ConnectionEvent| {
            let _ = tx.send(e.clone());
        });
    }
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event in time")
        .unwrap()
}

async fn no_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>, wait: Duration) {
    if let Ok(Some(e)) = timeout(wait, rx.recv()).await {
        panic!("unexpected event {:?}", e);
    }
}

async fn next_text(server: &mut ServerSide) -> String {
    loop {
        let frame = timeout(Duration::from_secs(5), server.next())
            .await
            .expect("no frame in time")
            .unwrap()
            .unwrap();
        if let tungstenite::Message::Text(text) = frame {
            return text;
        }
    }
}

#[tokio::test]
async fn test_open_receive_and_send() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&server.url, Some("t0ken"));
    assert_eq!(conn.state(), ConnectionState::Connecting);

    let mut peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));
    assert!(conn.is_connected());

    peer.send(tungstenite::Message::Text(
        r#"{"type": "new_event", "event": {"id": "evt_1"}}"#.to_string(),
    ))
    .await
    .unwrap();

    match next_event(&mut events).await {
        ConnectionEvent::Message(msg) => {
            assert_eq!(msg.kind(), "new_event");
            assert_eq!(msg.item().unwrap().id().as_str(), "evt_1");
        }
        other => panic!("expected message, got {:?}", other),
    }

    assert!(conn.send(Message::Ping));
    assert_eq!(next_text(&mut peer).await, r#"{"type":"ping"}"#);

    conn.close();
}

#[tokio::test]
async fn test_token_in_handshake_url() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/activity/", listener.local_addr().unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = tx.send(req.uri().to_string());
            Ok(resp)
        };
        let _ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let conn = Connection::with_options(fast_options());
    conn.connect(&url, Some("abc"));

    let uri = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(uri, "/ws/activity/?token=abc");

    conn.close();
}

#[tokio::test]
async fn test_malformed_frame_is_not_fatal() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&server.url, None);
    let mut peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));

    peer.send(tungstenite::Message::Text("{not json".to_string()))
        .await
        .unwrap();
    peer.send(tungstenite::Message::Text(r#"{"type": "pong"}"#.to_string()))
        .await
        .unwrap();

    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Error(_)));
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Message(_)));
    assert_eq!(conn.state(), ConnectionState::Connected);

    conn.close();
}

#[tokio::test]
async fn test_heartbeat_pings() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(ConnectionOptions {
        heartbeat_interval: Duration::from_millis(50),
        ..fast_options()
    });

    conn.connect(&server.url, None);
    let mut peer = server.next_client().await;

    assert_eq!(next_text(&mut peer).await, r#"{"type":"ping"}"#);
    assert_eq!(next_text(&mut peer).await, r#"{"type":"ping"}"#);

    conn.close();
}

#[tokio::test]
async fn test_abnormal_drop_reconnects() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&server.url, None);
    let peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));

    // no close frame
    drop(peer);

    match next_event(&mut events).await {
        ConnectionEvent::Close { code, .. } => assert_eq!(code, 1006),
        other => panic!("expected close, got {:?}", other),
    }

    let _peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));
    assert_eq!(conn.reconnect_attempts(), 0);

    conn.close();
}

#[tokio::test]
async fn test_normal_server_close_does_not_reconnect() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&server.url, None);
    let mut peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));

    peer.close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "bye".into(),
    }))
    .await
    .unwrap();

    match next_event(&mut events).await {
        ConnectionEvent::Close { code, reason } => {
            assert_eq!(code, 1000);
            assert_eq!(reason, "bye");
        }
        other => panic!("expected close, got {:?}", other),
    }

    no_event(&mut events, Duration::from_millis(200)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(server.accepted.try_recv().is_err());
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&closed_port_url(), None);

    let mut closes = 0;
    loop {
        match next_event(&mut events).await {
            ConnectionEvent::Close { code, .. } => {
                assert_eq!(code, 1006);
                closes += 1;
            }
            ConnectionEvent::Error(e) => {
                assert!(matches!(*e, ConnectionError::ConnectFailed { .. }))
            }
            ConnectionEvent::MaxReconnectAttemptsReached => break,
            other => panic!("unexpected event {:?}", other),
        }
    }

    // first attempt plus five retries
    assert_eq!(closes, 6);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(conn.reconnect_attempts(), 5);

    no_event(&mut events, Duration::from_millis(200)).await;

    // explicit connect starts over
    conn.connect(&closed_port_url(), None);
    assert_eq!(conn.reconnect_attempts(), 0);
    assert_eq!(conn.state(), ConnectionState::Connecting);

    conn.close();
}

#[tokio::test]
async fn test_invalid_url_enters_backoff() {
    let conn = Connection::with_options(ConnectionOptions {
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_secs(10),
            ..fast_options().reconnect
        },
        ..fast_options()
    });
    let mut events = record(&conn);

    conn.connect("http://localhost/ws/events/", None);

    match next_event(&mut events).await {
        ConnectionEvent::Error(e) => assert!(matches!(*e, ConnectionError::InvalidURL { .. })),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Close { .. }));
    assert_eq!(conn.state(), ConnectionState::Backoff);
    assert_eq!(conn.reconnect_attempts(), 1);

    conn.close();
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(ConnectionOptions {
        heartbeat_interval: Duration::from_millis(30),
        ..fast_options()
    });
    let mut events = record(&conn);

    conn.connect(&server.url, None);
    let mut peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));

    conn.close();
    conn.close();

    match next_event(&mut events).await {
        ConnectionEvent::Close { code, .. } => assert_eq!(code, 1000),
        other => panic!("expected close, got {:?}", other),
    }
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    // only pings sent before close may arrive, then the close frame
    loop {
        let frame = timeout(Duration::from_secs(5), peer.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let tungstenite::Message::Close(frame) = frame {
            assert_eq!(frame.unwrap().code, CloseCode::Normal);
            break;
        }
    }

    no_event(&mut events, Duration::from_millis(150)).await;
    assert!(server.accepted.try_recv().is_err());
}

#[tokio::test]
async fn test_close_cancels_pending_retry() {
    let conn = Connection::with_options(ConnectionOptions {
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(50),
            ..fast_options().reconnect
        },
        ..fast_options()
    });
    let mut events = record(&conn);

    conn.connect(&closed_port_url(), None);
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Error(_)));
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Close { .. }));
    assert_eq!(conn.state(), ConnectionState::Backoff);

    conn.close();

    no_event(&mut events, Duration::from_millis(200)).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_handshake_timeout_enters_backoff() {
    let (url, mut accepted) = silent_server().await;
    let conn = Connection::with_options(ConnectionOptions {
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_secs(10),
            ..fast_options().reconnect
        },
        handshake_timeout: Duration::from_millis(100),
        ..fast_options()
    });
    let mut events = record(&conn);

    conn.connect(&url, None);
    let _socket = timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap()
        .unwrap();

    match next_event(&mut events).await {
        ConnectionEvent::Error(e) => {
            assert!(matches!(*e, ConnectionError::HandshakeTimeout { .. }))
        }
        other => panic!("expected error, got {:?}", other),
    }
    match next_event(&mut events).await {
        ConnectionEvent::Close { code, .. } => assert_eq!(code, 1006),
        other => panic!("expected close, got {:?}", other),
    }
    assert_eq!(conn.state(), ConnectionState::Backoff);

    conn.close();
}

#[tokio::test]
async fn test_close_aborts_handshake() {
    let (url, mut accepted) = silent_server().await;
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&url, None);
    let mut socket = timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conn.state(), ConnectionState::Connecting);

    conn.close();
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    // client side socket is dropped: read the upgrade request, then eof
    let mut buf = [0u8; 1024];
    loop {
        let n = timeout(Duration::from_secs(2), socket.read(&mut buf))
            .await
            .expect("handshake socket still open")
            .unwrap_or(0);
        if n == 0 {
            break;
        }
    }

    no_event(&mut events, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_send_while_disconnected_is_dropped() {
    let conn = Connection::new();
    assert!(!conn.send(Message::Ping));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_while_connected_is_noop() {
    let mut server = TestServer::start().await;
    let conn = Connection::with_options(fast_options());
    let mut events = record(&conn);

    conn.connect(&server.url, None);
    let _peer = server.next_client().await;
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Open));

    conn.connect(&server.url, None);

    no_event(&mut events, Duration::from_millis(100)).await;
    assert!(server.accepted.try_recv().is_err());

    conn.close();
}
