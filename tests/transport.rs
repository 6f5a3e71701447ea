use arena_shooter::domain::ArenaError;
use arena_shooter::interface_adapters::clients::{
    ProtocolSocket, Transport, TransportConfig, TransportEvent, TransportState,
};
use arena_shooter::interface_adapters::protocol::{self, Message, WelcomePayload};
use arena_shooter::use_cases::SocketEvent;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{WebSocketStream, tungstenite::Message as WsMessage};

type ServerWs = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(5);

// Minimal websocket server that hands every accepted connection to the test.
async fn fake_server() -> (String, mpsc::UnboundedReceiver<ServerWs>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/ws", listener.local_addr().expect("addr"));
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                if tx.send(ws).is_err() {
                    return;
                }
            }
        }
    });
    (url, rx)
}

async fn accepted(rx: &mut mpsc::UnboundedReceiver<ServerWs>) -> ServerWs {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("connection before timeout")
        .expect("server alive")
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("event before timeout")
        .expect("transport alive")
}

fn welcome(id: u32) -> String {
    protocol::encode(&Message::Welcome(WelcomePayload {
        id,
        speed: 2.0,
        size: 10.0,
        bullet_speed: 6.0,
        bullet_size: 5.0,
    }))
    .expect("encode")
}

fn slow_retry(url: String) -> TransportConfig {
    TransportConfig {
        reconnect_interval: Duration::from_secs(60),
        ..TransportConfig::new(url)
    }
}

#[tokio::test]
async fn connect_after_a_drop_dials_immediately() {
    let (url, mut server) = fake_server().await;
    let (transport, mut events) = Transport::spawn(slow_retry(url));

    transport.connect().expect("connect");
    let first = accepted(&mut server).await;
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
    assert_eq!(transport.state(), TransportState::Connected);
    assert_eq!(transport.connect(), Err(ArenaError::DuplicateConnect));

    drop(first);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { explicit: false }
    );
    assert_eq!(transport.state(), TransportState::Disconnected);

    // The retry is a minute away; an explicit connect does not wait for it.
    transport.connect().expect("reconnect");
    let _second = accepted(&mut server).await;
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
}

#[tokio::test]
async fn dropped_connection_is_retried_after_the_interval() {
    let (url, mut server) = fake_server().await;
    let (transport, mut events) = Transport::spawn(TransportConfig {
        reconnect_interval: Duration::from_millis(100),
        ..TransportConfig::new(url)
    });

    transport.connect().expect("connect");
    drop(accepted(&mut server).await);
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { explicit: false }
    );

    let _again = accepted(&mut server).await;
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
}

#[tokio::test]
async fn undecodable_frames_do_not_cost_the_connection() {
    let (url, mut server) = fake_server().await;
    let (transport, mut events) = Transport::spawn(slow_retry(url));
    transport.connect().expect("connect");

    let mut ws = accepted(&mut server).await;
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

    ws.send(WsMessage::text("{not json")).await.expect("send");
    ws.send(WsMessage::text(r#"{"type":"teleport","data":{}}"#))
        .await
        .expect("send");
    ws.send(WsMessage::text(welcome(4))).await.expect("send");

    let TransportEvent::Message(Message::Welcome(payload)) = next_event(&mut events).await else {
        panic!("expected the welcome to come through");
    };
    assert_eq!(payload.id, 4);
    assert_eq!(transport.state(), TransportState::Connected);
}

#[tokio::test]
async fn sent_intents_reach_the_server_as_text_frames() {
    let (url, mut server) = fake_server().await;
    let (transport, mut events) = Transport::spawn(slow_retry(url));
    transport.connect().expect("connect");

    let mut ws = accepted(&mut server).await;
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

    transport.send(&Message::StopMoving).expect("send");
    let frame = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("frame before timeout")
        .expect("open")
        .expect("valid");
    assert_eq!(frame, WsMessage::text(r#"{"type":"stop_moving"}"#));
}

#[tokio::test]
async fn explicit_disconnect_closes_for_good() {
    let (url, mut server) = fake_server().await;
    let (transport, mut events) = Transport::spawn(TransportConfig {
        reconnect_interval: Duration::from_millis(50),
        ..TransportConfig::new(url)
    });
    transport.connect().expect("connect");
    let _ws = accepted(&mut server).await;
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

    transport.disconnect().await;
    assert_eq!(transport.state(), TransportState::Closed);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { explicit: true }
    );

    // No retry follows an explicit disconnect.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(server.try_recv().is_err());
    assert_eq!(
        transport.send(&Message::StopMoving),
        Err(ArenaError::TransportUnavailable)
    );
}

#[tokio::test]
async fn go_away_disconnects_before_it_is_reported() {
    let (url, mut server) = fake_server().await;
    let mut socket = ProtocolSocket::open(slow_retry(url)).expect("open");
    let mut ws = accepted(&mut server).await;

    assert_eq!(socket.next_event().await, Some(SocketEvent::Connected));

    ws.send(WsMessage::text(welcome(9))).await.expect("send");
    ws.send(WsMessage::text(
        protocol::encode(&Message::go_away("server restarting")).expect("encode"),
    ))
    .await
    .expect("send");

    let Some(SocketEvent::Welcome(info)) = socket.next_event().await else {
        panic!("expected welcome");
    };
    assert_eq!(info.id, 9);

    let event = tokio::time::timeout(WAIT, socket.next_event())
        .await
        .expect("go_away before timeout");
    assert_eq!(
        event,
        Some(SocketEvent::GoAway {
            reason: "server restarting".to_string()
        })
    );
    assert_eq!(socket.transport().state(), TransportState::Closed);

    // The server sees the client hang up.
    let closing = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("close before timeout");
    assert!(matches!(closing, Some(Ok(WsMessage::Close(_))) | None | Some(Err(_))));
}

#[tokio::test]
async fn go_away_followed_by_a_close_is_never_redialed() {
    let (url, mut server) = fake_server().await;
    let mut socket = ProtocolSocket::open(TransportConfig {
        reconnect_interval: Duration::from_millis(50),
        ..TransportConfig::new(url)
    })
    .expect("open");

    let mut ws = accepted(&mut server).await;
    ws.send(WsMessage::text(
        protocol::encode(&Message::go_away("server full")).expect("encode"),
    ))
    .await
    .expect("send");
    let _ = ws.close(None).await;

    // Nobody reads the socket for several retry intervals.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(socket.transport().state(), TransportState::Closed);
    assert!(
        server.try_recv().is_err(),
        "an evicted client must not dial again"
    );

    assert_eq!(socket.next_event().await, Some(SocketEvent::Connected));
    assert_eq!(
        socket.next_event().await,
        Some(SocketEvent::GoAway {
            reason: "server full".to_string()
        })
    );
    assert_eq!(
        socket.next_event().await,
        Some(SocketEvent::Disconnected { explicit: true })
    );
}

#[tokio::test]
async fn disconnect_while_dialing_reports_an_explicit_close() {
    // Accepts TCP but never answers the websocket handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/ws", listener.local_addr().expect("addr"));
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    let (transport, mut events) = Transport::spawn(slow_retry(url));
    transport.connect().expect("connect");
    transport
        .watch_state()
        .wait_for(|s| *s == TransportState::Connecting)
        .await
        .expect("state channel");

    transport.disconnect().await;
    assert_eq!(transport.state(), TransportState::Closed);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { explicit: true }
    );
}
