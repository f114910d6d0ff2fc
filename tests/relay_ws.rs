//! End-to-end presence relay tests over real websockets.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use presence_relay::config::RelayConfig;
use presence_relay::routes;
use presence_relay::state::AppState;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> (SocketAddr, AppState) {
    let state = AppState::new(RelayConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = routes::app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("relay server failed");
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, query: &str) -> (Ws, Value) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/api/ws?{query}"))
        .await
        .expect("websocket connect");
    let welcome = next_frame(&mut ws).await;
    assert_eq!(welcome["syscall"], "session:connected");
    (ws, welcome)
}

async fn next_frame(ws: &mut Ws) -> Value {
    loop {
        let msg = timeout(Duration::from_millis(500), ws.next())
            .await
            .expect("frame receive timed out")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("frame should be JSON");
        }
    }
}

async fn assert_silent(ws: &mut Ws) {
    if let Ok(Some(Ok(Message::Text(text)))) = timeout(Duration::from_millis(150), ws.next()).await {
        panic!("expected no frame, got {text}");
    }
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

async fn pointer_move(ws: &mut Ws, x: f64, y: f64) {
    send(ws, json!({ "syscall": "pointer:move", "data": { "x": x, "y": y } })).await;
}

fn connection_id(welcome: &Value) -> Uuid {
    welcome["data"]["connection_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("welcome carries connection_id")
}

#[tokio::test]
async fn peer_receives_pointer_and_sender_does_not() {
    let (addr, state) = spawn_relay().await;
    let (mut a, welcome_a) = connect(addr, "user_id=ua&name=Ada&document_id=doc1").await;
    let (mut b, _) = connect(addr, "user_id=ub&name=Bob&document_id=doc1").await;

    assert_eq!(welcome_a["data"]["document_id"], "doc1");
    assert!(welcome_a["data"]["color"].as_str().is_some_and(|c| c.starts_with('#')));
    assert_eq!(state.registry.members_of("doc1").await.len(), 2);

    pointer_move(&mut a, 10.0, 20.0).await;

    let remote = next_frame(&mut b).await;
    assert_eq!(remote["syscall"], "pointer:remote");
    assert_eq!(remote["data"]["x"], 10.0);
    assert_eq!(remote["data"]["y"], 20.0);
    assert_eq!(remote["data"]["id"], "ua");
    assert_eq!(remote["data"]["name"], "Ada");
    assert_eq!(remote["data"]["color"], welcome_a["data"]["color"]);

    assert_silent(&mut b).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn other_documents_never_see_events() {
    let (addr, _state) = spawn_relay().await;
    let (mut a, _) = connect(addr, "user_id=ua&name=Ada&document_id=doc1").await;
    let (mut b, _) = connect(addr, "user_id=ub&name=Bob&document_id=doc1").await;
    let (mut c, _) = connect(addr, "user_id=uc&name=Cy&document_id=doc2").await;

    pointer_move(&mut a, 1.0, 1.0).await;
    pointer_move(&mut b, 2.0, 2.0).await;

    assert_eq!(next_frame(&mut b).await["data"]["id"], "ua");
    assert_eq!(next_frame(&mut a).await["data"]["id"], "ub");
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn disconnect_notifies_peers_and_cleans_up() {
    let (addr, state) = spawn_relay().await;
    let (mut a, welcome_a) = connect(addr, "user_id=ua&name=Ada&document_id=doc1").await;
    let (mut b, _) = connect(addr, "user_id=ub&name=Bob&document_id=doc1").await;
    let a_id = connection_id(&welcome_a);

    a.close(None).await.expect("close a");

    let part = next_frame(&mut b).await;
    assert_eq!(part["syscall"], "session:part");
    assert_eq!(part["data"]["id"], "ua");
    assert_eq!(part["data"]["connection_id"], a_id.to_string());
    assert!(!state.registry.members_of("doc1").await.contains(&a_id));
    assert_silent(&mut b).await;

    b.close(None).await.expect("close b");
    timeout(Duration::from_millis(500), async {
        while state.registry.session_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session should be discarded after last member leaves");
}

#[tokio::test]
async fn explicit_join_when_handshake_has_no_document() {
    let (addr, state) = spawn_relay().await;
    let (mut a, welcome) = connect(addr, "user_id=ua&name=Ada").await;
    assert!(welcome["data"].get("document_id").is_none());

    // Moves before joining go nowhere and get no reply.
    pointer_move(&mut a, 5.0, 5.0).await;
    assert_silent(&mut a).await;

    send(&mut a, json!({ "syscall": "session:join", "data": { "document_id": "doc1" } })).await;
    let reply = next_frame(&mut a).await;
    assert_eq!(reply["status"], "done");
    assert_eq!(reply["data"]["document_id"], "doc1");
    assert!(state.registry.members_of("doc1").await.contains(&connection_id(&welcome)));

    send(&mut a, json!({ "syscall": "session:join", "data": { "document_id": "doc2" } })).await;
    let rejected = next_frame(&mut a).await;
    assert_eq!(rejected["status"], "error");
    assert_eq!(rejected["data"]["code"], "E_ALREADY_BOUND");
}

#[tokio::test]
async fn missing_user_id_is_rejected_before_upgrade() {
    let (addr, _state) = spawn_relay().await;
    let result = connect_async(format!("ws://{addr}/api/ws?document_id=doc1")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn malformed_frame_gets_gateway_error() {
    let (addr, _state) = spawn_relay().await;
    let (mut a, _) = connect(addr, "user_id=ua&document_id=doc1").await;

    a.send(Message::Text("not json".into())).await.expect("send");

    let err = next_frame(&mut a).await;
    assert_eq!(err["syscall"], "gateway:error");
}
