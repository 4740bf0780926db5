//! End-to-end tests using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use comms_auth::MemoryAuthProvider;
use comms_core::{Scope, UserRecord};
use comms_server::{CommsServer, CommsService, LocalBroker, ServerConfig};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct Harness {
    url: String,
    server: CommsServer,
    broker: Arc<LocalBroker>,
}

/// Boot a server on an ephemeral port.
async fn boot(authentication_required: bool, base: &str) -> Harness {
    let store = MemoryAuthProvider::new();
    store.insert_user(UserRecord::new("alice", Scope::all()));
    store.issue_token("good", "alice", Scope::read());
    store.issue_token("weak", "alice", "flows.write".into());

    let config = ServerConfig {
        port: 0,
        endpoint_base_path: base.to_owned(),
        authentication_required,
        ..ServerConfig::default()
    };
    let broker = Arc::new(LocalBroker::new());
    let service = CommsService::new(config.comms_config(), Arc::new(store), broker.clone());
    service.start().await.unwrap();

    let server = CommsServer::new(config, service);
    let (addr, _handle) = server.listen().await.unwrap();
    let url = format!("ws://{addr}{}", server.config().comms_path());
    Harness {
        url,
        server,
        broker,
    }
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    ws
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Next text frame parsed as JSON; `None` on close.
async fn next_json(ws: &mut WsStream) -> Option<Value> {
    loop {
        let msg = timeout(TIMEOUT, ws.next()).await.expect("read timed out")?;
        match msg {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Poll until `f` holds or the timeout elapses.
async fn eventually(f: impl Fn() -> bool) {
    timeout(TIMEOUT, async {
        while !f() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn open_channel_subscribe_and_receive_batch() {
    let h = boot(false, "/").await;
    let mut ws = connect(&h.url).await;
    eventually(|| h.server.service().registry().len() == 1).await;

    send_json(&mut ws, json!({"subscribe": "status/#"})).await;
    eventually(|| h.broker.subscription_count() == 1).await;

    assert_eq!(h.broker.publish("status/n1", json!({"fill": "green"}), false), 1);
    assert_eq!(h.broker.publish("status/n2", json!({"fill": "red"}), false), 1);
    assert_eq!(h.broker.publish("debug", json!("ignored"), false), 0);

    let frame = next_json(&mut ws).await.unwrap();
    assert_eq!(
        frame,
        json!([
            {"topic": "status/n1", "data": {"fill": "green"}},
            {"topic": "status/n2", "data": {"fill": "red"}}
        ])
    );
}

#[tokio::test]
async fn valid_token_is_acknowledged() {
    let h = boot(true, "/").await;
    let mut ws = connect(&h.url).await;
    assert!(h.server.service().registry().is_empty());

    send_json(&mut ws, json!({"auth": "good"})).await;
    assert_eq!(next_json(&mut ws).await, Some(json!({"auth": "ok"})));
    assert_eq!(h.server.service().registry().len(), 1);

    send_json(&mut ws, json!({"subscribe": "debug"})).await;
    eventually(|| h.broker.subscription_count() == 1).await;
    let _ = h.broker.publish("debug", json!({"msg": "hi"}), false);
    assert_eq!(
        next_json(&mut ws).await,
        Some(json!([{"topic": "debug", "data": {"msg": "hi"}}]))
    );
}

#[tokio::test]
async fn invalid_token_gets_fail_then_close() {
    let h = boot(true, "/").await;
    let mut ws = connect(&h.url).await;

    send_json(&mut ws, json!({"auth": "bogus"})).await;
    assert_eq!(next_json(&mut ws).await, Some(json!({"auth": "fail"})));
    assert_eq!(next_json(&mut ws).await, None);
    assert!(h.server.service().registry().is_empty());
}

#[tokio::test]
async fn token_without_capability_is_rejected() {
    let h = boot(true, "/").await;
    let mut ws = connect(&h.url).await;
    send_json(&mut ws, json!({"auth": "weak"})).await;
    assert_eq!(next_json(&mut ws).await, Some(json!({"auth": "fail"})));
    assert_eq!(next_json(&mut ws).await, None);
}

#[tokio::test]
async fn client_close_deregisters() {
    let h = boot(false, "/").await;
    let mut ws = connect(&h.url).await;
    eventually(|| h.server.service().registry().len() == 1).await;
    ws.close(None).await.unwrap();
    eventually(|| h.server.service().registry().is_empty()).await;
}

#[tokio::test]
async fn retained_status_replayed_on_subscribe() {
    let h = boot(false, "/").await;
    let _ = h.broker.publish("status/n1", json!({"text": "connected"}), true);

    let mut ws = connect(&h.url).await;
    send_json(&mut ws, json!({"subscribe": "status/+"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        Some(json!([{"topic": "status/n1", "data": {"text": "connected"}}]))
    );
}

#[tokio::test]
async fn endpoint_honours_base_path() {
    let h = boot(false, "/admin").await;
    assert!(h.url.ends_with("/admin/comms"));
    let _ws = connect(&h.url).await;
    eventually(|| h.server.service().registry().len() == 1).await;
}

#[tokio::test]
async fn stop_closes_open_sockets() {
    let h = boot(false, "/").await;
    let mut ws = connect(&h.url).await;
    eventually(|| h.server.service().registry().len() == 1).await;

    h.server.service().stop();
    assert_eq!(next_json(&mut ws).await, None);
    assert!(h.server.service().registry().is_empty());
}
