mod common;

use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use kpop_companion::store::DocumentStore;

use common::TestApp;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Helper: start the router on a random port, return the address.
async fn start_server(app: &TestApp) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router_clone();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("127.0.0.1:{}", addr.port())
}

/// Helper: open a feed socket for one room.
async fn ws_connect(addr: &str, token: &str, kind: &str, room_id: &str) -> WsStream {
    let url = format!(
        "ws://{}/api/v1/ws?token={}&kind={}&room_id={}",
        addr, token, kind, room_id
    );
    let (ws_stream, _) = connect_async(&url).await.expect("WS connect failed");
    ws_stream
}

/// Helper: receive the next snapshot with a timeout.
async fn next_snapshot(ws: &mut WsStream) -> Vec<Value> {
    loop {
        let msg = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
            .await
            .expect("WS recv timed out")
            .expect("WS stream ended")
            .expect("WS recv error");

        match msg {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text).unwrap();
                return value.as_array().cloned().expect("snapshot is an array");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text message, got {:?}", other),
        }
    }
}

/// Poll until the store has no live queries left.
async fn wait_for_no_subscriptions(app: &TestApp) {
    for _ in 0..50 {
        if app.store.active_subscriptions() == 0 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!(
        "{} subscriptions still active",
        app.store.active_subscriptions()
    );
}

// ─── Feed ───────────────────────────────────────────────

#[tokio::test]
async fn ws_streams_snapshots_as_messages_arrive() {
    let app = TestApp::new();
    let token = app.sign_in("u1", "One").await;
    let addr = start_server(&app).await;

    let mut ws = ws_connect(&addr, &token, "livestreams", "abc123").await;
    assert!(next_snapshot(&mut ws).await.is_empty());

    app.send_message(&token, "/api/v1/rooms/livestreams/abc123", "hello :heart:")
        .await;

    let snapshot = next_snapshot(&mut ws).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["text"], "hello ❤️");
    assert_eq!(snapshot[0]["userInfo"]["uid"], "u1");
}

#[tokio::test]
async fn ws_close_tears_down_the_live_query() {
    let app = TestApp::new();
    let token = app.sign_in("u1", "One").await;
    let addr = start_server(&app).await;

    let mut ws = ws_connect(&addr, &token, "livestreams", "abc123").await;
    next_snapshot(&mut ws).await;
    assert_eq!(app.store.active_subscriptions(), 1);

    ws.close(None).await.unwrap();
    wait_for_no_subscriptions(&app).await;
}

#[tokio::test]
async fn ws_rejects_bad_token() {
    let app = TestApp::new();
    let addr = start_server(&app).await;

    let url = format!(
        "ws://{}/api/v1/ws?token=bogus&kind=livestreams&room_id=abc123",
        addr
    );
    assert!(connect_async(&url).await.is_err());
    assert_eq!(app.store.active_subscriptions(), 0);
}

#[tokio::test]
async fn ws_private_chat_requires_membership() {
    let app = TestApp::new();
    let owner = app.sign_in("owner", "Owner").await;
    let outsider = app.sign_in("outsider", "Out").await;
    let chat_id = app.create_chat(&owner, "Party", &[]).await;
    let addr = start_server(&app).await;

    let url = format!(
        "ws://{}/api/v1/ws?token={}&kind=private-chats&room_id={}",
        addr, outsider, chat_id
    );
    assert!(connect_async(&url).await.is_err());

    let mut ws = ws_connect(&addr, &owner, "private-chats", &chat_id).await;
    assert!(next_snapshot(&mut ws).await.is_empty());
}
