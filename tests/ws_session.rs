use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use coderoom::db::dbsessions;
use coderoom::routes::api::create_api_routes;
use coderoom::ws::handler::init_session_gate;
use coderoom::ws::registry::RoomRegistry;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("server sent invalid JSON");
        }
    }
}

/// Drain messages until a rosterUpdated naming exactly `expect` arrives.
async fn wait_for_roster(ws: &mut WsClient, expect: &[&str]) {
    loop {
        let msg = next_json(ws).await;
        if msg["type"] == "rosterUpdated" {
            let mut ids: Vec<String> = msg["participants"]
                .as_array()
                .unwrap()
                .iter()
                .map(|p| p["userId"].as_str().unwrap().to_string())
                .collect();
            ids.sort();
            let mut want: Vec<String> = expect.iter().map(|s| s.to_string()).collect();
            want.sort();
            if ids == want {
                return;
            }
        }
    }
}

/// The full collaborative round trip: create a room over HTTP, join two
/// websocket clients, edit from one, observe fanout without echo, and see
/// the edit land in the durable record.
#[tokio::test]
async fn code_changes_fan_out_without_echo_and_persist() {
    let db_file = NamedTempFile::new().expect("temp db file");
    let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    dbsessions::init_db(&db_url).await.expect("init store");
    init_session_gate().await;

    let registry = Arc::new(RoomRegistry::new());
    let app = Router::new().nest("/api", create_api_routes(registry));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let http = reqwest::Client::new();

    // Alice creates the room.
    let created = http
        .post(format!("http://{addr}/api/v1/sessions"))
        .json(&json!({
            "roomId": "abc123",
            "creator": { "name": "Alice", "userId": "u-alice" },
            "code": "// start\n",
            "language": "python"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    // Creating the same room again is rejected.
    let duplicate = http
        .post(format!("http://{addr}/api/v1/sessions"))
        .json(&json!({
            "roomId": "abc123",
            "creator": { "name": "Mallory" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 400);

    let ws_url = format!("ws://{addr}/api/v1/ws");

    let (mut alice, _) = connect_async(ws_url.as_str()).await.expect("alice connect");
    alice
        .send(Message::Text(
            json!({"type": "join", "roomId": "abc123", "userId": "u-alice", "userName": "Alice"})
                .to_string(),
        ))
        .await
        .unwrap();
    wait_for_roster(&mut alice, &["u-alice"]).await;

    let (mut bob, _) = connect_async(ws_url.as_str()).await.expect("bob connect");
    bob.send(Message::Text(
        json!({"type": "join", "roomId": "abc123", "userId": "u-bob", "userName": "Bob"})
            .to_string(),
    ))
    .await
    .unwrap();
    wait_for_roster(&mut bob, &["u-alice", "u-bob"]).await;
    wait_for_roster(&mut alice, &["u-alice", "u-bob"]).await;

    // Bob overwrites the document.
    bob.send(Message::Text(
        json!({"type": "codeChange", "roomId": "abc123", "content": "print(1)"}).to_string(),
    ))
    .await
    .unwrap();

    // Alice sees the change, attributed to Bob's identity.
    let change = next_json(&mut alice).await;
    assert_eq!(change["type"], "fileContentChanged");
    assert_eq!(change["content"], "print(1)");
    assert_eq!(change["originUserId"], "u-bob");
    assert!(change["fileId"].is_null());

    // Bob never hears his own edit back.
    assert!(
        timeout(Duration::from_millis(300), bob.next()).await.is_err(),
        "origin connection received an echo"
    );

    // Persistence trails the broadcast; poll the durable record.
    let mut persisted = None;
    for _ in 0..50 {
        let session: Value = http
            .get(format!("http://{addr}/api/v1/sessions/abc123"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if session["code"] == "print(1)" {
            persisted = Some(session);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let session = persisted.expect("code change never reached the store");

    // Bob's join was reconciled into the durable participant list.
    let participant_ids: Vec<&str> = session["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["userId"].as_str().unwrap())
        .collect();
    assert!(participant_ids.contains(&"u-alice"));
    assert!(participant_ids.contains(&"u-bob"));

    // Chat fans out the same way and lands in the log.
    bob.send(Message::Text(
        json!({"type": "chatMessage", "roomId": "abc123", "message": "done!"}).to_string(),
    ))
    .await
    .unwrap();
    let chat = next_json(&mut alice).await;
    assert_eq!(chat["type"], "messageReceived");
    assert_eq!(chat["message"]["message"], "done!");
    assert_eq!(chat["message"]["userName"], "Bob");

    // Joining a room that was never created is refused on the channel.
    let (mut stranger, _) = connect_async(ws_url.as_str()).await.expect("stranger connect");
    stranger
        .send(Message::Text(
            json!({"type": "join", "roomId": "ghost", "userId": "u-x", "userName": "X"})
                .to_string(),
        ))
        .await
        .unwrap();
    let refusal = next_json(&mut stranger).await;
    assert_eq!(refusal["type"], "error");
    assert_eq!(refusal["kind"], "not_found");

    // Hard-deleting the room also evicts it from the join gate: a fresh
    // connection must be refused even though earlier joins warmed the
    // cache for this room id.
    let deleted = http
        .delete(format!("http://{addr}/api/v1/sessions/abc123"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    let (mut latecomer, _) = connect_async(ws_url.as_str())
        .await
        .expect("latecomer connect");
    latecomer
        .send(Message::Text(
            json!({"type": "join", "roomId": "abc123", "userId": "u-late", "userName": "Late"})
                .to_string(),
        ))
        .await
        .unwrap();
    let refusal = next_json(&mut latecomer).await;
    assert_eq!(refusal["type"], "error");
    assert_eq!(refusal["kind"], "not_found");
}
