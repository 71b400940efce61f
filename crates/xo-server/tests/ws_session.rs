//! End-to-end WebSocket tests: a real server, a real client, full
//! create/join/move traffic over the wire.

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use xo_server::{start, ServerConfig};
use xo_store::Database;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(port: u16) -> WsStream {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/ws"))
        .await
        .expect("connect");
    ws
}

async fn start_server() -> u16 {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        port: 0,
        ..Default::default()
    };
    let handle = start(config, db).await.unwrap();
    let port = handle.port;
    // Keep background tasks alive for the test duration
    std::mem::forget(handle);
    port
}

/// Send a raw text frame and read the next text reply, skipping control frames.
async fn roundtrip(ws: &mut WsStream, payload: &str) -> serde_json::Value {
    ws.send(Message::Text(payload.into())).await.unwrap();
    loop {
        let msg = ws.next().await.expect("stream open").expect("read frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_command(ws: &mut WsStream, command: &str, game_info: serde_json::Value) -> serde_json::Value {
    let payload = serde_json::json!({ "command": command, "game_info": game_info }).to_string();
    roundtrip(ws, &payload).await
}

#[tokio::test]
async fn create_join_move_over_the_wire() {
    let port = start_server().await;
    let mut ws = connect(port).await;

    // Create
    let created = send_command(&mut ws, "GENERATE_NEW_GAME", serde_json::json!({})).await;
    assert_eq!(created["code"], 201);
    assert_eq!(created["message"], "Created");
    let game_id = created["game_info"]["game_id"].as_str().unwrap().to_string();
    let creator = created["game_info"]["first_user_id"].as_str().unwrap().to_string();
    assert!(game_id.starts_with("game_"));
    assert_eq!(created["game_info"]["second_user_id"], "");

    // Join from a second connection
    let mut ws2 = connect(port).await;
    let joined = send_command(&mut ws2, "JOIN_GAME", serde_json::json!({ "game_id": game_id })).await;
    assert_eq!(joined["code"], 200);
    let joiner = joined["game_info"]["second_user_id"].as_str().unwrap().to_string();
    assert!(joiner.starts_with("user_"));
    assert_ne!(joiner, creator);

    // Creator moves
    let moved = send_command(
        &mut ws,
        "MAKE_MOVE",
        serde_json::json!({ "game_id": game_id, "state": "X at 0,0", "last_move_user_id": creator }),
    )
    .await;
    assert_eq!(moved["code"], 200);
    assert_eq!(moved["game_info"]["state"], "X at 0,0");
    assert_eq!(moved["game_info"]["last_move_user_id"], creator);

    // Joiner overwrites
    let moved = send_command(
        &mut ws2,
        "MAKE_MOVE",
        serde_json::json!({ "game_id": game_id, "state": "O at 1,1", "last_move_user_id": joiner }),
    )
    .await;
    assert_eq!(moved["game_info"]["state"], "O at 1,1");
    assert_eq!(moved["game_info"]["last_move_user_id"], joiner);
}

#[tokio::test]
async fn join_missing_game_returns_not_found() {
    let port = start_server().await;
    let mut ws = connect(port).await;

    let reply = send_command(&mut ws, "JOIN_GAME", serde_json::json!({ "game_id": "game_missing" })).await;
    assert_eq!(reply["code"], 404);
    assert!(reply["error"].as_str().unwrap().contains("game_missing"));
}

#[tokio::test]
async fn validation_error_keeps_connection_alive() {
    let port = start_server().await;
    let mut ws = connect(port).await;

    let reply = send_command(&mut ws, "JOIN_GAME", serde_json::json!({})).await;
    assert_eq!(reply["code"], 400);

    // Same connection still dispatches commands
    let created = send_command(&mut ws, "GENERATE_NEW_GAME", serde_json::json!({})).await;
    assert_eq!(created["code"], 201);
}

#[tokio::test]
async fn malformed_frame_answered_and_survived() {
    let port = start_server().await;
    let mut ws = connect(port).await;

    let reply = roundtrip(&mut ws, "{not json").await;
    assert_eq!(reply["code"], 400);
    assert_eq!(reply["error"], "malformed request");

    let ack = send_command(&mut ws, "PING", serde_json::json!({})).await;
    assert_eq!(ack["code"], 200);
    assert_eq!(ack["message"], "OK");
}

#[tokio::test]
async fn unknown_command_acks() {
    let port = start_server().await;
    let mut ws = connect(port).await;

    let ack = send_command(&mut ws, "HELLO", serde_json::json!({})).await;
    assert_eq!(ack["code"], 200);
    assert_eq!(ack["message"], "OK");
    assert!(ack.get("game_info").is_none());
}

#[tokio::test]
async fn second_join_rejected() {
    let port = start_server().await;
    let mut ws = connect(port).await;

    let created = send_command(&mut ws, "GENERATE_NEW_GAME", serde_json::json!({})).await;
    let game_id = created["game_info"]["game_id"].as_str().unwrap().to_string();

    let first = send_command(&mut ws, "JOIN_GAME", serde_json::json!({ "game_id": game_id })).await;
    assert_eq!(first["code"], 200);

    let second = send_command(&mut ws, "JOIN_GAME", serde_json::json!({ "game_id": game_id })).await;
    assert_eq!(second["code"], 400);
    assert_eq!(second["error"], "game is full");
}
