//! Integration tests for the burrow server, handler, and full connection flow.
//!
//! The game runs in stepped mode so a test decides when ticks happen.

use std::time::Duration;

use burrow::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn builder() -> BurrowServerBuilder {
    BurrowServer::builder()
        .bind("127.0.0.1:0")
        .tick_rate(0)
        .no_mobs()
}

/// Starts a server and returns its address and game handle.
async fn start(builder: BurrowServerBuilder) -> (String, GameHandle) {
    let server = builder.build().await.expect("server should build");
    let addr = server.local_addr().expect("should have local addr").to_string();
    let game = server.game();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, game)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string())).await.expect("send");
}

/// Next JSON message, or `None` if the server closed the connection.
async fn recv(ws: &mut ClientWs) -> Option<Value> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("server should answer in time");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(text.as_str()).expect("valid json"));
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

async fn expect_type(ws: &mut ClientWs, kind: &str) -> Value {
    let msg = recv(ws).await.expect("connection open");
    assert_eq!(msg["type"], kind, "unexpected message {msg}");
    msg
}

/// Registers `name` and returns the player's uid.
async fn init(ws: &mut ClientWs, name: &str) -> u64 {
    send(ws, json!({"type": "init", "username": name})).await;
    let reg = expect_type(ws, "registration_successful").await;
    assert_eq!(reg["player"]["name"], name);
    expect_type(ws, "room_info").await;
    reg["player"]["uid"].as_u64().expect("numeric uid")
}

/// Skips messages until one of type `kind` arrives.
async fn wait_for_type(ws: &mut ClientWs, kind: &str) -> Value {
    loop {
        let msg = recv(ws).await.expect("connection open");
        if msg["type"] == kind {
            return msg;
        }
    }
}

/// Round-trips a frame the handler answers immediately. Everything sent
/// before it has then been handed to the game.
async fn sync(ws: &mut ClientWs) {
    send(ws, json!({"type": "sync"})).await;
    expect_type(ws, "action_response").await;
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_init_registers_player() {
    let (addr, _game) = start(builder()).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "init", "username": "xyf"})).await;

    let reg = expect_type(&mut ws, "registration_successful").await;
    assert_eq!(reg["player"]["name"], "xyf");
    assert!(reg["player"]["allowed_actions"].as_array().unwrap().len() >= 1);
    let info = expect_type(&mut ws, "room_info").await;
    assert_eq!(info["entities"], json!([]));
}

#[tokio::test]
async fn test_requests_before_init_are_refused() {
    let (addr, _game) = start(builder()).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "move", "direction": "east", "player": 1})).await;
    let msg = expect_type(&mut ws, "action_response").await;
    assert_eq!(msg["response"], "Send init first.");

    init(&mut ws, "late").await;
}

#[tokio::test]
async fn test_move_resolves_on_tick() {
    let (addr, game) = start(builder()).await;
    let mut ws = connect(&addr).await;
    let uid = init(&mut ws, "walker").await;
    game.step().await.unwrap();
    let arrived = expect_type(&mut ws, "room_change").await;
    assert_eq!(arrived["enters"], true);

    send(&mut ws, json!({"type": "move", "direction": "east", "player": uid})).await;
    sync(&mut ws).await;
    game.step().await.unwrap();

    let update = expect_type(&mut ws, "update").await;
    assert!(update["message"].as_str().unwrap().starts_with("You move east"));
    expect_type(&mut ws, "room_info").await;
    let left = expect_type(&mut ws, "room_change").await;
    assert_eq!(left["entity_uid"], uid);
    assert_eq!(left["enters"], false);
    let entered = expect_type(&mut ws, "room_change").await;
    assert_eq!(entered["enters"], true);
    assert_ne!(left["room_uid"], entered["room_uid"]);
}

#[tokio::test]
async fn test_move_into_wall_is_answered() {
    let (addr, game) = start(builder()).await;
    let mut ws = connect(&addr).await;
    let uid = init(&mut ws, "bonk").await;

    send(&mut ws, json!({"type": "move", "direction": "north", "player": uid})).await;
    sync(&mut ws).await;
    game.step().await.unwrap();

    let msg = expect_type(&mut ws, "action_response").await;
    assert!(msg["response"].as_str().unwrap().contains("north"));
}

#[tokio::test]
async fn test_unknown_type_keeps_session_open() {
    let (addr, game) = start(builder()).await;
    let mut ws = connect(&addr).await;
    init(&mut ws, "chatty").await;

    send(&mut ws, json!({"type": "teleport", "to": "moon"})).await;
    let msg = expect_type(&mut ws, "action_response").await;
    assert!(msg["response"].as_str().unwrap().contains("teleport"));

    ws.send(Message::text("not json")).await.unwrap();
    let msg = expect_type(&mut ws, "action_response").await;
    assert_eq!(msg["response"], "Malformed request.");

    send(
        &mut ws,
        json!({"type": "chat", "player_name": "chatty", "chat_message": "still here"}),
    )
    .await;
    sync(&mut ws).await;
    game.step().await.unwrap();

    let chat = expect_type(&mut ws, "chat").await;
    assert_eq!(chat["player_name"], "chatty");
    assert_eq!(chat["chat_message"], "still here");
}

#[tokio::test]
async fn test_chat_reaches_other_players() {
    let (addr, game) = start(builder()).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    init(&mut a, "a").await;
    init(&mut b, "b").await;

    send(&mut a, json!({"type": "chat", "player_name": "a", "chat_message": "hi b"})).await;
    sync(&mut a).await;
    game.step().await.unwrap();

    let mut saw_chat = false;
    while let Some(msg) = recv(&mut b).await {
        if msg["type"] == "chat" {
            assert_eq!(msg["chat_message"], "hi b");
            saw_chat = true;
            break;
        }
    }
    assert!(saw_chat);
}

#[tokio::test]
async fn test_duplicate_username_is_refused() {
    let (addr, _game) = start(builder()).await;
    let mut first = connect(&addr).await;
    init(&mut first, "twin").await;

    let mut second = connect(&addr).await;
    send(&mut second, json!({"type": "init", "username": "twin"})).await;
    let msg = expect_type(&mut second, "action_response").await;
    assert!(msg["response"].as_str().unwrap().contains("taken"));

    init(&mut second, "twin2").await;
}

#[tokio::test]
async fn test_acting_for_another_player_is_refused() {
    let (addr, _game) = start(builder()).await;
    let mut ws = connect(&addr).await;
    let uid = init(&mut ws, "honest").await;

    send(
        &mut ws,
        json!({"type": "action", "action": "bite", "player": uid + 1000}),
    )
    .await;
    let msg = expect_type(&mut ws, "action_response").await;
    assert_eq!(msg["response"], "You can only act for yourself.");
}

#[tokio::test]
async fn test_second_init_while_alive_is_answered() {
    let (addr, _game) = start(builder()).await;
    let mut ws = connect(&addr).await;
    init(&mut ws, "again").await;

    send(&mut ws, json!({"type": "init", "username": "again"})).await;
    expect_type(&mut ws, "action_response").await;
}

#[tokio::test]
async fn test_second_init_after_death_revives() {
    let (addr, game) = start(builder()).await;
    let mut victim = connect(&addr).await;
    let victim_uid = init(&mut victim, "victim").await;
    let mut biter = connect(&addr).await;
    let biter_uid = init(&mut biter, "biter").await;

    // 20 health, 3 per bite.
    for _ in 0..7 {
        send(
            &mut biter,
            json!({"type": "action", "action": "bite", "player": biter_uid, "target": victim_uid}),
        )
        .await;
        sync(&mut biter).await;
        game.step().await.unwrap();
    }
    wait_for_type(&mut victim, "DEATH").await;

    send(&mut victim, json!({"type": "move", "direction": "east", "player": victim_uid})).await;
    let refused = wait_for_type(&mut victim, "action_response").await;
    assert_eq!(refused["response"], "You are dead.");

    send(&mut victim, json!({"type": "init", "username": "victim"})).await;
    let info = wait_for_type(&mut victim, "room_info").await;
    assert_eq!(info["entities"][0]["entity_name"], "biter");

    send(&mut victim, json!({"type": "move", "direction": "east", "player": victim_uid})).await;
    sync(&mut victim).await;
    game.step().await.unwrap();
    loop {
        let update = wait_for_type(&mut victim, "update").await;
        if update["message"].as_str().unwrap().starts_with("You move east") {
            break;
        }
    }
}

#[tokio::test]
async fn test_silent_tcp_peer_does_not_block_accepts() {
    let (addr, _game) = start(builder()).await;
    let _silent = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("raw connect");

    let mut ws = tokio::time::timeout(Duration::from_secs(2), connect(&addr))
        .await
        .expect("handshake should not wait behind the silent peer");
    init(&mut ws, "prompt").await;
}

#[tokio::test]
async fn test_silent_tcp_peer_is_dropped_after_handshake_timeout() {
    use tokio::io::AsyncReadExt;

    let (addr, _game) = start(builder().handshake_timeout(Duration::from_millis(100))).await;
    let mut silent = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("raw connect");

    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(2), silent.read(&mut buf))
        .await
        .expect("server should hang up");
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_disconnect_is_seen_by_roommates() {
    let (addr, game) = start(builder()).await;
    let mut stays = connect(&addr).await;
    init(&mut stays, "stays").await;
    let mut leaves = connect(&addr).await;
    let leaver = init(&mut leaves, "leaves").await;

    // Flush both entry events.
    game.step().await.unwrap();
    expect_type(&mut stays, "room_change").await;
    expect_type(&mut stays, "room_change").await;

    leaves.close(None).await.unwrap();

    let mut saw_leave = false;
    for _ in 0..50 {
        game.step().await.unwrap();
        if let Ok(Some(Ok(Message::Text(text)))) =
            tokio::time::timeout(Duration::from_millis(20), stays.next()).await
        {
            let msg: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(msg["type"], "room_change");
            assert_eq!(msg["entity_uid"], leaver);
            assert_eq!(msg["enters"], false);
            saw_leave = true;
            break;
        }
    }
    assert!(saw_leave);
}

#[tokio::test]
async fn test_idle_connection_is_dropped() {
    let (addr, _game) = start(builder().idle_timeout(Duration::from_millis(100))).await;
    let mut ws = connect(&addr).await;
    init(&mut ws, "sleepy").await;

    assert!(recv(&mut ws).await.is_none());
}

#[tokio::test]
async fn test_build_rejects_mob_in_wall() {
    let result = builder().mob(MobSpawn::new("stuck", 5, 0, 0)).build().await;
    assert!(matches!(result, Err(BurrowError::World(_))));
}

#[tokio::test]
async fn test_build_rejects_unwalkable_spawn() {
    let result = builder().spawn(0, 0).build().await;
    assert!(matches!(
        result,
        Err(BurrowError::World(WorldError::NotWalkable(0, 0)))
    ));
}

#[tokio::test]
async fn test_startup_mobs_show_in_room_info() {
    let (addr, _game) = start(builder().mob(MobSpawn::new("beetle", 5, 1, 1))).await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "init", "username": "scout"})).await;
    expect_type(&mut ws, "registration_successful").await;
    let info = expect_type(&mut ws, "room_info").await;
    assert_eq!(info["entities"][0]["entity_name"], "beetle");
}
