//! Gateway Integration Tests
//!
//! Each test starts an in-process gateway on the in-memory store and talks
//! to it over a real WebSocket.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use integration_tests::{direct_conversation, unique_user_id, TestServer};
use relay_gateway::protocol::CloseCode;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_stats_count_identified_connections() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = unique_user_id();

    let (_first, _) = server.connect_as(alice).await.unwrap();
    let (_second, _) = server.connect_as(alice).await.unwrap();
    let (_bob, _) = server.connect_as(unique_user_id()).await.unwrap();

    let response = server.get("/health/stats").await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: serde_json::Value = response.json().await.unwrap();
    assert_eq!(stats["connections"], 3);
    assert_eq!(stats["users"], 2);
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_hello_then_ready() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = unique_user_id();

    let (client, ready) = server.connect_as(alice).await.unwrap();

    assert!(client.heartbeat_interval > 0);
    assert_eq!(ready["user_id"], alice.to_string());
    assert_eq!(ready["online_user_ids"], json!([alice.to_string()]));
    assert!(ready["session_id"].is_string());
}

#[tokio::test]
async fn test_heartbeat_is_acknowledged() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.open().await.unwrap();

    client.heartbeat().await.unwrap();
    let ack = client.expect_op(11).await.unwrap();
    assert!(ack.get("d").is_none());
}

#[tokio::test]
async fn test_command_before_identify_closes() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.open().await.unwrap();

    client
        .command("JOIN_CONVERSATION", json!({ "room_id": "1" }))
        .await
        .unwrap();

    assert_eq!(client.expect_close().await.unwrap(), CloseCode::NotAuthenticated);
}

#[tokio::test]
async fn test_invalid_token_closes() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.open().await.unwrap();

    client
        .send(integration_tests::identify_frame("not-a-token"))
        .await
        .unwrap();

    let code = client.expect_close().await.unwrap();
    assert_eq!(code, CloseCode::AuthenticationFailed);
    assert!(!code.should_reconnect());
}

#[tokio::test]
async fn test_malformed_frame_closes() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.open().await.unwrap();

    client.send(json!({ "op": "nope" })).await.unwrap();

    assert_eq!(client.expect_close().await.unwrap(), CloseCode::DecodeError);
}

// ============================================================================
// Presence Tests
// ============================================================================

#[tokio::test]
async fn test_presence_online_and_offline() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (alice_id, bob_id) = (unique_user_id(), unique_user_id());

    let (mut alice, _) = server.connect_as(alice_id).await.unwrap();
    let (bob, ready) = server.connect_as(bob_id).await.unwrap();

    let online = ready["online_user_ids"].as_array().unwrap();
    assert!(online.contains(&json!(alice_id.to_string())));
    assert!(online.contains(&json!(bob_id.to_string())));

    let changed = alice.expect_event("PRESENCE_CHANGED").await.unwrap();
    assert_eq!(changed, json!({ "user_id": bob_id.to_string(), "status": "online" }));

    bob.close().await.unwrap();

    let changed = alice.expect_event("PRESENCE_CHANGED").await.unwrap();
    assert_eq!(changed, json!({ "user_id": bob_id.to_string(), "status": "offline" }));
}

#[tokio::test]
async fn test_second_connection_does_not_announce_presence() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (alice_id, bob_id) = (unique_user_id(), unique_user_id());

    let (mut alice, _) = server.connect_as(alice_id).await.unwrap();
    let (_bob, _) = server.connect_as(bob_id).await.unwrap();
    alice.expect_event("PRESENCE_CHANGED").await.unwrap();

    let (second, _) = server.connect_as(bob_id).await.unwrap();
    second.close().await.unwrap();

    alice
        .assert_no_event("PRESENCE_CHANGED", Duration::from_millis(300))
        .await
        .unwrap();
}

// ============================================================================
// Relay Tests
// ============================================================================

#[tokio::test]
async fn test_direct_message_round_trip() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (alice_id, bob_id) = (unique_user_id(), unique_user_id());

    let (mut alice, _) = server.connect_as(alice_id).await.unwrap();
    let (mut bob, _) = server.connect_as(bob_id).await.unwrap();

    // Create the conversation; both online members are joined automatically
    alice
        .command("CREATE_CONVERSATION", direct_conversation(bob_id, "c1"))
        .await
        .unwrap();
    let created = alice.expect_event("CONVERSATION_CREATED").await.unwrap();
    assert_eq!(created["nonce"], "c1");
    let room_id = created["id"].as_str().unwrap().to_string();

    let announced = bob.expect_event("CONVERSATION_CREATED").await.unwrap();
    assert_eq!(announced["id"], room_id);
    assert!(announced.get("nonce").is_none());

    // Send
    alice
        .command(
            "SEND_MESSAGE",
            json!({ "room_id": room_id, "content": "hello", "nonce": "m1" }),
        )
        .await
        .unwrap();

    let received = bob.expect_event("NEW_MESSAGE").await.unwrap();
    assert_eq!(received["content"], "hello");
    assert_eq!(received["sender_id"], alice_id.to_string());

    let delivered = alice.expect_event("MESSAGE_DELIVERED").await.unwrap();
    assert_eq!(delivered["nonce"], "m1");
    assert_eq!(delivered["message_id"], received["id"]);

    // Read receipt goes back to the author
    bob.command(
        "MARK_READ",
        json!({ "room_id": room_id, "message_ids": [received["id"]] }),
    )
    .await
    .unwrap();

    let read = alice.expect_event("MESSAGE_READ").await.unwrap();
    assert_eq!(read["message_id"], received["id"]);
    assert_eq!(read["reader_id"], bob_id.to_string());
}

#[tokio::test]
async fn test_sender_does_not_receive_own_message() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (alice_id, bob_id) = (unique_user_id(), unique_user_id());

    let (mut alice, _) = server.connect_as(alice_id).await.unwrap();
    let (_bob, _) = server.connect_as(bob_id).await.unwrap();

    alice
        .command("CREATE_CONVERSATION", direct_conversation(bob_id, "c1"))
        .await
        .unwrap();
    let created = alice.expect_event("CONVERSATION_CREATED").await.unwrap();

    alice
        .command(
            "SEND_MESSAGE",
            json!({ "room_id": created["id"], "content": "echo?" }),
        )
        .await
        .unwrap();

    alice.expect_event("MESSAGE_DELIVERED").await.unwrap();
    alice
        .assert_no_event("NEW_MESSAGE", Duration::from_millis(300))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_typing_start_and_stop() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (alice_id, bob_id) = (unique_user_id(), unique_user_id());

    let (mut alice, _) = server.connect_as(alice_id).await.unwrap();
    let (mut bob, _) = server.connect_as(bob_id).await.unwrap();

    alice
        .command("CREATE_CONVERSATION", direct_conversation(bob_id, "c1"))
        .await
        .unwrap();
    let created = alice.expect_event("CONVERSATION_CREATED").await.unwrap();
    let room = json!({ "room_id": created["id"] });

    alice.command("TYPING_START", room.clone()).await.unwrap();
    let typing = bob.expect_event("USER_TYPING").await.unwrap();
    assert_eq!(typing["user_id"], alice_id.to_string());
    assert_eq!(typing["room_id"], created["id"]);

    alice.command("TYPING_STOP", room).await.unwrap();
    let stopped = bob.expect_event("USER_STOPPED_TYPING").await.unwrap();
    assert_eq!(stopped["user_id"], alice_id.to_string());
}

#[tokio::test]
async fn test_rejected_command_keeps_socket_open() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (mut alice, _) = server.connect_as(unique_user_id()).await.unwrap();

    alice
        .command(
            "JOIN_CONVERSATION",
            json!({ "room_id": "424242", "nonce": "j1" }),
        )
        .await
        .unwrap();

    let rejected = alice.expect_event("COMMAND_REJECTED").await.unwrap();
    assert_eq!(rejected["command"], "JOIN_CONVERSATION");
    assert_eq!(rejected["code"], "UNKNOWN_ROOM");
    assert_eq!(rejected["nonce"], "j1");

    alice.heartbeat().await.unwrap();
    alice.expect_op(11).await.unwrap();
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let (mut alice, _) = server.connect_as(unique_user_id()).await.unwrap();

    alice.command("SHOUT", json!({})).await.unwrap();

    let rejected = alice.expect_event("COMMAND_REJECTED").await.unwrap();
    assert_eq!(rejected["code"], "UNKNOWN_COMMAND");
}
