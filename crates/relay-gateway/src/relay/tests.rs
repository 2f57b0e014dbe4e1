use super::*;
use crate::connection::Connection;
use crate::protocol::GatewayMessage;
use crate::store::InMemoryStore;
use async_trait::async_trait;
use relay_core::{
    DomainError, MembershipStore, Message, MessageKind, MessageStore, NewMessage, ReadReceipt,
    RepoResult, Room, RoomKind, Snowflake,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

const TTL: Duration = Duration::from_millis(3000);
const ROOM: Snowflake = Snowflake::new(100);
const U: Snowflake = Snowflake::new(1);
const A: Snowflake = Snowflake::new(2);
const B: Snowflake = Snowflake::new(3);
const OUTSIDER: Snowflake = Snowflake::new(9);

struct Client {
    conn: Arc<Connection>,
    rx: mpsc::Receiver<GatewayMessage>,
}

impl Client {
    fn drain(&mut self) -> Vec<(String, Value)> {
        let mut events = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            events.push((msg.t.unwrap_or_default(), msg.d.unwrap_or_default()));
        }
        events
    }

    /// Payloads of one event type received since the last drain
    fn events(&mut self, name: &str) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter(|(t, _)| t == name)
            .map(|(_, d)| d)
            .collect()
    }
}

fn settings() -> RelaySettings {
    RelaySettings {
        typing_ttl: TTL,
        max_content_length: 4000,
    }
}

/// Relay over an in-memory store seeded with group `ROOM` = {U, A, B}
fn relay() -> (RelayDispatcher, Arc<InMemoryStore>) {
    let store = InMemoryStore::new_shared(1);
    store.insert_room(Room::new(ROOM, RoomKind::Group, Some("team".into()), U, [U, A, B]));
    let relay = RelayDispatcher::new(RelayStores::shared(store.clone()), settings());
    (relay, store)
}

fn connect(relay: &RelayDispatcher, user: Snowflake) -> Client {
    let (tx, rx) = mpsc::channel(64);
    let (conn, _ready) = relay.connect(user, tx);
    Client { conn, rx }
}

async fn joined(relay: &RelayDispatcher, user: Snowflake) -> Client {
    let client = connect(relay, user);
    relay.join_conversation(&client.conn, ROOM).await.unwrap();
    client
}

async fn send(relay: &RelayDispatcher, client: &Client, content: &str) -> RelayResult<Message> {
    relay
        .send_message(&client.conn, ROOM, content.to_string(), MessageKind::Text, None)
        .await
}

/// Let spawned typing timers observe the advanced clock
async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

// === Connections & presence ===

#[tokio::test]
async fn test_connect_reports_online_users() {
    let (relay, _) = relay();
    let _a = connect(&relay, A);

    let (tx, _rx) = mpsc::channel(8);
    let (conn, ready) = relay.connect(U, tx);
    assert_eq!(ready.user_id, U);
    assert_eq!(ready.session_id, conn.id().to_string());
    assert_eq!(ready.online_user_ids, vec![U, A]);
}

#[tokio::test]
async fn test_presence_changes_reach_other_users_only() {
    let (relay, _) = relay();
    let mut u = connect(&relay, U);
    let mut a = connect(&relay, A);

    let online = u.events("PRESENCE_CHANGED");
    assert_eq!(online.len(), 1);
    assert_eq!(online[0]["user_id"], "2");
    assert_eq!(online[0]["status"], "online");
    assert!(a.events("PRESENCE_CHANGED").is_empty());

    assert!(relay.disconnect(a.conn.id()));
    assert!(!relay.disconnect(a.conn.id()));
    let offline = u.events("PRESENCE_CHANGED");
    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0]["status"], "offline");
}

#[tokio::test]
async fn test_disconnect_drops_joins() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    assert!(relay.rooms().is_joined(ROOM, u.conn.id()));

    relay.disconnect(u.conn.id());
    assert!(!relay.rooms().is_joined(ROOM, u.conn.id()));
    assert!(relay.rooms().rooms_of(u.conn.id()).is_empty());
    assert!(!relay.registry().is_online(U));
}

#[tokio::test]
async fn test_sweep_closed_releases_dropped_connections() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let conn_id = u.conn.id();
    drop(u.rx);

    assert_eq!(relay.sweep_closed(), 1);
    assert!(!relay.rooms().is_joined(ROOM, conn_id));
    assert_eq!(relay.stats().connections, 0);
}

// === Joins ===

#[tokio::test]
async fn test_join_loads_room_on_cache_miss() {
    let (relay, _) = relay();
    assert_eq!(relay.rooms().room_count(), 0);

    let u = connect(&relay, U);
    let room = relay.join_conversation(&u.conn, ROOM).await.unwrap();
    assert_eq!(room.member_count(), 3);
    assert_eq!(relay.rooms().room_count(), 1);
}

#[tokio::test]
async fn test_join_unknown_room() {
    let (relay, _) = relay();
    let u = connect(&relay, U);
    let err = relay
        .join_conversation(&u.conn, Snowflake::new(404))
        .await
        .unwrap_err();
    assert_eq!(err, RelayError::RoomNotFound(Snowflake::new(404)));
}

#[tokio::test]
async fn test_non_member_cannot_join_or_receive() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let mut outsider = connect(&relay, OUTSIDER);

    let err = relay
        .join_conversation(&outsider.conn, ROOM)
        .await
        .unwrap_err();
    assert_eq!(err, RelayError::Unauthorized { room_id: ROOM });
    assert_eq!(err.code(), "UNAUTHORIZED");

    send(&relay, &u, "secret").await.unwrap();
    assert!(outsider.events("NEW_MESSAGE").is_empty());
}

#[tokio::test]
async fn test_leave_twice_equals_once() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;

    assert!(relay.leave_conversation(&a.conn, ROOM));
    let after_once: HashSet<_> = relay.rooms().joined_connections(ROOM).into_iter().collect();
    assert!(!relay.leave_conversation(&a.conn, ROOM));
    let after_twice: HashSet<_> = relay.rooms().joined_connections(ROOM).into_iter().collect();
    assert_eq!(after_twice, after_once);
    assert_eq!(after_once.len(), 1);

    a.drain();
    send(&relay, &u, "anyone?").await.unwrap();
    assert!(a.events("NEW_MESSAGE").is_empty());
}

/// Membership store whose reads wait until the test releases them
struct GatedMembership {
    inner: Arc<InMemoryStore>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MembershipStore for GatedMembership {
    async fn get_room(&self, room_id: Snowflake) -> RepoResult<Room> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.get_room(room_id).await
    }
}

#[tokio::test]
async fn test_disconnect_during_room_load_leaves_no_join() {
    let store = InMemoryStore::new_shared(1);
    store.insert_room(Room::new(ROOM, RoomKind::Group, Some("team".into()), U, [U, A, B]));
    let gate = Arc::new(GatedMembership {
        inner: store.clone(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let stores = RelayStores {
        membership: gate.clone(),
        ..RelayStores::shared(store)
    };
    let relay = RelayDispatcher::new(stores, settings());
    let u = connect(&relay, U);
    let conn_id = u.conn.id();

    let (result, ()) = tokio::join!(relay.join_conversation(&u.conn, ROOM), async {
        gate.entered.notified().await;
        assert!(relay.disconnect(conn_id));
        gate.release.notify_one();
    });

    assert!(result.is_ok());
    assert!(!relay.registry().is_online(U));
    assert!(!relay.rooms().is_joined(ROOM, conn_id));
    assert!(!relay.rooms().is_user_joined(ROOM, U));
    assert!(relay.rooms().rooms_of(conn_id).is_empty());
    assert_eq!(relay.rooms().room_count(), 0);
}

#[tokio::test]
async fn test_room_is_reloaded_after_last_leave() {
    let (relay, store) = relay();
    let u = joined(&relay, U).await;
    assert_eq!(relay.rooms().room_count(), 1);

    relay.disconnect(u.conn.id());
    assert_eq!(relay.rooms().room_count(), 0);

    // U is removed behind the relay's back
    store.insert_room(Room::new(ROOM, RoomKind::Group, Some("team".into()), A, [A, B]));

    let u = connect(&relay, U);
    let err = relay.join_conversation(&u.conn, ROOM).await.unwrap_err();
    assert_eq!(err, RelayError::Unauthorized { room_id: ROOM });
    assert_eq!(relay.rooms().room_count(), 0);

    let a = connect(&relay, A);
    let room = relay.join_conversation(&a.conn, ROOM).await.unwrap();
    assert!(!room.has_member(U));
}

#[tokio::test]
async fn test_rooms_read_without_joining_are_not_cached() {
    let (relay, _) = relay();
    let u = connect(&relay, U);

    relay
        .update_conversation(&u.conn, ROOM, Some("renamed".into()), &[], &[], None)
        .await
        .unwrap();
    assert_eq!(relay.rooms().room_count(), 0);

    let direct = relay
        .create_conversation(&u.conn, RoomKind::Direct, &[A], None, None)
        .await
        .unwrap();
    assert!(relay.rooms().is_joined(direct.id, u.conn.id()));
    assert_eq!(relay.rooms().room_count(), 1);
}

// === Messages ===

#[tokio::test]
async fn test_fan_out_completeness_and_exclusivity() {
    let (relay, store) = relay();
    let mut u1 = joined(&relay, U).await;
    let mut u2 = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    // Online member that never joined
    let mut b = connect(&relay, B);
    for client in [&mut u1, &mut u2, &mut a, &mut b] {
        client.drain();
    }

    let message = relay
        .send_message(
            &u1.conn,
            ROOM,
            "hello".to_string(),
            MessageKind::Text,
            Some("n-1".to_string()),
        )
        .await
        .unwrap();

    let received = a.events("NEW_MESSAGE");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["id"], message.id.to_string());
    assert_eq!(received[0]["content"], "hello");

    for sender in [&mut u1, &mut u2] {
        let events = sender.drain();
        assert!(events.iter().all(|(t, _)| t != "NEW_MESSAGE"));
        let delivered: Vec<&Value> = events
            .iter()
            .filter(|(t, _)| t == "MESSAGE_DELIVERED")
            .map(|(_, d)| d)
            .collect();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0]["message_id"], message.id.to_string());
        assert_eq!(delivered[0]["nonce"], "n-1");
    }

    assert!(b.drain().is_empty());
    assert_eq!(store.messages_in(ROOM).len(), 1);
}

#[tokio::test]
async fn test_send_requires_join() {
    let (relay, store) = relay();
    let u = connect(&relay, U);

    let err = send(&relay, &u, "hi").await.unwrap_err();
    assert_eq!(err, RelayError::NotAMember(ROOM));
    assert!(store.messages_in(ROOM).is_empty());
}

#[tokio::test]
async fn test_send_rejects_empty_and_oversized_content() {
    let (relay, store) = relay();
    let u = joined(&relay, U).await;

    let err = send(&relay, &u, "   ").await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PAYLOAD");

    let long = "x".repeat(4001);
    let err = send(&relay, &u, &long).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PAYLOAD");
    assert!(store.messages_in(ROOM).is_empty());
}

#[tokio::test]
async fn test_content_limit_follows_settings() {
    let store = InMemoryStore::new_shared(1);
    store.insert_room(Room::new(ROOM, RoomKind::Group, Some("team".into()), U, [U, A]));
    let settings = RelaySettings {
        max_content_length: 8000,
        ..settings()
    };
    let relay = RelayDispatcher::new(RelayStores::shared(store.clone()), settings);
    let u = joined(&relay, U).await;

    send(&relay, &u, &"x".repeat(5000)).await.unwrap();
    let err = send(&relay, &u, &"x".repeat(8001)).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PAYLOAD");
    assert_eq!(store.messages_in(ROOM).len(), 1);
}

#[tokio::test]
async fn test_offline_recipient_is_dropped_silently() {
    let (relay, store) = relay();
    let mut u = joined(&relay, U).await;
    u.drain();

    let message = send(&relay, &u, "are you there?").await.unwrap();
    assert_eq!(store.messages_in(ROOM), vec![message]);
    assert_eq!(u.events("MESSAGE_DELIVERED").len(), 1);

    // B comes online later and gets nothing queued
    let mut b = joined(&relay, B).await;
    assert!(b.events("NEW_MESSAGE").is_empty());
}

#[tokio::test]
async fn test_sequential_sends_persist_in_order() {
    let (relay, store) = relay();
    let u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    a.drain();

    for i in 0..10 {
        send(&relay, &u, &format!("m{i}")).await.unwrap();
    }

    let persisted: Vec<String> = store
        .messages_in(ROOM)
        .into_iter()
        .map(|m| m.content)
        .collect();
    let received: Vec<String> = a
        .events("NEW_MESSAGE")
        .into_iter()
        .map(|d| d["content"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
    assert_eq!(persisted, expected);
    assert_eq!(received, expected);
}

struct FailingMessages;

#[async_trait]
impl MessageStore for FailingMessages {
    async fn append(&self, _message: NewMessage) -> RepoResult<Message> {
        Err(DomainError::DatabaseError("connection reset".into()))
    }

    async fn mark_read(
        &self,
        _room_id: Snowflake,
        _message_id: Snowflake,
        _reader_id: Snowflake,
    ) -> RepoResult<Option<ReadReceipt>> {
        Err(DomainError::DatabaseError("connection reset".into()))
    }
}

#[tokio::test]
async fn test_persistence_failure_aborts_fan_out() {
    let store = InMemoryStore::new_shared(1);
    store.insert_room(Room::new(ROOM, RoomKind::Group, Some("team".into()), U, [U, A]));
    let stores = RelayStores {
        messages: Arc::new(FailingMessages),
        ..RelayStores::shared(store)
    };
    let relay = RelayDispatcher::new(stores, settings());

    let mut u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    u.drain();
    a.drain();

    let err = send(&relay, &u, "lost").await.unwrap_err();
    assert_eq!(err.code(), "PERSISTENCE_FAILURE");
    assert!(u.drain().is_empty());
    assert!(a.drain().is_empty());

    let err = relay
        .mark_read(&a.conn, ROOM, &[Snowflake::new(1)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PERSISTENCE_FAILURE");
}

// === Read receipts ===

#[tokio::test]
async fn test_read_receipt_reaches_sender_only() {
    let (relay, _) = relay();
    let mut u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    let mut b = joined(&relay, B).await;
    let message = send(&relay, &u, "ping").await.unwrap();
    for client in [&mut u, &mut a, &mut b] {
        client.drain();
    }

    let receipts = relay.mark_read(&a.conn, ROOM, &[message.id]).await.unwrap();
    assert_eq!(receipts.len(), 1);

    let read = u.events("MESSAGE_READ");
    assert_eq!(read.len(), 1);
    assert_eq!(read[0]["message_id"], message.id.to_string());
    assert_eq!(read[0]["reader_id"], "2");
    assert!(a.drain().is_empty());
    assert!(b.drain().is_empty());

    // Re-marking is a no-op
    let again = relay.mark_read(&a.conn, ROOM, &[message.id]).await.unwrap();
    assert!(again.is_empty());
    assert!(u.events("MESSAGE_READ").is_empty());
}

#[tokio::test]
async fn test_mark_read_skips_unknown_and_own_messages() {
    let (relay, _) = relay();
    let mut u = joined(&relay, U).await;
    let own = send(&relay, &u, "mine").await.unwrap();
    u.drain();

    let receipts = relay
        .mark_read(&u.conn, ROOM, &[own.id, Snowflake::new(12345)])
        .await
        .unwrap();
    assert_eq!(receipts.len(), 1);
    assert!(u.events("MESSAGE_READ").is_empty());
}

#[tokio::test]
async fn test_mark_read_requires_join() {
    let (relay, store) = relay();
    let mut u = joined(&relay, U).await;
    // Member of the room, online, never joined
    let a = connect(&relay, A);
    let message = send(&relay, &u, "ping").await.unwrap();
    u.drain();

    let err = relay.mark_read(&a.conn, ROOM, &[message.id]).await.unwrap_err();
    assert_eq!(err, RelayError::NotAMember(ROOM));
    assert!(u.events("MESSAGE_READ").is_empty());

    // Nothing was recorded, so a later read after joining is announced
    relay.join_conversation(&a.conn, ROOM).await.unwrap();
    let receipts = relay.mark_read(&a.conn, ROOM, &[message.id]).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(u.events("MESSAGE_READ").len(), 1);
    assert_eq!(store.messages_in(ROOM).len(), 1);
}

#[tokio::test]
async fn test_mark_read_requires_membership() {
    let (relay, _) = relay();
    let outsider = connect(&relay, OUTSIDER);
    let err = relay
        .mark_read(&outsider.conn, ROOM, &[Snowflake::new(1)])
        .await
        .unwrap_err();
    assert_eq!(err, RelayError::NotAMember(ROOM));
}

// === Typing ===

#[tokio::test(start_paused = true)]
async fn test_typing_expires_with_exactly_one_stop() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    a.drain();

    relay.typing_start(&u.conn, ROOM).unwrap();
    let typing = a.events("USER_TYPING");
    assert_eq!(typing.len(), 1);
    assert_eq!(typing[0]["user_id"], "1");

    tokio::time::advance(TTL + Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(a.events("USER_STOPPED_TYPING").len(), 1);

    tokio::time::advance(TTL * 3).await;
    settle().await;
    assert!(a.events("USER_STOPPED_TYPING").is_empty());
    assert_eq!(relay.stats().typing, 0);
}

#[tokio::test(start_paused = true)]
async fn test_typing_stop_before_expiry() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;

    relay.typing_start(&u.conn, ROOM).unwrap();
    tokio::time::advance(Duration::from_millis(1000)).await;
    a.drain();

    assert!(relay.typing_stop(&u.conn, ROOM));
    assert_eq!(a.events("USER_STOPPED_TYPING").len(), 1);
    assert!(!relay.typing_stop(&u.conn, ROOM));

    tokio::time::advance(TTL * 2).await;
    settle().await;
    assert!(a.events("USER_STOPPED_TYPING").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_typing_restart_rearms() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;

    relay.typing_start(&u.conn, ROOM).unwrap();
    tokio::time::advance(Duration::from_millis(2000)).await;
    settle().await;
    relay.typing_start(&u.conn, ROOM).unwrap();
    tokio::time::advance(Duration::from_millis(2000)).await;
    settle().await;
    a.drain();

    tokio::time::advance(Duration::from_millis(1001)).await;
    settle().await;
    assert_eq!(a.events("USER_STOPPED_TYPING").len(), 1);
}

#[tokio::test]
async fn test_typing_requires_join() {
    let (relay, _) = relay();
    let u = connect(&relay, U);
    let err = relay.typing_start(&u.conn, ROOM).unwrap_err();
    assert_eq!(err, RelayError::NotAMember(ROOM));
}

#[tokio::test]
async fn test_send_message_clears_typing() {
    let (relay, _) = relay();
    let u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    relay.typing_start(&u.conn, ROOM).unwrap();
    a.drain();

    send(&relay, &u, "done typing").await.unwrap();
    let names: Vec<String> = a.drain().into_iter().map(|(t, _)| t).collect();
    assert_eq!(names, vec!["USER_STOPPED_TYPING", "NEW_MESSAGE"]);
    assert_eq!(relay.stats().typing, 0);
}

#[tokio::test]
async fn test_last_disconnect_stops_typing() {
    let (relay, _) = relay();
    let u1 = joined(&relay, U).await;
    let u2 = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    relay.typing_start(&u1.conn, ROOM).unwrap();
    a.drain();

    // Another device keeps the user online
    relay.disconnect(u1.conn.id());
    assert!(a.events("USER_STOPPED_TYPING").is_empty());

    relay.disconnect(u2.conn.id());
    assert_eq!(a.events("USER_STOPPED_TYPING").len(), 1);
}

// === Conversations ===

#[tokio::test]
async fn test_create_direct_validates_participants() {
    let (relay, _) = relay();
    let u = connect(&relay, U);

    let err = relay
        .create_conversation(&u.conn, RoomKind::Direct, &[A, B], None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARTICIPANTS");

    let err = relay
        .create_conversation(&u.conn, RoomKind::Direct, &[U], None, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARTICIPANTS");
}

#[tokio::test]
async fn test_create_group_requires_name() {
    let (relay, _) = relay();
    let u = connect(&relay, U);

    let err = relay
        .create_conversation(&u.conn, RoomKind::Group, &[A], Some("  ".into()), None)
        .await
        .unwrap_err();
    assert_eq!(err, RelayError::MissingGroupName);

    let err = relay
        .create_conversation(&u.conn, RoomKind::Group, &[], Some("solo".into()), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARTICIPANTS");
}

#[tokio::test]
async fn test_create_conversation_joins_and_notifies_participants() {
    let (relay, _) = relay();
    let mut u = connect(&relay, U);
    let mut a1 = connect(&relay, A);
    let mut a2 = connect(&relay, A);
    let mut outsider = connect(&relay, OUTSIDER);
    for client in [&mut u, &mut a1, &mut a2, &mut outsider] {
        client.drain();
    }

    let room = relay
        .create_conversation(&u.conn, RoomKind::Direct, &[A], None, Some("c-1".into()))
        .await
        .unwrap();
    assert_eq!(room.member_count(), 2);

    let created = u.events("CONVERSATION_CREATED");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["nonce"], "c-1");
    assert_eq!(created[0]["id"], room.id.to_string());

    for client in [&mut a1, &mut a2] {
        let created = client.events("CONVERSATION_CREATED");
        assert_eq!(created.len(), 1);
        assert!(created[0].get("nonce").is_none());
        assert!(relay.rooms().is_joined(room.id, client.conn.id()));
    }
    assert!(outsider.drain().is_empty());

    // Auto-joined connections receive messages right away
    relay
        .send_message(&u.conn, room.id, "hi".into(), MessageKind::Text, None)
        .await
        .unwrap();
    assert_eq!(a1.events("NEW_MESSAGE").len(), 1);
    assert_eq!(a2.events("NEW_MESSAGE").len(), 1);
}

#[tokio::test]
async fn test_direct_conversation_is_reused() {
    let (relay, _) = relay();
    let u = connect(&relay, U);
    let a = connect(&relay, A);

    let first = relay
        .create_conversation(&u.conn, RoomKind::Direct, &[A], None, None)
        .await
        .unwrap();
    let second = relay
        .create_conversation(&a.conn, RoomKind::Direct, &[U], None, None)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_update_rejects_direct_rooms_and_non_members() {
    let (relay, _) = relay();
    let u = connect(&relay, U);
    let outsider = connect(&relay, OUTSIDER);
    let direct = relay
        .create_conversation(&u.conn, RoomKind::Direct, &[A], None, None)
        .await
        .unwrap();

    let err = relay
        .update_conversation(&u.conn, direct.id, Some("x".into()), &[], &[], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARTICIPANTS");

    let err = relay
        .update_conversation(&outsider.conn, ROOM, Some("mine".into()), &[], &[], None)
        .await
        .unwrap_err();
    assert_eq!(err, RelayError::NotAMember(ROOM));

    let err = relay
        .update_conversation(&u.conn, ROOM, None, &[], &[], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PAYLOAD");

    let err = relay
        .update_conversation(&u.conn, ROOM, None, &[], &[A, B], None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PARTICIPANTS");
}

#[tokio::test]
async fn test_update_membership_refreshes_joins_and_audience() {
    let (relay, store) = relay();
    let mut u = joined(&relay, U).await;
    let mut a = joined(&relay, A).await;
    let mut b = joined(&relay, B).await;
    let mut newcomer = connect(&relay, OUTSIDER);
    relay.typing_start(&b.conn, ROOM).unwrap();
    for client in [&mut u, &mut a, &mut b, &mut newcomer] {
        client.drain();
    }

    let room = relay
        .update_conversation(
            &u.conn,
            ROOM,
            Some("core team".into()),
            &[OUTSIDER],
            &[B],
            Some("up-1".into()),
        )
        .await
        .unwrap();

    assert_eq!(room.name.as_deref(), Some("core team"));
    assert!(room.has_member(OUTSIDER));
    assert!(!room.has_member(B));
    assert_eq!(store.get_room(ROOM).await.unwrap().members, room.members);

    // Removed user's joins and typing are gone; added user is joined
    assert!(!relay.rooms().is_joined(ROOM, b.conn.id()));
    assert!(relay.rooms().is_joined(ROOM, newcomer.conn.id()));
    assert_eq!(relay.stats().typing, 0);

    let a_events: Vec<String> = a.drain().into_iter().map(|(t, _)| t).collect();
    assert_eq!(a_events, vec!["USER_STOPPED_TYPING", "CONVERSATION_UPDATED"]);

    let updated = u.events("CONVERSATION_UPDATED");
    assert_eq!(updated[0]["nonce"], "up-1");
    // Old and new members are both told
    assert_eq!(b.events("CONVERSATION_UPDATED").len(), 1);
    assert_eq!(newcomer.events("CONVERSATION_UPDATED").len(), 1);

    send(&relay, &u, "welcome").await.unwrap();
    assert_eq!(newcomer.events("NEW_MESSAGE").len(), 1);
    assert!(b.events("NEW_MESSAGE").is_empty());
}

#[tokio::test]
async fn test_stats() {
    let (relay, _) = relay();
    let _u1 = joined(&relay, U).await;
    let _u2 = connect(&relay, U);
    let _a = connect(&relay, A);

    assert_eq!(
        relay.stats(),
        RelayStats {
            connections: 3,
            users: 2,
            rooms: 1,
            typing: 0,
            presence_transitions: 2,
        }
    );
}
