//! Test fixtures and frame builders
//!
//! Provides reusable user ids and client frames for integration tests.

use relay_core::Snowflake;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};

/// Signing secret shared by the test server and the token helper
pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Counter for unique user ids
static USER_COUNTER: AtomicI64 = AtomicI64::new(1_000);

/// Get a user id no other test uses
pub fn unique_user_id() -> Snowflake {
    Snowflake::new(USER_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Heartbeat frame (op=1)
pub fn heartbeat_frame() -> Value {
    json!({ "op": 1 })
}

/// Identify frame (op=2)
pub fn identify_frame(token: &str) -> Value {
    json!({ "op": 2, "d": { "token": token } })
}

/// Command frame (op=3)
pub fn command_frame(name: &str, data: Value) -> Value {
    json!({ "op": 3, "t": name, "d": data })
}

/// CREATE_CONVERSATION payload for a direct conversation
pub fn direct_conversation(other: Snowflake, nonce: &str) -> Value {
    json!({
        "kind": "direct",
        "participant_ids": [other.to_string()],
        "nonce": nonce,
    })
}
