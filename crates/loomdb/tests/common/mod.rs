//! Shared harness for the messaging integration tests: a settled
//! environment with a scripted transport, a recording event sink, and a
//! logged-in current partner.

#![allow(dead_code)]

use loomdb::{
    core::{Env, MemorySink, MemorySinkHandle, Patch, RecordId, ScriptedTransport, Store, Value},
    schema,
};
use serde_json::json;

pub struct Harness {
    pub env: Env,
    pub transport: ScriptedTransport,
    pub events: MemorySinkHandle,
    pub me: RecordId,
}

/// Environment with partner 1 ("Me") logged in as the current partner.
pub fn harness() -> Harness {
    let transport = ScriptedTransport::new();
    let mut env = schema::new_env(Box::new(transport.clone())).expect("messaging schema builds");
    let sink = MemorySink::new();
    let events = sink.handle();
    env.bus.subscribe(Box::new(sink));
    let me = schema::init_current_partner(&mut env, &json!({ "id": 1, "name": "Me" }))
        .expect("current partner inserts");

    Harness {
        env,
        transport,
        events,
        me,
    }
}

/// Server payload of a direct chat between the current partner and "Ada".
pub fn chat_payload(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "model": "mail.channel",
        "channel_type": "chat",
        "uuid": format!("uuid-{id}"),
        "is_minimized": false,
        "is_pinned": true,
        "members": [
            { "id": 1, "name": "Me" },
            { "id": 2, "name": "Ada" },
        ],
    })
}

pub fn insert_chat(env: &mut Env, id: i64) -> RecordId {
    loomdb::actions::thread::insert(env, &chat_payload(id)).expect("chat inserts")
}

pub fn message_payload(id: i64, author_id: i64, body: &str) -> serde_json::Value {
    json!({
        "id": id,
        "body": body,
        "author": { "id": author_id },
    })
}

/// Merge message payloads into a thread the way a notification handler would.
pub fn deliver_messages(env: &mut Env, thread: RecordId, payloads: &[serde_json::Value]) {
    let patches = payloads
        .iter()
        .map(|p| loomdb::convert::message_patch(p).expect("message payload converts"))
        .collect();
    env.update(thread, Patch::new().insert("messages", patches))
        .expect("messages merge");
}

pub fn message_by_server_id(store: &Store, id: i64) -> RecordId {
    store
        .find("message", |s, record| s.value(record, "id") == &Value::Int(id))
        .expect("message exists")
}

pub fn partner_by_server_id(store: &Store, id: i64) -> RecordId {
    loomdb::entities::partner::by_server_id(store, id).expect("partner exists")
}
