use crate::{
    convert,
    entities::thread::{CHANNEL_MODEL, FoldState},
    error::Error,
};
use loomdb_core::{
    env::Env,
    error::InternalError,
    obs::BusEvent,
    store::{Patch, RecordId},
    transport::TransportRequest,
};
use serde_json::json;

/// No composer input for this long means the current partner stopped typing.
pub const CURRENT_PARTNER_INACTIVE_TYPING_MS: u64 = 5_000;
/// Re-notify the server while the current partner keeps typing this long.
pub const CURRENT_PARTNER_LONG_TYPING_MS: u64 = 50_000;
/// Evict another member from the typing list after this long without a
/// refreshed typing notification from the server.
pub const OTHER_MEMBER_LONG_TYPING_MS: u64 = 60_000;

const INACTIVE_TYPING_TIMER: &str = "typing_inactivity";
const LONG_TYPING_TIMER: &str = "typing_long";
const OTHER_TYPING_TIMER: &str = "other_member_typing";

fn server_id(env: &Env, thread: RecordId) -> i64 {
    env.store.value(thread, "id").as_int().unwrap_or_default()
}

fn is_channel(env: &Env, thread: RecordId) -> bool {
    env.store.value(thread, "model").as_text() == Some(CHANNEL_MODEL)
}

/// Convert a server payload and upsert the thread.
pub fn insert(env: &mut Env, payload: &serde_json::Value) -> Result<RecordId, Error> {
    let patch = convert::thread_patch(payload)?;
    let id = env.insert("thread", patch)?;
    tracing::debug!(thread = %id, "thread inserted");

    Ok(id)
}

pub fn open(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    fold(env, thread, FoldState::Open)
}

/// Optimistically apply a fold state and notify the server. The pending
/// value drives the UI until a matching confirmation clears it.
pub fn fold(env: &mut Env, thread: RecordId, state: FoldState) -> Result<(), Error> {
    tracing::debug!(thread = %thread, state = state.as_str(), "thread fold");
    env.update(thread, Patch::new().set("pending_fold_state", state.as_str()))?;
    notify_fold_state_to_server(env, thread, state)
}

fn notify_fold_state_to_server(
    env: &mut Env,
    thread: RecordId,
    state: FoldState,
) -> Result<(), Error> {
    // fold sync only exists for channels, and needs the channel uuid
    if !is_channel(env, thread) {
        return Ok(());
    }
    let Some(uuid) = env.store.value(thread, "uuid").as_text().map(str::to_string) else {
        return Ok(());
    };
    if uuid.is_empty() {
        return Ok(());
    }

    env.request(
        TransportRequest::new(CHANNEL_MODEL, "channel_fold")
            .kwargs(json!({ "uuid": uuid, "state": state.as_str() })),
    )?;

    Ok(())
}

/// Server push or RPC echo confirming a fold state.
pub fn handle_fold_confirmation(
    env: &mut Env,
    thread: RecordId,
    state: FoldState,
) -> Result<(), Error> {
    env.update(thread, Patch::new().set("server_fold_state", state.as_str()))?;

    Ok(())
}

pub fn pin(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    env.update(thread, Patch::new().set("is_pending_pinned", true))?;
    notify_pin_state_to_server(env, thread)
}

pub fn unpin(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    env.update(thread, Patch::new().set("is_pending_pinned", false))?;
    notify_pin_state_to_server(env, thread)
}

fn notify_pin_state_to_server(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    if !is_channel(env, thread) {
        return Ok(());
    }
    let pending = env.store.value(thread, "is_pending_pinned");
    if pending.is_null() {
        return Ok(());
    }
    let pinned = pending.is_truthy();
    let uuid = env
        .store
        .value(thread, "uuid")
        .as_text()
        .unwrap_or_default()
        .to_string();

    env.request(
        TransportRequest::new(CHANNEL_MODEL, "channel_pin")
            .kwargs(json!({ "uuid": uuid, "pinned": pinned })),
    )?;

    Ok(())
}

pub fn handle_pin_confirmation(env: &mut Env, thread: RecordId, pinned: bool) -> Result<(), Error> {
    env.update(thread, Patch::new().set("is_server_pinned", pinned))?;

    Ok(())
}

/// Mark `message` as the last one seen. Stale or already-pending ids are
/// ignored: the seen marker only moves forward, regardless of which
/// in-flight confirmation resumes first.
pub fn mark_as_seen(env: &mut Env, thread: RecordId, message: RecordId) -> Result<(), Error> {
    if !is_channel(env, thread) {
        return Ok(());
    }
    let message_id = env.store.value(message, "id").as_int().unwrap_or_default();
    let pending = env
        .store
        .value(thread, "pending_seen_message_id")
        .as_int()
        .unwrap_or_default();
    if pending != 0 && message_id <= pending {
        return Ok(());
    }
    let last_seen = env
        .store
        .value(thread, "last_seen_by_current_partner_message_id")
        .as_int()
        .unwrap_or_default();
    if last_seen != 0 && message_id <= last_seen {
        return Ok(());
    }

    tracing::debug!(thread = %thread, message_id, "mark as seen");
    env.update(thread, Patch::new().set("pending_seen_message_id", message_id))?;
    let outcome = env.request(
        TransportRequest::new(CHANNEL_MODEL, "channel_seen")
            .args(json!([[server_id(env, thread)]]))
            .kwargs(json!({ "last_message_id": message_id })),
    );
    if let Err(err) = outcome {
        // roll back the optimistic marker so a later attempt is not blocked
        env.update(thread, Patch::new().clear("pending_seen_message_id"))?;
        return Err(err.into());
    }

    Ok(())
}

/// Server confirmation of a seen marker. Clears the pending id once the
/// confirmation covers it; never moves the known marker backwards.
pub fn handle_seen_confirmation(
    env: &mut Env,
    thread: RecordId,
    last_message_id: i64,
) -> Result<(), Error> {
    let known = env
        .store
        .value(thread, "known_last_seen_message_id")
        .as_int()
        .unwrap_or_default();
    let mut patch = Patch::new().set("known_last_seen_message_id", known.max(last_message_id));

    let pending = env
        .store
        .value(thread, "pending_seen_message_id")
        .as_int()
        .unwrap_or_default();
    if pending != 0 && pending <= last_message_id {
        patch = patch.clear("pending_seen_message_id");
    }
    env.update(thread, patch)?;

    Ok(())
}

pub fn mark_as_fetched(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    if !is_channel(env, thread) {
        return Ok(());
    }
    env.request(
        TransportRequest::new(CHANNEL_MODEL, "channel_fetched")
            .args(json!([[server_id(env, thread)]])),
    )?;

    Ok(())
}

/// Rename the thread. A direct chat stores a per-partner override via
/// `channel_set_custom_name`; a named channel renames for everyone via
/// `channel_rename`. The display name derivation prefers the custom name.
pub fn rename(env: &mut Env, thread: RecordId, new_name: &str) -> Result<(), Error> {
    match env.store.value(thread, "channel_type").as_text() {
        Some("chat") => {
            env.request(
                TransportRequest::new(CHANNEL_MODEL, "channel_set_custom_name")
                    .args(json!([server_id(env, thread)]))
                    .kwargs(json!({ "name": new_name })),
            )?;
            env.update(thread, Patch::new().set("custom_channel_name", new_name))?;
        }
        Some("channel") => {
            env.request(
                TransportRequest::new(CHANNEL_MODEL, "channel_rename")
                    .args(json!([server_id(env, thread)]))
                    .kwargs(json!({ "name": new_name })),
            )?;
            env.update(thread, Patch::new().set("name", new_name))?;
        }
        _ => {
            env.update(thread, Patch::new().set("custom_channel_name", new_name))?;
        }
    }

    Ok(())
}

/// Leave the channel: close its window state and unpin it.
pub fn unsubscribe(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    fold(env, thread, FoldState::Closed)?;
    unpin(env, thread)
}

/// Fetch messages newer than what is known locally, merge them in, and
/// announce how many were actually new.
pub fn load_new_messages(env: &mut Env, thread: RecordId) -> Result<usize, Error> {
    let model = env
        .store
        .value(thread, "model")
        .as_text()
        .unwrap_or_default()
        .to_string();
    let response = env.request(
        TransportRequest::new(model, "message_fetch")
            .args(json!([server_id(env, thread)]))
            .kwargs(json!({ "limit": 30 })),
    )?;
    let payloads = response.as_array().cloned().unwrap_or_default();

    let mut patches = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        patches.push(convert::message_patch(payload)?);
    }
    let before = env.store.ids(thread, "messages").len();
    env.update(thread, Patch::new().insert("messages", patches))?;
    let message_count = env.store.ids(thread, "messages").len() - before;

    tracing::debug!(thread = %thread, message_count, "new messages loaded");
    env.bus.publish(&BusEvent::NewMessagesLoaded {
        thread,
        message_count,
    });

    Ok(message_count)
}

// ---- typing protocol ----------------------------------------------------

/// Current partner typed something: (re)start the inactivity and
/// long-typing timers, move them to the back of the typing list, and notify
/// the other members.
pub fn register_current_partner_is_typing(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    let Some(current) = env.current_partner() else {
        return Ok(());
    };
    env.schedule_timer(
        thread,
        INACTIVE_TYPING_TIMER,
        None,
        CURRENT_PARTNER_INACTIVE_TYPING_MS,
        on_current_partner_inactive_typing_timeout,
    );
    // the long-typing deadline is anchored to the start of the typing
    // session, so further keystrokes must not push it out
    if !env.timer_scheduled(thread, LONG_TYPING_TIMER) {
        env.schedule_timer(
            thread,
            LONG_TYPING_TIMER,
            None,
            CURRENT_PARTNER_LONG_TYPING_MS,
            on_current_partner_long_typing_timeout,
        );
    }
    // move to the end of the registration order
    env.update(
        thread,
        Patch::new()
            .unlink("typing_members", vec![current])
            .link_one("typing_members", current),
    )?;

    notify_current_partner_typing_status(env, thread, true, false)
}

/// Keystroke during an active typing session. Pushes the inactivity
/// deadline out; the long-typing deadline stays anchored to the session
/// start and the server notification stays suppressed while the status is
/// unchanged.
pub fn refresh_current_partner_is_typing(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    register_current_partner_is_typing(env, thread)
}

/// Current partner stopped typing (explicitly, or via inactivity timeout).
pub fn unregister_current_partner_is_typing(env: &mut Env, thread: RecordId) -> Result<(), Error> {
    let Some(current) = env.current_partner() else {
        return Ok(());
    };
    env.clear_timer(thread, INACTIVE_TYPING_TIMER, None);
    env.clear_timer(thread, LONG_TYPING_TIMER, None);
    env.update(thread, Patch::new().unlink("typing_members", vec![current]))?;

    notify_current_partner_typing_status(env, thread, false, false)
}

/// Server said another member is typing. Starts (or restarts) the eviction
/// timer that drops them if no refresh arrives in time.
pub fn register_other_member_typing_member(
    env: &mut Env,
    thread: RecordId,
    partner: RecordId,
) -> Result<(), Error> {
    env.schedule_timer(
        thread,
        OTHER_TYPING_TIMER,
        Some(partner),
        OTHER_MEMBER_LONG_TYPING_MS,
        on_other_member_long_typing_timeout,
    );
    env.update(
        thread,
        Patch::new()
            .unlink("typing_members", vec![partner])
            .link_one("typing_members", partner),
    )?;

    Ok(())
}

/// Refresh an already-typing member's eviction deadline without disturbing
/// the registration order.
pub fn refresh_other_member_typing_member(
    env: &mut Env,
    thread: RecordId,
    partner: RecordId,
) -> Result<(), Error> {
    env.schedule_timer(
        thread,
        OTHER_TYPING_TIMER,
        Some(partner),
        OTHER_MEMBER_LONG_TYPING_MS,
        on_other_member_long_typing_timeout,
    );

    Ok(())
}

pub fn unregister_other_member_typing_member(
    env: &mut Env,
    thread: RecordId,
    partner: RecordId,
) -> Result<(), Error> {
    env.clear_timer(thread, OTHER_TYPING_TIMER, Some(partner));
    env.update(thread, Patch::new().unlink("typing_members", vec![partner]))?;

    Ok(())
}

/// Notify the server of the current partner's typing status. Duplicate
/// same-status notifications are suppressed unless forced; the long-typing
/// timeout forces one so peers keep showing the indicator.
pub(crate) fn notify_current_partner_typing_status(
    env: &mut Env,
    thread: RecordId,
    is_typing: bool,
    force: bool,
) -> Result<(), Error> {
    let last_notified = env.store.value(thread, "typing_notified_is_typing").is_truthy();
    if !force && last_notified == is_typing {
        return Ok(());
    }
    if is_channel(env, thread) {
        env.request(
            TransportRequest::new(CHANNEL_MODEL, "notify_typing")
                .args(json!([server_id(env, thread)]))
                .kwargs(json!({ "is_typing": is_typing })),
        )?;
    }
    env.update(thread, Patch::new().set("typing_notified_is_typing", is_typing))?;

    Ok(())
}

fn on_current_partner_inactive_typing_timeout(
    env: &mut Env,
    thread: RecordId,
    _subject: Option<RecordId>,
) -> Result<(), InternalError> {
    unregister_current_partner_is_typing(env, thread).map_err(Error::into_internal)
}

fn on_current_partner_long_typing_timeout(
    env: &mut Env,
    thread: RecordId,
    _subject: Option<RecordId>,
) -> Result<(), InternalError> {
    notify_current_partner_typing_status(env, thread, true, true)
        .map_err(Error::into_internal)?;
    // keep refreshing while the typing session lasts
    env.schedule_timer(
        thread,
        LONG_TYPING_TIMER,
        None,
        CURRENT_PARTNER_LONG_TYPING_MS,
        on_current_partner_long_typing_timeout,
    );

    Ok(())
}

fn on_other_member_long_typing_timeout(
    env: &mut Env,
    thread: RecordId,
    subject: Option<RecordId>,
) -> Result<(), InternalError> {
    let Some(partner) = subject else {
        return Ok(());
    };
    unregister_other_member_typing_member(env, thread, partner).map_err(Error::into_internal)
}
