//! The conversion boundary: pure functions mapping server wire payloads
//! into the store's patch vocabulary. Wire format changes stop here; the
//! entity models never see raw JSON.

use crate::error::Error;
use loomdb_core::{error::InternalError, store::Patch};
use serde_json::Value as Json;

fn expect_object<'a>(
    payload: &'a Json,
    entity: &str,
) -> Result<&'a serde_json::Map<String, Json>, Error> {
    payload.as_object().ok_or_else(|| {
        InternalError::convert_unsupported(format!("{entity} payload must be a JSON object")).into()
    })
}

fn require_i64(object: &serde_json::Map<String, Json>, entity: &str, key: &str) -> Result<i64, Error> {
    object.get(key).and_then(Json::as_i64).ok_or_else(|| {
        InternalError::convert_unsupported(format!("{entity} payload is missing integer `{key}`"))
            .into()
    })
}

fn require_str<'a>(
    object: &'a serde_json::Map<String, Json>,
    entity: &str,
    key: &str,
) -> Result<&'a str, Error> {
    object.get(key).and_then(Json::as_str).ok_or_else(|| {
        InternalError::convert_unsupported(format!("{entity} payload is missing text `{key}`"))
            .into()
    })
}

fn opt_str<'a>(object: &'a serde_json::Map<String, Json>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Json::as_str)
}

fn opt_i64(object: &serde_json::Map<String, Json>, key: &str) -> Option<i64> {
    object.get(key).and_then(Json::as_i64)
}

fn opt_bool(object: &serde_json::Map<String, Json>, key: &str) -> Option<bool> {
    object.get(key).and_then(Json::as_bool)
}

/// `res.partner` wire record -> partner patch.
pub fn partner_patch(payload: &Json) -> Result<Patch, Error> {
    let object = expect_object(payload, "partner")?;
    let mut patch = Patch::new().set("id", require_i64(object, "partner", "id")?);

    if let Some(name) = opt_str(object, "name") {
        patch = patch.set("name", name);
    }
    if let Some(display_name) = opt_str(object, "display_name") {
        patch = patch.set("display_name", display_name);
    }
    if let Some(im_status) = opt_str(object, "im_status") {
        patch = patch.set("im_status", im_status);
    }

    Ok(patch)
}

/// `mail.message` wire record -> message patch, including the nested author.
pub fn message_patch(payload: &Json) -> Result<Patch, Error> {
    let object = expect_object(payload, "message")?;
    let mut patch = Patch::new().set("id", require_i64(object, "message", "id")?);

    if let Some(body) = opt_str(object, "body") {
        patch = patch.set("body", body);
    }
    if let Some(transient) = opt_bool(object, "is_transient") {
        patch = patch.set("is_transient", transient);
    }
    if let Some(needaction) = opt_bool(object, "needaction") {
        patch = patch.set("is_needaction", needaction);
    }
    if let Some(author) = object.get("author") {
        patch = patch.insert("author", vec![partner_patch(author)?]);
    }

    Ok(patch)
}

/// Channel/document wire record -> thread patch. The fold state collapses
/// the server's `(is_minimized, state)` pair: not minimized means closed.
pub fn thread_patch(payload: &Json) -> Result<Patch, Error> {
    let object = expect_object(payload, "thread")?;
    let model = require_str(object, "thread", "model")?.to_string();
    let thread_id = require_i64(object, "thread", "id")?;
    let mut patch = Patch::new().set("model", model).set("id", thread_id);

    if let Some(name) = opt_str(object, "name") {
        patch = patch.set("name", name);
    }
    if let Some(channel_type) = opt_str(object, "channel_type") {
        patch = patch.set("channel_type", channel_type);
    }
    if let Some(custom) = opt_str(object, "custom_channel_name") {
        patch = patch.set("custom_channel_name", custom);
    }
    if let Some(uuid) = opt_str(object, "uuid") {
        patch = patch.set("uuid", uuid);
    }
    if let Some(minimized) = opt_bool(object, "is_minimized") {
        let state = if minimized {
            opt_str(object, "state").unwrap_or("open")
        } else {
            "closed"
        };
        patch = patch.set("server_fold_state", state);
    }
    if let Some(pinned) = opt_bool(object, "is_pinned") {
        patch = patch.set("is_server_pinned", pinned);
    }
    if let Some(mass_mailing) = opt_bool(object, "mass_mailing") {
        patch = patch.set("is_mass_mailing", mass_mailing);
    }
    if let Some(seen) = opt_i64(object, "seen_message_id") {
        patch = patch.set("known_last_seen_message_id", seen);
    }
    if let Some(counter) = opt_i64(object, "message_unread_counter") {
        patch = patch.set("server_message_unread_counter", counter);
    }
    if let Some(last) = opt_i64(object, "last_message_id") {
        patch = patch.set("server_last_message_id", last);
    }

    if let Some(members) = object.get("members").and_then(Json::as_array) {
        let mut member_patches = Vec::with_capacity(members.len());
        for member in members {
            member_patches.push(partner_patch(member)?);
        }
        patch = patch.insert("members", member_patches);
    }

    if let Some(infos) = object.get("seen_partners_info").and_then(Json::as_array) {
        let mut info_patches = Vec::with_capacity(infos.len());
        for info in infos {
            info_patches.push(seen_info_patch(thread_id, info)?);
        }
        // replace: stale rows are unlinked and, being causally owned,
        // deleted with them
        patch = patch.insert_and_replace("partner_seen_infos", info_patches);
    }

    Ok(patch)
}

/// One `seen_partners_info` row -> seen-info patch keyed on
/// `(thread id, partner id)`.
fn seen_info_patch(thread_id: i64, payload: &Json) -> Result<Patch, Error> {
    let object = expect_object(payload, "seen info")?;
    let partner_id = require_i64(object, "seen info", "partner_id")?;
    let mut patch = Patch::new()
        .set("thread_id", thread_id)
        .set("partner_id", partner_id)
        .insert("partner", vec![Patch::new().set("id", partner_id)]);

    if let Some(seen) = opt_i64(object, "seen_message_id") {
        patch = patch.insert("last_seen_message", vec![Patch::new().set("id", seen)]);
    }
    if let Some(fetched) = opt_i64(object, "fetched_message_id") {
        patch = patch.insert("last_fetched_message", vec![Patch::new().set("id", fetched)]);
    }

    Ok(patch)
}
