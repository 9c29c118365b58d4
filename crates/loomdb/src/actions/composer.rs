use crate::{actions::thread as thread_actions, convert, error::Error};
use loomdb_core::{
    env::Env,
    store::{Patch, RecordId, RecordIdentity},
    transport::TransportRequest,
    value::{IdentityValue, Value},
};
use serde_json::json;

const POST_OPERATION: &str = "post_message";

/// Post the composer's content as a message on its thread.
///
/// At most one message is ever posted per submission, no matter how many
/// times the UI dispatches the command: an identical in-flight post for the
/// same composer is refused outright, the `can_post_message` derivation
/// goes false the moment `is_posting_message` is set, and it stays false
/// after the post because the composer is cleared.
pub fn post_message(env: &mut Env, composer: RecordId) -> Result<Option<RecordId>, Error> {
    if !env.try_begin(POST_OPERATION, composer) {
        tracing::debug!(composer = %composer, "post suppressed, already in flight");
        return Ok(None);
    }
    let outcome = post_message_guarded(env, composer);
    env.finish(POST_OPERATION, composer);

    outcome
}

fn post_message_guarded(env: &mut Env, composer: RecordId) -> Result<Option<RecordId>, Error> {
    if !env.store.value(composer, "can_post_message").is_truthy() {
        tracing::debug!(composer = %composer, "post suppressed, composer cannot post");
        return Ok(None);
    }
    let Some(thread) = env.store.one(composer, "thread") else {
        return Err(Error::from(
            loomdb_core::error::InternalError::action_internal(format!(
                "composer {composer} is not attached to a thread"
            )),
        ));
    };

    // the submission counts as the end of the typing session
    thread_actions::unregister_current_partner_is_typing(env, thread)?;

    env.update(composer, Patch::new().set("is_posting_message", true))?;
    let outcome = post_message_inner(env, composer, thread);
    env.update(composer, Patch::new().set("is_posting_message", false))?;

    outcome.map(Some)
}

fn post_message_inner(
    env: &mut Env,
    composer: RecordId,
    thread: RecordId,
) -> Result<RecordId, Error> {
    let body = env
        .store
        .value(composer, "text_input_content")
        .as_text()
        .unwrap_or_default()
        .trim()
        .to_string();
    let is_log = env.store.value(composer, "is_log").is_truthy();
    let attachment_ids: Vec<i64> = env
        .store
        .ids(composer, "attachments")
        .iter()
        .filter_map(|a| env.store.value(*a, "id").as_int())
        .collect();
    let model = env
        .store
        .value(thread, "model")
        .as_text()
        .unwrap_or_default()
        .to_string();
    let thread_server_id = env.store.value(thread, "id").as_int().unwrap_or_default();

    let response = env.request(
        TransportRequest::new(model, "message_post")
            .args(json!([thread_server_id]))
            .kwargs(json!({
                "body": body,
                "attachment_ids": attachment_ids,
                "message_type": if is_log { "notification" } else { "comment" },
            })),
    )?;

    // the server either echoes the full message record or just its id
    let message_patch = if response.is_object() {
        convert::message_patch(&response)?
    } else {
        let message_id = response.as_i64().ok_or_else(|| {
            loomdb_core::error::InternalError::convert_unsupported(
                "message_post answered neither a record nor an id",
            )
        })?;
        let mut patch = Patch::new().set("id", message_id).set("body", body);
        if let Some(current) = env.current_partner() {
            patch = patch.link_one("author", current);
        }
        patch
    };
    let message_id = patch_message_id(&message_patch)?;
    env.update(thread, Patch::new().insert("messages", vec![message_patch]))?;

    // emptying the composer is what re-arms it for the next submission
    env.update(
        composer,
        Patch::new()
            .clear("text_input_content")
            .unlink_all("attachments"),
    )?;

    let record = env
        .store
        .lookup(&RecordIdentity {
            entity: "message",
            key: vec![IdentityValue::Int(message_id)],
        })
        .ok_or_else(|| {
            loomdb_core::error::InternalError::action_internal(format!(
                "posted message {message_id} did not land in the registry"
            ))
        })?;
    tracing::debug!(thread = %thread, message_id, "message posted");

    Ok(record)
}

fn patch_message_id(patch: &Patch) -> Result<i64, Error> {
    patch
        .set_value("id")
        .and_then(|v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        })
        .ok_or_else(|| {
            loomdb_core::error::InternalError::convert_unsupported(
                "message payload carries no integer id",
            )
            .into()
        })
}
