mod common;

use common::*;
use loomdb::{
    actions::{self, Command},
    core::{Patch, Value},
    entities::{composer::Composer, thread::Thread},
};
use serde_json::json;

fn composer_of(h: &Harness, chat: loomdb::core::RecordId) -> loomdb::core::RecordId {
    Thread(chat).composer(&h.env.store).expect("composer exists")
}

#[test]
fn posting_sends_exactly_one_message_per_submission() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let composer = composer_of(&h, chat);

    h.env
        .update(composer, Patch::new().set("text_input_content", "hello"))
        .expect("draft");
    assert!(Composer(composer).can_post_message(&h.env.store));

    h.transport.push_response(json!({
        "id": 42,
        "body": "<p>hello</p>",
        "author": { "id": 1, "name": "Me" },
    }));
    let posted = actions::execute(&mut h.env, Command::PostMessage { composer })
        .expect("post")
        .expect("a message was posted");

    assert_eq!(h.env.store.value(posted, "id"), &Value::Int(42));
    assert_eq!(
        Thread(chat).last_message(&h.env.store),
        Some(posted),
        "the posted message lands in the thread"
    );
    assert_eq!(
        Composer(composer).text_input_content(&h.env.store),
        "",
        "the composer is emptied"
    );

    // a double-click or retry dispatches the command again; the emptied
    // composer makes it a no-op
    let second = actions::execute(&mut h.env, Command::PostMessage { composer }).expect("retry");
    assert_eq!(second, None);
    assert_eq!(h.transport.calls_to("message_post"), 1);
}

#[test]
fn posting_accepts_a_bare_message_id_response() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let composer = composer_of(&h, chat);

    h.env
        .update(composer, Patch::new().set("text_input_content", "  spaced out  "))
        .expect("draft");
    h.transport.push_response(json!(43));

    let posted = actions::execute(&mut h.env, Command::PostMessage { composer })
        .expect("post")
        .expect("posted");

    assert_eq!(h.env.store.value(posted, "id"), &Value::Int(43));
    assert_eq!(
        h.env.store.value(posted, "body"),
        &Value::text("spaced out"),
        "the body is the trimmed draft"
    );
    assert_eq!(h.env.store.one(posted, "author"), Some(h.me));
}

#[test]
fn posting_refuses_while_an_identical_post_is_in_flight() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let composer = composer_of(&h, chat);

    h.env
        .update(composer, Patch::new().set("text_input_content", "hello"))
        .expect("draft");

    // a dispatch arriving while the same post is still in flight is refused
    // before anything reaches the transport
    assert!(h.env.try_begin("post_message", composer));
    let outcome = actions::execute(&mut h.env, Command::PostMessage { composer }).expect("refused");
    assert_eq!(outcome, None);
    assert_eq!(h.transport.calls_to("message_post"), 0);
    h.env.finish("post_message", composer);

    // once the slot is free the post goes through, and releases it again
    h.transport.push_response(json!(44));
    actions::execute(&mut h.env, Command::PostMessage { composer })
        .expect("post")
        .expect("posted");
    assert_eq!(h.transport.calls_to("message_post"), 1);
    assert!(!h.env.is_in_flight("post_message", composer));
}

#[test]
fn posting_is_blocked_while_an_attachment_uploads() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let composer = composer_of(&h, chat);

    let upload = h
        .env
        .insert(
            "attachment",
            Patch::new()
                .set("id", 9)
                .set("filename", "photo.png")
                .set("is_temporary", true),
        )
        .expect("attachment");
    h.env
        .update(composer, Patch::new().link_one("attachments", upload))
        .expect("attach");

    assert!(!Composer(composer).can_post_message(&h.env.store));
    let outcome = actions::execute(&mut h.env, Command::PostMessage { composer }).expect("post");
    assert_eq!(outcome, None);
    assert_eq!(h.transport.calls_to("message_post"), 0);

    // the upload finishing unblocks the composer
    h.env
        .update(upload, Patch::new().set("is_temporary", false))
        .expect("uploaded");
    assert!(Composer(composer).can_post_message(&h.env.store));
}

#[test]
fn posting_our_own_message_does_not_raise_the_unread_counter() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let composer = composer_of(&h, chat);

    deliver_messages(&mut h.env, chat, &[message_payload(5, 2, "hi")]);
    loomdb::actions::thread::handle_seen_confirmation(&mut h.env, chat, 5).expect("seen");
    assert_eq!(Thread(chat).local_message_unread_counter(&h.env.store), 0);

    h.env
        .update(composer, Patch::new().set("text_input_content", "reply"))
        .expect("draft");
    h.transport.push_response(json!(6));
    actions::execute(&mut h.env, Command::PostMessage { composer }).expect("post");

    assert_eq!(
        Thread(chat).last_seen_by_current_partner_message_id(&h.env.store),
        6,
        "our own message extends the seen marker"
    );
    assert_eq!(Thread(chat).local_message_unread_counter(&h.env.store), 0);
}

#[test]
fn posting_ends_the_typing_session() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let composer = composer_of(&h, chat);

    loomdb::actions::thread::register_current_partner_is_typing(&mut h.env, chat)
        .expect("typing");
    assert_eq!(h.transport.calls_to("notify_typing"), 1);

    h.env
        .update(composer, Patch::new().set("text_input_content", "sent"))
        .expect("draft");
    // the submission first notifies the typing stop, then posts
    h.transport.push_response(json!(null));
    h.transport.push_response(json!(7));
    actions::execute(&mut h.env, Command::PostMessage { composer }).expect("post");

    assert!(Thread(chat).typing_members(&h.env.store).is_empty());
    assert_eq!(
        h.transport.calls_to("notify_typing"),
        2,
        "the submission notifies the stop"
    );
}
