mod common;

use common::*;
use loomdb::{
    actions::thread::{
        self as thread_actions, CURRENT_PARTNER_INACTIVE_TYPING_MS, CURRENT_PARTNER_LONG_TYPING_MS,
        OTHER_MEMBER_LONG_TYPING_MS,
    },
    core::Patch,
    entities::thread::Thread,
};

#[test]
fn another_member_typing_shows_up_and_expires() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let ada = partner_by_server_id(&h.env.store, 2);

    thread_actions::register_other_member_typing_member(&mut h.env, chat, ada).expect("register");
    assert_eq!(
        Thread(chat).typing_status_text(&h.env.store),
        "Ada is typing..."
    );

    // a refresh pushes the eviction deadline out
    h.env
        .advance_time(OTHER_MEMBER_LONG_TYPING_MS - 1)
        .expect("almost due");
    thread_actions::refresh_other_member_typing_member(&mut h.env, chat, ada).expect("refresh");
    h.env
        .advance_time(OTHER_MEMBER_LONG_TYPING_MS - 1)
        .expect("still within the refreshed deadline");
    assert_eq!(
        Thread(chat).typing_status_text(&h.env.store),
        "Ada is typing..."
    );

    // no further refresh: evicted
    h.env.advance_time(1).expect("deadline");
    assert_eq!(Thread(chat).typing_status_text(&h.env.store), "");
    assert!(Thread(chat).typing_members(&h.env.store).is_empty());
}

#[test]
fn typing_status_text_counts_the_typers() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let ada = partner_by_server_id(&h.env.store, 2);
    let bob = h
        .env
        .insert("partner", Patch::new().set("id", 3).set("name", "Bob"))
        .expect("bob");
    let eve = h
        .env
        .insert("partner", Patch::new().set("id", 4).set("name", "Eve"))
        .expect("eve");

    thread_actions::register_other_member_typing_member(&mut h.env, chat, ada).expect("ada");
    assert_eq!(
        Thread(chat).typing_status_text(&h.env.store),
        "Ada is typing..."
    );

    thread_actions::register_other_member_typing_member(&mut h.env, chat, bob).expect("bob");
    assert_eq!(
        Thread(chat).typing_status_text(&h.env.store),
        "Ada and Bob are typing..."
    );

    thread_actions::register_other_member_typing_member(&mut h.env, chat, eve).expect("eve");
    assert_eq!(
        Thread(chat).typing_status_text(&h.env.store),
        "Ada, Bob and more are typing..."
    );

    // the current partner's own typing never shows in the status text
    thread_actions::unregister_other_member_typing_member(&mut h.env, chat, ada).expect("ada done");
    thread_actions::unregister_other_member_typing_member(&mut h.env, chat, bob).expect("bob done");
    thread_actions::unregister_other_member_typing_member(&mut h.env, chat, eve).expect("eve done");
    thread_actions::register_current_partner_is_typing(&mut h.env, chat).expect("me");
    assert_eq!(Thread(chat).typing_status_text(&h.env.store), "");
}

#[test]
fn current_partner_typing_notifies_once_and_stops_on_inactivity() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);

    thread_actions::register_current_partner_is_typing(&mut h.env, chat).expect("typing");
    assert_eq!(h.transport.calls_to("notify_typing"), 1);
    assert_eq!(Thread(chat).typing_members(&h.env.store), vec![h.me]);

    // a keystroke within the window refreshes silently
    h.env.advance_time(4_000).expect("keystroke gap");
    thread_actions::refresh_current_partner_is_typing(&mut h.env, chat).expect("still typing");
    assert_eq!(h.transport.calls_to("notify_typing"), 1, "same status, no re-notify");

    // then the keyboard goes quiet
    h.env
        .advance_time(CURRENT_PARTNER_INACTIVE_TYPING_MS - 1)
        .expect("almost inactive");
    assert_eq!(Thread(chat).typing_members(&h.env.store), vec![h.me]);
    h.env.advance_time(1).expect("inactive");

    assert!(Thread(chat).typing_members(&h.env.store).is_empty());
    assert_eq!(
        h.transport.calls_to("notify_typing"),
        2,
        "the stop is notified exactly once"
    );
}

#[test]
fn long_typing_sessions_force_a_renotification() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);

    thread_actions::register_current_partner_is_typing(&mut h.env, chat).expect("typing");
    assert_eq!(h.transport.calls_to("notify_typing"), 1);

    // keep typing past the long-typing deadline; keystrokes only reset the
    // inactivity window, never the session deadline
    let mut elapsed = 0;
    while elapsed < CURRENT_PARTNER_LONG_TYPING_MS {
        h.env.advance_time(4_000).expect("keystroke gap");
        elapsed += 4_000;
        thread_actions::refresh_current_partner_is_typing(&mut h.env, chat).expect("typing");
    }

    assert_eq!(
        h.transport.calls_to("notify_typing"),
        2,
        "peers are reminded the session is still going"
    );

    // going quiet afterwards still notifies the stop
    h.env
        .advance_time(CURRENT_PARTNER_INACTIVE_TYPING_MS)
        .expect("inactive");
    assert_eq!(h.transport.calls_to("notify_typing"), 3);
    assert!(Thread(chat).typing_members(&h.env.store).is_empty());
}

#[test]
fn unregistering_clears_the_typing_timers() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);

    thread_actions::register_current_partner_is_typing(&mut h.env, chat).expect("typing");
    thread_actions::unregister_current_partner_is_typing(&mut h.env, chat).expect("stopped");
    assert_eq!(h.transport.calls_to("notify_typing"), 2);

    // no timer left behind to fire a duplicate stop
    h.env
        .advance_time(CURRENT_PARTNER_LONG_TYPING_MS * 2)
        .expect("idle");
    assert_eq!(h.transport.calls_to("notify_typing"), 2);
}
