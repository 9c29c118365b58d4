mod common;

use common::*;
use loomdb::{
    core::{Patch, RecordId, Store},
    entities::thread::Thread,
};
use proptest::prelude::*;
use serde_json::json;

fn members_symmetric(store: &Store, thread: RecordId, partner: RecordId) -> bool {
    store.ids(thread, "members").contains(&partner)
        == store.ids(partner, "member_threads").contains(&thread)
}

#[test]
fn member_links_are_symmetric_in_both_directions() {
    let mut h = harness();
    let chat = insert_chat(&mut h.env, 100);
    let ada = partner_by_server_id(&h.env.store, 2);

    assert!(h.env.store.ids(ada, "member_threads").contains(&chat));

    h.env
        .update(chat, Patch::new().unlink("members", vec![ada]))
        .expect("leave");
    assert!(!h.env.store.ids(ada, "member_threads").contains(&chat));
    assert!(members_symmetric(&h.env.store, chat, ada));
}

#[test]
fn one_to_one_relink_displaces_the_previous_composer() {
    let mut h = harness();
    let first = insert_chat(&mut h.env, 100);
    let second = insert_chat(&mut h.env, 101);
    let composer = Thread(first).composer(&h.env.store).expect("composer");

    // stealing the composer severs it from its previous thread cleanly
    h.env
        .update(second, Patch::new().link_one("composer", composer))
        .expect("relink");

    assert_eq!(Thread(second).composer(&h.env.store), Some(composer));
    assert_eq!(Thread(first).composer(&h.env.store), None);
    assert_eq!(h.env.store.one(composer, "thread"), Some(second));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any interleaving of joins and leaves keeps every membership edge
    /// mirrored on both sides, and keeps the chat correspondent inside the
    /// member set.
    #[test]
    fn membership_stays_symmetric_under_random_edits(
        ops in proptest::collection::vec(
            (0usize..3, 0usize..4, proptest::bool::ANY),
            0..40,
        ),
    ) {
        let mut h = harness();
        let threads: Vec<RecordId> = (0..3)
            .map(|i| insert_chat(&mut h.env, 100 + i))
            .collect();
        let partners: Vec<RecordId> = (0..4)
            .map(|i| {
                h.env
                    .insert(
                        "partner",
                        Patch::new().set("id", 10 + i).set("name", format!("p{i}")),
                    )
                    .expect("partner")
            })
            .collect();

        for (t, p, join) in ops {
            let patch = if join {
                Patch::new().link_one("members", partners[p])
            } else {
                Patch::new().unlink("members", vec![partners[p]])
            };
            h.env.update(threads[t], patch).expect("membership edit");
        }

        for &thread in &threads {
            for &partner in &partners {
                prop_assert!(members_symmetric(&h.env.store, thread, partner));
            }
            if let Some(correspondent) = Thread(thread).correspondent(&h.env.store) {
                prop_assert!(
                    Thread(thread).members(&h.env.store).contains(&correspondent),
                    "a chat correspondent is always a member"
                );
            }
        }
    }

    /// Messages delivered in any order and any grouping end up sorted by
    /// server id, with the last message derivation agreeing with the order.
    #[test]
    fn message_order_is_arrival_independent(
        ids in proptest::collection::vec(1i64..200, 1..30),
    ) {
        let mut h = harness();
        let chat = insert_chat(&mut h.env, 100);

        for id in &ids {
            deliver_messages(&mut h.env, chat, &[json!({ "id": id, "body": "m" })]);
        }

        let ordered: Vec<i64> = Thread(chat)
            .ordered_messages(&h.env.store)
            .iter()
            .map(|m| h.env.store.value(*m, "id").as_int().unwrap_or_default())
            .collect();
        let mut expected: Vec<i64> = ids.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(&ordered, &expected);

        let last = Thread(chat).last_message(&h.env.store).map(|m| {
            h.env.store.value(m, "id").as_int().unwrap_or_default()
        });
        prop_assert_eq!(last, expected.last().copied());
    }
}
