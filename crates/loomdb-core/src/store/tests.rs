use crate::{
    error::ErrorClass,
    model::{DepPath, EntityModel, Schema, attr},
    store::{FieldCommand, Patch, RecordId, RecordIdentity, Store},
    test_support,
    value::{IdentityValue, Value},
};

fn author(store: &mut Store, id: i64, name: &str) -> RecordId {
    store
        .insert("author", Patch::new().set("id", id).set("name", name))
        .expect("author inserts")
}

fn book(store: &mut Store, id: i64, title: &str) -> RecordId {
    store
        .insert("book", Patch::new().set("id", id).set("title", title))
        .expect("book inserts")
}

fn tag(store: &mut Store, id: i64, label: &str) -> RecordId {
    store
        .insert("tag", Patch::new().set("id", id).set("label", label))
        .expect("tag inserts")
}

#[test]
fn insert_applies_defaults_and_registers_identity() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");

    assert_eq!(store.value(ada, "rename_count"), &Value::Int(0));
    assert_eq!(store.value(ada, "name"), &Value::text("ada"));

    let identity = RecordIdentity {
        entity: "author",
        key: vec![IdentityValue::Int(1)],
    };
    assert_eq!(store.lookup(&identity), Some(ada));
}

#[test]
fn upsert_merges_into_the_existing_record() {
    let mut store = test_support::store();
    let first = author(&mut store, 7, "grace");
    let second = author(&mut store, 7, "grace hopper");

    assert_eq!(first, second);
    assert_eq!(store.all("author").len(), 1);
    assert_eq!(store.value(first, "name"), &Value::text("grace hopper"));
}

#[test]
fn insert_without_identity_fields_is_rejected() {
    let mut store = test_support::store();
    let err = store
        .insert("author", Patch::new().set("name", "nameless"))
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn identity_fields_are_immutable() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");

    // re-writing the same key is a no-op, a different key is an error
    store.update(ada, Patch::new().set("id", 1)).expect("same key");
    let err = store.update(ada, Patch::new().set("id", 2)).unwrap_err();
    assert_eq!(err.class, ErrorClass::Conflict);
}

#[test]
fn identityless_entities_always_create_fresh_records() {
    let mut store = test_support::store();
    let a = store.insert("jacket", Patch::new()).expect("jacket");
    let b = store.insert("jacket", Patch::new()).expect("jacket");

    assert_ne!(a, b);
}

#[test]
fn link_maintains_inverse_symmetry() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let notes = book(&mut store, 10, "notes");

    store
        .update(ada, Patch::new().link_one("books", notes))
        .expect("link");

    assert_eq!(store.ids(ada, "books"), &[notes]);
    assert_eq!(store.one(notes, "author"), Some(ada));
}

#[test]
fn x2one_relink_displaces_the_previous_pair() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let alan = author(&mut store, 2, "alan");
    let notes = book(&mut store, 10, "notes");

    store
        .update(notes, Patch::new().link_one("author", ada))
        .expect("first link");
    store
        .update(notes, Patch::new().link_one("author", alan))
        .expect("relink");

    assert_eq!(store.one(notes, "author"), Some(alan));
    assert!(store.ids(ada, "books").is_empty());
    assert_eq!(store.ids(alan, "books"), &[notes]);
    // displacement is a relink, never a causal delete
    assert!(store.exists(notes));
}

#[test]
fn linking_a_dead_record_is_an_error() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let notes = book(&mut store, 10, "notes");
    store.delete(notes).expect("delete");

    let err = store
        .update(ada, Patch::new().link_one("books", notes))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

#[test]
fn reads_of_missing_state_are_empty() {
    let store = test_support::store();
    let ghost = RecordId(999);

    assert!(!store.exists(ghost));
    assert!(store.value(ghost, "name").is_null());
    assert!(store.ids(ghost, "books").is_empty());
    assert_eq!(store.one(ghost, "books"), None);
}

#[test]
fn unlink_from_causal_relation_deletes_the_orphan() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let notes = book(&mut store, 10, "notes");
    store
        .update(ada, Patch::new().link_one("books", notes))
        .expect("link");

    store
        .update(ada, Patch::new().unlink("books", vec![notes]))
        .expect("unlink");

    assert!(!store.exists(notes));
}

#[test]
fn causal_target_survives_while_another_owner_remains() {
    let mut store = test_support::store();
    let spring = store
        .insert("anthology", Patch::new().set("id", 1).set("title", "spring"))
        .expect("anthology");
    let autumn = store
        .insert("anthology", Patch::new().set("id", 2).set("title", "autumn"))
        .expect("anthology");
    let notes = book(&mut store, 10, "notes");
    store
        .update(spring, Patch::new().link_one("contains", notes))
        .expect("link");
    store
        .update(autumn, Patch::new().link_one("contains", notes))
        .expect("link");

    store.delete(spring).expect("delete spring");
    assert!(store.exists(notes), "autumn still owns the book");

    store.delete(autumn).expect("delete autumn");
    assert!(!store.exists(notes), "last owner gone");
}

#[test]
fn delete_cascades_through_chained_causal_relations() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let notes = book(&mut store, 10, "notes");
    let jacket = store.one(notes, "jacket").expect("default-created jacket");
    store
        .update(ada, Patch::new().link_one("books", notes))
        .expect("link");

    store.delete(ada).expect("delete author");

    assert!(!store.exists(notes), "author causally owns the book");
    assert!(!store.exists(jacket), "book causally owns its jacket");
}

#[test]
fn delete_is_idempotent_and_severs_inverse_sides() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let notes = book(&mut store, 10, "notes");
    store
        .update(notes, Patch::new().link_one("author", ada))
        .expect("link");

    store.delete(notes).expect("delete");
    store.delete(notes).expect("deleting a dead handle is a no-op");

    assert!(store.ids(ada, "books").is_empty());
    // identity slot is free for reuse
    let again = book(&mut store, 10, "notes again");
    assert_ne!(again, notes);
}

#[test]
fn replace_imposes_the_requested_ordering() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let a = book(&mut store, 10, "a");
    let b = book(&mut store, 11, "b");
    let c = book(&mut store, 12, "c");
    store
        .update(ada, Patch::new().link("books", vec![a, b, c]))
        .expect("link");

    store
        .update(ada, Patch::new().replace("books", vec![c, a]))
        .expect("replace");

    assert_eq!(store.ids(ada, "books"), &[c, a]);
    assert!(store.one(b, "author").is_none());
    // b was unlinked from a causal relation with no other owner
    assert!(!store.exists(b));
}

#[test]
fn nested_insert_command_upserts_and_links() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");

    store
        .update(
            ada,
            Patch::new().insert(
                "books",
                vec![Patch::new().set("id", 10).set("title", "notes")],
            ),
        )
        .expect("insert-and-link");

    let notes = store.one(ada, "books").expect("linked");
    assert_eq!(store.value(notes, "title"), &Value::text("notes"));

    // the same nested patch merges into the existing record
    store
        .update(
            ada,
            Patch::new().insert("books", vec![Patch::new().set("id", 10).set("title", "notes v2")]),
        )
        .expect("upsert");
    assert_eq!(store.ids(ada, "books"), &[notes]);
    assert_eq!(store.value(notes, "title"), &Value::text("notes v2"));
}

#[test]
fn derived_fields_reject_direct_writes() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");

    let err = store
        .update(ada, Patch::new().set("book_count", 5))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);

    let err = store
        .update(ada, Patch::new().set("display_name", "nope"))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
}

// ---- derivation ---------------------------------------------------------

#[test]
fn computed_fields_settle_on_creation() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");

    assert_eq!(store.value(ada, "book_count"), &Value::Int(0));
    assert_eq!(store.value(ada, "display_name"), &Value::text("ada [0]"));
}

#[test]
fn computed_chains_converge_after_relation_changes() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let a = book(&mut store, 10, "a");
    let b = book(&mut store, 11, "b");

    store
        .update(ada, Patch::new().link("books", vec![a, b]))
        .expect("link");

    // books -> book_count -> display_name, one settle pass
    assert_eq!(store.value(ada, "book_count"), &Value::Int(2));
    assert_eq!(store.value(ada, "display_name"), &Value::text("ada [2]"));
}

#[test]
fn computed_relation_fields_relink_on_change() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let a = book(&mut store, 10, "a");
    let b = book(&mut store, 11, "b");

    store
        .update(ada, Patch::new().link("books", vec![a, b]))
        .expect("link");
    assert_eq!(store.one(ada, "latest_book"), Some(b));

    store
        .update(ada, Patch::new().unlink("books", vec![b]))
        .expect("unlink");
    assert_eq!(store.one(ada, "latest_book"), Some(a));
}

#[test]
fn related_fields_track_both_hops() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let alan = author(&mut store, 2, "alan");
    let notes = book(&mut store, 10, "notes");

    store
        .update(notes, Patch::new().link_one("author", ada))
        .expect("link");
    assert_eq!(store.value(notes, "author_name"), &Value::text("ada"));

    // hop 2: the related record's field changes
    store
        .update(ada, Patch::new().set("name", "ada lovelace"))
        .expect("rename");
    assert_eq!(store.value(notes, "author_name"), &Value::text("ada lovelace"));

    // hop 1: the relation itself changes
    store
        .update(notes, Patch::new().link_one("author", alan))
        .expect("relink");
    assert_eq!(store.value(notes, "author_name"), &Value::text("alan"));

    store
        .update(notes, Patch::new().unlink_all("author"))
        .expect("unlink");
    assert!(store.value(notes, "author_name").is_null());
}

#[test]
fn related_relations_flatten_across_the_many_hop() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let a = book(&mut store, 10, "a");
    let b = book(&mut store, 11, "b");
    let rust = tag(&mut store, 20, "rust");
    let db = tag(&mut store, 21, "db");

    store
        .update(a, Patch::new().link("tags", vec![rust, db]))
        .expect("tag a");
    store
        .update(b, Patch::new().link("tags", vec![rust]))
        .expect("tag b");
    store
        .update(ada, Patch::new().link("books", vec![a, b]))
        .expect("link books");

    // flattened across both books, duplicates collapsed, first-seen order
    assert_eq!(store.ids(ada, "book_tags"), &[rust, db]);
    assert_eq!(store.ids(db, "tagged_authors"), &[ada]);

    // hop 1: dropping a book re-derives against the remaining targets
    store
        .update(ada, Patch::new().unlink("books", vec![a]))
        .expect("unlink a");
    assert_eq!(store.ids(ada, "book_tags"), &[rust]);
    assert!(store.ids(db, "tagged_authors").is_empty());

    // hop 2: retagging a still-linked book flows back up
    store
        .update(b, Patch::new().link("tags", vec![db]))
        .expect("retag b");
    assert_eq!(store.ids(ada, "book_tags"), &[rust, db]);
}

#[test]
fn derivation_skips_records_deleted_mid_pass() {
    let mut store = test_support::store();
    let ada = author(&mut store, 1, "ada");
    let notes = book(&mut store, 10, "notes");
    store
        .update(ada, Patch::new().link_one("books", notes))
        .expect("link");

    // deleting the author cascades to the book whose related field would
    // otherwise re-evaluate against a dead author
    store.delete(ada).expect("delete");
    assert!(!store.exists(notes));
}

#[test]
fn non_convergent_declarations_hit_the_pass_cap() {
    fn bump_b(store: &Store, id: RecordId) -> FieldCommand {
        let b = store.value(id, "b").as_int().unwrap_or(0);
        FieldCommand::Set(Value::Int(b + 1))
    }
    fn bump_a(store: &Store, id: RecordId) -> FieldCommand {
        let a = store.value(id, "a").as_int().unwrap_or(0);
        FieldCommand::Set(Value::Int(a + 1))
    }

    let oscillator = EntityModel::new(
        "oscillator",
        vec![
            attr("seed"),
            attr("a").computed(vec![DepPath::Local("b"), DepPath::Local("seed")], bump_b),
            attr("b").computed(vec![DepPath::Local("a"), DepPath::Local("seed")], bump_a),
        ],
    );
    let schema = Schema::new(vec![oscillator]).expect("schema builds; the cycle is dynamic");
    let mut store = Store::new(schema);

    let err = store
        .insert("oscillator", Patch::new().set("seed", 1))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);

    // a failed settle leaves no half-applied queue behind
    assert!(store.insert("oscillator", Patch::new()).is_err());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn many2many_links_stay_symmetric_under_random_edits(
            ops in prop::collection::vec((0usize..3, 0usize..4, any::<bool>()), 0..40),
        ) {
            let mut store = test_support::store();
            let books: Vec<RecordId> = (0..3i64)
                .map(|i| book(&mut store, 10 + i, "untitled"))
                .collect();
            let tags: Vec<RecordId> = (0..4i64)
                .map(|i| tag(&mut store, 20 + i, "label"))
                .collect();

            for (b, t, link) in ops {
                let patch = if link {
                    Patch::new().link("tags", vec![tags[t]])
                } else {
                    Patch::new().unlink("tags", vec![tags[t]])
                };
                store.update(books[b], patch).expect("edit applies");
            }

            for b in &books {
                for t in store.ids(*b, "tags") {
                    prop_assert!(store.ids(*t, "books").contains(b));
                }
            }
            for t in &tags {
                for b in store.ids(*t, "books") {
                    prop_assert!(store.ids(*b, "tags").contains(t));
                }
            }
        }
    }
}
