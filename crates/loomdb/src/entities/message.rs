use loomdb_core::{
    model::{EntityModel, attr, many2many, many2one, one2many},
    store::{RecordId, Store},
};

/// A message. Most relation fields here are the written inverse side of a
/// thread's derived collections; the engine maintains them, renderers read
/// them through `Thread`.
#[must_use]
pub fn model() -> EntityModel {
    EntityModel::new(
        "message",
        vec![
            attr("id").id(),
            attr("body").default(""),
            attr("is_transient").default(false),
            attr("is_needaction").default(false),
            many2one("author", "partner", "authored_messages"),
            many2many("threads", "thread", "messages"),
            // inverses of thread-side derived collections
            many2many("ordered_in_threads", "thread", "ordered_messages"),
            many2many(
                "ordered_non_transient_in_threads",
                "thread",
                "ordered_non_transient_messages",
            ),
            one2many("last_message_of", "thread", "last_message"),
            one2many(
                "last_non_transient_message_of",
                "thread",
                "last_non_transient_message",
            ),
            one2many("separator_of", "thread", "message_after_new_message_separator"),
            one2many(
                "seen_by_everyone_of",
                "thread",
                "last_current_partner_message_seen_by_everyone",
            ),
            one2many("last_seen_by_infos", "seen_info", "last_seen_message"),
            one2many("last_fetched_by_infos", "seen_info", "last_fetched_message"),
        ],
    )
}

///
/// Message
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Message(pub RecordId);

impl Message {
    #[must_use]
    pub fn id(self, store: &Store) -> i64 {
        store.value(self.0, "id").as_int().unwrap_or_default()
    }

    #[must_use]
    pub fn body(self, store: &Store) -> String {
        store
            .value(self.0, "body")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn is_transient(self, store: &Store) -> bool {
        store.value(self.0, "is_transient").is_truthy()
    }

    #[must_use]
    pub fn author(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "author")
    }
}
