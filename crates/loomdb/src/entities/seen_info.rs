use loomdb_core::{
    model::{EntityModel, attr, many2one},
    store::{RecordId, Store},
};

/// Per-partner seen/fetched bookkeeping on a thread. Identity is the
/// `(thread server id, partner server id)` pair, mirroring the server's
/// `seen_partners_info` rows; the thread causally owns these records
/// through its `partner_seen_infos` relation.
#[must_use]
pub fn model() -> EntityModel {
    EntityModel::new(
        "seen_info",
        vec![
            attr("thread_id").id(),
            attr("partner_id").id(),
            many2one("thread", "thread", "partner_seen_infos"),
            many2one("partner", "partner", "seen_infos"),
            many2one("last_seen_message", "message", "last_seen_by_infos"),
            many2one("last_fetched_message", "message", "last_fetched_by_infos"),
        ],
    )
}

///
/// SeenInfo
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SeenInfo(pub RecordId);

impl SeenInfo {
    #[must_use]
    pub fn partner(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "partner")
    }

    #[must_use]
    pub fn last_seen_message_id(self, store: &Store) -> i64 {
        store
            .one(self.0, "last_seen_message")
            .map(|m| store.value(m, "id").as_int().unwrap_or_default())
            .unwrap_or_default()
    }
}
