use loomdb_core::{
    model::{EntityModel, attr, many2many, many2one},
    store::{RecordId, Store},
};

/// An uploaded (or uploading) file. `is_temporary` marks an upload still in
/// flight; composers refuse to post while one exists.
#[must_use]
pub fn model() -> EntityModel {
    EntityModel::new(
        "attachment",
        vec![
            attr("id").id(),
            attr("filename").default(""),
            attr("is_temporary").default(false),
            many2many("threads", "thread", "attachments"),
            many2one("origin_thread", "thread", "origin_thread_attachments"),
            many2many("all_attachments_of", "thread", "all_attachments"),
            many2many("composers", "composer", "attachments"),
        ],
    )
}

///
/// Attachment
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attachment(pub RecordId);

impl Attachment {
    #[must_use]
    pub fn id(self, store: &Store) -> i64 {
        store.value(self.0, "id").as_int().unwrap_or_default()
    }

    #[must_use]
    pub fn filename(self, store: &Store) -> String {
        store
            .value(self.0, "filename")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn is_temporary(self, store: &Store) -> bool {
        store.value(self.0, "is_temporary").is_truthy()
    }
}
