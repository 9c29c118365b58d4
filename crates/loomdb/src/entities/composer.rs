use loomdb_core::{
    model::{DepPath, EntityModel, attr, many2many, one2one},
    store::{FieldCommand, RecordId, Store},
    value::Value,
};

fn can_post_message(store: &Store, id: RecordId) -> FieldCommand {
    let has_text = store.value(id, "text_input_content").is_truthy();
    let attachments = store.ids(id, "attachments");
    if !has_text && attachments.is_empty() {
        return FieldCommand::Set(Value::Bool(false));
    }

    let uploading = attachments
        .iter()
        .any(|a| store.value(*a, "is_temporary").is_truthy());
    let posting = store.value(id, "is_posting_message").is_truthy();

    FieldCommand::Set(Value::Bool(!uploading && !posting))
}

/// The message-composition state of one thread. Identity-less: each thread
/// creates its own composer at birth and causally owns it.
#[must_use]
pub fn model() -> EntityModel {
    EntityModel::new(
        "composer",
        vec![
            one2one("thread", "thread", "composer"),
            attr("text_input_content").default(""),
            attr("is_log").default(false),
            attr("is_posting_message").default(false),
            many2many("attachments", "attachment", "composers"),
            attr("can_post_message").default(false).computed(
                vec![
                    DepPath::Local("text_input_content"),
                    DepPath::Local("attachments"),
                    DepPath::Via("attachments", "is_temporary"),
                    DepPath::Local("is_posting_message"),
                ],
                can_post_message,
            ),
        ],
    )
}

///
/// Composer
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Composer(pub RecordId);

impl Composer {
    #[must_use]
    pub fn thread(self, store: &Store) -> Option<RecordId> {
        store.one(self.0, "thread")
    }

    #[must_use]
    pub fn text_input_content(self, store: &Store) -> String {
        store
            .value(self.0, "text_input_content")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn can_post_message(self, store: &Store) -> bool {
        store.value(self.0, "can_post_message").is_truthy()
    }

    #[must_use]
    pub fn is_posting_message(self, store: &Store) -> bool {
        store.value(self.0, "is_posting_message").is_truthy()
    }

    #[must_use]
    pub fn attachments(self, store: &Store) -> Vec<RecordId> {
        store.ids(self.0, "attachments").to_vec()
    }
}
