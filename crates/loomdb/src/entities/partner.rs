use loomdb_core::{
    model::{DepPath, EntityModel, attr, many2many, one2many},
    store::{FieldCommand, RecordId, Store},
    value::Value,
};

fn name_or_display_name(store: &Store, id: RecordId) -> FieldCommand {
    let name = store.value(id, "name");
    let value = if name.is_truthy() {
        name.clone()
    } else {
        store.value(id, "display_name").clone()
    };

    FieldCommand::Set(value)
}

/// A person (or bot) known to the messaging layer.
#[must_use]
pub fn model() -> EntityModel {
    EntityModel::new(
        "partner",
        vec![
            attr("id").id(),
            attr("name").default(""),
            attr("display_name").default(""),
            attr("im_status").default(""),
            attr("name_or_display_name").default("").computed(
                vec![DepPath::Local("name"), DepPath::Local("display_name")],
                name_or_display_name,
            ),
            one2many("authored_messages", "message", "author"),
            many2many("member_threads", "thread", "members"),
            many2many("typing_threads", "thread", "typing_members"),
            many2many("other_typing_threads", "thread", "ordered_other_typing_members"),
            one2many("correspondent_threads", "thread", "correspondent"),
            one2many("seen_infos", "seen_info", "partner"),
        ],
    )
}

///
/// Partner
/// Read-only accessor wrapper for renderers.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Partner(pub RecordId);

impl Partner {
    #[must_use]
    pub fn id(self, store: &Store) -> i64 {
        store.value(self.0, "id").as_int().unwrap_or_default()
    }

    #[must_use]
    pub fn name_or_display_name(self, store: &Store) -> String {
        store
            .value(self.0, "name_or_display_name")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    #[must_use]
    pub fn im_status(self, store: &Store) -> String {
        store
            .value(self.0, "im_status")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    /// Threads this partner authors messages in, via the written inverse.
    #[must_use]
    pub fn authored_messages(self, store: &Store) -> Vec<RecordId> {
        store.ids(self.0, "authored_messages").to_vec()
    }
}

/// Look up a partner record by its server id.
#[must_use]
pub fn by_server_id(store: &Store, id: i64) -> Option<RecordId> {
    store.find("partner", |s, record| {
        s.value(record, "id") == &Value::Int(id)
    })
}
