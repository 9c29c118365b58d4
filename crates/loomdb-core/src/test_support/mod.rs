//! Shared fixtures for engine tests: a small library schema exercising
//! every field shape without dragging in messaging semantics.

use crate::{
    env::Env,
    error::InternalError,
    model::{
        DepPath, EntityModel, Schema, TriggerModel, attr, many2many, many2one, one2many, one2one,
    },
    store::{FieldCommand, Patch, RecordId, Store},
    transport::ScriptedTransport,
    value::Value,
};

fn book_count(store: &Store, id: RecordId) -> FieldCommand {
    let count = store.ids(id, "books").len() as i64;
    FieldCommand::Set(Value::Int(count))
}

fn display_name(store: &Store, id: RecordId) -> FieldCommand {
    let name = store.value(id, "name").as_text().unwrap_or("").to_string();
    let count = store.value(id, "book_count").as_int().unwrap_or(0);
    FieldCommand::Set(Value::Text(format!("{name} [{count}]")))
}

fn latest_book(store: &Store, id: RecordId) -> FieldCommand {
    match store.ids(id, "books").last() {
        Some(book) => FieldCommand::link_one(*book),
        None => FieldCommand::UnlinkAll,
    }
}

fn on_name_changed(env: &mut Env, id: RecordId) -> Result<(), InternalError> {
    let renames = env.store.value(id, "rename_count").as_int().unwrap_or(0);
    env.update(id, Patch::new().set("rename_count", renames + 1))
}

/// author/book/tag/jacket: identity upserts, causal one2many, many2many,
/// one2one with a default-created target, computed and related fields
/// (attribute- and relation-kind), and one observer trigger.
pub fn library_schema() -> Schema {
    let author = EntityModel::new(
        "author",
        vec![
            attr("id").id(),
            attr("name").default(""),
            attr("rename_count").default(0),
            one2many("books", "book", "author").causal(),
            attr("book_count")
                .default(0)
                .computed(vec![DepPath::Local("books")], book_count),
            attr("display_name").computed(
                vec![DepPath::Local("name"), DepPath::Local("book_count")],
                display_name,
            ),
            many2one("latest_book", "book", "latest_of").computed(
                vec![DepPath::Local("books")],
                latest_book,
            ),
            many2many("book_tags", "tag", "tagged_authors").related("books", "tags"),
        ],
    )
    .with_triggers(vec![TriggerModel::new(
        "on_name_changed",
        vec![DepPath::Local("name")],
        on_name_changed,
    )]);

    let book = EntityModel::new(
        "book",
        vec![
            attr("id").id(),
            attr("title").default(""),
            many2one("author", "author", "books"),
            one2many("latest_of", "author", "latest_book"),
            many2many("tags", "tag", "books"),
            many2many("anthologies", "anthology", "contains"),
            one2one("jacket", "jacket", "book").causal().insert_by_default(),
            attr("author_name").related("author", "name"),
        ],
    );

    let tag = EntityModel::new(
        "tag",
        vec![
            attr("id").id(),
            attr("label").default(""),
            many2many("books", "book", "tags"),
            many2many("tagged_authors", "author", "book_tags"),
        ],
    );

    let jacket = EntityModel::new(
        "jacket",
        vec![attr("blurb").default(""), one2one("book", "book", "jacket")],
    );

    // shared causal ownership: a book lives while any anthology holds it
    let anthology = EntityModel::new(
        "anthology",
        vec![
            attr("id").id(),
            attr("title").default(""),
            many2many("contains", "book", "anthologies").causal(),
        ],
    );

    Schema::new(vec![author, book, tag, jacket, anthology]).expect("library schema is valid")
}

pub fn store() -> Store {
    Store::new(library_schema())
}

pub fn env() -> (Env, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let env = Env::new(library_schema(), Box::new(transport.clone()));

    (env, transport)
}
