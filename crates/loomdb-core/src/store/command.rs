use crate::{store::RecordId, value::Value};

///
/// FieldCommand
///
/// The write vocabulary accepted by `insert`/`update` and produced by
/// computed fields. Attribute fields accept `Set`/`Clear`; relation fields
/// accept the link family. Nested `Insert` payloads are patches for the
/// relation's target entity (upsert-and-link).
///

#[derive(Clone, Debug)]
pub enum FieldCommand {
    /// Write an attribute value.
    Set(Value),
    /// Reset to the declared default: unlink-all for relations, the default
    /// value (or `Null`) for attributes. The only way to write `Null` onto a
    /// field whose default is `Null`.
    Clear,
    /// Link existing records.
    Link(Vec<RecordId>),
    /// Unlink specific records. Unknown handles are ignored.
    Unlink(Vec<RecordId>),
    /// Unlink every record currently in the relation.
    UnlinkAll,
    /// Replace the relation's contents with exactly this ordered sequence.
    Replace(Vec<RecordId>),
    /// Upsert records on the target entity, then link them.
    Insert(Vec<Patch>),
    /// Upsert records on the target entity, then replace with them.
    InsertAndReplace(Vec<Patch>),
}

impl FieldCommand {
    /// Link a single record.
    #[must_use]
    pub fn link_one(id: RecordId) -> Self {
        Self::Link(vec![id])
    }
}

///
/// Patch
///
/// An ordered list of field writes, applied in declaration order. Built by
/// action code and by the conversion boundary; also the payload of nested
/// relation inserts.
///

#[derive(Clone, Debug, Default)]
pub struct Patch {
    writes: Vec<(&'static str, FieldCommand)>,
}

impl Patch {
    #[must_use]
    pub const fn new() -> Self {
        Self { writes: Vec::new() }
    }

    #[must_use]
    pub fn set(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.writes.push((field, FieldCommand::Set(value.into())));
        self
    }

    #[must_use]
    pub fn clear(mut self, field: &'static str) -> Self {
        self.writes.push((field, FieldCommand::Clear));
        self
    }

    #[must_use]
    pub fn link(mut self, field: &'static str, ids: Vec<RecordId>) -> Self {
        self.writes.push((field, FieldCommand::Link(ids)));
        self
    }

    #[must_use]
    pub fn link_one(mut self, field: &'static str, id: RecordId) -> Self {
        self.writes.push((field, FieldCommand::link_one(id)));
        self
    }

    #[must_use]
    pub fn unlink(mut self, field: &'static str, ids: Vec<RecordId>) -> Self {
        self.writes.push((field, FieldCommand::Unlink(ids)));
        self
    }

    #[must_use]
    pub fn unlink_all(mut self, field: &'static str) -> Self {
        self.writes.push((field, FieldCommand::UnlinkAll));
        self
    }

    #[must_use]
    pub fn replace(mut self, field: &'static str, ids: Vec<RecordId>) -> Self {
        self.writes.push((field, FieldCommand::Replace(ids)));
        self
    }

    #[must_use]
    pub fn insert(mut self, field: &'static str, patches: Vec<Self>) -> Self {
        self.writes.push((field, FieldCommand::Insert(patches)));
        self
    }

    #[must_use]
    pub fn insert_and_replace(mut self, field: &'static str, patches: Vec<Self>) -> Self {
        self.writes
            .push((field, FieldCommand::InsertAndReplace(patches)));
        self
    }

    #[must_use]
    pub fn command(mut self, field: &'static str, command: FieldCommand) -> Self {
        self.writes.push((field, command));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, FieldCommand)> {
        self.writes.iter()
    }

    /// Value supplied by the last `Set` on `field`, if any. Used for
    /// identity resolution before a record exists.
    #[must_use]
    pub fn set_value(&self, field: &str) -> Option<&Value> {
        self.writes.iter().rev().find_map(|(name, command)| {
            if *name == field
                && let FieldCommand::Set(value) = command
            {
                Some(value)
            } else {
                None
            }
        })
    }
}
