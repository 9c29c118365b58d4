use crate::value::Value;
use derive_more::Display;
use std::collections::BTreeMap;

///
/// RecordId
///
/// Opaque arena handle. Records reference each other by handle, never by
/// owning pointer, so relational cycles never prevent deletion.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("record#{_0}")]
pub struct RecordId(pub(crate) u64);

///
/// RelationSlot
///
/// Forward storage of one relation field: an ordered list of handles.
/// Invariant: `many == false` implies at most one entry. Ordering is
/// insertion order unless a `Replace` imposes a new sequence.
///

#[derive(Clone, Debug, Default)]
pub struct RelationSlot {
    pub(crate) ids: Vec<RecordId>,
    pub(crate) many: bool,
}

impl RelationSlot {
    pub(crate) const fn new(many: bool) -> Self {
        Self {
            ids: Vec::new(),
            many,
        }
    }

    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    #[must_use]
    pub fn one(&self) -> Option<RecordId> {
        self.ids.first().copied()
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

///
/// RecordSlot
///
/// One live record: entity name, attribute values, relation slots. Mutation
/// is funneled through the store; readers receive shared references only.
///

#[derive(Clone, Debug)]
pub struct RecordSlot {
    pub entity: &'static str,
    pub(crate) values: BTreeMap<&'static str, Value>,
    pub(crate) relations: BTreeMap<&'static str, RelationSlot>,
}

impl RecordSlot {
    pub(crate) fn new(entity: &'static str) -> Self {
        Self {
            entity,
            values: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Attribute value, `Null` when never written and defaulted to nothing.
    #[must_use]
    pub fn value(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(field).unwrap_or(&NULL)
    }

    #[must_use]
    pub fn relation(&self, field: &str) -> Option<&RelationSlot> {
        self.relations.get(field)
    }
}
