use crate::{
    store::{FieldCommand, RecordId, Store},
    value::Value,
};

///
/// RelationKind
///
/// The four supported relation shapes. Forward storage is a single ordered
/// slot; "one" kinds keep at most one handle in it.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Whether the forward side of this relation holds many records.
    #[must_use]
    pub const fn is_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Kind expected on the inverse field of a relation of this kind.
    #[must_use]
    pub const fn inverse_kind(self) -> Self {
        match self {
            Self::OneToOne => Self::OneToOne,
            Self::OneToMany => Self::ManyToOne,
            Self::ManyToOne => Self::OneToMany,
            Self::ManyToMany => Self::ManyToMany,
        }
    }
}

///
/// DepPath
///
/// A declared dependency of a computed field or trigger: either a field on
/// the same record, or one relation hop away (`<relation>.<field>`).
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum DepPath {
    Local(&'static str),
    Via(&'static str, &'static str),
}

/// Pure derivation function of a computed field. Reads the settled graph,
/// returns the command the engine applies to the field.
pub type ComputeFn = fn(&Store, RecordId) -> FieldCommand;

///
/// FieldKind
///

#[derive(Clone, Debug)]
pub enum FieldKind {
    Attribute {
        /// Applied at creation only; never overwrites a supplied value.
        default: Option<Value>,
    },
    Relation {
        kind: RelationKind,
        target: &'static str,
        inverse: &'static str,
        /// The source record owns the target's lifecycle: unlinking the
        /// target deletes it unless another owner still holds it through
        /// the same relation.
        causal: bool,
        /// Create-and-link an empty target record at source creation
        /// (the original's `default: create()` relation default).
        default_insert: bool,
    },
}

///
/// FieldOrigin
///
/// How the field obtains its value. `Computed` and `Related` fields are
/// engine-written; a direct write from action code is an invariant
/// violation.
///

#[derive(Clone)]
pub enum FieldOrigin {
    Written,
    /// The declared dependency list is trusted to be complete. The schema
    /// validator rejects paths naming unknown fields, but an *omitted*
    /// dependency silently under-triggers recomputation — keep the list in
    /// sync with the compute body.
    Computed {
        deps: Vec<DepPath>,
        compute: ComputeFn,
    },
    /// Read-only proxy for `<relation>.<field>`; no user function involved.
    Related {
        relation: &'static str,
        field: &'static str,
    },
}

///
/// FieldModel
///
/// Declaration metadata for one field of one entity.
///

#[derive(Clone)]
pub struct FieldModel {
    pub name: &'static str,
    pub kind: FieldKind,
    pub origin: FieldOrigin,
    /// Identity component. Only written attributes may carry it.
    pub id: bool,
}

impl FieldModel {
    #[must_use]
    pub const fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation { .. })
    }

    #[must_use]
    pub const fn is_engine_written(&self) -> bool {
        !matches!(self.origin, FieldOrigin::Written)
    }

    /// Mark this attribute as an identity component.
    #[must_use]
    pub const fn id(mut self) -> Self {
        self.id = true;
        self
    }

    /// Attach a default value (attributes only; ignored for relations).
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        if let FieldKind::Attribute { default } = &mut self.kind {
            *default = Some(value.into());
        }
        self
    }

    /// Turn the field into a computed field with an explicit dependency list.
    #[must_use]
    pub fn computed(mut self, deps: Vec<DepPath>, compute: ComputeFn) -> Self {
        self.origin = FieldOrigin::Computed { deps, compute };
        self
    }

    /// Turn the field into a related proxy for `<relation>.<field>`.
    #[must_use]
    pub fn related(mut self, relation: &'static str, field: &'static str) -> Self {
        self.origin = FieldOrigin::Related { relation, field };
        self
    }

    /// Mark a relation causal (owner manages the target's lifecycle).
    #[must_use]
    pub const fn causal(mut self) -> Self {
        if let FieldKind::Relation { causal, .. } = &mut self.kind {
            *causal = true;
        }
        self
    }

    /// Create-and-link an empty target record when the source is created.
    #[must_use]
    pub const fn insert_by_default(mut self) -> Self {
        if let FieldKind::Relation { default_insert, .. } = &mut self.kind {
            *default_insert = true;
        }
        self
    }
}

/// Declare an attribute field.
#[must_use]
pub const fn attr(name: &'static str) -> FieldModel {
    FieldModel {
        name,
        kind: FieldKind::Attribute { default: None },
        origin: FieldOrigin::Written,
        id: false,
    }
}

const fn relation(
    name: &'static str,
    kind: RelationKind,
    target: &'static str,
    inverse: &'static str,
) -> FieldModel {
    FieldModel {
        name,
        kind: FieldKind::Relation {
            kind,
            target,
            inverse,
            causal: false,
            default_insert: false,
        },
        origin: FieldOrigin::Written,
        id: false,
    }
}

/// Declare a one2one relation field.
#[must_use]
pub const fn one2one(name: &'static str, target: &'static str, inverse: &'static str) -> FieldModel {
    relation(name, RelationKind::OneToOne, target, inverse)
}

/// Declare a one2many relation field.
#[must_use]
pub const fn one2many(
    name: &'static str,
    target: &'static str,
    inverse: &'static str,
) -> FieldModel {
    relation(name, RelationKind::OneToMany, target, inverse)
}

/// Declare a many2one relation field.
#[must_use]
pub const fn many2one(
    name: &'static str,
    target: &'static str,
    inverse: &'static str,
) -> FieldModel {
    relation(name, RelationKind::ManyToOne, target, inverse)
}

/// Declare a many2many relation field.
#[must_use]
pub const fn many2many(
    name: &'static str,
    target: &'static str,
    inverse: &'static str,
) -> FieldModel {
    relation(name, RelationKind::ManyToMany, target, inverse)
}
