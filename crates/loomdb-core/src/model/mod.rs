mod entity;
mod field;
mod schema;

pub use entity::{EntityModel, TriggerFn, TriggerModel};
pub use field::{
    ComputeFn, DepPath, FieldKind, FieldModel, FieldOrigin, RelationKind, attr, many2many,
    many2one, one2many, one2one,
};
pub use schema::Schema;
