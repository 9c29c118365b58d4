//! Core runtime for LoomDB: the dynamic value model, field/entity
//! descriptors, the record registry, the dependency-tracked recomputation
//! engine, and the execution environment shared by all entity code.

pub mod env;
pub mod error;
pub mod model;
pub mod obs;
pub mod store;
pub mod timer;
pub mod transport;
pub mod value;

mod recompute;

#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Maximum computed-field evaluations per settle pass.
///
/// A settle pass that does not converge within this budget indicates a
/// cyclic field declaration, which is a programmer error.
pub const MAX_RECOMPUTE_PASSES: usize = 1024;

/// Maximum trigger rounds per top-level mutation.
///
/// Triggers may themselves write fields and fire further triggers; a chain
/// longer than this indicates mutually re-firing trigger declarations.
pub const MAX_TRIGGER_ROUNDS: usize = 64;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No engine internals or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        env::Env,
        error::InternalError,
        model::{DepPath, EntityModel, FieldModel, RelationKind, Schema, TriggerModel},
        store::{FieldCommand, Patch, RecordId, Store},
        value::Value,
    };
}
