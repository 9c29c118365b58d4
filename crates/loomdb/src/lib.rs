//! LoomDB — a reactive relational object-graph store for messaging
//! front-ends. This crate is the messaging facade over `loomdb-core`: the
//! entity schema (threads, messages, partners, composers, seen infos,
//! attachments), the wire-format conversion boundary, and the typed action
//! layer that talks to the server transport.

pub mod actions;
pub mod convert;
pub mod entities;
pub mod error;
pub mod schema;

pub use error::Error;

/// Re-export of the engine surface the facade builds on.
pub mod core {
    pub use loomdb_core::{
        env::Env,
        error::{ErrorClass, ErrorOrigin, InternalError},
        model::{
            DepPath, EntityModel, FieldModel, RelationKind, Schema, TriggerModel, attr, many2many,
            many2one, one2many, one2one,
        },
        obs::{BusEvent, EventBus, EventSink, MemorySink, MemorySinkHandle},
        store::{FieldCommand, Patch, RecordId, Store},
        transport::{
            NullTransport, ScriptedTransport, Transport, TransportError, TransportRequest,
        },
        value::Value,
    };
}

pub mod prelude {
    pub use crate::{
        actions::{self, Command},
        core::{BusEvent, Env, FieldCommand, Patch, RecordId, Store, Value},
        entities::{
            composer::Composer,
            thread::{FoldState, Thread},
        },
        error::Error,
        schema::{messaging_schema, new_env},
    };
}
