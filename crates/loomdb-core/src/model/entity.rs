use crate::{
    env::Env,
    error::InternalError,
    model::field::{DepPath, FieldModel},
    store::RecordId,
};

/// Observer hook body. Runs after the recomputation pass settles; may update
/// records and publish bus events through the environment.
pub type TriggerFn = fn(&mut Env, RecordId) -> Result<(), InternalError>;

///
/// TriggerModel
///
/// Typed replacement for "not a real field, used to trigger" pseudo-fields:
/// a named observer with declared local dependencies. Remote state is
/// observed by depending on a related or computed local field.
///

#[derive(Clone)]
pub struct TriggerModel {
    pub name: &'static str,
    /// Local paths only; validated at schema build.
    pub deps: Vec<DepPath>,
    pub run: TriggerFn,
}

impl TriggerModel {
    #[must_use]
    pub fn new(name: &'static str, deps: Vec<DepPath>, run: TriggerFn) -> Self {
        Self { name, deps, run }
    }

    /// The local field names this trigger watches.
    pub fn local_deps(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.deps.iter().filter_map(|dep| match dep {
            DepPath::Local(name) => Some(*name),
            DepPath::Via(..) => None,
        })
    }
}

///
/// EntityModel
///
/// Runtime model for one entity: ordered field list, identity components,
/// and observer triggers.
///

#[derive(Clone)]
pub struct EntityModel {
    pub name: &'static str,
    pub fields: Vec<FieldModel>,
    pub triggers: Vec<TriggerModel>,
}

impl EntityModel {
    #[must_use]
    pub fn new(name: &'static str, fields: Vec<FieldModel>) -> Self {
        Self {
            name,
            fields,
            triggers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_triggers(mut self, triggers: Vec<TriggerModel>) -> Self {
        self.triggers = triggers;
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Identity components in declaration order. May be empty: identity-less
    /// entities (e.g. per-thread composers) are never merged by upsert.
    pub fn id_fields(&self) -> impl Iterator<Item = &FieldModel> {
        self.fields.iter().filter(|f| f.id)
    }

    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.fields.iter().any(|f| f.id)
    }
}
