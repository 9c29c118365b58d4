mod command;
mod identity;
mod record;

#[cfg(test)]
mod tests;

pub use command::{FieldCommand, Patch};
pub use identity::RecordIdentity;
pub use record::{RecordId, RecordSlot, RelationSlot};

use crate::{
    MAX_RECOMPUTE_PASSES,
    error::InternalError,
    model::{DepPath, FieldKind, FieldModel, FieldOrigin, RelationKind, Schema, TriggerFn},
    recompute::DependencyGraph,
    value::Value,
};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    rc::Rc,
};

static NULL_VALUE: Value = Value::Null;
const EMPTY_IDS: &[RecordId] = &[];

///
/// WriteMode
///
/// Who is writing: action code may only touch written fields; the
/// recomputation engine is allowed to write computed/related fields.
///

#[derive(Clone, Copy, Eq, PartialEq)]
enum WriteMode {
    Action,
    Engine,
}

///
/// RelInfo
/// Flattened relation metadata for one write path.
///

#[derive(Clone, Copy)]
struct RelInfo {
    kind: RelationKind,
    target: &'static str,
    inverse: &'static str,
    causal: bool,
}

impl RelInfo {
    fn of(field: &FieldModel) -> Result<Self, InternalError> {
        let FieldKind::Relation {
            kind,
            target,
            inverse,
            causal,
            ..
        } = field.kind
        else {
            return Err(InternalError::store_invariant(format!(
                "field {} is not a relation",
                field.name
            )));
        };

        Ok(Self {
            kind,
            target,
            inverse,
            causal,
        })
    }
}

///
/// FiredTrigger
/// One observer hook scheduled by the settle pass, ready to run.
///

pub struct FiredTrigger {
    pub record: RecordId,
    pub name: &'static str,
    pub run: TriggerFn,
}

///
/// Store
///
/// The record registry and the single shared resource of the system: an
/// arena of record slots, the identity index, and the dependency graph.
/// All mutation funnels through `insert`/`update`/`delete`; each top-level
/// mutation settles all derived state before returning.
///

pub struct Store {
    schema: Rc<Schema>,
    slots: BTreeMap<RecordId, RecordSlot>,
    identities: BTreeMap<RecordIdentity, RecordId>,
    deps: DependencyGraph,
    next_id: u64,
    current_partner: Option<RecordId>,

    // settle-pass state
    depth: u32,
    dirty: VecDeque<(RecordId, &'static str)>,
    pending: BTreeSet<(RecordId, &'static str)>,
    fired: BTreeSet<(RecordId, &'static str)>,
    deleting: BTreeSet<RecordId>,
    deleted_log: Vec<(RecordId, &'static str)>,
}

impl Store {
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Rc::new(schema),
            slots: BTreeMap::new(),
            identities: BTreeMap::new(),
            deps: DependencyGraph::default(),
            next_id: 1,
            current_partner: None,
            depth: 0,
            dirty: VecDeque::new(),
            pending: BTreeSet::new(),
            fired: BTreeSet::new(),
            deleting: BTreeSet::new(),
            deleted_log: Vec::new(),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The logged-in partner record, if the messaging layer set one.
    #[must_use]
    pub const fn current_partner(&self) -> Option<RecordId> {
        self.current_partner
    }

    /// Changing the partner does not re-derive fields that read it; it is
    /// session state, set once before any thread exists.
    pub const fn set_current_partner(&mut self, partner: Option<RecordId>) {
        self.current_partner = partner;
    }

    // ---- reads ---------------------------------------------------------

    #[must_use]
    pub fn exists(&self, id: RecordId) -> bool {
        self.slots.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&RecordSlot> {
        self.slots.get(&id)
    }

    /// Attribute value; `Null` for missing records or never-written fields.
    /// Missing local state reads as empty by design: the remote source of
    /// truth may simply not have been fetched yet.
    #[must_use]
    pub fn value(&self, id: RecordId, field: &str) -> &Value {
        self.slots
            .get(&id)
            .map_or(&NULL_VALUE, |slot| slot.value(field))
    }

    /// Relation contents in order; empty for missing records/relations.
    #[must_use]
    pub fn ids(&self, id: RecordId, field: &str) -> &[RecordId] {
        self.slots
            .get(&id)
            .and_then(|slot| slot.relation(field))
            .map_or(EMPTY_IDS, RelationSlot::ids)
    }

    /// First (or only) record in a relation.
    #[must_use]
    pub fn one(&self, id: RecordId, field: &str) -> Option<RecordId> {
        self.ids(id, field).first().copied()
    }

    #[must_use]
    pub fn lookup(&self, identity: &RecordIdentity) -> Option<RecordId> {
        self.identities.get(identity).copied()
    }

    #[must_use]
    pub fn all(&self, entity: &str) -> Vec<RecordId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.entity == entity)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn find(
        &self,
        entity: &str,
        predicate: impl Fn(&Self, RecordId) -> bool,
    ) -> Option<RecordId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.entity == entity)
            .map(|(id, _)| *id)
            .find(|id| predicate(self, *id))
    }

    // ---- mutation ------------------------------------------------------

    /// Create-or-upsert: a patch resolving to a known identity merges into
    /// the existing record and returns its handle.
    pub fn insert(&mut self, entity: &str, patch: Patch) -> Result<RecordId, InternalError> {
        self.scoped(|store| store.insert_inner(entity, &patch))
    }

    pub fn update(&mut self, id: RecordId, patch: Patch) -> Result<(), InternalError> {
        self.scoped(|store| store.update_inner(id, &patch, WriteMode::Action))
    }

    /// Sever every relation, cascade causal ownership, free the slot.
    /// Idempotent: deleting a dead handle is a no-op.
    pub fn delete(&mut self, id: RecordId) -> Result<(), InternalError> {
        self.scoped(|store| store.delete_inner(id))
    }

    /// Triggers scheduled by the last settle pass, drained for the
    /// environment to run.
    pub fn take_fired_triggers(&mut self) -> Result<Vec<FiredTrigger>, InternalError> {
        let fired = std::mem::take(&mut self.fired);
        let schema = Rc::clone(&self.schema);

        let mut out = Vec::new();
        for (record, name) in fired {
            let Some(slot) = self.slots.get(&record) else {
                continue;
            };
            let entity = schema.entity(slot.entity)?;
            let Some(trigger) = entity.triggers.iter().find(|t| t.name == name) else {
                continue;
            };
            out.push(FiredTrigger {
                record,
                name,
                run: trigger.run,
            });
        }

        Ok(out)
    }

    /// Records deleted (directly or by causal cascade) since the last drain.
    pub fn take_deleted(&mut self) -> Vec<(RecordId, &'static str)> {
        std::mem::take(&mut self.deleted_log)
    }

    // ---- write plumbing ------------------------------------------------

    /// Run one mutation; settle derived state when the outermost mutation
    /// finishes. Nested mutations (relation inserts, cascades, computed
    /// writes) share the outer settle pass, so no intermediate state is
    /// ever observable from outside.
    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, InternalError>,
    ) -> Result<T, InternalError> {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        if self.depth > 0 {
            return result;
        }
        match result {
            Ok(value) => {
                self.settle()?;
                Ok(value)
            }
            Err(err) => {
                self.reset_settle_state();
                Err(err)
            }
        }
    }

    fn reset_settle_state(&mut self) {
        self.dirty.clear();
        self.pending.clear();
        self.fired.clear();
        self.deleting.clear();
    }

    fn insert_inner(&mut self, entity_name: &str, patch: &Patch) -> Result<RecordId, InternalError> {
        let schema = Rc::clone(&self.schema);
        let entity = schema.entity(entity_name)?;

        let identity = RecordIdentity::from_patch(entity, patch)?;
        if let Some(identity) = &identity
            && let Some(existing) = self.identities.get(identity).copied()
        {
            // idempotent upsert: merge into the live record
            self.update_inner(existing, patch, WriteMode::Action)?;
            return Ok(existing);
        }

        let id = RecordId(self.next_id);
        self.next_id += 1;

        let mut slot = RecordSlot::new(entity.name);
        for field in &entity.fields {
            match &field.kind {
                FieldKind::Attribute { default } => {
                    if let Some(value) = default {
                        slot.values.insert(field.name, value.clone());
                    }
                }
                FieldKind::Relation { kind, .. } => {
                    slot.relations
                        .insert(field.name, RelationSlot::new(kind.is_many()));
                }
            }
        }
        self.slots.insert(id, slot);
        if let Some(identity) = identity {
            self.identities.insert(identity, id);
        }

        // relation defaults: create-and-link empty sub-records
        for field in &entity.fields {
            if let FieldKind::Relation {
                default_insert: true,
                ..
            } = field.kind
            {
                self.apply_command(
                    id,
                    field.name,
                    &FieldCommand::Insert(vec![Patch::new()]),
                    WriteMode::Action,
                )?;
            }
        }

        self.apply_patch(id, patch, WriteMode::Action)?;

        // register observers and schedule the first derivation pass
        self.deps.register_triggers(entity, id);
        for field in &entity.fields {
            if field.is_engine_written() {
                self.pending.insert((id, field.name));
            }
        }

        Ok(id)
    }

    fn update_inner(
        &mut self,
        id: RecordId,
        patch: &Patch,
        mode: WriteMode,
    ) -> Result<(), InternalError> {
        if !self.slots.contains_key(&id) {
            return Err(InternalError::store_not_found(format!(
                "cannot update missing {id}"
            )));
        }

        self.apply_patch(id, patch, mode)
    }

    fn apply_patch(
        &mut self,
        id: RecordId,
        patch: &Patch,
        mode: WriteMode,
    ) -> Result<(), InternalError> {
        for (field, command) in patch.iter() {
            self.apply_command(id, field, command, mode)?;
        }

        Ok(())
    }

    fn apply_command(
        &mut self,
        id: RecordId,
        field_name: &str,
        command: &FieldCommand,
        mode: WriteMode,
    ) -> Result<bool, InternalError> {
        let schema = Rc::clone(&self.schema);
        let entity_name = self
            .slots
            .get(&id)
            .map(|slot| slot.entity)
            .ok_or_else(|| InternalError::store_not_found(format!("cannot write missing {id}")))?;
        let entity = schema.entity(entity_name)?;
        let field = entity.field(field_name).ok_or_else(|| {
            InternalError::model_unsupported(format!("unknown field {entity_name}.{field_name}"))
        })?;

        if mode == WriteMode::Action && field.is_engine_written() {
            return Err(InternalError::store_invariant(format!(
                "{entity_name}.{field_name} is derived and cannot be written directly"
            )));
        }

        match &field.kind {
            FieldKind::Attribute { default } => match command {
                FieldCommand::Set(value) => self.set_attr(id, field, value.clone()),
                FieldCommand::Clear => {
                    let value = default.clone().unwrap_or(Value::Null);
                    self.set_attr(id, field, value)
                }
                _ => Err(InternalError::store_invariant(format!(
                    "attribute {entity_name}.{field_name} only accepts set/clear"
                ))),
            },
            FieldKind::Relation { .. } => {
                let rel = RelInfo::of(field)?;
                match command {
                    FieldCommand::Set(_) => Err(InternalError::store_invariant(format!(
                        "relation {entity_name}.{field_name} requires link commands, not set"
                    ))),
                    FieldCommand::Link(ids) => self.link(id, field, rel, ids),
                    FieldCommand::Unlink(ids) => self.unlink(id, field, rel, ids),
                    FieldCommand::UnlinkAll | FieldCommand::Clear => {
                        let current = self.ids(id, field_name).to_vec();
                        self.unlink(id, field, rel, &current)
                    }
                    FieldCommand::Replace(ids) => self.replace(id, field, rel, ids),
                    FieldCommand::Insert(patches) => {
                        let inserted = self.insert_targets(rel.target, patches)?;
                        self.link(id, field, rel, &inserted)
                    }
                    FieldCommand::InsertAndReplace(patches) => {
                        let inserted = self.insert_targets(rel.target, patches)?;
                        self.replace(id, field, rel, &inserted)
                    }
                }
            }
        }
    }

    fn insert_targets(
        &mut self,
        target: &str,
        patches: &[Patch],
    ) -> Result<Vec<RecordId>, InternalError> {
        let mut inserted = Vec::with_capacity(patches.len());
        for patch in patches {
            inserted.push(self.insert_inner(target, patch)?);
        }

        Ok(inserted)
    }

    fn set_attr(
        &mut self,
        id: RecordId,
        field: &FieldModel,
        value: Value,
    ) -> Result<bool, InternalError> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or_else(|| InternalError::store_not_found(format!("cannot write missing {id}")))?;

        let current = slot.values.get(field.name).unwrap_or(&NULL_VALUE);
        if *current == value {
            return Ok(false);
        }
        if field.id && !current.is_null() {
            return Err(InternalError::store_conflict(format!(
                "identity field {}.{} is immutable",
                slot.entity, field.name
            )));
        }

        slot.values.insert(field.name, value);
        self.mark_dirty(id, field.name);

        Ok(true)
    }

    fn link(
        &mut self,
        source: RecordId,
        field: &FieldModel,
        rel: RelInfo,
        to_link: &[RecordId],
    ) -> Result<bool, InternalError> {
        let mut changed = false;
        for other in to_link {
            let other = *other;
            self.verify_link_target(field, rel, other)?;

            if self.ids(source, field.name).contains(&other) {
                continue;
            }
            if !rel.kind.is_many()
                && let Some(prev) = self.one(source, field.name)
            {
                // x2one relink: properly sever the previous pair first
                self.sever(source, field, rel, prev, true)?;
            }

            self.rel_add(source, field.name, other);
            self.inverse_add(source, rel, other)?;
            changed = true;
        }

        Ok(changed)
    }

    fn verify_link_target(
        &self,
        field: &FieldModel,
        rel: RelInfo,
        other: RecordId,
    ) -> Result<(), InternalError> {
        let Some(slot) = self.slots.get(&other) else {
            return Err(InternalError::store_invariant(format!(
                "{other} is not alive and cannot be linked through {}",
                field.name
            )));
        };
        if slot.entity != rel.target {
            return Err(InternalError::store_invariant(format!(
                "{other} is a {} record, relation {} targets {}",
                slot.entity, field.name, rel.target
            )));
        }

        Ok(())
    }

    /// Mirror a forward link on the inverse side, displacing an occupied
    /// x2one inverse without applying causality (the displaced pair is
    /// being relinked, not orphaned).
    fn inverse_add(
        &mut self,
        source: RecordId,
        rel: RelInfo,
        other: RecordId,
    ) -> Result<(), InternalError> {
        let schema = Rc::clone(&self.schema);
        let inverse_field = schema.entity(rel.target)?.field(rel.inverse).ok_or_else(|| {
            InternalError::model_invariant(format!("missing inverse {}.{}", rel.target, rel.inverse))
        })?;
        let inverse_rel = RelInfo::of(inverse_field)?;

        if !inverse_rel.kind.is_many()
            && let Some(displaced) = self.one(other, rel.inverse)
            && displaced != source
        {
            self.rel_remove(other, rel.inverse, displaced);
            self.rel_remove(displaced, inverse_rel.inverse, other);
        }

        self.rel_add(other, rel.inverse, source);

        Ok(())
    }

    fn unlink(
        &mut self,
        source: RecordId,
        field: &FieldModel,
        rel: RelInfo,
        to_unlink: &[RecordId],
    ) -> Result<bool, InternalError> {
        let mut changed = false;
        for other in to_unlink {
            if self.ids(source, field.name).contains(other) {
                self.sever(source, field, rel, *other, true)?;
                changed = true;
            }
        }

        Ok(changed)
    }

    fn replace(
        &mut self,
        source: RecordId,
        field: &FieldModel,
        rel: RelInfo,
        new_ids: &[RecordId],
    ) -> Result<bool, InternalError> {
        // dedup while preserving the requested order
        let mut wanted: Vec<RecordId> = Vec::with_capacity(new_ids.len());
        for id in new_ids {
            if !wanted.contains(id) {
                wanted.push(*id);
            }
        }

        if !rel.kind.is_many() {
            return match wanted.first() {
                Some(first) => self.link(source, field, rel, &[*first]),
                None => {
                    let current = self.ids(source, field.name).to_vec();
                    self.unlink(source, field, rel, &current)
                }
            };
        }

        let current = self.ids(source, field.name).to_vec();
        let to_link: Vec<RecordId> = wanted
            .iter()
            .copied()
            .filter(|id| !current.contains(id))
            .collect();
        let to_unlink: Vec<RecordId> = current
            .iter()
            .copied()
            .filter(|id| !wanted.contains(id))
            .collect();

        let mut changed = false;
        if self.link(source, field, rel, &to_link)? {
            changed = true;
        }
        if self.unlink(source, field, rel, &to_unlink)? {
            changed = true;
        }

        // impose the requested ordering
        let now = self.ids(source, field.name);
        if now != wanted.as_slice() {
            if let Some(slot) = self.slots.get_mut(&source)
                && let Some(relation) = slot.relations.get_mut(field.name)
            {
                relation.ids = wanted;
            }
            self.mark_dirty(source, field.name);
            changed = true;
        }

        Ok(changed)
    }

    /// Remove one linked pair from both sides. When `apply_causality` is
    /// set and the relation is causal, the orphaned target is deleted —
    /// unless another owner still holds it through the same relation.
    fn sever(
        &mut self,
        source: RecordId,
        field: &FieldModel,
        rel: RelInfo,
        other: RecordId,
        apply_causality: bool,
    ) -> Result<(), InternalError> {
        self.rel_remove(source, field.name, other);
        self.rel_remove(other, rel.inverse, source);

        if apply_causality && rel.causal && self.exists(other) && self.ids(other, rel.inverse).is_empty()
        {
            self.delete_inner(other)?;
        }

        Ok(())
    }

    fn rel_add(&mut self, id: RecordId, field: &'static str, other: RecordId) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        let Some(relation) = slot.relations.get_mut(field) else {
            return;
        };
        if !relation.ids.contains(&other) {
            relation.ids.push(other);
            self.mark_dirty(id, field);
        }
    }

    fn rel_remove(&mut self, id: RecordId, field: &'static str, other: RecordId) {
        let Some(slot) = self.slots.get_mut(&id) else {
            // deleted mid-cascade; nothing to sever
            return;
        };
        let Some(relation) = slot.relations.get_mut(field) else {
            return;
        };
        if let Some(pos) = relation.ids.iter().position(|x| *x == other) {
            relation.ids.remove(pos);
            self.mark_dirty(id, field);
        }
    }

    fn delete_inner(&mut self, id: RecordId) -> Result<(), InternalError> {
        if !self.slots.contains_key(&id) || self.deleting.contains(&id) {
            return Ok(());
        }
        self.deleting.insert(id);

        let schema = Rc::clone(&self.schema);
        let entity_name = self.slots.get(&id).map(|slot| slot.entity).unwrap_or_default();
        let entity = schema.entity(entity_name)?;

        // sever every relation before freeing the slot, so inverse-side
        // dependents recompute against the record's absence
        for field in &entity.fields {
            if !field.is_relation() {
                continue;
            }
            let rel = RelInfo::of(field)?;
            let others = self.ids(id, field.name).to_vec();
            for other in others {
                self.sever(id, field, rel, other, true)?;
            }
        }

        let slot = self.slots.remove(&id).ok_or_else(|| {
            InternalError::store_invariant(format!("{id} vanished during deletion"))
        })?;
        if let Some(identity) = RecordIdentity::from_values(entity, |f| slot.value(f))? {
            self.identities.remove(&identity);
        }

        self.deps.remove_record(id);
        self.pending.retain(|(record, _)| *record != id);
        self.fired.retain(|(record, _)| *record != id);
        self.deleting.remove(&id);
        self.deleted_log.push((id, slot.entity));

        Ok(())
    }

    // ---- recomputation -------------------------------------------------

    fn mark_dirty(&mut self, id: RecordId, field: &'static str) {
        self.dirty.push_back((id, field));
    }

    /// Drain writes and recompute every transitively affected derived
    /// field, converging to a fixed point within `MAX_RECOMPUTE_PASSES`.
    fn settle(&mut self) -> Result<(), InternalError> {
        let result = self.settle_loop();
        if result.is_err() {
            self.reset_settle_state();
        }

        result
    }

    fn settle_loop(&mut self) -> Result<(), InternalError> {
        let mut passes = 0usize;
        loop {
            while let Some((record, field)) = self.dirty.pop_front() {
                for dependent in self.deps.dependents_of(record, field) {
                    self.pending.insert(dependent);
                }
                for trigger in self.deps.trigger_dependents_of(record, field) {
                    self.fired.insert(trigger);
                }
            }

            let Some((record, field)) = self.pending.pop_first() else {
                break;
            };
            passes += 1;
            if passes > MAX_RECOMPUTE_PASSES {
                return Err(InternalError::recompute_invariant(format!(
                    "recomputation did not converge after {MAX_RECOMPUTE_PASSES} passes; \
                     cyclic field declaration suspected around {record}.{field}"
                )));
            }

            self.evaluate(record, field)?;
        }

        Ok(())
    }

    fn evaluate(&mut self, id: RecordId, field_name: &'static str) -> Result<(), InternalError> {
        let Some(slot) = self.slots.get(&id) else {
            self.deps.drop_edges(id, field_name);
            return Ok(());
        };

        let schema = Rc::clone(&self.schema);
        let entity = schema.entity(slot.entity)?;
        let Some(field) = entity.field(field_name) else {
            return Ok(());
        };

        let command = match &field.origin {
            FieldOrigin::Written => return Ok(()),
            FieldOrigin::Computed { deps, compute } => {
                self.rebind_edges(id, field_name, deps);
                (compute)(&*self, id)
            }
            FieldOrigin::Related {
                relation,
                field: related_field,
            } => {
                let (relation, related_field) = (*relation, *related_field);
                let deps = [DepPath::Via(relation, related_field)];
                self.rebind_edges(id, field_name, &deps);
                self.related_command(id, field, relation, related_field)
            }
        };

        self.apply_command(id, field_name, &command, WriteMode::Engine)?;

        Ok(())
    }

    /// Re-resolve the declared dependency paths against the live graph.
    /// A `Via` path re-binds to whatever records the relation currently
    /// holds; this is what keeps derivation correct when a link changes.
    fn rebind_edges(&mut self, id: RecordId, field_name: &'static str, deps: &[DepPath]) {
        let mut edges = BTreeSet::new();
        for dep in deps {
            match dep {
                DepPath::Local(field) => {
                    edges.insert((id, *field));
                }
                DepPath::Via(relation, field) => {
                    edges.insert((id, *relation));
                    for target in self.ids(id, relation) {
                        edges.insert((*target, *field));
                    }
                }
            }
        }

        self.deps.set_edges((id, field_name), edges);
    }

    fn related_command(
        &self,
        id: RecordId,
        field: &FieldModel,
        relation: &'static str,
        related_field: &'static str,
    ) -> FieldCommand {
        match &field.kind {
            FieldKind::Relation { .. } => {
                let mut ids = Vec::new();
                for target in self.ids(id, relation) {
                    for linked in self.ids(*target, related_field) {
                        if !ids.contains(linked) {
                            ids.push(*linked);
                        }
                    }
                }
                FieldCommand::Replace(ids)
            }
            FieldKind::Attribute { .. } => match self.one(id, relation) {
                Some(target) => FieldCommand::Set(self.value(target, related_field).clone()),
                None => FieldCommand::Clear,
            },
        }
    }
}
