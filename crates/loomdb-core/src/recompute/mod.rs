use crate::{model::EntityModel, store::RecordId};
use std::collections::{BTreeMap, BTreeSet};

/// A concrete dependency edge or its owner: one field of one record.
type FieldRef = (RecordId, &'static str);

///
/// DependencyGraph
///
/// Reverse index from written fields to the derived fields and triggers
/// that read them. Edges are concrete `(record, field)` pairs, resolved
/// from declared dependency paths each time a derived field evaluates, so
/// a `Via` path always points at the relation's current targets.
///

#[derive(Default)]
pub(crate) struct DependencyGraph {
    /// Derived field -> the edges it currently watches.
    edges_of: BTreeMap<FieldRef, BTreeSet<FieldRef>>,
    /// Watched field -> the derived fields watching it.
    dependents: BTreeMap<FieldRef, BTreeSet<FieldRef>>,
    /// Watched field -> `(record, trigger name)` pairs to fire on change.
    trigger_dependents: BTreeMap<FieldRef, BTreeSet<FieldRef>>,
}

impl DependencyGraph {
    /// Replace the watch set of one derived field, diffing against the
    /// previous binding so stale reverse entries are dropped.
    pub fn set_edges(&mut self, owner: FieldRef, edges: BTreeSet<FieldRef>) {
        let previous = self.edges_of.insert(owner, edges.clone()).unwrap_or_default();

        for removed in previous.difference(&edges) {
            if let Some(watchers) = self.dependents.get_mut(removed) {
                watchers.remove(&owner);
            }
        }
        for added in edges.difference(&previous) {
            self.dependents.entry(*added).or_default().insert(owner);
        }
    }

    pub fn drop_edges(&mut self, record: RecordId, field: &'static str) {
        self.set_edges((record, field), BTreeSet::new());
        self.edges_of.remove(&(record, field));
    }

    pub fn dependents_of(&self, record: RecordId, field: &'static str) -> Vec<FieldRef> {
        self.dependents
            .get(&(record, field))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn trigger_dependents_of(&self, record: RecordId, field: &'static str) -> Vec<FieldRef> {
        self.trigger_dependents
            .get(&(record, field))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Bind a new record's triggers to their declared local fields. Trigger
    /// dependencies are local-only, so the binding never needs rebuilding.
    pub fn register_triggers(&mut self, entity: &EntityModel, record: RecordId) {
        for trigger in &entity.triggers {
            for dep in trigger.local_deps() {
                self.trigger_dependents
                    .entry((record, dep))
                    .or_default()
                    .insert((record, trigger.name));
            }
        }
    }

    /// Purge every edge owned by or pointing at a deleted record.
    pub fn remove_record(&mut self, record: RecordId) {
        self.edges_of.retain(|owner, _| owner.0 != record);
        self.dependents.retain(|watched, _| watched.0 != record);
        self.trigger_dependents.retain(|watched, _| watched.0 != record);

        for watchers in self.dependents.values_mut() {
            watchers.retain(|owner| owner.0 != record);
        }
        for watchers in self.trigger_dependents.values_mut() {
            watchers.retain(|owner| owner.0 != record);
        }
    }
}
