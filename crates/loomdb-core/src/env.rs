use crate::{
    MAX_TRIGGER_ROUNDS,
    error::InternalError,
    model::Schema,
    obs::{BusEvent, EventBus},
    store::{Patch, RecordId, Store},
    timer::{TimerFn, TimerWheel},
    transport::{NullTransport, Transport, TransportError, TransportRequest},
};
use std::collections::BTreeSet;

///
/// Env
///
/// The explicit execution context every action receives: the store, the
/// event bus, the transport seam, the deferred-work timers, and a virtual
/// clock. There are no globals; everything an action touches flows through
/// here.
///

pub struct Env {
    pub store: Store,
    pub bus: EventBus,
    transport: Box<dyn Transport>,
    timers: TimerWheel,
    now_ms: u64,
    in_flight: BTreeSet<(&'static str, RecordId)>,
    running_triggers: bool,
}

impl Env {
    #[must_use]
    pub fn new(schema: Schema, transport: Box<dyn Transport>) -> Self {
        Self {
            store: Store::new(schema),
            bus: EventBus::new(),
            transport,
            timers: TimerWheel::default(),
            now_ms: 0,
            in_flight: BTreeSet::new(),
            running_triggers: false,
        }
    }

    #[must_use]
    pub fn without_transport(schema: Schema) -> Self {
        Self::new(schema, Box::new(NullTransport))
    }

    // ---- mutation ------------------------------------------------------

    pub fn insert(&mut self, entity: &str, patch: Patch) -> Result<RecordId, InternalError> {
        let id = self.store.insert(entity, patch)?;
        self.after_mutation()?;

        Ok(id)
    }

    pub fn update(&mut self, id: RecordId, patch: Patch) -> Result<(), InternalError> {
        self.store.update(id, patch)?;
        self.after_mutation()
    }

    pub fn delete(&mut self, id: RecordId) -> Result<(), InternalError> {
        self.store.delete(id)?;
        self.after_mutation()
    }

    /// Cleanup after a settled mutation: drop timers aimed at deleted
    /// records, announce the deletions, then run observer triggers until
    /// none are left. Reentrant calls (a trigger mutating through the env)
    /// defer to the outer loop.
    fn after_mutation(&mut self) -> Result<(), InternalError> {
        self.reap_deleted();

        if self.running_triggers {
            return Ok(());
        }
        self.running_triggers = true;
        let result = self.trigger_loop();
        self.running_triggers = false;

        result
    }

    fn reap_deleted(&mut self) {
        for (record, entity) in self.store.take_deleted() {
            self.timers.clear_record(record);
            self.bus.publish(&BusEvent::RecordDeleted { entity, record });
        }
    }

    fn trigger_loop(&mut self) -> Result<(), InternalError> {
        let mut rounds = 0usize;
        loop {
            let fired = self.store.take_fired_triggers()?;
            if fired.is_empty() {
                return Ok(());
            }
            rounds += 1;
            if rounds > MAX_TRIGGER_ROUNDS {
                return Err(InternalError::recompute_invariant(format!(
                    "observer triggers did not quiesce after {MAX_TRIGGER_ROUNDS} rounds"
                )));
            }

            for trigger in fired {
                if !self.store.exists(trigger.record) {
                    continue;
                }
                tracing::trace!(trigger = trigger.name, record = %trigger.record, "trigger fired");
                (trigger.run)(self, trigger.record)?;
            }
            self.reap_deleted();
        }
    }

    // ---- transport -----------------------------------------------------

    pub fn request(
        &mut self,
        request: TransportRequest,
    ) -> Result<serde_json::Value, TransportError> {
        tracing::debug!(model = %request.model, method = %request.method, "transport request");
        self.transport.request(request)
    }

    // ---- clock and timers ---------------------------------------------

    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Advance the virtual clock and fire every timer that comes due, in
    /// deadline order. Timers owned by since-deleted records are skipped.
    pub fn advance_time(&mut self, delta_ms: u64) -> Result<(), InternalError> {
        self.now_ms += delta_ms;
        loop {
            let due = self.timers.take_due(self.now_ms);
            if due.is_empty() {
                return Ok(());
            }
            for entry in due {
                if !self.store.exists(entry.owner) {
                    continue;
                }
                tracing::trace!(kind = entry.kind, owner = %entry.owner, "timer fired");
                (entry.run)(self, entry.owner, entry.subject)?;
            }
        }
    }

    /// Schedule deferred work `delay_ms` from now. Rescheduling the same
    /// `(owner, kind, subject)` replaces the previous deadline.
    pub fn schedule_timer(
        &mut self,
        owner: RecordId,
        kind: &'static str,
        subject: Option<RecordId>,
        delay_ms: u64,
        run: TimerFn,
    ) {
        self.timers
            .schedule(owner, kind, subject, self.now_ms + delay_ms, run);
    }

    pub fn clear_timer(&mut self, owner: RecordId, kind: &'static str, subject: Option<RecordId>) {
        self.timers.clear(owner, kind, subject);
    }

    #[must_use]
    pub fn timer_scheduled(&self, owner: RecordId, kind: &'static str) -> bool {
        self.timers.is_scheduled(owner, kind)
    }

    // ---- in-flight guard ----------------------------------------------

    /// Claim an exclusive slot for `(operation, record)`. Returns false if
    /// the same operation is already in flight for that record.
    pub fn try_begin(&mut self, operation: &'static str, record: RecordId) -> bool {
        self.in_flight.insert((operation, record))
    }

    pub fn finish(&mut self, operation: &'static str, record: RecordId) {
        self.in_flight.remove(&(operation, record));
    }

    #[must_use]
    pub fn is_in_flight(&self, operation: &'static str, record: RecordId) -> bool {
        self.in_flight.contains(&(operation, record))
    }

    // ---- session -------------------------------------------------------

    #[must_use]
    pub fn current_partner(&self) -> Option<RecordId> {
        self.store.current_partner()
    }

    pub fn set_current_partner(&mut self, partner: Option<RecordId>) {
        self.store.set_current_partner(partner);
    }
}
