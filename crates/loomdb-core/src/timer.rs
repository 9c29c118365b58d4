use crate::{env::Env, error::InternalError, store::RecordId};

/// Deferred work body: owner record, optional subject record.
pub type TimerFn = fn(&mut Env, RecordId, Option<RecordId>) -> Result<(), InternalError>;

///
/// TimerEntry
///
/// One scheduled piece of deferred work, keyed by owner record, a kind
/// label, and an optional subject (e.g. the typing member a thread will
/// evict). Scheduling the same key again replaces the entry — deadlines
/// are not additive.
///

pub(crate) struct TimerEntry {
    pub owner: RecordId,
    pub kind: &'static str,
    pub subject: Option<RecordId>,
    pub deadline_ms: u64,
    pub run: TimerFn,
}

///
/// TimerWheel
///
/// Deterministic virtual-clock timer set. Nothing fires on its own; the
/// environment drains due entries when its clock advances.
///

#[derive(Default)]
pub(crate) struct TimerWheel {
    entries: Vec<TimerEntry>,
}

impl TimerWheel {
    pub fn schedule(
        &mut self,
        owner: RecordId,
        kind: &'static str,
        subject: Option<RecordId>,
        deadline_ms: u64,
        run: TimerFn,
    ) {
        self.entries
            .retain(|e| !(e.owner == owner && e.kind == kind && e.subject == subject));
        self.entries.push(TimerEntry {
            owner,
            kind,
            subject,
            deadline_ms,
            run,
        });
    }

    pub fn clear(&mut self, owner: RecordId, kind: &'static str, subject: Option<RecordId>) {
        self.entries
            .retain(|e| !(e.owner == owner && e.kind == kind && e.subject == subject));
    }

    /// Drop every timer owned by or aimed at a record. Called when the
    /// record is deleted.
    pub fn clear_record(&mut self, record: RecordId) {
        self.entries
            .retain(|e| e.owner != record && e.subject != Some(record));
    }

    pub fn is_scheduled(&self, owner: RecordId, kind: &'static str) -> bool {
        self.entries
            .iter()
            .any(|e| e.owner == owner && e.kind == kind)
    }

    /// Remove and return entries due at `now_ms`, earliest deadline first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<TimerEntry> {
        let mut due = Vec::new();
        let mut remaining = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.deadline_ms <= now_ms {
                due.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        self.entries = remaining;
        due.sort_by_key(|e| e.deadline_ms);

        due
    }
}
