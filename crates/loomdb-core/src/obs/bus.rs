use crate::store::RecordId;
use std::{cell::RefCell, rc::Rc};

///
/// BusEvent
///
/// Cross-cutting notifications published after derived state has settled.
/// Subscribers see consistent reads only.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BusEvent {
    /// The current partner's seen marker on a thread moved.
    ThreadLastSeenChanged { thread: RecordId },
    /// A fetch merged new messages into a thread.
    NewMessagesLoaded {
        thread: RecordId,
        message_count: usize,
    },
    /// A record left the registry, directly or by causal cascade.
    RecordDeleted {
        entity: &'static str,
        record: RecordId,
    },
}

///
/// EventSink
///
/// Observer boundary. Sinks must not mutate the store; they receive events
/// by reference and react outside the mutation path.
///

pub trait EventSink {
    fn publish(&self, event: &BusEvent);
}

///
/// EventBus
///

#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn publish(&self, event: &BusEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}

///
/// MemorySink
///
/// Recording sink for tests. Subscribe the sink, keep the handle:
///
/// ```ignore
/// let sink = MemorySink::new();
/// let events = sink.handle();
/// env.bus.subscribe(Box::new(sink));
/// ```
///

#[derive(Default)]
pub struct MemorySink {
    events: Rc<RefCell<Vec<BusEvent>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle(Rc::clone(&self.events))
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &BusEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Shared view of a `MemorySink`'s recording.
#[derive(Clone)]
pub struct MemorySinkHandle(Rc<RefCell<Vec<BusEvent>>>);

impl MemorySinkHandle {
    #[must_use]
    pub fn events(&self) -> Vec<BusEvent> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    #[must_use]
    pub fn count_of(&self, matches: impl Fn(&BusEvent) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| matches(e)).count()
    }
}
