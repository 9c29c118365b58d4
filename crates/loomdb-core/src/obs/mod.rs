mod bus;

pub use bus::{BusEvent, EventBus, EventSink, MemorySink, MemorySinkHandle};
