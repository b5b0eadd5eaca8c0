mod event_bus;

pub use event_bus::{
    EventBus, EventBusStats, EventEnvelope, FlushedPayload, SessionEvent, StateChangedPayload,
    TickPayload,
};
