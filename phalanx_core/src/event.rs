use derivative::Derivative;
use std::any::Any;

/// Domain-defined event tag. The runtime never interprets the value; systems
/// subscribe to the kinds they care about.
pub type EventKind = u64;

/// A tagged message with an opaque payload. Producers hand events to the
/// world queue; subscribing systems inspect the payload by downcasting.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Event {
    kind: EventKind,
    #[derivative(Debug = "ignore")]
    payload: Box<dyn Any + Send + Sync>,
}

impl Event {
    pub fn new<P: Any + Send + Sync>(kind: EventKind, payload: P) -> Event {
        Event {
            kind,
            payload: Box::new(payload),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The payload, if it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}
