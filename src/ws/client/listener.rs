use std::{
    collections::HashMap,
    fmt::Display,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use enum_as_inner::EnumAsInner;

use super::error::ConnectionError;
use crate::ws::Message;

/// Kind of [ConnectionEvent], used to register handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// connection opened
    Open,
    /// message received
    Message,
    /// connection closed
    Close,
    /// something went wrong
    Error,
    /// retries exhausted, connection stays closed
    MaxReconnectAttemptsReached,
}

impl EventKind {
    /// All event kinds
    pub const ALL: [EventKind; 5] = [
        Self::Open,
        Self::Message,
        Self::Close,
        Self::Error,
        Self::MaxReconnectAttemptsReached,
    ];
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Close => "close",
            Self::Error => "error",
            Self::MaxReconnectAttemptsReached => "maxReconnectAttemptsReached",
        })
    }
}

/// Event emitted by a [Connection](super::Connection)
#[derive(Debug, Clone, EnumAsInner)]
pub enum ConnectionEvent {
    /// connection opened
    Open,
    /// a message decoded from server
    Message(Message),
    /// connection closed
    Close {
        /// close code, 1006 when no close frame was received
        code: u16,
        /// close reason
        reason: String,
    },
    /// connect failure or malformed frame
    Error(Arc<ConnectionError>),
    /// retries exhausted
    MaxReconnectAttemptsReached,
}

impl ConnectionEvent {
    /// kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Close { .. } => EventKind::Close,
            Self::Error(_) => EventKind::Error,
            Self::MaxReconnectAttemptsReached => EventKind::MaxReconnectAttemptsReached,
        }
    }
}

/// Event handler.
///
/// Any `Fn(&ConnectionEvent)` closure is a handler.
pub trait Handler: Send + Sync {
    /// Handle the event
    fn handle(&self, event: &ConnectionEvent);
}

impl<F> Handler for F
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    fn handle(&self, event: &ConnectionEvent) {
        self(event)
    }
}

/// Registration token returned by [Connection::on](super::Connection::on)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handlers = Vec<(HandlerId, Arc<dyn Handler>)>;

/// Handlers grouped by event kind, called in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Handlers>>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = f.debug_map();
        for (kind, list) in handlers.iter() {
            map.entry(kind, &list.len());
        }
        map.finish()
    }
}

impl Listeners {
    pub fn on(&self, kind: EventKind, handler: Arc<dyn Handler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        match handlers.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(i, _)| *i != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Call every handler of the event kind, a panicking handler does not stop the others.
    pub fn emit(&self, event: &ConnectionEvent) {
        let kind = event.kind();

        // handlers may (un)register handlers, so don't call them with lock held
        let snapshot: Vec<Arc<dyn Handler>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler.handle(event))).is_err() {
                log::error!("Handler of {} event panicked, ignored", kind);
            }
        }
    }
}
