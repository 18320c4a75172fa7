//! Self healing push channel connection.
//!
//! A [Connection] keeps at most one socket open, re-opens it with
//! exponential backoff after an abnormal close, pings the server on an
//! interval and fans events out to registered handlers.

mod driver;
mod error;
mod listener;
mod pinger;
mod policy;
mod state;

#[cfg(test)]
mod tests;

pub use error::ConnectionError;
pub use listener::{ConnectionEvent, EventKind, Handler, HandlerId};
pub use policy::{
    ConnectionOptions, ReconnectPolicy, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use state::ConnectionState;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_tungstenite as websocket;

use crate::ws::{message::NORMAL_CLOSURE, Message, Outgoing};
use listener::Listeners;
use state::{Core, Target};

pub(crate) type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

/// Handle of a push channel connection, cheap to clone.
///
/// All clones share one socket. Methods that start work (`connect`) must
/// be called inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    /// Create a disconnected connection with default options
    pub fn new() -> Self {
        Self::with_options(ConnectionOptions::default())
    }

    /// Create a disconnected connection
    pub fn with_options(options: ConnectionOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                core: Mutex::new(Core::default()),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Open a socket to `url`, adding `token` as query parameter.
    ///
    /// Does nothing while connecting or connected. Otherwise the retry
    /// counter is reset and any pending retry is replaced by this attempt.
    pub fn connect(&self, url: &str, token: Option<&str>) {
        let mut core = self.shared.lock();

        if matches!(
            core.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            log::debug!("Connect ignored, connection is {}", core.state);
            return;
        }

        core.cancel_timers();
        core.attempts = 0;
        core.target = Some(Target {
            url: url.to_string(),
            token: token.map(str::to_string),
        });

        self.shared.start_attempt(&mut core);
    }

    /// Queue a message for sending.
    ///
    /// Returns `false` and drops the message when not connected.
    pub fn send(&self, message: Message) -> bool {
        let core = self.shared.lock();

        let sent = match (&core.state, &core.outgoing) {
            (ConnectionState::Connected, Some(tx)) => tx.send(Outgoing::Message(message)).is_ok(),
            _ => false,
        };

        if !sent {
            log::warn!("Connection is {}, message dropped", core.state);
        }

        sent
    }

    /// Close the connection with code 1000 and cancel pending retry, handshake and heartbeat.
    ///
    /// Calling it again has no effect. A later [connect](Self::connect) starts over.
    pub fn close(&self) {
        let mut core = self.shared.lock();

        let was = core.state;
        core.generation += 1;
        core.state = ConnectionState::Disconnected;
        core.cancel_timers();
        if was == ConnectionState::Connecting {
            log::debug!("Abort handshake in progress");
            core.abort_handshake();
        }

        if let Some(tx) = core.outgoing.take() {
            let _ = tx.send(Outgoing::Close {
                code: NORMAL_CLOSURE,
                reason: "client closing connection".to_string(),
            });
        }

        drop(core);

        if was == ConnectionState::Connected {
            log::info!("Connection closed by client");
            self.shared.listeners.emit(&ConnectionEvent::Close {
                code: NORMAL_CLOSURE,
                reason: "client closing connection".to_string(),
            });
        }
    }

    /// Register a handler of `kind` events
    pub fn on<H: Handler + 'static>(&self, kind: EventKind, handler: H) -> HandlerId {
        self.shared.listeners.on(kind, Arc::new(handler))
    }

    /// Remove a handler, returns `false` if it was not registered for `kind`
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        self.shared.listeners.off(kind, id)
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Check if messages can be sent now
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Retries scheduled since last successful open or explicit connect
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    #[cfg(test)]
    pub(crate) fn inject(&self, event: &ConnectionEvent) {
        self.shared.listeners.emit(event)
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    options: ConnectionOptions,
    core: Mutex<Core>,
    listeners: Listeners,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_attempt(self: &Arc<Self>, core: &mut Core) {
        let target = match core.target.clone() {
            Some(target) => target,
            None => {
                core.state = ConnectionState::Disconnected;
                return;
            }
        };

        core.generation += 1;
        core.state = ConnectionState::Connecting;

        core.handshake = Some(tokio::spawn(driver::run(
            Arc::clone(self),
            core.generation,
            target,
        )));
    }

    /// Schedule next retry, or give up when retries are exhausted.
    ///
    /// Returns the event to emit once the lock is released.
    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core) -> Option<ConnectionEvent> {
        let policy = &self.options.reconnect;

        if core.attempts >= policy.max_attempts {
            log::warn!(
                "Connection still down after {} retries, give up",
                core.attempts
            );
            core.state = ConnectionState::Disconnected;
            return Some(ConnectionEvent::MaxReconnectAttemptsReached);
        }

        let delay = policy.delay(core.attempts);
        core.attempts += 1;
        core.state = ConnectionState::Backoff;

        log::info!(
            "Reconnect in {:?} ({}/{})",
            delay,
            core.attempts,
            policy.max_attempts
        );

        let generation = core.generation;
        let shared = Arc::downgrade(self);
        core.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.reconnect(generation);
            }
        }));

        None
    }

    fn reconnect(self: &Arc<Self>, generation: u64) {
        let mut core = self.lock();

        if core.generation != generation || core.state != ConnectionState::Backoff {
            return;
        }

        // this runs inside the timer task, just detach it
        core.reconnect_timer = None;
        self.start_attempt(&mut core);
    }

    /// Handshake done, returns `false` if the attempt is no longer wanted.
    fn opened(self: &Arc<Self>, generation: u64, tx: mpsc::UnboundedSender<Outgoing>) -> bool {
        let mut core = self.lock();

        if core.generation != generation {
            return false;
        }

        core.state = ConnectionState::Connected;
        core.attempts = 0;
        core.handshake = None;
        core.outgoing = Some(tx);
        core.stop_heartbeat();
        core.heartbeat = Some(tokio::spawn(pinger::run(
            Arc::downgrade(self),
            generation,
            self.options.heartbeat_interval,
        )));

        drop(core);

        log::info!("Connection opened");
        self.listeners.emit(&ConnectionEvent::Open);

        true
    }

    fn connect_failed(self: &Arc<Self>, generation: u64, error: ConnectionError) {
        let mut core = self.lock();

        if core.generation != generation {
            return;
        }

        core.outgoing = None;
        let follow_up = self.schedule_reconnect(&mut core);
        drop(core);

        log::warn!("{}", error);
        let reason = error.to_string();
        self.listeners.emit(&ConnectionEvent::Error(Arc::new(error)));
        self.listeners.emit(&ConnectionEvent::Close {
            code: crate::ws::message::ABNORMAL_CLOSURE,
            reason,
        });
        if let Some(event) = follow_up {
            self.listeners.emit(&event);
        }
    }

    fn closed(self: &Arc<Self>, generation: u64, code: u16, reason: String) {
        let mut core = self.lock();

        if core.generation != generation {
            return;
        }

        core.outgoing = None;
        core.stop_heartbeat();

        let follow_up = if code == NORMAL_CLOSURE {
            core.state = ConnectionState::Disconnected;
            None
        } else {
            self.schedule_reconnect(&mut core)
        };

        drop(core);

        log::info!("Connection closed with code {}: {}", code, reason);
        self.listeners.emit(&ConnectionEvent::Close { code, reason });
        if let Some(event) = follow_up {
            self.listeners.emit(&event);
        }
    }

    fn ping(&self, generation: u64) -> bool {
        let core = self.lock();

        if core.generation != generation || core.state != ConnectionState::Connected {
            return false;
        }

        match &core.outgoing {
            Some(tx) => tx.send(Outgoing::Message(Message::Ping)).is_ok(),
            None => false,
        }
    }

    /// Emit unless the connection of `generation` was closed or replaced.
    fn emit_current(&self, generation: u64, event: &ConnectionEvent) {
        if self.lock().generation == generation {
            self.listeners.emit(event);
        }
    }
}
