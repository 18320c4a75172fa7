use std::fmt::Display;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::ws::Outgoing;

/// Lifecycle state of a [Connection](super::Connection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// not connected and no retry pending
    #[default]
    Disconnected,
    /// handshake in progress
    Connecting,
    /// open and able to send
    Connected,
    /// waiting for a scheduled retry
    Backoff,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff => "backoff",
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub url: String,
    pub token: Option<String>,
}

/// Mutable part of a connection.
///
/// Every spawned task remembers the `generation` it was started for and
/// does nothing once it changed, so a stale socket or timer never touches
/// a newer connection.
#[derive(Debug, Default)]
pub(crate) struct Core {
    pub state: ConnectionState,
    pub target: Option<Target>,
    pub attempts: u32,
    pub generation: u64,
    pub outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
    pub handshake: Option<JoinHandle<()>>,
    pub reconnect_timer: Option<JoinHandle<()>>,
    pub heartbeat: Option<JoinHandle<()>>,
}

impl Core {
    pub fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }

    /// Abort a driver still in handshake, an open one is stopped by a close frame instead.
    pub fn abort_handshake(&mut self) {
        if let Some(handle) = self.handshake.take() {
            handle.abort();
        }
    }

    pub fn cancel_timers(&mut self) {
        if let Some(handle) = self.reconnect_timer.take() {
            handle.abort();
        }
        self.stop_heartbeat();
    }
}
