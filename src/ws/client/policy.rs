use std::time::Duration;

/// Default heartbeat interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default limit of a websocket handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// When and how often a dropped connection is re-established.
///
/// The delay before retry number `n` (starting from zero) is
/// `min(base_delay * 2^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// retries before giving up
    pub max_attempts: u32,
    /// delay before the first retry
    pub base_delay: Duration,
    /// upper bound of a single delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `attempt`, zero based.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Options of a [Connection](super::Connection)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// reconnect behavior after abnormal close
    pub reconnect: ReconnectPolicy,
    /// how often a ping message is sent while connected
    pub heartbeat_interval: Duration,
    /// a handshake not done within this is treated as a failed attempt
    pub handshake_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}
