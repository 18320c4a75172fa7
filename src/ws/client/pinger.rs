use std::{sync::Weak, time::Duration};

use tokio::time::Instant;

use super::Shared;

/// Send a ping message every `interval` until the connection of `generation` is gone.
pub(crate) async fn run(shared: Weak<Shared>, generation: u64, interval: Duration) {
    let mut ping_time = Instant::now() + interval;

    loop {
        tokio::time::sleep_until(ping_time).await;

        let shared = match shared.upgrade() {
            Some(shared) => shared,
            None => break,
        };

        if !shared.ping(generation) {
            log::debug!("Connection of heartbeat gone, stop");
            break;
        }

        log::trace!("Heartbeat ping sent");
        ping_time = Instant::now() + interval;
    }
}
