use log::{info, warn};

use crate::ports::Connectivity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityCheck {
    Up,
    Reconnected,
    StillDown,
}

impl ConnectivityCheck {
    pub fn link_up(self) -> bool {
        !matches!(self, Self::StillDown)
    }
}

/// Fixed-interval link supervision. No backoff: a failed reconnect is simply
/// retried at the next interval boundary.
#[derive(Debug, Clone)]
pub struct ConnectivitySupervisor {
    interval_ms: u64,
    connect_timeout_ms: u64,
    last_check_ms: u64,
}

impl ConnectivitySupervisor {
    pub fn new(interval_ms: u64, connect_timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            connect_timeout_ms,
            last_check_ms: 0,
        }
    }

    pub fn last_check_ms(&self) -> u64 {
        self.last_check_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_check_ms) >= self.interval_ms
    }

    pub fn poll(&mut self, now_ms: u64, link: &mut impl Connectivity) -> Option<ConnectivityCheck> {
        if !self.is_due(now_ms) {
            return None;
        }
        self.last_check_ms = now_ms;

        if link.is_up() {
            return Some(ConnectivityCheck::Up);
        }

        warn!("wifi link down; reconnecting (timeout {} ms)", self.connect_timeout_ms);
        if link.reconnect(self.connect_timeout_ms) {
            info!("wifi link restored");
            Some(ConnectivityCheck::Reconnected)
        } else {
            warn!(
                "wifi reconnect failed; next attempt in {} ms",
                self.interval_ms
            );
            Some(ConnectivityCheck::StillDown)
        }
    }
}
