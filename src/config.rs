//! Runtime configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

use crate::consts::{HEARTBEAT_INTERVAL, PEER_TIMEOUT};

/// Presence timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Period between outgoing heartbeats.
    pub heartbeat_interval: Duration,
    /// Silence after which a peer is treated as departed.
    pub peer_timeout: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { heartbeat_interval: HEARTBEAT_INTERVAL, peer_timeout: PEER_TIMEOUT }
    }
}

impl PresenceConfig {
    /// Build presence timing from environment variables.
    ///
    /// Optional:
    /// - `PRESENCE_HEARTBEAT_MS`: default 5000
    /// - `PRESENCE_TIMEOUT_MS`: default 11000
    ///
    /// A zero heartbeat period falls back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key))
    }

    fn from_lookup<F, E>(lookup: F) -> Self
    where
        F: Fn(&str) -> Result<String, E>,
    {
        let defaults = Self::default();
        let heartbeat_ms = env_parse(&lookup, "PRESENCE_HEARTBEAT_MS", duration_ms(defaults.heartbeat_interval));
        let timeout_ms = env_parse(&lookup, "PRESENCE_TIMEOUT_MS", duration_ms(defaults.peer_timeout));
        Self {
            heartbeat_interval: if heartbeat_ms == 0 {
                defaults.heartbeat_interval
            } else {
                Duration::from_millis(heartbeat_ms)
            },
            peer_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

pub(crate) fn env_parse<T, F, E>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Result<String, E>,
{
    match lookup(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
