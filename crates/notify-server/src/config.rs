//! Server configuration from the environment.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub recent_capacity: usize,
    pub keepalive: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9201,
            recent_capacity: 100,
            keepalive: Duration::from_secs(15),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = parse_or(&lookup, "SERVER_PORT", defaults.port);
        let recent_capacity =
            parse_or(&lookup, "RECENT_EVENTS_CAPACITY", defaults.recent_capacity).max(1);
        let keepalive_secs =
            parse_or(&lookup, "KEEPALIVE_SECS", defaults.keepalive.as_secs()).max(1);

        Self {
            port,
            recent_capacity,
            keepalive: Duration::from_secs(keepalive_secs),
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid setting, using default");
            default
        }),
        _ => default,
    }
}
