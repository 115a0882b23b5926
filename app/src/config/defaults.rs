//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    (
        "NOTIFY_SERVER_URL",
        "http://localhost:9201",
        "Base URL of the notification source",
    ),
    (
        "POLL_INTERVAL_MS",
        "30000",
        "Health probe interval while the live channel is down",
    ),
    (
        "SETTLE_DELAY_MS",
        "1000",
        "Pause between tearing down and re-opening the live channel",
    ),
    (
        "DISPLAY_DURATION_MS",
        "15000",
        "How long a notification stays visible",
    ),
    (
        "EXIT_DURATION_MS",
        "300",
        "Length of the exit phase before a notification is cleared",
    ),
    (
        "HTTP_CONNECT_TIMEOUT_SECS",
        "10",
        "TCP connect timeout for requests to the notification source",
    ),
    ("AUTO_CONNECT", "true", "Open the live channel at startup"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}
