//! Runtime application configuration loaded from settings.

use std::time::Duration;

use anyhow::Context;

use super::manager::SettingsManager;
use super::validation::validate_setting;
use crate::notification::QueueTimings;
use crate::supervisor::SupervisorTimings;

/// Typed runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server_url: String,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub display_duration: Duration,
    pub exit_duration: Duration,
    pub http_connect_timeout: Duration,
    pub auto_connect: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:9201".into(),
            poll_interval: Duration::from_millis(30_000),
            settle_delay: Duration::from_millis(1_000),
            display_duration: Duration::from_millis(15_000),
            exit_duration: Duration::from_millis(300),
            http_connect_timeout: Duration::from_secs(10),
            auto_connect: true,
        }
    }
}

impl AppConfig {
    /// Load and validate every setting. Fails on the first invalid value.
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> Result<String, anyhow::Error> {
            let value = sm.get_setting(key)?;
            validate_setting(key, &value)
                .map_err(|e| anyhow::anyhow!("invalid {key}={value:?}: {e}"))?;
            Ok(value)
        };
        let millis = |key: &str| -> Result<Duration, anyhow::Error> {
            let v: u64 = g(key)?.parse().with_context(|| format!("parsing {key}"))?;
            Ok(Duration::from_millis(v))
        };

        let connect_secs: u64 = g("HTTP_CONNECT_TIMEOUT_SECS")?
            .parse()
            .context("parsing HTTP_CONNECT_TIMEOUT_SECS")?;

        Ok(Self {
            server_url: g("NOTIFY_SERVER_URL")?,
            poll_interval: millis("POLL_INTERVAL_MS")?,
            settle_delay: millis("SETTLE_DELAY_MS")?,
            display_duration: millis("DISPLAY_DURATION_MS")?,
            exit_duration: millis("EXIT_DURATION_MS")?,
            http_connect_timeout: Duration::from_secs(connect_secs),
            auto_connect: g("AUTO_CONNECT")? == "true",
        })
    }

    pub fn supervisor_timings(&self) -> SupervisorTimings {
        SupervisorTimings {
            poll_interval: self.poll_interval,
            settle_delay: self.settle_delay,
        }
    }

    pub fn queue_timings(&self) -> QueueTimings {
        QueueTimings {
            display_duration: self.display_duration,
            exit_duration: self.exit_duration,
        }
    }
}
