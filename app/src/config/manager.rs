//! SettingsManager: environment-backed settings with defaults.

use std::collections::HashMap;

use super::defaults::DEFAULT_SETTINGS;

/// Resolves setting keys against explicit values, falling back to defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsManager {
    values: HashMap<String, String>,
}

impl SettingsManager {
    /// Capture every known key present (and non-empty) in the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from explicit pairs. Unknown keys are kept but never read.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let values = DEFAULT_SETTINGS
            .keys()
            .filter_map(|key| {
                lookup(key)
                    .filter(|v| !v.is_empty())
                    .map(|v| (key.to_string(), v))
            })
            .collect();
        Self { values }
    }

    /// Get a setting value. Falls back to default if not set.
    pub fn get_setting(&self, key: &str) -> Result<String, anyhow::Error> {
        let def = DEFAULT_SETTINGS
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("unknown setting key: {key}"))?;
        Ok(self
            .values
            .get(key)
            .cloned()
            .unwrap_or_else(|| def.default.to_string()))
    }

    /// Keys explicitly set rather than defaulted, sorted.
    pub fn overridden_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .values
            .keys()
            .map(String::as_str)
            .filter(|k| DEFAULT_SETTINGS.contains_key(k))
            .collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default() {
        let sm = SettingsManager::default();
        assert_eq!(sm.get_setting("SETTLE_DELAY_MS").unwrap(), "1000");
    }

    #[test]
    fn explicit_value_wins() {
        let sm = SettingsManager::from_pairs([("SETTLE_DELAY_MS", "250")]);
        assert_eq!(sm.get_setting("SETTLE_DELAY_MS").unwrap(), "250");
        assert_eq!(sm.overridden_keys(), vec!["SETTLE_DELAY_MS"]);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let sm = SettingsManager::default();
        assert!(sm.get_setting("PRINTER_TYPE").is_err());
    }

    #[test]
    fn lookup_skips_empty_and_unknown() {
        let sm = SettingsManager::from_lookup(|key| match key {
            "POLL_INTERVAL_MS" => Some(String::new()),
            "AUTO_CONNECT" => Some("false".into()),
            _ => None,
        });
        assert_eq!(sm.get_setting("POLL_INTERVAL_MS").unwrap(), "30000");
        assert_eq!(sm.get_setting("AUTO_CONNECT").unwrap(), "false");
    }
}
