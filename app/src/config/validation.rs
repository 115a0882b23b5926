//! Setting value validation.

use url::Url;

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "NOTIFY_SERVER_URL" => validate_http_url(value)?,
        "POLL_INTERVAL_MS" => validate_int_range(value, 1_000, 3_600_000)?,
        "SETTLE_DELAY_MS" => validate_int_range(value, 0, 60_000)?,
        "DISPLAY_DURATION_MS" => validate_int_range(value, 1_000, 600_000)?,
        "EXIT_DURATION_MS" => validate_int_range(value, 0, 10_000)?,
        "HTTP_CONNECT_TIMEOUT_SECS" => validate_int_range(value, 1, 300)?,
        _ if is_boolean_setting(key) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: u64, max: u64) -> Result<(), String> {
    let v: u64 = value.parse().map_err(|_| "must be a non-negative integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn validate_http_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL: {e}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("must use http or https".into());
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("must include a host".into());
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "AUTO_CONNECT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_boolean() {
        assert!(validate_setting("AUTO_CONNECT", "true").is_ok());
        assert!(validate_setting("AUTO_CONNECT", "false").is_ok());
        assert!(validate_setting("AUTO_CONNECT", "yes").is_err());
    }

    #[test]
    fn test_valid_server_url() {
        assert!(validate_setting("NOTIFY_SERVER_URL", "http://localhost:9201").is_ok());
        assert!(validate_setting("NOTIFY_SERVER_URL", "https://notify.example.com").is_ok());
        assert!(validate_setting("NOTIFY_SERVER_URL", "ws://localhost:9201").is_err());
        assert!(validate_setting("NOTIFY_SERVER_URL", "localhost:9201").is_err());
        assert!(validate_setting("NOTIFY_SERVER_URL", "").is_err());
    }

    #[test]
    fn test_interval_ranges() {
        assert!(validate_setting("POLL_INTERVAL_MS", "30000").is_ok());
        assert!(validate_setting("POLL_INTERVAL_MS", "999").is_err());
        assert!(validate_setting("POLL_INTERVAL_MS", "-1").is_err());
        assert!(validate_setting("SETTLE_DELAY_MS", "0").is_ok());
        assert!(validate_setting("EXIT_DURATION_MS", "10001").is_err());
        assert!(validate_setting("DISPLAY_DURATION_MS", "abc").is_err());
        assert!(validate_setting("HTTP_CONNECT_TIMEOUT_SECS", "0").is_err());
    }
}
