use std::str::FromStr;

use tracing::{error, warn};

pub const API_KEY: &str = "DATADOG_API_KEY";
pub const APP_KEY: &str = "DATADOG_APP_KEY";
pub const HOST_COUNT: &str = "BIGDOG_HOSTS";
pub const METRICS_URL: &str = "BIGDOG_METRICS_URL";
pub const TAGS_URL: &str = "BIGDOG_TAGS_URL";
pub const CHECK_RUN_URL: &str = "BIGDOG_CHECK_RUN_URL";
pub const SIZING_URL: &str = "BIGDOG_SIZING_URL";
pub const HOST_PREFIX: &str = "BIGDOG_HOST_PREFIX";
pub const CHECK_IN_INTERVAL: &str = "BIGDOG_CHECK_IN_INTERVAL";
pub const THROTTLE_BATCH: &str = "BIGDOG_THROTTLE_BATCH";
pub const THROTTLE_PAUSE_MS: &str = "BIGDOG_THROTTLE_PAUSE_MS";
pub const MAX_IN_FLIGHT: &str = "BIGDOG_MAX_IN_FLIGHT";
pub const HTTP_TIMEOUT: &str = "BIGDOG_HTTP_TIMEOUT";
pub const SEED: &str = "BIGDOG_SEED";
pub const SERVICE_CHECKS: &str = "BIGDOG_SERVICE_CHECKS";
pub const CONFIG_FILE: &str = "BIGDOG_CONFIG";

pub fn get_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

pub fn get_string_or(key: &str, default: &str) -> String {
    get_string(key).unwrap_or_else(|| default.to_string())
}

/// Read and parse `key`, falling back to `default` when it is unset or invalid.
pub fn get_parsed_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = get_string(key) else {
        return default;
    };

    raw.parse().unwrap_or_else(|e| {
        warn!("{key}: invalid value {raw:?} ({e}), using default");
        default
    })
}

pub fn get_parsed<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_string(key)?;
    raw.parse()
        .inspect_err(|e| warn!("{key}: invalid value {raw:?} ({e}), ignoring"))
        .ok()
}

/// Parse the desired host count.
///
/// A missing or malformed count is reported and degrades to an empty fleet.
pub fn parse_host_count(raw: Option<&str>) -> usize {
    let Some(raw) = raw else {
        error!("{HOST_COUNT} is not set, simulating zero hosts");
        return 0;
    };

    match raw.trim().parse::<usize>() {
        Ok(count) => count,
        Err(e) => {
            error!("{HOST_COUNT}: cannot parse {raw:?} as a host count ({e}), simulating zero hosts");
            0
        }
    }
}
