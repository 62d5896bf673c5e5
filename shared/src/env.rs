//! Environment variable helpers shared by the client and server configs
//!
//! Missing values fall back to the given default. Unparseable values do too,
//! with a warning naming the variable.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Parse an environment variable as `T`
pub fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match try_parse(std::env::var(key).ok().as_deref()) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            warn!("Ignoring {}: {}; using default", key, e);
            default
        }
    }
}

/// Parse an environment variable as a boolean (`true`/`1`/`false`/`0`)
pub fn parse_env_bool(key: &str, default: bool) -> bool {
    match try_parse_bool(std::env::var(key).ok().as_deref()) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            warn!("Ignoring {}: {}; using default", key, e);
            default
        }
    }
}

/// Parse an environment variable holding a millisecond count
pub fn parse_env_duration_ms(key: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(parse_env(key, default_ms))
}

/// Read an environment variable as a non-empty string
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `Ok(None)` when unset, the parse error text when set but invalid
fn try_parse<T>(raw: Option<&str>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{:?} is invalid ({})", v, e)),
    }
}

fn try_parse_bool(raw: Option<&str>) -> Result<Option<bool>, String> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(format!("{:?} is not a boolean", other)),
    }
}
