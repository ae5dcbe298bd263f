use std::str::FromStr;

use crate::error::CommonError;

/// Read an optional, parseable environment variable.
///
/// Unset (or blank) yields `Ok(None)`; set-but-unparseable is an error rather than a
/// silent fallback to the default.
pub fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, CommonError> {
    let Ok(value) = std::env::var(name) else {
        return Ok(None);
    };
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| CommonError::InvalidEnv { name, value })
}

/// Read a string environment variable, falling back to `default` when unset or blank.
pub fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
