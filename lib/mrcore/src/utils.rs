use std::str::FromStr;

use tracing::warn;

/// Parses `name` from the environment, ignoring (and logging) unparsable
/// values so the caller falls back to its default.
pub fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}
