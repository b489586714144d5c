use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Fallback data directory when no platform data directory is available
pub const FALLBACK_DATA_DIR: &str = "./processed_data";

/// Get the default base data directory (`<data_local_dir>/chat-atlas`)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("chat-atlas"))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

/// Read an environment variable, treating empty values as unset
pub fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Read and parse an environment variable, ignoring values that fail to parse
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_non_empty(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
