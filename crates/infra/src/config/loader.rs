//! Configuration loader
//!
//! Loads [`AppConfig`] from an optional file and applies environment
//! overrides on top.
//!
//! ## Loading Strategy
//! 1. `STORELINK_CONFIG` names a file explicitly; otherwise standard paths
//!    are probed
//! 2. No file found means built-in defaults
//! 3. `STORELINK_*` environment variables override individual values
//! 4. The merged result is validated
//!
//! ## Environment Variables
//! - `STORELINK_CONFIG`: Config file path (`.json` or `.toml`)
//! - `STORELINK_CACHE_TTL_SECS`: Idle time before a connector is evicted
//! - `STORELINK_CLEANUP_INTERVAL_SECS`: Eviction sweep interval
//! - `STORELINK_HEALTH_CHECK_TIMEOUT_SECS`: Bound on connector health checks
//! - `STORELINK_BREAKER_TIMEOUT_SECS`: Open → half-open cooldown
//! - `STORELINK_RETRY_MAX_ATTEMPTS`: Attempts per outbound call
//! - `STORELINK_TOKEN_EXPIRY_BUFFER_SECS`: Refresh margin for bearer tokens
//! - `STORELINK_LOG_LEVEL`: Default log filter
//! - `STORELINK_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./storelink.{toml,json}` or `./config.{toml,json}`
//! 2. `../storelink.{toml,json}`
//! 3. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use storelink_domain::{AppConfig, Result, StoreLinkError};

const CONFIG_PATH_VAR: &str = "STORELINK_CONFIG";

/// Load configuration: file (if any), then environment overrides.
///
/// # Errors
/// Returns `StoreLinkError::Config` if:
/// - `STORELINK_CONFIG` points at a missing or unreadable file
/// - The file format is invalid
/// - An override has an unparsable value
/// - The merged configuration fails validation
pub fn load() -> Result<AppConfig> {
    let explicit = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    let base = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            AppConfig::default()
        }
    };

    let config = load_from_env(base)?;
    config.validate()?;
    Ok(config)
}

/// Apply `STORELINK_*` overrides to `base`.
///
/// Unset variables leave the corresponding value untouched.
///
/// # Errors
/// Returns `StoreLinkError::Config` for values that do not parse.
pub fn load_from_env(mut base: AppConfig) -> Result<AppConfig> {
    if let Some(ttl) = env_parse("STORELINK_CACHE_TTL_SECS")? {
        base.registry.cache_ttl_secs = ttl;
    }
    if let Some(interval) = env_parse("STORELINK_CLEANUP_INTERVAL_SECS")? {
        base.registry.cleanup_interval_secs = interval;
    }
    if let Some(timeout) = env_parse("STORELINK_HEALTH_CHECK_TIMEOUT_SECS")? {
        base.registry.health_check_timeout_secs = timeout;
    }
    if let Some(timeout) = env_parse("STORELINK_BREAKER_TIMEOUT_SECS")? {
        base.circuit_breaker.timeout_secs = timeout;
    }
    if let Some(attempts) = env_parse("STORELINK_RETRY_MAX_ATTEMPTS")? {
        base.retry.max_attempts = attempts;
    }
    if let Some(buffer) = env_parse("STORELINK_TOKEN_EXPIRY_BUFFER_SECS")? {
        base.token.expiry_buffer_secs = buffer;
    }
    if let Ok(level) = std::env::var("STORELINK_LOG_LEVEL") {
        base.logging.level = level;
    }
    base.logging.json = env_bool("STORELINK_LOG_JSON", base.logging.json);

    Ok(base)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `StoreLinkError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(StoreLinkError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            StoreLinkError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| StoreLinkError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration, detecting the format by extension.
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| StoreLinkError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| StoreLinkError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(StoreLinkError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a config file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["storelink.toml", "storelink.json", "config.toml", "config.json"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter().flat_map(|dir| NAMES.iter().map(move |name| dir.join(name))).find(|p| p.exists())
}

/// Parse an optional numeric environment variable
///
/// # Errors
/// Returns `StoreLinkError::Config` if the variable is set but invalid.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| StoreLinkError::Config(format!("Invalid {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
