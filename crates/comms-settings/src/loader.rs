//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CommsSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `COMMS_*` environment variable overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::CommsSettings;

/// Resolve the path to the settings file (`~/.comms/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".comms").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CommsSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CommsSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<CommsSettings> {
    let defaults = serde_json::to_value(CommsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored.
pub fn apply_env_overrides(settings: &mut CommsSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so the mapping is testable without
/// touching the process environment.
pub fn apply_overrides(settings: &mut CommsSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = read_string(&lookup, "COMMS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_with(&lookup, "COMMS_PORT", |s| parse_u16_range(s, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = read_string(&lookup, "COMMS_BASE_PATH") {
        settings.server.endpoint_base_path = v;
    }
    if let Some(v) = read_with(&lookup, "COMMS_KEEP_ALIVE_MS", |s| {
        parse_u64_range(s, 1000, 3_600_000)
    }) {
        settings.comms.keep_alive_ms = v;
    }
    if let Some(v) = read_with(&lookup, "COMMS_AUTH_REQUIRED", parse_bool) {
        settings.comms.authentication_required = v;
    }
    if let Some(v) = read_with(&lookup, "COMMS_DISABLED", parse_bool) {
        settings.comms.disabled = v;
    }
    if let Some(v) = read_string(&lookup, "COMMS_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

fn read_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = lookup(name)?;
    let result = parse(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
