//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PanelSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `MCPANEL_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::PanelSettings;

/// Resolve the default settings file (`~/.mcpanel/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mcpanel").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PanelSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PanelSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file(path: &Path) -> Result<PanelSettings> {
    let defaults = serde_json::to_value(PanelSettings::default())?;

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

/// Apply `MCPANEL_*` environment overrides.
pub fn apply_env_overrides(settings: &mut PanelSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Empty values are ignored; invalid values are ignored with a warning.
pub fn apply_overrides(settings: &mut PanelSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read("MCPANEL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("MCPANEL_PORT") {
        match parse_u16_range(&v, 1, 65535) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "MCPANEL_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("MCPANEL_ALLOWED_ORIGINS") {
        settings.server.allowed_origins = parse_list(&v);
    }

    // ── Process ─────────────────────────────────────────────────────
    if let Some(v) = read("MCPANEL_GAME_ADDR") {
        settings.process.address = v;
    }
    if let Some(v) = read("MCPANEL_EXECUTOR") {
        if let Some(kind) = parse_enum("MCPANEL_EXECUTOR", &v) {
            settings.process.executor = kind;
        }
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = read("MCPANEL_LOGS_PATH") {
        settings.logs.path = v;
    }
    if let Some(v) = read("MCPANEL_MODS_PATH") {
        settings.catalog.mods_dir = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read("MCPANEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("MCPANEL_LOG_FORMAT") {
        if let Some(format) = parse_enum("MCPANEL_LOG_FORMAT", &v) {
            settings.logging.format = format;
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, trimming and dropping empty items.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_enum<T: DeserializeOwned>(key: &str, val: &str) -> Option<T> {
    let parsed = serde_json::from_value(Value::String(val.trim().to_lowercase())).ok();
    if parsed.is_none() {
        warn!(key, value = %val, "invalid env var, ignoring");
    }
    parsed
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
