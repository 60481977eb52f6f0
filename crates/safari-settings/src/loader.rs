//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SafariSettings::default()`]
//! 2. If `~/.safari/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{OpenAiEndpointSettings, SafariSettings};

/// `~/.safari`, falling back to `/tmp/.safari` without a home.
pub fn safari_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".safari")
}

/// Resolve the path to the settings file (`~/.safari/settings.json`).
pub fn settings_path() -> PathBuf {
    safari_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SafariSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<SafariSettings> {
    let defaults = serde_json::to_value(SafariSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SafariSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
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
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut SafariSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SAFARI_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("SAFARI_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_usize("SAFARI_MAX_SEND_QUEUE", 1, 65_536) {
        settings.server.max_send_queue = v;
    }

    // ── Agent ───────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("SAFARI_MAX_STEPS", 1, 10_000) {
        settings.agent.max_steps = v as u32;
    }
    if let Some(v) = read_env_string("SAFARI_DEFAULT_MODEL") {
        settings.agent.default_model = v;
    }

    // ── Models ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SAFARI_GEMINI_API_KEY").or_else(|| read_env_string("GOOGLE_API_KEY")) {
        settings.models.gemini.api_key = Some(v);
    }
    if let Some(v) = read_env_string("SAFARI_GEMINI_MODEL") {
        settings.models.gemini.model = v;
    }
    if let Some(url) = read_env_string("SAFARI_VLLM_BASE_URL") {
        let mut endpoint = OpenAiEndpointSettings {
            base_url: url,
            ..Default::default()
        };
        if let Some(model) = read_env_string("SAFARI_VLLM_MODEL") {
            endpoint.id = format!("vllm-{model}");
            endpoint.label = format!("vLLM ({model})");
            endpoint.model = model;
        }
        endpoint.api_key = read_env_string("SAFARI_VLLM_API_KEY");
        settings.models.openai_compatible.retain(|e| e.id != endpoint.id);
        settings.models.openai_compatible.push(endpoint);
    }

    // ── Capture / dataset ───────────────────────────────────────────
    if let Some(v) = read_env_string("SAFARI_CAPTURE_URL") {
        settings.capture.base_url = v;
    }
    if let Some(v) = read_env_bool("SAFARI_DATASET_ENABLED") {
        settings.dataset.enabled = v;
    }
    if let Some(v) = read_env_string("SAFARI_DATASET_DIR") {
        settings.dataset.dir = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SAFARI_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("SAFARI_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Resolve a settings path: absolute stays, relative joins `~/.safari`.
pub fn resolve_path(raw: &str) -> PathBuf {
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        p
    } else {
        safari_home().join(p)
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
