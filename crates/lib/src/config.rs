//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.medchat/config.json`) and environment.
//! Only the completion endpoint and chat panel defaults live here; the session itself is never persisted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Remote completion endpoint settings.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Chat panel defaults (primer override, initial visibility).
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Where and how to reach the completion endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// Full POST URL of the completion endpoint. Overridden by MEDCHAT_COMPLETION_URL env.
    pub url: Option<String>,

    /// API key sent as the `key` query parameter. Overridden by MEDCHAT_API_KEY env.
    pub api_key: Option<String>,

    /// Transport timeout in seconds. When absent the HTTP client default applies.
    pub timeout_secs: Option<u64>,
}

/// Chat panel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// File whose contents replace the built-in primer. Relative paths are resolved against the config file's parent.
    #[serde(default)]
    pub primer_path: Option<PathBuf>,

    /// Open the chat panel as soon as the session is created.
    #[serde(default)]
    pub open_on_start: bool,
}

/// Reads the process environment; the default override source for the `resolve_*` functions.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Trimmed, non-empty value of an env var.
fn env_non_empty(env: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    env(name).and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the completion URL: env MEDCHAT_COMPLETION_URL overrides config.
pub fn resolve_completion_url(config: &Config) -> Option<String> {
    resolve_completion_url_with(config, process_env)
}

/// Same as [`resolve_completion_url`] with `env` as the environment.
pub fn resolve_completion_url_with(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_non_empty(env, "MEDCHAT_COMPLETION_URL")
        .or_else(|| trimmed(config.completion.url.as_ref()))
}

/// Resolve the API key: env MEDCHAT_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    resolve_api_key_with(config, process_env)
}

/// Same as [`resolve_api_key`] with `env` as the environment.
pub fn resolve_api_key_with(
    config: &Config,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_non_empty(env, "MEDCHAT_API_KEY").or_else(|| trimmed(config.completion.api_key.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MEDCHAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".medchat").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Directory holding the config file ("." when the path has no parent).
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the primer override path, if any. Relative paths are resolved against the config file's parent.
pub fn resolve_primer_path(config: &Config, config_path: &Path) -> Option<PathBuf> {
    match &config.chat.primer_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                Some(p.clone())
            } else {
                Some(config_dir(config_path).join(p))
            }
        }
        _ => None,
    }
}

/// Load config from the given path, or the default path (or MEDCHAT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
