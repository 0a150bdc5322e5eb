use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::DEFAULT_NOTIFICATION_CAPACITY;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "multiroom.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub poll_interval_secs: u64,
    /// `0` disables the per-request timeout.
    pub request_timeout_secs: u64,
    pub notification_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".into(),
            poll_interval_secs: 30,
            request_timeout_secs: 10,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// File, then environment. An explicit `--config` path must exist; the implicit
/// lookup silently falls back to defaults.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = match explicit {
        Some(path) => read_settings_file(path)?,
        None => match default_config_path() {
            Some(path) => read_settings_file(&path)?,
            None => ClientSettings::default(),
        },
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("multiroom").join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

fn read_settings_file(path: &Path) -> anyhow::Result<ClientSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_settings(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

fn parse_settings(raw: &str) -> anyhow::Result<ClientSettings> {
    Ok(toml::from_str(raw)?)
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("MULTIROOM_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(parsed) = var("APP__POLL_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_secs = parsed;
    }
    if let Some(parsed) = var("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = parsed;
    }
    if let Some(parsed) = var("APP__NOTIFICATION_CAPACITY").and_then(|v| v.parse().ok()) {
        settings.notification_capacity = parsed;
    }
}
