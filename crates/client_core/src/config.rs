use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{ClientError, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "booster.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSettings {
    pub server_url: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub download_dir: PathBuf,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            api_token: None,
            request_timeout_secs: 30,
            poll_interval_secs: 10,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Loads `booster.toml` from the working directory when present, then applies
/// environment overrides.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    if let Ok(raw) = fs::read_to_string(DEFAULT_SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Same as [`load_settings`] but the file is mandatory.
pub fn load_settings_from(path: &Path) -> Result<ClientSettings> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ClientError::Config(format!("failed to read '{}': {err}", path.display()))
    })?;
    let mut settings = ClientSettings::default();
    apply_file(&mut settings, &raw);
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("api_token").and_then(toml::Value::as_str) {
        settings.api_token = Some(v.to_string());
    }
    if let Some(v) = file_cfg
        .get("request_timeout_secs")
        .and_then(toml::Value::as_integer)
    {
        settings.request_timeout_secs = v.max(0) as u64;
    }
    if let Some(v) = file_cfg
        .get("poll_interval_secs")
        .and_then(toml::Value::as_integer)
    {
        settings.poll_interval_secs = v.max(0) as u64;
    }
    if let Some(v) = file_cfg.get("download_dir").and_then(toml::Value::as_str) {
        settings.download_dir = PathBuf::from(v);
    }
}

fn apply_env(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| var(&format!("APP__{name}")).or_else(|| var(&format!("BOOSTER_{name}")));

    if let Some(v) = lookup("SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("API_TOKEN") {
        settings.api_token = Some(v).filter(|token| !token.trim().is_empty());
    }
    if let Some(v) = lookup("TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("POLL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.poll_interval_secs = parsed;
        }
    }
    if let Some(v) = lookup("DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }
}

/// Trims whitespace and trailing slashes and defaults the scheme to `http`.
pub fn normalize_server_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.is_empty() {
        return ClientSettings::default().server_url;
    }
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}
