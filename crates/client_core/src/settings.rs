use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::backend::RetryPolicy;

pub const DEFAULT_SETTINGS_FILE: &str = "skybridge.toml";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
pub const DEFAULT_LEASE_PROMPT: &str = "Analyze the uploaded lease agreements and estimate the ROI of moving the leased infrastructure to the cloud.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub lease_prompt: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            request_timeout_secs: 30,
            max_retries: 2,
            retry_delay_ms: 500,
            lease_prompt: DEFAULT_LEASE_PROMPT.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    lease_prompt: Option<String>,
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn parsed_server_url(&self) -> Result<Url> {
        let url = Url::parse(self.server_url.trim())
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("unsupported server url scheme '{other}' (expected http or https)"),
        }
    }

    fn apply_toml(&mut self, raw: &str) -> Result<()> {
        let file_cfg: FileSettings = toml::from_str(raw).context("invalid settings file")?;
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file_cfg.retry_delay_ms {
            self.retry_delay_ms = v;
        }
        if let Some(v) = file_cfg.lease_prompt {
            self.lease_prompt = v;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SKYBRIDGE_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }

        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_secs = parsed;
            }
        }
        if let Some(v) = lookup("APP__MAX_RETRIES") {
            if let Ok(parsed) = v.parse::<u32>() {
                self.max_retries = parsed;
            }
        }
        if let Some(v) = lookup("APP__RETRY_DELAY_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.retry_delay_ms = parsed;
            }
        }

        if let Some(v) = lookup("APP__LEASE_PROMPT") {
            self.lease_prompt = v;
        }
    }
}

/// Defaults, then the settings file, then environment overrides.
///
/// An explicitly named file must exist; the default `skybridge.toml` is optional.
pub fn load_settings(explicit_path: Option<&Path>) -> Result<ClientSettings> {
    load_settings_with_env(explicit_path, |key| std::env::var(key).ok())
}

pub fn load_settings_with_env<F>(explicit_path: Option<&Path>, lookup: F) -> Result<ClientSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = ClientSettings::default();

    let path = settings_path(explicit_path);
    match fs::read_to_string(&path) {
        Ok(raw) => settings
            .apply_toml(&raw)
            .with_context(|| format!("failed to load settings from '{}'", path.display()))?,
        Err(err) if explicit_path.is_some() => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()));
        }
        Err(_) => {}
    }

    settings.apply_env(lookup);
    settings.parsed_server_url()?;
    Ok(settings)
}

fn settings_path(explicit_path: Option<&Path>) -> PathBuf {
    explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
