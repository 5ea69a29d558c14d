use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::feed::{DEFAULT_ALBUM_MEDIA_PAGE_SIZE, DEFAULT_PAGE_SIZE};

pub const DEFAULT_SETTINGS_FILE: &str = "gallery.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub page_size: u32,
    pub album_page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            page_size: DEFAULT_PAGE_SIZE,
            album_page_size: DEFAULT_ALBUM_MEDIA_PAGE_SIZE,
            request_timeout_secs: 30,
        }
    }
}

/// Keys accepted in `gallery.toml`; anything missing keeps its default.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    page_size: Option<u32>,
    album_page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn base_url(&self) -> anyhow::Result<Url> {
        Url::parse(self.base_url.trim())
            .with_context(|| format!("invalid gallery base url '{}'", self.base_url))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if let Some(v) = file.page_size {
            self.page_size = v;
        }
        if let Some(v) = file.album_page_size {
            self.album_page_size = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
    }

    /// Applies `GALLERY_BASE_URL` and `APP__*` overrides; `APP__` wins.
    /// Unparseable numbers are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GALLERY_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("APP__BASE_URL") {
            self.base_url = v;
        }

        if let Some(v) = lookup("APP__PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.page_size = v;
        }
        if let Some(v) = lookup("APP__ALBUM_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.album_page_size = v;
        }
        if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = v;
        }
    }
}

/// Defaults, then `gallery.toml` in the working directory, then environment.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        settings.apply_file(file);
    }

    settings.apply_env(lookup);
    settings.base_url().context("settings rejected")?;
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
