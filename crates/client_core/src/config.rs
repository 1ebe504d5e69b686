use std::{collections::HashMap, fs, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub event_capacity: usize,
    pub member_icon_size: u32,
    pub member_icon_gap: u32,
    pub screen_padding: u32,
    pub category_page_size: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            event_capacity: 1024,
            member_icon_size: 40,
            member_icon_gap: 10,
            screen_padding: 40,
            category_page_size: 3,
        }
    }
}

impl ClientSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Trimmed base url without a trailing slash.
    pub fn normalized_base_url(&self) -> anyhow::Result<String> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("base url must not be empty");
        }
        let parsed =
            Url::parse(trimmed).with_context(|| format!("invalid base url '{trimmed}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported base url scheme '{}'", parsed.scheme());
        }
        Ok(trimmed.to_string())
    }
}

pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_overrides(settings: &mut ClientSettings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        tracing::warn!("config: ignoring malformed {SETTINGS_FILE}");
        return;
    };
    for (key, value) in &file_cfg {
        apply_override(settings, key, value);
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    for (env_key, key) in [
        ("APP__BASE_URL", "base_url"),
        ("APP__REQUEST_TIMEOUT_MS", "request_timeout_ms"),
        ("APP__EVENT_CAPACITY", "event_capacity"),
        ("APP__MEMBER_ICON_SIZE", "member_icon_size"),
        ("APP__MEMBER_ICON_GAP", "member_icon_gap"),
        ("APP__SCREEN_PADDING", "screen_padding"),
        ("APP__CATEGORY_PAGE_SIZE", "category_page_size"),
    ] {
        if let Some(value) = lookup(env_key) {
            apply_override(settings, key, &value);
        }
    }
}

fn apply_override(settings: &mut ClientSettings, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "base_url" => settings.base_url = value.to_string(),
        "request_timeout_ms" => {
            // A zero timeout would fail every request.
            if value.parse::<u64>().is_ok_and(|ms| ms > 0) {
                set_parsed(&mut settings.request_timeout_ms, value);
            }
        }
        "event_capacity" => set_parsed(&mut settings.event_capacity, value),
        "member_icon_size" => set_parsed(&mut settings.member_icon_size, value),
        "member_icon_gap" => set_parsed(&mut settings.member_icon_gap, value),
        "screen_padding" => set_parsed(&mut settings.screen_padding, value),
        "category_page_size" => set_parsed(&mut settings.category_page_size, value),
        other => tracing::debug!(key = other, "config: unknown setting ignored"),
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) {
    if let Ok(parsed) = value.parse::<T>() {
        *slot = parsed;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
