use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::RwLock,
    time::Duration,
};

use crate::messaging::MessagingConfig;

const PLACEHOLDER_HOST: &str = "your-worker-domain";

/// Where the story index and the cart are kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontSettings {
    pub api_base_url: Option<String>,
    pub page_limit: u32,
    pub order_by: String,
    pub order: String,
    pub autoplay_duration_ms: u64,
    pub autoplay: bool,
    pub swipe_threshold: f64,
    pub story_storage_key: Option<String>,
    pub messaging: MessagingConfig,
    pub request_timeout_ms: u64,
    pub storage_backend: StorageBackend,
    pub debug: bool,
}

impl Default for StorefrontSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            page_limit: 10,
            order_by: "datetime".into(),
            order: "desc".into(),
            autoplay_duration_ms: 5_000,
            autoplay: true,
            swipe_threshold: 50.0,
            story_storage_key: Some("story_index".into()),
            messaging: MessagingConfig::default(),
            request_timeout_ms: 15_000,
            storage_backend: StorageBackend::Sqlite,
            debug: false,
        }
    }
}

impl StorefrontSettings {
    /// The catalog base URL, or `None` while it is unset or still the
    /// deployment placeholder.
    pub fn api_base_url(&self) -> Option<&str> {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty() && !url.contains(PLACEHOLDER_HOST))
    }

    pub fn autoplay_duration(&self) -> Duration {
        Duration::from_millis(self.autoplay_duration_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STOREFRONT_API_BASE_URL") {
            self.api_base_url = Some(url);
        }
        if let Some(phone) = lookup("STOREFRONT_WHATSAPP_PHONE") {
            self.messaging.phone_number = phone;
        }
        if let Some(message) = lookup("STOREFRONT_WHATSAPP_DEFAULT_MESSAGE") {
            self.messaging.default_message = message;
        }
        if let Some(flag) = lookup("STOREFRONT_DEBUG") {
            self.debug = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true");
        }
    }
}

/// Settings file plus process environment. The file keeps only what was
/// written to it; overrides are layered on every read.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StorefrontSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Settings file {} is invalid, using defaults: {err}",
                    path.display()
                );
                StorefrontSettings::default()
            })
        } else {
            StorefrontSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Effective settings: file contents with environment overrides applied.
    pub fn settings(&self) -> Result<StorefrontSettings> {
        let mut settings = self
            .data
            .read()
            .map_err(|_| anyhow!("settings lock poisoned"))?
            .clone();
        settings.apply_env_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StorefrontSettings),
    {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        f(&mut guard);
        self.persist(&guard)
    }

    fn persist(&self, data: &StorefrontSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
