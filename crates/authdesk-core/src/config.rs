//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! the AuthBackend URL, the Google OAuth client, the token storage backend
//! and the demo-mode switch.
//!
//! Configuration is stored at `~/.config/authdesk/config.json`. A few fields
//! can be overridden from the environment (or a `.env` file loaded by the
//! binary), see `Config::apply_env`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "authdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// OAuth client the sign-in page was registered with
pub const DEFAULT_GOOGLE_CLIENT_ID: &str =
    "176867064739-b9uq3gmpq12tsf72jfqugr4s72rhp5qp.apps.googleusercontent.com";

pub const DEFAULT_DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where session tokens are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub google_client_id: String,
    pub google_client_secret: Option<String>,
    pub device_code_url: String,
    pub token_url: String,
    pub storage: StorageBackend,
    /// Adopt a placeholder session when the backend cannot be reached.
    /// Only meant for exercising the UI without a running backend.
    pub demo_mode: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            google_client_id: DEFAULT_GOOGLE_CLIENT_ID.to_string(),
            google_client_secret: None,
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            storage: StorageBackend::default(),
            demo_mode: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `AUTHDESK_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("AUTHDESK_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(id) = var("AUTHDESK_GOOGLE_CLIENT_ID") {
            self.google_client_id = id;
        }
        if let Some(secret) = var("AUTHDESK_GOOGLE_CLIENT_SECRET") {
            self.google_client_secret = Some(secret);
        }
        if let Some(flag) = var("AUTHDESK_DEMO_MODE") {
            self.demo_mode = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-user cache directory for stored tokens and logs.
    /// Independent of the config file so logging can start before loading it.
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
