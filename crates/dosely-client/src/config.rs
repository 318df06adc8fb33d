//! # Client Configuration
//!
//! Configuration management for the Dosely client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DOSELY_API_URL=https://api.dosely.app                              │
//! │     DOSELY_PAGE_SIZE=20                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/dosely/config.toml (Linux)                               │
//! │     ~/Library/Application Support/com.dosely.dosely/config.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     http://localhost:3000, 30 s timeout, 10 stocks per page            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # config.toml
//! [api]
//! base_url = "https://api.dosely.app"
//! timeout_secs = 30
//! page_size = 10
//!
//! [session]
//! token_key = "dosely_token"
//! # storage_path = "/home/ana/.local/share/dosely/session.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use dosely_core::{DEFAULT_PAGE_SIZE, DEFAULT_TOKEN_KEY, MAX_PAGE_SIZE};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

/// Where the stock and user service lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the REST service, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Number of stocks requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            page_size: default_page_size(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Where the session token is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Fixed storage key the token is held under.
    #[serde(default = "default_token_key")]
    pub token_key: String,

    /// Session file. Defaults to `session.json` in the platform data dir.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_token_key() -> String {
    DEFAULT_TOKEN_KEY.to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            token_key: default_token_key(),
            storage_path: None,
        }
    }
}

impl SessionSettings {
    /// Resolves the session file, falling back to the platform data dir.
    pub fn resolved_storage_path(&self) -> Option<PathBuf> {
        self.storage_path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "dosely", "dosely")
                .map(|dirs| dirs.data_dir().join("session.json"))
        })
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

impl ClientConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (config.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ClientError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.page_size == 0 || self.api.page_size > MAX_PAGE_SIZE {
            return Err(ClientError::InvalidConfig(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.api.page_size
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.session.token_key.trim().is_empty() {
            return Err(ClientError::InvalidConfig("token_key must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DOSELY_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(timeout) = std::env::var("DOSELY_TIMEOUT_SECS") {
            match timeout.parse::<u64>() {
                Ok(t) => self.api.timeout_secs = t,
                Err(_) => warn!(value = %timeout, "Ignoring non-numeric DOSELY_TIMEOUT_SECS"),
            }
        }

        if let Ok(size) = std::env::var("DOSELY_PAGE_SIZE") {
            match size.parse::<u32>() {
                Ok(s) => {
                    debug!(page_size = s, "Overriding page size from environment");
                    self.api.page_size = s;
                }
                Err(_) => warn!(value = %size, "Ignoring non-numeric DOSELY_PAGE_SIZE"),
            }
        }

        if let Ok(key) = std::env::var("DOSELY_TOKEN_KEY") {
            self.session.token_key = key;
        }

        if let Ok(path) = std::env::var("DOSELY_SESSION_PATH") {
            self.session.storage_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "dosely", "dosely")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Returns the page size.
    pub fn page_size(&self) -> u32 {
        self.api.page_size
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }
}
