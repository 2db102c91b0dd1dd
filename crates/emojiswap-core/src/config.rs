//! # Configuration
//!
//! Settings for the service endpoint, adjustment behavior and local storage.
//!
//! ## Sources (in priority order)
//!
//! 1. Environment variables (`EMOJISWAP_*` prefix)
//! 2. Explicit config file (`--config`)
//! 3. Global config (`~/.config/emojiswap/config.toml`)
//! 4. Default values
//!
//! ## Example
//!
//! ```ignore
//! let config = AppConfig::load()?;
//! let api = config.http_client();
//! let session = ProcessingSession::new(Arc::new(api), config.result_cache(), config.session_options());
//! ```

use crate::cache::ResultCache;
use crate::gallery::Gallery;
use crate::session::SessionOptions;
use crate::{CoreError, Result};
use emojiswap_client::http::{DEFAULT_BASE_URL, DETECT_PATH, PROCESS_PATH};
use emojiswap_client::{Endpoints, HttpClient};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Service endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_detect_path")]
    pub detect_path: String,

    #[serde(default = "default_process_path")]
    pub process_path: String,

    /// Per-request deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_detect_path() -> String {
    DETECT_PATH.to_string()
}

fn default_process_path() -> String {
    PROCESS_PATH.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            detect_path: default_detect_path(),
            process_path: default_process_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Slider handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustConfig {
    /// Quiet period before a slider change is sent
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Process with the current config as soon as faces are found
    #[serde(default)]
    pub auto_process: bool,
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            auto_process: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "ResultCache::default_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "Gallery::default_dir")]
    pub gallery_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: ResultCache::default_dir(),
            gallery_dir: Gallery::default_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub adjust: AdjustConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path this config was loaded from
    #[serde(skip)]
    loaded_from: Option<PathBuf>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the global config file (if any), then apply the environment
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`load`](Self::load), but an explicit file replaces the global one
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::global_config_path() {
                Some(global) if global.exists() => {
                    debug!("Loading global config from {:?}", global);
                    Self::load_from_file(&global)?
                }
                _ => Self::default(),
            },
        };

        config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.loaded_from = Some(path.to_path_buf());
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    /// Apply `EMOJISWAP_*` environment variable overrides
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("EMOJISWAP_BASE_URL") {
            self.api.base_url = url;
        }

        if let Some(timeout) = lookup("EMOJISWAP_TIMEOUT_MS") {
            if let Ok(parsed) = timeout.parse() {
                self.api.timeout_ms = parsed;
            }
        }

        if let Some(debounce) = lookup("EMOJISWAP_DEBOUNCE_MS") {
            if let Ok(parsed) = debounce.parse() {
                self.adjust.debounce_ms = parsed;
            }
        }

        if let Some(auto) = lookup("EMOJISWAP_AUTO_PROCESS") {
            self.adjust.auto_process = auto == "1" || auto.to_lowercase() == "true";
        }

        if let Some(dir) = lookup("EMOJISWAP_CACHE_DIR") {
            self.storage.cache_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("EMOJISWAP_GALLERY_DIR") {
            self.storage.gallery_dir = PathBuf::from(dir);
        }

        self
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, content)?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("emojiswap").join("config.toml"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.adjust.debounce_ms)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            detect: self.api.detect_path.clone(),
            process: self.api.process_path.clone(),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            auto_process: self.adjust.auto_process,
        }
    }

    pub fn result_cache(&self) -> ResultCache {
        ResultCache::new(&self.storage.cache_dir)
    }

    /// HTTP client for the configured service
    pub fn http_client(&self) -> HttpClient {
        HttpClient::new(self.api.base_url.trim())
            .with_timeout(self.timeout())
            .with_endpoints(self.endpoints())
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            return Err(CoreError::InvalidConfig("Base URL must not be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CoreError::InvalidConfig(format!(
                "Base URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        for (name, path) in [
            ("detect_path", &self.api.detect_path),
            ("process_path", &self.api.process_path),
        ] {
            if !path.starts_with('/') {
                return Err(CoreError::InvalidConfig(format!(
                    "{} must start with '/', got '{}'",
                    name, path
                )));
            }
        }

        if self.api.timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration builder for programmatic configuration
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.api.timeout_ms = ms;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.adjust.debounce_ms = ms;
        self
    }

    pub fn auto_process(mut self, enabled: bool) -> Self {
        self.config.adjust.auto_process = enabled;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.cache_dir = dir.into();
        self
    }

    pub fn gallery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.gallery_dir = dir.into();
        self
    }

    pub fn build(self) -> Result<AppConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
