//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MAILSNAP_*)
//! 2. TOML config file (if MAILSNAP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::{PageSize, StoreConfig};

mod validation;

pub use validation::ConfigError;

/// Largest page width or height accepted, in CSS pixels.
pub const MAX_PAGE_DIMENSION: u32 = 10_000;

/// How the pipeline decides layout has settled after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SettleMode {
    /// Sleep for `settle_delay_ms` once.
    Fixed,
    /// Sample the content height every `settle_delay_ms` until two samples agree.
    Stable,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MAILSNAP_*)
/// 2. TOML config file (if MAILSNAP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding page blobs and the manifest.
    ///
    /// Set via MAILSNAP_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum number of persisted pages before LRU eviction.
    ///
    /// Set via MAILSNAP_MAX_ENTRIES environment variable.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum number of pages kept in memory. Zero disables the memory layer.
    ///
    /// Set via MAILSNAP_MEMORY_ENTRIES environment variable.
    #[serde(default = "default_memory_entries")]
    pub memory_entries: usize,

    /// Default render width in CSS pixels.
    ///
    /// Set via MAILSNAP_PAGE_WIDTH environment variable.
    #[serde(default = "default_page_width")]
    pub page_width: u32,

    /// Default page height in CSS pixels.
    ///
    /// Set via MAILSNAP_PAGE_HEIGHT environment variable.
    #[serde(default = "default_page_height")]
    pub page_height: u32,

    /// Settle delay after loading, in milliseconds.
    ///
    /// Set via MAILSNAP_SETTLE_DELAY_MS environment variable.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Settle strategy: "fixed" or "stable".
    ///
    /// Set via MAILSNAP_SETTLE_MODE environment variable.
    #[serde(default = "default_settle_mode")]
    pub settle_mode: SettleMode,

    /// Upper bound for each renderer call, in milliseconds.
    ///
    /// Set via MAILSNAP_RENDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Default number of candidates considered by a prewarm pass.
    ///
    /// Set via MAILSNAP_PREWARM_CAP environment variable.
    #[serde(default = "default_prewarm_cap")]
    pub prewarm_cap: usize,

    /// Whether the headless browser is launched.
    ///
    /// Set via MAILSNAP_RENDER_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub render_enabled: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./html-snapshots")
}

fn default_max_entries() -> usize {
    50
}

fn default_memory_entries() -> usize {
    64
}

fn default_page_width() -> u32 {
    360
}

fn default_page_height() -> u32 {
    400
}

fn default_settle_delay_ms() -> u64 {
    150
}

fn default_settle_mode() -> SettleMode {
    SettleMode::Fixed
}

fn default_render_timeout_ms() -> u64 {
    20_000
}

fn default_prewarm_cap() -> usize {
    20
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_entries: default_max_entries(),
            memory_entries: default_memory_entries(),
            page_width: default_page_width(),
            page_height: default_page_height(),
            settle_delay_ms: default_settle_delay_ms(),
            settle_mode: default_settle_mode(),
            render_timeout_ms: default_render_timeout_ms(),
            prewarm_cap: default_prewarm_cap(),
            render_enabled: true,
        }
    }
}

impl AppConfig {
    /// Settle delay as Duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Renderer call timeout as Duration.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Default target size for render requests.
    pub fn page_size(&self) -> PageSize {
        PageSize::new(self.page_width, self.page_height)
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            dir: self.cache_dir.clone(),
            max_entries: self.max_entries,
            memory_entries: self.memory_entries,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MAILSNAP_`
    /// 2. TOML file from `MAILSNAP_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MAILSNAP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MAILSNAP_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
