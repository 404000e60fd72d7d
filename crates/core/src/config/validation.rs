//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MAX_PAGE_DIMENSION, SettleMode};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_entries` is 0
    /// - `page_width` or `page_height` is 0 or exceeds 10000px
    /// - `settle_delay_ms` exceeds 10 seconds
    /// - `render_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `prewarm_cap` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid { field: "max_entries".into(), reason: "must be greater than 0".into() });
        }

        for (field, value) in [("page_width", self.page_width), ("page_height", self.page_height)] {
            if value == 0 {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must be greater than 0".into() });
            }
            if value > MAX_PAGE_DIMENSION {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: format!("must not exceed {MAX_PAGE_DIMENSION}px"),
                });
            }
        }

        if self.settle_delay_ms > 10_000 {
            return Err(ConfigError::Invalid {
                field: "settle_delay_ms".into(),
                reason: "must not exceed 10 seconds (10000ms)".into(),
            });
        }

        if self.render_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.render_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.prewarm_cap == 0 {
            return Err(ConfigError::Invalid { field: "prewarm_cap".into(), reason: "must be greater than 0".into() });
        }

        if self.settle_mode == SettleMode::Stable && self.settle_delay_ms == 0 {
            tracing::warn!("settle_mode=stable with settle_delay_ms=0 samples height back to back");
        }

        if self.memory_entries > self.max_entries.saturating_mul(4) {
            tracing::warn!(
                memory_entries = self.memory_entries,
                max_entries = self.max_entries,
                "memory layer is much larger than the disk bound; evicted pages also leave memory"
            );
        }

        Ok(())
    }
}
