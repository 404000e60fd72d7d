//! Core types and shared functionality for mailsnap.
//!
//! This crate provides:
//! - Content-addressed snapshot keys
//! - Two-tier page cache (bounded memory layer + manifest-indexed disk blobs)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BaseKey, CacheEntry, Manifest, PageKey, PageSize, SnapshotStore, StoreConfig};
pub use config::{AppConfig, ConfigError, MAX_PAGE_DIMENSION, SettleMode};
pub use error::Error;
