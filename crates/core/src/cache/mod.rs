//! Two-tier snapshot cache for rendered HTML pages.
//!
//! This module provides a content-addressed page cache with:
//!
//! - SHA-256 fingerprints of (HTML, width, height)
//! - A bounded in-memory LRU layer
//! - Blob files indexed by a JSON manifest, rewritten on every mutation
//! - LRU eviction bounded by manifest entry count

pub mod hash;
pub mod keys;
pub mod manifest;
pub mod memory;
pub mod store;

pub use crate::Error;

pub use keys::{BaseKey, PageKey, PageSize};
pub use manifest::{CacheEntry, Manifest};
pub use memory::MemoryLayer;
pub use store::{SnapshotStore, StoreConfig};
