//! Durable index of cached page blobs.
//!
//! The manifest is a JSON array of `{key, timestamp, filename}` records kept
//! in recency order (oldest first). It is rewritten in full on every mutation
//! and loaded once when the store opens.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::keys::PageKey;
use crate::Error;

/// One persisted page record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: PageKey,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
}

/// Ordered collection of [`CacheEntry`] records, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<CacheEntry>,
    last_issued: Option<DateTime<Utc>>,
}

impl Manifest {
    /// Load a manifest from disk.
    ///
    /// A missing, unreadable or corrupt file yields an empty manifest.
    pub async fn load(path: &Path) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest unreadable, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_slice::<Vec<CacheEntry>>(&bytes) {
            Ok(entries) => Self::from_entries(entries),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest corrupt, starting empty");
                Self::default()
            }
        }
    }

    /// Build a manifest from raw entries, restoring recency order.
    pub fn from_entries(mut entries: Vec<CacheEntry>) -> Self {
        entries.sort_by_key(|e| e.timestamp);
        let last_issued = entries.last().map(|e| e.timestamp);
        Self { entries, last_issued }
    }

    /// Rewrite the manifest file in full.
    ///
    /// Writes to a sibling temp file and renames it over the target.
    pub async fn save(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_vec(&self.entries)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn find(&self, key: &PageKey) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    /// Replace or append the entry for `key`, stamping it as newest.
    pub fn upsert(&mut self, key: PageKey, filename: String) -> &CacheEntry {
        self.entries.retain(|e| e.key != key);
        let timestamp = self.next_timestamp();
        self.entries.push(CacheEntry { key, timestamp, filename });
        &self.entries[self.entries.len() - 1]
    }

    /// Refresh the recency of `key`. Returns false if the key is unknown.
    pub fn touch(&mut self, key: &PageKey) -> bool {
        let Some(pos) = self.entries.iter().position(|e| &e.key == key) else {
            return false;
        };
        let mut entry = self.entries.remove(pos);
        entry.timestamp = self.next_timestamp();
        self.entries.push(entry);
        true
    }

    /// Drop least-recently-touched entries until at most `max_entries` remain.
    ///
    /// Returns the removed entries, oldest first.
    pub fn evict_overflow(&mut self, max_entries: usize) -> Vec<CacheEntry> {
        self.entries.sort_by_key(|e| e.timestamp);
        let overflow = self.entries.len().saturating_sub(max_entries);
        self.entries.drain(..overflow).collect()
    }

    /// Hand out a timestamp strictly later than any previously issued one.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_issued {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_issued = Some(stamp);
        stamp
    }
}
