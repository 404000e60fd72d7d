//! Two-tier page store: bounded memory layer over manifest-indexed disk blobs.
//!
//! Reads go memory first, then the manifest and blob file. Writes land in
//! memory synchronously and are persisted by a single background writer task
//! that applies blob writes, manifest updates and eviction strictly in
//! submission order. The writer holds the manifest write lock for each
//! operation, so reads never observe a half-applied mutation.
//!
//! Disk failures are logged and otherwise ignored; the memory layer stays
//! authoritative for the life of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc, oneshot};

use super::manifest::{CacheEntry, Manifest};
use super::memory::MemoryLayer;
use super::keys::PageKey;
use crate::Error;

const MANIFEST_FILE: &str = "manifest.json";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding blobs and the manifest.
    pub dir: PathBuf,
    /// Maximum number of manifest entries before LRU eviction.
    pub max_entries: usize,
    /// Maximum number of pages held in the memory layer.
    pub memory_entries: usize,
}

impl StoreConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), max_entries: 50, memory_entries: 64 }
    }
}

enum WriteOp {
    Store { key: PageKey, data: Bytes, generation: u64 },
    Touch(PageKey),
    Purge { max_entries: usize, done: oneshot::Sender<usize> },
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

struct Shared {
    dir: PathBuf,
    manifest_path: PathBuf,
    max_entries: usize,
    memory: MemoryLayer,
    manifest: RwLock<Manifest>,
    /// Pages submitted to the writer but not yet applied.
    staged: Mutex<HashMap<PageKey, (u64, Bytes)>>,
    generation: AtomicU64,
}

/// Handle to the page store. Cheap to clone; all clones share one writer.
#[derive(Clone)]
pub struct SnapshotStore {
    shared: Arc<Shared>,
    writer: mpsc::UnboundedSender<WriteOp>,
}

impl SnapshotStore {
    /// Open the store at `config.dir`.
    ///
    /// Creates the directory if needed, loads the manifest (an unreadable or
    /// corrupt manifest starts an empty cache) and spawns the writer task.
    pub async fn open(config: StoreConfig) -> Self {
        if let Err(e) = tokio::fs::create_dir_all(&config.dir).await {
            tracing::warn!(dir = %config.dir.display(), error = %e, "cache directory unavailable, persistence disabled");
        }

        let manifest_path = config.dir.join(MANIFEST_FILE);
        let manifest = Manifest::load(&manifest_path).await;
        tracing::debug!(entries = manifest.len(), dir = %config.dir.display(), "snapshot store opened");

        let shared = Arc::new(Shared {
            dir: config.dir,
            manifest_path,
            max_entries: config.max_entries,
            memory: MemoryLayer::new(config.memory_entries),
            manifest: RwLock::new(manifest),
            staged: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        });

        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(shared.clone(), rx));

        Self { shared, writer }
    }

    /// Upper bound on persisted pages.
    pub fn max_entries(&self) -> usize {
        self.shared.max_entries
    }

    /// Directory the store persists into.
    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Fetch a page, refreshing its recency.
    ///
    /// Returns `None` if the key is unknown or its blob cannot be read.
    pub async fn get(&self, key: &PageKey) -> Option<Bytes> {
        if let Some(data) = self.shared.memory.get(key).or_else(|| self.staged(key)) {
            self.submit(WriteOp::Touch(key.clone()));
            return Some(data);
        }

        // Promote under the read lock; eviction needs the write lock.
        let data = {
            let manifest = self.shared.manifest.read().await;
            let entry = manifest.find(key)?;
            let path = self.shared.dir.join(&entry.filename);
            let data = match tokio::fs::read(&path).await {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "blob unreadable");
                    return None;
                }
            };
            self.shared.memory.insert(key.clone(), data.clone());
            data
        };

        self.submit(WriteOp::Touch(key.clone()));
        Some(data)
    }

    /// Store a page.
    ///
    /// Visible to `get` immediately; persistence, manifest update and
    /// eviction happen on the writer task without the caller waiting.
    pub fn put(&self, key: PageKey, data: Bytes) {
        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed);
        self.shared.memory.insert(key.clone(), data.clone());
        self.shared
            .staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.clone(), (generation, data.clone()));
        self.submit(WriteOp::Store { key, data, generation });
    }

    /// Whether `key` resolves without loading its blob.
    pub async fn contains(&self, key: &PageKey) -> bool {
        if self.shared.memory.contains(key) || self.staged(key).is_some() {
            return true;
        }
        self.shared.manifest.read().await.find(key).is_some()
    }

    /// Number of persisted entries.
    pub async fn entry_count(&self) -> usize {
        self.shared.manifest.read().await.len()
    }

    /// Snapshot of the manifest, oldest first.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.shared.manifest.read().await.entries().to_vec()
    }

    /// Evict least-recently-touched entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_to(&self, max_entries: usize) -> Result<usize, Error> {
        let (done, rx) = oneshot::channel();
        self.writer
            .send(WriteOp::Purge { max_entries, done })
            .map_err(|_| Error::StoreClosed)?;
        rx.await.map_err(|_| Error::StoreClosed)
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<usize, Error> {
        self.purge_to(0).await
    }

    /// Wait until every write submitted so far has been applied.
    pub async fn flush(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.writer.send(WriteOp::Flush(tx)).map_err(|_| Error::StoreClosed)?;
        rx.await.map_err(|_| Error::StoreClosed)
    }

    /// Flush pending writes and stop the writer task.
    ///
    /// Subsequent `put` calls only reach the memory layer.
    pub async fn close(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.writer.send(WriteOp::Shutdown(tx)).map_err(|_| Error::StoreClosed)?;
        rx.await.map_err(|_| Error::StoreClosed)
    }

    fn staged(&self, key: &PageKey) -> Option<Bytes> {
        let staged = self.shared.staged.lock().unwrap_or_else(|e| e.into_inner());
        staged.get(key).map(|(_, data)| data.clone())
    }

    fn submit(&self, op: WriteOp) {
        if self.writer.send(op).is_err() {
            tracing::debug!("snapshot writer closed, write kept in memory only");
        }
    }
}

async fn run_writer(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Store { key, data, generation } => apply_store(&shared, key, &data, generation).await,
            WriteOp::Touch(key) => {
                let mut manifest = shared.manifest.write().await;
                if manifest.touch(&key) {
                    save_manifest(&shared, &manifest).await;
                }
            }
            WriteOp::Purge { max_entries, done } => {
                let mut manifest = shared.manifest.write().await;
                let removed = manifest.evict_overflow(max_entries);
                let count = removed.len();
                if count > 0 {
                    delete_entries(&shared, removed).await;
                    save_manifest(&shared, &manifest).await;
                }
                let _ = done.send(count);
            }
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
            WriteOp::Shutdown(done) => {
                let _ = done.send(());
                break;
            }
        }
    }
    tracing::debug!("snapshot writer stopped");
}

async fn apply_store(shared: &Shared, key: PageKey, data: &Bytes, generation: u64) {
    let filename = key.filename();
    let path = shared.dir.join(&filename);

    {
        let mut manifest = shared.manifest.write().await;
        match tokio::fs::write(&path, data).await {
            Ok(()) => {
                manifest.upsert(key.clone(), filename);
                let evicted = manifest.evict_overflow(shared.max_entries);
                if !evicted.is_empty() {
                    tracing::debug!(evicted = evicted.len(), "evicted least recently used pages");
                    delete_entries(shared, evicted).await;
                }
                save_manifest(shared, &manifest).await;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to persist page blob");
            }
        }
    }

    let mut staged = shared.staged.lock().unwrap_or_else(|e| e.into_inner());
    if staged.get(&key).is_some_and(|(g, _)| *g == generation) {
        staged.remove(&key);
    }
}

async fn delete_entries(shared: &Shared, entries: Vec<CacheEntry>) {
    for entry in entries {
        let path = shared.dir.join(&entry.filename);
        if let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(file = %entry.filename, error = %e, "failed to delete evicted blob");
        }
        shared.memory.remove(&entry.key);
    }
}

async fn save_manifest(shared: &Shared, manifest: &Manifest) {
    if let Err(e) = manifest.save(&shared.manifest_path).await {
        tracing::warn!(error = %e, "failed to save manifest");
    }
}
