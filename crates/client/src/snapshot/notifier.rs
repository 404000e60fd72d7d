//! Per-key completion fan-out.
//!
//! Callers waiting on a render register a one-shot receiver under the key.
//! When the render finishes every registered waiter receives the same
//! [`PageSet`] exactly once; waiters on other keys are never woken.
//!
//! ```text
//! request A ─┐
//! request B ─┼──► waiters[key] = [tx_a, tx_b, tx_c]
//! request C ─┘              │
//!                 complete(pages) ──► tx_a, tx_b, tx_c each send once
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mailsnap_core::BaseKey;
use tokio::sync::oneshot;

/// The ordered page images of one completed render.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    pub key: BaseKey,
    pub pages: Arc<[Bytes]>,
}

impl PageSet {
    pub fn new(key: BaseKey, pages: Vec<Bytes>) -> Self {
        Self { key, pages: pages.into() }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Handle to a render that has not finished yet.
///
/// Dropping it simply stops listening; the render still fills the cache.
#[derive(Debug)]
pub struct PendingPages {
    rx: oneshot::Receiver<PageSet>,
}

impl PendingPages {
    /// Wait for the render to finish.
    ///
    /// Returns `None` if the render failed.
    pub async fn wait(self) -> Option<PageSet> {
        self.rx.await.ok()
    }
}

/// Waiter lists keyed by render job.
#[derive(Debug, Default)]
pub struct CompletionNotifier {
    waiters: Mutex<HashMap<BaseKey, Vec<oneshot::Sender<PageSet>>>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `key`.
    pub fn subscribe(&self, key: &BaseKey) -> PendingPages {
        let (tx, rx) = oneshot::channel();
        self.lock().entry(key.clone()).or_default().push(tx);
        PendingPages { rx }
    }

    /// Deliver `pages` to every waiter registered for its key.
    ///
    /// Returns the number of waiters that were still listening.
    pub fn complete(&self, pages: &PageSet) -> usize {
        let waiters = self.lock().remove(&pages.key).unwrap_or_default();
        let delivered = waiters.into_iter().filter_map(|tx| tx.send(pages.clone()).ok()).count();
        if delivered > 0 {
            tracing::debug!(key = %pages.key, waiters = delivered, "delivered pages to waiters");
        }
        delivered
    }

    /// Drop every waiter for `key`; their `wait` resolves to `None`.
    pub fn abandon(&self, key: &BaseKey) -> usize {
        self.lock().remove(key).map_or(0, |waiters| waiters.len())
    }

    /// Number of waiters registered for `key`.
    pub fn waiter_count(&self, key: &BaseKey) -> usize {
        self.lock().get(key).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BaseKey, Vec<oneshot::Sender<PageSet>>>> {
        self.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }
}
