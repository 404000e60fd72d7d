//! Render coordination with at-most-one pipeline per key.
//!
//! `request_pages` answers from the cache when every page of a job is
//! stored. Otherwise it claims the key in the pending set under one lock:
//! the first caller spawns the pipeline, later callers join its waiter list.
//! The claim is released on every exit path, including panics, so a failed
//! render can be retried by the next request.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use mailsnap_core::{BaseKey, PageSize, SnapshotStore};
use serde::Serialize;

use super::notifier::{CompletionNotifier, PageSet, PendingPages};
use super::pipeline::{CapturePipeline, SettleStrategy};
use crate::render::Renderer;

/// Outcome of a page request.
#[derive(Debug)]
pub enum PageRequest {
    /// Every page was already cached.
    Ready(PageSet),
    /// A render is in flight; wait on the handle for its pages.
    Pending(PendingPages),
}

/// Counters for monitoring coordinator effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Total page requests received.
    pub requests: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Requests that joined an in-flight render.
    pub joined: u64,
    /// Pipelines started.
    pub renders_started: u64,
    /// Pipelines that stored every page.
    pub renders_completed: u64,
    /// Pipelines that aborted.
    pub renders_failed: u64,
}

impl CoordinatorStats {
    /// Share of requests that did not start a render (0.0 to 1.0).
    pub fn dedup_ratio(&self) -> f64 {
        if self.requests == 0 { 0.0 } else { (self.cache_hits + self.joined) as f64 / self.requests as f64 }
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    joined: AtomicU64,
    renders_started: AtomicU64,
    renders_completed: AtomicU64,
    renders_failed: AtomicU64,
}

#[derive(Debug, Default)]
struct RenderState {
    pending: HashSet<BaseKey>,
    page_counts: HashMap<BaseKey, u32>,
    completed: HashSet<BaseKey>,
}

enum Claim<R: Renderer> {
    Owner(PendingPages, ClaimGuard<R>),
    Waiting(PendingPages),
    Complete,
}

struct Inner<R: Renderer> {
    renderer: Arc<R>,
    store: SnapshotStore,
    settle: SettleStrategy,
    state: Mutex<RenderState>,
    notifier: CompletionNotifier,
    counters: Counters,
}

impl<R: Renderer> Inner<R> {
    fn state(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Deduplicating front door to the capture pipeline.
///
/// Cheap to clone; clones share the pending, completed and page-count state.
pub struct RenderCoordinator<R: Renderer> {
    inner: Arc<Inner<R>>,
}

impl<R: Renderer> Clone for RenderCoordinator<R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<R: Renderer> RenderCoordinator<R> {
    pub fn new(renderer: Arc<R>, store: SnapshotStore, settle: SettleStrategy) -> Self {
        Self {
            inner: Arc::new(Inner {
                renderer,
                store,
                settle,
                state: Mutex::new(RenderState::default()),
                notifier: CompletionNotifier::new(),
                counters: Counters::default(),
            }),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    /// Request the pages of `html` rendered at `size`.
    ///
    /// Never fails: a render that errors leaves the key uncached and its
    /// waiters resolve to `None`.
    pub async fn request_pages(&self, html: &str, size: PageSize) -> PageRequest {
        self.inner.counters.requests.fetch_add(1, Ordering::Relaxed);
        let key = BaseKey::new(html, size);

        if let Some(pages) = self.cached_pages(&key).await {
            self.inner.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return PageRequest::Ready(pages);
        }

        loop {
            match self.claim(&key) {
                Claim::Waiting(pending) => {
                    self.inner.counters.joined.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "joined in-flight render");
                    return PageRequest::Pending(pending);
                }
                Claim::Owner(pending, guard) => {
                    self.spawn_render(guard, html.to_owned(), size);
                    return PageRequest::Pending(pending);
                }
                Claim::Complete => {
                    // Finished between the cache check and the claim.
                    if let Some(pages) = self.cached_pages(&key).await {
                        self.inner.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                        return PageRequest::Ready(pages);
                    }
                }
            }
        }
    }

    /// Request pages and wait for them.
    pub async fn render_pages(&self, html: &str, size: PageSize) -> Option<PageSet> {
        match self.request_pages(html, size).await {
            PageRequest::Ready(pages) => Some(pages),
            PageRequest::Pending(pending) => pending.wait().await,
        }
    }

    /// Whether every page of `key` is stored.
    pub async fn is_complete(&self, key: &BaseKey) -> bool {
        let Some(count) = self.completed_count(key) else {
            return false;
        };
        for index in 0..count {
            if !self.inner.store.contains(&key.page(index)).await {
                self.invalidate(key);
                return false;
            }
        }
        true
    }

    /// Page count recorded once measurement of `key` finished.
    pub fn page_count(&self, key: &BaseKey) -> Option<u32> {
        self.inner.state().page_counts.get(key).copied()
    }

    /// Whether a render for `key` is in flight.
    pub fn is_pending(&self, key: &BaseKey) -> bool {
        self.inner.state().pending.contains(key)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state().pending.len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let c = &self.inner.counters;
        CoordinatorStats {
            requests: c.requests.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            renders_started: c.renders_started.load(Ordering::Relaxed),
            renders_completed: c.renders_completed.load(Ordering::Relaxed),
            renders_failed: c.renders_failed.load(Ordering::Relaxed),
        }
    }

    fn completed_count(&self, key: &BaseKey) -> Option<u32> {
        let state = self.inner.state();
        if state.completed.contains(key) { state.page_counts.get(key).copied() } else { None }
    }

    /// Load every page of a completed key, invalidating it if any was evicted.
    async fn cached_pages(&self, key: &BaseKey) -> Option<PageSet> {
        let count = self.completed_count(key)?;
        let mut pages = Vec::with_capacity(count as usize);
        for index in 0..count {
            match self.inner.store.get(&key.page(index)).await {
                Some(page) => pages.push(page),
                None => {
                    tracing::debug!(key = %key, index, "cached page evicted, will re-render");
                    self.invalidate(key);
                    return None;
                }
            }
        }
        Some(PageSet::new(key.clone(), pages))
    }

    fn invalidate(&self, key: &BaseKey) {
        let mut state = self.inner.state();
        state.completed.remove(key);
        if !state.pending.contains(key) {
            state.page_counts.remove(key);
        }
    }

    /// Atomically join or claim the render for `key`.
    fn claim(&self, key: &BaseKey) -> Claim<R> {
        let mut state = self.inner.state();
        if state.pending.contains(key) {
            return Claim::Waiting(self.inner.notifier.subscribe(key));
        }
        if state.completed.contains(key) {
            return Claim::Complete;
        }
        state.pending.insert(key.clone());
        let pending = self.inner.notifier.subscribe(key);
        Claim::Owner(pending, ClaimGuard { inner: self.inner.clone(), key: key.clone(), finished: false })
    }

    fn spawn_render(&self, guard: ClaimGuard<R>, html: String, size: PageSize) {
        let inner = self.inner.clone();
        inner.counters.renders_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %guard.key, width = size.width, height = size.height, "starting render");

        tokio::spawn(async move {
            let pipeline = CapturePipeline::new(&*inner.renderer, &inner.store, inner.settle);
            let key = guard.key.clone();
            let result = pipeline
                .run(&html, size, &key, |count| {
                    let capacity = inner.store.max_entries();
                    if count as usize > capacity {
                        tracing::warn!(
                            key = %key,
                            pages = count,
                            capacity,
                            "job has more pages than the cache holds; it will not stay complete"
                        );
                    }
                    inner.state().page_counts.insert(key.clone(), count);
                })
                .await;

            match result {
                Ok(pages) => {
                    inner.counters.renders_completed.fetch_add(1, Ordering::Relaxed);
                    guard.complete(pages);
                }
                Err(e) => {
                    inner.counters.renders_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %e, "render failed");
                }
            }
        });
    }
}

/// Ownership of one pending key. Releases the key when dropped.
struct ClaimGuard<R: Renderer> {
    inner: Arc<Inner<R>>,
    key: BaseKey,
    finished: bool,
}

impl<R: Renderer> ClaimGuard<R> {
    /// Mark the key complete and wake its waiters.
    fn complete(mut self, pages: Vec<bytes::Bytes>) {
        let pages = PageSet::new(self.key.clone(), pages);
        let mut state = self.inner.state();
        state.pending.remove(&self.key);
        state.completed.insert(self.key.clone());
        self.inner.notifier.complete(&pages);
        self.finished = true;
    }
}

impl<R: Renderer> Drop for ClaimGuard<R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.inner.state();
        state.pending.remove(&self.key);
        state.page_counts.remove(&self.key);
        let dropped = self.inner.notifier.abandon(&self.key);
        tracing::debug!(key = %self.key, waiters = dropped, "released failed render");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::testing::{FakeRenderer, open_store};
    use std::time::Duration;

    const SIZE: PageSize = PageSize { width: 360, height: 400 };

    fn coordinator(renderer: FakeRenderer, store: SnapshotStore) -> (Arc<FakeRenderer>, RenderCoordinator<FakeRenderer>) {
        let renderer = Arc::new(renderer);
        let coordinator = RenderCoordinator::new(renderer.clone(), store, SettleStrategy::Fixed(Duration::ZERO));
        (renderer, coordinator)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (_dir, store) = open_store(50).await;
        let (renderer, coordinator) = coordinator(FakeRenderer::new(360.0, 1000.0), store);

        let first = coordinator.render_pages("<p>hi</p>", SIZE).await.unwrap();
        assert_eq!(first.len(), 3);

        match coordinator.request_pages("<p>hi</p>", SIZE).await {
            PageRequest::Ready(pages) => assert_eq!(pages, first),
            PageRequest::Pending(_) => panic!("expected cache hit"),
        }
        assert_eq!(renderer.loads(), 1);
        assert_eq!(coordinator.stats().cache_hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_render_once() {
        let (_dir, store) = open_store(50).await;
        let renderer = FakeRenderer::new(360.0, 900.0).with_delay(Duration::from_millis(50));
        let (renderer, coordinator) = coordinator(renderer, store);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move { coordinator.render_pages("<p>same</p>", SIZE).await }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(renderer.loads(), 1);
        assert!(results.iter().all(|pages| pages == &results[0]));
        assert_eq!(results[0].len(), 3);

        let stats = coordinator.stats();
        assert_eq!(stats.renders_started, 1);
        assert_eq!(stats.requests, 16);
        assert_eq!(stats.joined + stats.cache_hits, 15);
    }

    #[tokio::test]
    async fn test_complete_only_after_all_pages() {
        let (_dir, store) = open_store(50).await;
        let renderer = FakeRenderer::new(360.0, 1000.0).with_delay(Duration::from_millis(20));
        let (_renderer, coordinator) = coordinator(renderer, store);
        let key = BaseKey::new("<p>x</p>", SIZE);

        let PageRequest::Pending(pending) = coordinator.request_pages("<p>x</p>", SIZE).await else {
            panic!("expected pending render");
        };
        assert!(coordinator.is_pending(&key));
        assert!(!coordinator.is_complete(&key).await);

        let pages = pending.wait().await.unwrap();
        assert!(coordinator.is_complete(&key).await);
        assert!(!coordinator.is_pending(&key));
        assert_eq!(coordinator.page_count(&key), Some(pages.len() as u32));
    }

    #[tokio::test]
    async fn test_failure_releases_claim() {
        let (_dir, store) = open_store(50).await;
        let (renderer, coordinator) = coordinator(FakeRenderer::new(360.0, 1000.0).failing_load(), store);
        let key = BaseKey::new("<p>bad</p>", SIZE);

        assert!(coordinator.render_pages("<p>bad</p>", SIZE).await.is_none());
        assert!(!coordinator.is_pending(&key));
        assert!(!coordinator.is_complete(&key).await);
        assert_eq!(coordinator.page_count(&key), None);

        assert!(coordinator.render_pages("<p>bad</p>", SIZE).await.is_none());
        assert_eq!(renderer.loads(), 2);
        assert_eq!(coordinator.stats().renders_failed, 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_not_complete() {
        let (_dir, store) = open_store(50).await;
        let (_renderer, coordinator) =
            coordinator(FakeRenderer::new(360.0, 1000.0).failing_capture_at(2), store.clone());
        let key = BaseKey::new("<p>half</p>", SIZE);

        assert!(coordinator.render_pages("<p>half</p>", SIZE).await.is_none());
        assert!(store.contains(&key.page(0)).await);
        assert!(!coordinator.is_complete(&key).await);
    }

    #[tokio::test]
    async fn test_panicking_render_releases_claim() {
        let (_dir, store) = open_store(50).await;
        let (renderer, coordinator) = coordinator(FakeRenderer::new(360.0, 1000.0).panicking_once(), store);
        let key = BaseKey::new("<p>crash</p>", SIZE);

        let PageRequest::Pending(first) = coordinator.request_pages("<p>crash</p>", SIZE).await else {
            panic!("expected pending render");
        };
        let PageRequest::Pending(joined) = coordinator.request_pages("<p>crash</p>", SIZE).await else {
            panic!("expected to join the render");
        };

        assert!(first.wait().await.is_none());
        assert!(joined.wait().await.is_none());
        assert!(!coordinator.is_pending(&key));
        assert_eq!(coordinator.page_count(&key), None);

        let pages = coordinator.render_pages("<p>crash</p>", SIZE).await.unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(renderer.loads(), 2);
        assert!(coordinator.is_complete(&key).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_each_render_notifies_its_waiters_once() {
        let (_dir, store) = open_store(50).await;
        let renderer = FakeRenderer::new(360.0, 1000.0).with_delay(Duration::from_millis(30));
        let (renderer, coordinator) = coordinator(renderer, store.clone());
        let key = BaseKey::new("<p>again</p>", SIZE);

        for round in 1..=2u64 {
            let mut waiters = Vec::new();
            for _ in 0..3 {
                match coordinator.request_pages("<p>again</p>", SIZE).await {
                    PageRequest::Pending(pending) => waiters.push(pending),
                    PageRequest::Ready(_) => panic!("round {round}: expected a fresh render"),
                }
            }
            assert_eq!(coordinator.inner.notifier.waiter_count(&key), 3);

            for waiter in waiters {
                assert_eq!(waiter.wait().await.unwrap().len(), 3);
            }
            assert_eq!(coordinator.inner.notifier.waiter_count(&key), 0);
            assert_eq!(coordinator.stats().renders_completed, round);

            store.clear().await.unwrap();
            assert!(!coordinator.is_complete(&key).await);
        }

        assert_eq!(renderer.loads(), 2);
        assert_eq!(coordinator.stats().renders_started, 2);
    }

    #[tokio::test]
    async fn test_job_larger_than_cache_still_delivers_pages() {
        let (_dir, store) = open_store(5).await;
        let (_renderer, coordinator) = coordinator(FakeRenderer::new(360.0, 1000.0), store);
        let small = PageSize::new(360, 100);

        let pages = coordinator.render_pages("<p>tall</p>", small).await.unwrap();

        assert_eq!(pages.len(), 10);
        assert_eq!(coordinator.page_count(&BaseKey::new("<p>tall</p>", small)), Some(10));
    }

    #[tokio::test]
    async fn test_evicted_pages_trigger_rerender() {
        let (_dir, store) = open_store(50).await;
        let (renderer, coordinator) = coordinator(FakeRenderer::new(360.0, 1000.0), store.clone());
        let key = BaseKey::new("<p>gone</p>", SIZE);

        coordinator.render_pages("<p>gone</p>", SIZE).await.unwrap();
        store.clear().await.unwrap();
        assert!(!coordinator.is_complete(&key).await);

        let pages = coordinator.render_pages("<p>gone</p>", SIZE).await.unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(renderer.loads(), 2);
    }

    #[tokio::test]
    async fn test_distinct_sizes_are_distinct_jobs() {
        let (_dir, store) = open_store(50).await;
        let (renderer, coordinator) = coordinator(FakeRenderer::new(360.0, 1000.0), store);

        coordinator.render_pages("<p>x</p>", SIZE).await.unwrap();
        coordinator.render_pages("<p>x</p>", PageSize::new(360, 500)).await.unwrap();
        assert_eq!(renderer.loads(), 2);
    }

    #[tokio::test]
    async fn test_dropped_requester_still_fills_cache() {
        let (_dir, store) = open_store(50).await;
        let renderer = FakeRenderer::new(360.0, 400.0).with_delay(Duration::from_millis(10));
        let (_renderer, coordinator) = coordinator(renderer, store);
        let key = BaseKey::new("<p>bye</p>", SIZE);

        drop(coordinator.request_pages("<p>bye</p>", SIZE).await);
        while coordinator.is_pending(&key) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(coordinator.is_complete(&key).await);
    }

    #[test]
    fn test_dedup_ratio() {
        let stats = CoordinatorStats { requests: 4, cache_hits: 1, joined: 2, ..Default::default() };
        assert_eq!(stats.dedup_ratio(), 0.75);
        assert_eq!(CoordinatorStats::default().dedup_ratio(), 0.0);
    }
}
