//! Test doubles for the snapshot pipeline.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use mailsnap_core::{SnapshotStore, StoreConfig};
use tempfile::TempDir;

use crate::render::{CaptureRect, ContentSize, RenderError, Renderer};

pub(crate) async fn open_store(max_entries: usize) -> (TempDir, SnapshotStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(StoreConfig { dir: dir.path().to_path_buf(), max_entries, memory_entries: 64 }).await;
    (dir, store)
}

/// Renderer that lays out every document at a fixed size and records calls.
pub(crate) struct FakeRenderer {
    content: ContentSize,
    growing: Mutex<VecDeque<f64>>,
    delay: Duration,
    fail_load: bool,
    fail_capture_at: Option<usize>,
    panic_once: AtomicBool,
    loads: AtomicUsize,
    measures: AtomicUsize,
    disposed: AtomicUsize,
    scales: Mutex<Vec<f64>>,
    resizes: Mutex<Vec<(u32, u32)>>,
    captures: Mutex<Vec<CaptureRect>>,
}

impl FakeRenderer {
    pub(crate) fn new(width: f64, height: f64) -> Self {
        Self {
            content: ContentSize::new(width, height),
            growing: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            fail_load: false,
            fail_capture_at: None,
            panic_once: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            measures: AtomicUsize::new(0),
            disposed: AtomicUsize::new(0),
            scales: Mutex::new(Vec::new()),
            resizes: Mutex::new(Vec::new()),
            captures: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long inside `load`, keeping renders in flight.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report these heights from the first measures before the final one.
    pub(crate) fn with_growing_heights(self, heights: &[f64]) -> Self {
        self.growing.lock().unwrap().extend(heights.iter().copied());
        self
    }

    pub(crate) fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub(crate) fn failing_capture_at(mut self, index: usize) -> Self {
        self.fail_capture_at = Some(index);
        self
    }

    /// Panic inside the first `measure` call only.
    pub(crate) fn panicking_once(self) -> Self {
        self.panic_once.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn measures(&self) -> usize {
        self.measures.load(Ordering::SeqCst)
    }

    pub(crate) fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn scales(&self) -> Vec<f64> {
        self.scales.lock().unwrap().clone()
    }

    pub(crate) fn resizes(&self) -> Vec<(u32, u32)> {
        self.resizes.lock().unwrap().clone()
    }

    pub(crate) fn captured_offsets(&self) -> Vec<f64> {
        self.captures.lock().unwrap().iter().map(|r| r.y).collect()
    }
}

#[async_trait::async_trait]
impl Renderer for FakeRenderer {
    type Surface = usize;

    async fn load(&self, _html: &str, _width: u32) -> Result<usize, RenderError> {
        let id = self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_load {
            return Err(RenderError::Load("fake load failure".into()));
        }
        Ok(id)
    }

    async fn measure(&self, _surface: &usize) -> Result<ContentSize, RenderError> {
        self.measures.fetch_add(1, Ordering::SeqCst);
        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("renderer crashed during measure");
        }
        let height = self.growing.lock().unwrap().pop_front().unwrap_or(self.content.height);
        Ok(ContentSize::new(self.content.width, height))
    }

    async fn scale(&self, _surface: &usize, factor: f64) -> Result<f64, RenderError> {
        self.scales.lock().unwrap().push(factor);
        Ok(self.content.height * factor)
    }

    async fn resize(&self, _surface: &usize, width: u32, height: u32) -> Result<(), RenderError> {
        self.resizes.lock().unwrap().push((width, height));
        Ok(())
    }

    async fn capture(&self, surface: &usize, rect: CaptureRect) -> Result<Bytes, RenderError> {
        let mut captures = self.captures.lock().unwrap();
        if self.fail_capture_at == Some(captures.len()) {
            return Err(RenderError::Capture("fake capture failure".into()));
        }
        captures.push(rect);
        Ok(Bytes::from(format!("surface{surface}@{}+{}", rect.y, rect.height)))
    }

    async fn dispose(&self, _surface: usize) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}
