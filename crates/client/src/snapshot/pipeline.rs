//! Pagination and capture pipeline.
//!
//! Drives a [`Renderer`] through load → settle → measure → scale → paginate →
//! capture for one claimed key, storing each page as it is captured.
//!
//! ```text
//! load(html, width)
//!   │ settle (fixed delay or stable height)
//!   ▼
//! measure ──► width > target? ──► scale(target / width)
//!   │
//!   ▼
//! page_count = max(1, ceil(final_height / page_height))
//!   │ resize(width, final_height)
//!   ▼
//! capture(page 0) → put, capture(page 1) → put, ...
//! ```

use std::time::Duration;

use bytes::Bytes;
use mailsnap_core::{BaseKey, PageSize, SettleMode, SnapshotStore};

use crate::render::{CaptureRect, ContentSize, RenderError, Renderer};

/// Upper bound on height samples taken by [`SettleStrategy::StableHeight`].
const MAX_SETTLE_SAMPLES: u32 = 20;

/// How the pipeline waits for layout to finish after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStrategy {
    /// Sleep once for a fixed delay.
    Fixed(Duration),
    /// Poll the content height until two consecutive samples agree.
    StableHeight { interval: Duration, max_samples: u32 },
}

impl SettleStrategy {
    pub fn from_mode(mode: SettleMode, delay: Duration) -> Self {
        match mode {
            SettleMode::Fixed => Self::Fixed(delay),
            SettleMode::Stable => Self::StableHeight { interval: delay, max_samples: MAX_SETTLE_SAMPLES },
        }
    }
}

impl Default for SettleStrategy {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(150))
    }
}

/// Result of fitting measured content into the target width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedLayout {
    /// Uniform scale applied, if the content was wider than the target.
    pub scale: Option<f64>,
    /// Content height after scaling.
    pub final_height: f64,
}

/// Scale overflowing content down to `target_width`.
pub fn fit_to_width(measured: ContentSize, target_width: u32) -> FittedLayout {
    let target = f64::from(target_width);
    if measured.width > target {
        let scale = target / measured.width;
        FittedLayout { scale: Some(scale), final_height: measured.height * scale }
    } else {
        FittedLayout { scale: None, final_height: measured.height }
    }
}

/// Number of pages needed for `final_height`; always at least one.
pub fn page_count(final_height: f64, page_height: u32) -> u32 {
    let pages = (final_height / f64::from(page_height)).ceil();
    if pages.is_finite() && pages >= 1.0 { pages as u32 } else { 1 }
}

/// Capture rectangles for every page, top to bottom.
///
/// The last page is clipped to the remaining content; an empty document
/// still yields one rectangle at least a pixel tall.
pub fn page_rects(final_height: f64, width: u32, page_height: u32) -> Vec<CaptureRect> {
    let step = f64::from(page_height);
    (0..page_count(final_height, page_height))
        .map(|index| {
            let y = f64::from(index) * step;
            CaptureRect { x: 0.0, y, width: f64::from(width), height: step.min(final_height - y).max(1.0) }
        })
        .collect()
}

/// Runs the capture steps for one render job.
pub struct CapturePipeline<'a, R: Renderer> {
    renderer: &'a R,
    store: &'a SnapshotStore,
    settle: SettleStrategy,
}

impl<'a, R: Renderer> CapturePipeline<'a, R> {
    pub fn new(renderer: &'a R, store: &'a SnapshotStore, settle: SettleStrategy) -> Self {
        Self { renderer, store, settle }
    }

    /// Render `html` at `size` and store every page under `key`.
    ///
    /// `on_measured` receives the page count as soon as it is known. The
    /// surface is disposed on every exit path. Pages stored before a failure
    /// stay in the cache.
    pub async fn run(
        &self, html: &str, size: PageSize, key: &BaseKey, on_measured: impl FnOnce(u32) + Send,
    ) -> Result<Vec<Bytes>, RenderError> {
        let surface = self.renderer.load(html, size.width).await?;
        let result = self.paginate(&surface, size, key, on_measured).await;
        self.renderer.dispose(surface).await;
        result
    }

    async fn paginate(
        &self, surface: &R::Surface, size: PageSize, key: &BaseKey, on_measured: impl FnOnce(u32) + Send,
    ) -> Result<Vec<Bytes>, RenderError> {
        self.settle(surface).await?;

        let measured = self.renderer.measure(surface).await?;
        let layout = fit_to_width(measured, size.width);
        if let Some(scale) = layout.scale {
            let reported = self.renderer.scale(surface, scale).await?;
            tracing::debug!(key = %key, scale, reported, final_height = layout.final_height, "scaled wide content");
        }

        let rects = page_rects(layout.final_height, size.width, size.height);
        let count = rects.len() as u32;
        on_measured(count);

        let surface_height = layout.final_height.ceil().max(1.0) as u32;
        self.renderer.resize(surface, size.width, surface_height).await?;

        let mut pages = Vec::with_capacity(rects.len());
        for (index, rect) in (0u32..).zip(rects) {
            let image = self.renderer.capture(surface, rect).await?;
            self.store.put(key.page(index), image.clone());
            pages.push(image);
        }

        tracing::debug!(key = %key, pages = count, height = layout.final_height, "captured all pages");
        Ok(pages)
    }

    async fn settle(&self, surface: &R::Surface) -> Result<(), RenderError> {
        match self.settle {
            SettleStrategy::Fixed(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            SettleStrategy::StableHeight { interval, max_samples } => {
                let mut last = self.renderer.measure(surface).await?.height;
                for _ in 1..max_samples {
                    tokio::time::sleep(interval).await;
                    let height = self.renderer.measure(surface).await?.height;
                    if height == last {
                        return Ok(());
                    }
                    last = height;
                }
                tracing::debug!(samples = max_samples, "content height never settled");
                Ok(())
            }
        }
    }
}
