//! Background cache warming for messages likely to be opened next.
//!
//! Prewarming goes through the same coordinator as foreground requests, so a
//! body that is already rendering is joined rather than rendered twice.
//! Candidates are processed one at a time and the task yields between them,
//! leaving the runtime to foreground work.

use mailsnap_core::{BaseKey, PageSize};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::coordinator::RenderCoordinator;
use crate::render::Renderer;

/// Default number of candidates warmed per request.
pub const DEFAULT_PREWARM_CAP: usize = 20;

/// Outcome of one prewarm pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrewarmReport {
    /// Candidates inside the cap.
    pub considered: usize,
    /// Candidates with an empty body.
    pub skipped_empty: usize,
    /// Candidates whose pages were all cached already.
    pub already_cached: usize,
    /// Candidates rendered, or joined while another caller rendered them.
    pub rendered: usize,
    /// Candidates whose render failed.
    pub failed: usize,
}

/// Warms the snapshot cache ahead of use.
pub struct PrewarmScheduler<R: Renderer> {
    coordinator: RenderCoordinator<R>,
}

impl<R: Renderer> PrewarmScheduler<R> {
    pub fn new(coordinator: RenderCoordinator<R>) -> Self {
        Self { coordinator }
    }

    /// Warm the first `cap` candidates at `size` on a background task.
    ///
    /// Returns immediately; await the handle for the report.
    pub fn request_prewarm(&self, candidates: Vec<String>, size: PageSize, cap: usize) -> JoinHandle<PrewarmReport> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move { warm(&coordinator, candidates, size, cap).await })
    }
}

async fn warm<R: Renderer>(
    coordinator: &RenderCoordinator<R>, candidates: Vec<String>, size: PageSize, cap: usize,
) -> PrewarmReport {
    let mut report = PrewarmReport::default();

    for html in candidates.into_iter().take(cap) {
        report.considered += 1;
        if html.trim().is_empty() {
            report.skipped_empty += 1;
            continue;
        }
        if coordinator.is_complete(&BaseKey::new(&html, size)).await {
            report.already_cached += 1;
            continue;
        }

        match coordinator.render_pages(&html, size).await {
            Some(_) => report.rendered += 1,
            None => report.failed += 1,
        }
        tokio::task::yield_now().await;
    }

    tracing::info!(
        considered = report.considered,
        skipped_empty = report.skipped_empty,
        already_cached = report.already_cached,
        rendered = report.rendered,
        failed = report.failed,
        "prewarm finished"
    );
    report
}
