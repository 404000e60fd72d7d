//! Snapshot rendering: capture pipeline, render deduplication and prewarm.

pub mod coordinator;
pub mod notifier;
pub mod pipeline;
pub mod prewarm;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{CoordinatorStats, PageRequest, RenderCoordinator};
pub use notifier::{CompletionNotifier, PageSet, PendingPages};
pub use pipeline::{CapturePipeline, FittedLayout, SettleStrategy, fit_to_width, page_count, page_rects};
pub use prewarm::{DEFAULT_PREWARM_CAP, PrewarmReport, PrewarmScheduler};
