//! Client code for mailsnap.
//!
//! This crate turns HTML message bodies into cached page images: the
//! [`render`] module abstracts the layout engine and [`snapshot`] drives it,
//! deduplicating concurrent renders and warming the cache in the background.

pub mod render;
pub mod snapshot;

pub use render::{CaptureRect, ContentSize, RenderError, Renderer, wrap_document};
#[cfg(feature = "render")]
pub use render::{HeadlessRenderer, HeadlessSurface};

pub use snapshot::{
    CoordinatorStats, PageRequest, PageSet, PendingPages, PrewarmReport, PrewarmScheduler, RenderCoordinator,
    SettleStrategy,
};
