//! Renderer contract for laying out HTML and rasterizing page regions.
//!
//! Any engine that can lay out HTML/CSS at a fixed width and capture a
//! sub-rectangle as PNG satisfies [`Renderer`]. The headless Chromium
//! implementation lives behind the `render` feature.

pub mod document;
#[cfg(feature = "render")]
pub mod headless;

use bytes::Bytes;
use thiserror::Error;

pub use document::wrap_document;
#[cfg(feature = "render")]
pub use headless::{HeadlessRenderer, HeadlessSurface};

/// Errors that can occur while driving a renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to load the document.
    #[error("load failed: {0}")]
    Load(String),

    /// Failed to read the laid-out content size.
    #[error("measure failed: {0}")]
    Measure(String),

    /// Failed to apply a scale or resize to the surface.
    #[error("layout update failed: {0}")]
    Layout(String),

    /// Failed to rasterize a region.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Renderer call did not finish in time.
    #[error("render timeout after {0}ms")]
    Timeout(u64),
}

/// Laid-out content size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentSize {
    pub width: f64,
    pub height: f64,
}

impl ContentSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Region of the surface to rasterize, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Renderer trait for laying out HTML and capturing raster regions.
///
/// A surface is created by [`Renderer::load`] and must be handed back to
/// [`Renderer::dispose`] once the caller is done with it.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Per-document rendering surface.
    type Surface: Send + Sync;

    /// Lay out `html` at `width` with unconstrained height.
    async fn load(&self, html: &str, width: u32) -> Result<Self::Surface, RenderError>;

    /// Actual rendered content size.
    async fn measure(&self, surface: &Self::Surface) -> Result<ContentSize, RenderError>;

    /// Apply a uniform scale transform, returning the new content height.
    async fn scale(&self, surface: &Self::Surface, factor: f64) -> Result<f64, RenderError>;

    /// Resize the surface viewport.
    async fn resize(&self, surface: &Self::Surface, width: u32, height: u32) -> Result<(), RenderError>;

    /// Rasterize `rect` to PNG bytes.
    async fn capture(&self, surface: &Self::Surface, rect: CaptureRect) -> Result<Bytes, RenderError>;

    /// Release the surface.
    async fn dispose(&self, surface: Self::Surface);
}
