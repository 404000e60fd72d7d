//! Headless Chrome/Chromium renderer using chromiumoxide.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::page::{Page, ScreenshotParams};

use super::{CaptureRect, ContentSize, RenderError, Renderer, wrap_document};

const MEASURE_SCRIPT: &str = "[document.documentElement.scrollWidth, document.documentElement.scrollHeight]";

/// Headless Chrome/Chromium renderer.
///
/// One browser process is shared by every surface; each surface is a tab.
pub struct HeadlessRenderer {
    browser: Browser,
    timeout: Duration,
}

/// A loaded document in its own browser tab.
pub struct HeadlessSurface {
    page: Page,
}

impl HeadlessRenderer {
    /// Create a new headless renderer by launching a browser instance.
    ///
    /// The browser uses a background task to handle Chrome DevTools Protocol
    /// events. Every renderer call is bounded by `timeout`.
    pub async fn new(timeout: Duration) -> Result<Self, RenderError> {
        use futures_util::StreamExt;

        let (browser, mut handler) = Browser::launch(BrowserConfig::builder().build().map_err(RenderError::BrowserLaunch)?)
            .await
            .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser, timeout })
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, RenderError>> + Send) -> Result<T, RenderError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RenderError::Timeout(self.timeout.as_millis() as u64))?
    }

    async fn set_viewport(page: &Page, width: u32, height: u32) -> Result<(), RenderError> {
        page.execute(SetDeviceMetricsOverrideParams::new(i64::from(width), i64::from(height), 1.0, false))
            .await
            .map_err(|e| RenderError::Layout(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Renderer for HeadlessRenderer {
    type Surface = HeadlessSurface;

    async fn load(&self, html: &str, width: u32) -> Result<HeadlessSurface, RenderError> {
        let document = wrap_document(html, width);
        self.bounded(async {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Load(e.to_string()))?;
            Self::set_viewport(&page, width, 1).await?;
            page.set_content(document)
                .await
                .map_err(|e| RenderError::Load(e.to_string()))?;
            Ok(HeadlessSurface { page })
        })
        .await
    }

    async fn measure(&self, surface: &HeadlessSurface) -> Result<ContentSize, RenderError> {
        self.bounded(async {
            let (width, height): (f64, f64) = surface
                .page
                .evaluate(MEASURE_SCRIPT)
                .await
                .map_err(|e| RenderError::Measure(e.to_string()))?
                .into_value()
                .map_err(|e| RenderError::Measure(e.to_string()))?;
            Ok(ContentSize::new(width, height))
        })
        .await
    }

    async fn scale(&self, surface: &HeadlessSurface, factor: f64) -> Result<f64, RenderError> {
        let script = format!(
            "document.documentElement.style.zoom = '{factor}'; document.documentElement.getBoundingClientRect().height"
        );
        self.bounded(async {
            surface
                .page
                .evaluate(script)
                .await
                .map_err(|e| RenderError::Layout(e.to_string()))?
                .into_value::<f64>()
                .map_err(|e| RenderError::Layout(e.to_string()))
        })
        .await
    }

    async fn resize(&self, surface: &HeadlessSurface, width: u32, height: u32) -> Result<(), RenderError> {
        self.bounded(Self::set_viewport(&surface.page, width, height)).await
    }

    async fn capture(&self, surface: &HeadlessSurface, rect: CaptureRect) -> Result<Bytes, RenderError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport { x: rect.x, y: rect.y, width: rect.width, height: rect.height, scale: 1.0 })
            .build();
        self.bounded(async {
            let png = surface
                .page
                .screenshot(params)
                .await
                .map_err(|e| RenderError::Capture(e.to_string()))?;
            Ok(Bytes::from(png))
        })
        .await
    }

    async fn dispose(&self, surface: HeadlessSurface) {
        if let Err(e) = surface.page.close().await {
            tracing::debug!("failed to close render tab: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_headless_renderer_new() {
        let renderer = HeadlessRenderer::new(Duration::from_secs(20)).await;
        assert!(renderer.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_capture_first_page() {
        let renderer = HeadlessRenderer::new(Duration::from_secs(20)).await.unwrap();
        let surface = renderer.load("<h1>Hello</h1><p>world</p>", 360).await.unwrap();

        let size = renderer.measure(&surface).await.unwrap();
        assert!(size.height > 0.0);

        let png = renderer
            .capture(&surface, CaptureRect { x: 0.0, y: 0.0, width: 360.0, height: size.height.min(400.0) })
            .await
            .unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        renderer.dispose(surface).await;
    }

    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_scale_reports_height_scaled_once() {
        let renderer = HeadlessRenderer::new(Duration::from_secs(20)).await.unwrap();
        let surface = renderer.load("<div style=\"height: 2000px\"></div>", 360).await.unwrap();

        let before = renderer.measure(&surface).await.unwrap().height;
        let scaled = renderer.scale(&surface, 0.5).await.unwrap();
        assert!((scaled - before * 0.5).abs() < 2.0, "scaled {scaled} from {before}");

        renderer.dispose(surface).await;
    }
}
