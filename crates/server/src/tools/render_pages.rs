//! render_pages tool implementation.
//!
//! Renders an HTML message body into fixed-size page images, reusing cached
//! pages and joining any render already in flight for the same body.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailsnap_client::{PageRequest, PageSet, RenderCoordinator, Renderer};
use mailsnap_core::{BaseKey, Error, MAX_PAGE_DIMENSION, PageSize};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input parameters for the render_pages tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderPagesParams {
    /// The HTML message body to render.
    pub html: String,

    /// Page width in pixels (default: configured page width).
    #[serde(default)]
    pub width: Option<u32>,

    /// Page height in pixels (default: configured page height).
    #[serde(default)]
    pub height: Option<u32>,

    /// Wait for an in-flight render to finish (default: true).
    #[serde(default = "default_true")]
    pub wait: bool,

    /// Attach the page images to the result (default: true).
    #[serde(default = "default_true")]
    pub include_images: bool,
}

fn default_true() -> bool {
    true
}

/// Render status reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    /// Every page was already cached.
    Cached,
    /// The pages were rendered for this call or a concurrent one.
    Rendered,
    /// A render is still running; call again or use cache_get later.
    Pending,
}

/// Output structure for the render_pages tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderPagesOutput {
    /// Base key identifying this (html, width, height) job.
    pub key: String,
    /// Page size the body was rendered at.
    pub size: PageSize,
    pub status: RenderStatus,
    /// Number of pages, once known.
    pub page_count: Option<u32>,
    /// Page keys usable with cache_get, in page order.
    pub pages: Vec<String>,
}

/// Implementation of the render_pages tool.
pub async fn render_pages_impl<R: Renderer>(
    coordinator: Option<&RenderCoordinator<R>>, default_size: PageSize, params: RenderPagesParams,
) -> Result<CallToolResult, McpError> {
    let coordinator = coordinator.ok_or(Error::RenderDisabled)?;
    if params.html.trim().is_empty() {
        return Err(Error::InvalidInput("html cannot be empty".into()).into());
    }

    let size = resolve_size(default_size, params.width, params.height)?;
    let key = BaseKey::new(&params.html, size);

    let (status, pages) = match coordinator.request_pages(&params.html, size).await {
        PageRequest::Ready(pages) => (RenderStatus::Cached, pages),
        PageRequest::Pending(pending) if params.wait => match pending.wait().await {
            Some(pages) => (RenderStatus::Rendered, pages),
            None => return Err(Error::RenderFailed(format!("render failed for {key}")).into()),
        },
        PageRequest::Pending(_) => {
            let output = RenderPagesOutput {
                key: key.to_string(),
                size,
                status: RenderStatus::Pending,
                page_count: coordinator.page_count(&key),
                pages: Vec::new(),
            };
            return Ok(CallToolResult::success(vec![Content::text(to_json(&output)?)]));
        }
    };

    tracing::debug!(key = %key, pages = pages.len(), ?status, "render_pages served");

    let output = RenderPagesOutput {
        key: key.to_string(),
        size,
        status,
        page_count: Some(pages.len() as u32),
        pages: (0..pages.len() as u32).map(|i| key.page(i).to_string()).collect(),
    };

    let mut content = vec![Content::text(to_json(&output)?)];
    if params.include_images {
        content.extend(page_images(&pages));
    }
    Ok(CallToolResult::success(content))
}

/// Apply per-call overrides to the configured page size.
pub fn resolve_size(default: PageSize, width: Option<u32>, height: Option<u32>) -> Result<PageSize, Error> {
    let size = PageSize::new(width.unwrap_or(default.width), height.unwrap_or(default.height));
    let bounds = 1..=MAX_PAGE_DIMENSION;
    if !bounds.contains(&size.width) || !bounds.contains(&size.height) {
        return Err(Error::InvalidInput(format!(
            "page size must be within 1..={MAX_PAGE_DIMENSION}px, got {}x{}",
            size.width, size.height
        )));
    }
    Ok(size)
}

pub(crate) fn page_images(pages: &PageSet) -> impl Iterator<Item = Content> + '_ {
    pages.pages.iter().map(|png| Content::image(STANDARD.encode(png), "image/png"))
}

pub(crate) fn to_json<T: Serialize>(output: &T) -> Result<String, Error> {
    serde_json::to_string_pretty(output).map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))
}
