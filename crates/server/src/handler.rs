//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl, stats_impl};
use crate::tools::{PrewarmParams, RenderPagesParams, prewarm_impl, render_pages_impl};

use mailsnap_client::{HeadlessRenderer, RenderCoordinator};
use mailsnap_core::{AppConfig, SnapshotStore};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for mailsnap.
#[derive(Clone)]
pub struct McpSnapServer {
    tool_router: ToolRouter<Self>,
    config: AppConfig,
    store: SnapshotStore,
    coordinator: Option<RenderCoordinator<HeadlessRenderer>>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl McpSnapServer {
    /// Create a new server handler.
    ///
    /// Without a coordinator the render tools report that rendering is
    /// disabled, while the cache tools keep working.
    pub fn new(
        config: AppConfig, store: SnapshotStore, coordinator: Option<RenderCoordinator<HeadlessRenderer>>,
    ) -> Self {
        Self { tool_router: Self::tool_router(), config, store, coordinator }
    }

    /// Render an HTML message body into page images.
    #[tool(
        description = "Render an HTML message body into fixed-size PNG pages. Returns page keys and images; cached pages are reused and concurrent requests share one render."
    )]
    async fn render_pages(&self, params: Parameters<RenderPagesParams>) -> Result<CallToolResult, McpError> {
        render_pages_impl(self.coordinator.as_ref(), self.config.page_size(), params.0).await
    }

    /// Warm the cache for bodies likely to be opened next.
    #[tool(description = "Render up to max_count HTML bodies in the background so later render_pages calls hit the cache.")]
    async fn prewarm(&self, params: Parameters<PrewarmParams>) -> Result<CallToolResult, McpError> {
        prewarm_impl(self.coordinator.as_ref(), self.config.page_size(), self.config.prewarm_cap, params.0).await
    }

    /// Fetch a cached page image.
    #[tool(description = "Retrieve one cached page image by page key.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.store, params.0).await
    }

    /// Evict cached pages.
    #[tool(description = "Evict least recently used pages, keeping at most max_entries. Omit max_entries to clear the cache.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.store, params.0).await
    }

    /// Report cache and render statistics.
    #[tool(description = "Report cache size, age range and render deduplication counters.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.store, self.coordinator.as_ref()).await
    }
}

impl ServerHandler for McpSnapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-mailsnap".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
