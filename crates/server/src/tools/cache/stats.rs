//! cache_stats tool implementation.

use mailsnap_client::{CoordinatorStats, RenderCoordinator, Renderer};
use mailsnap_core::SnapshotStore;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::render_pages::to_json;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    /// Cache directory on disk.
    pub dir: String,
    /// Pages recorded in the manifest.
    pub entries: usize,
    /// Timestamp of the least recently used page, RFC 3339.
    pub oldest: Option<String>,
    /// Timestamp of the most recently used page, RFC 3339.
    pub newest: Option<String>,
    /// Whether rendering is available.
    pub render_enabled: bool,
    /// Renders currently in flight.
    pub pending_renders: usize,
    /// Coordinator counters, absent when rendering is disabled.
    pub renders: Option<RenderCounters>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct RenderCounters {
    pub requests: u64,
    pub cache_hits: u64,
    pub joined: u64,
    pub renders_started: u64,
    pub renders_completed: u64,
    pub renders_failed: u64,
    /// Share of requests served without starting a render.
    pub dedup_ratio: f64,
}

impl From<CoordinatorStats> for RenderCounters {
    fn from(s: CoordinatorStats) -> Self {
        Self {
            requests: s.requests,
            cache_hits: s.cache_hits,
            joined: s.joined,
            renders_started: s.renders_started,
            renders_completed: s.renders_completed,
            renders_failed: s.renders_failed,
            dedup_ratio: s.dedup_ratio(),
        }
    }
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl<R: Renderer>(
    store: &SnapshotStore, coordinator: Option<&RenderCoordinator<R>>,
) -> Result<CallToolResult, McpError> {
    let entries = store.entries().await;
    let output = CacheStatsOutput {
        dir: store.dir().display().to_string(),
        entries: entries.len(),
        oldest: entries.first().map(|e| e.timestamp.to_rfc3339()),
        newest: entries.last().map(|e| e.timestamp.to_rfc3339()),
        render_enabled: coordinator.is_some(),
        pending_renders: coordinator.map_or(0, |c| c.pending_count()),
        renders: coordinator.map(|c| c.stats().into()),
    };
    Ok(CallToolResult::success(vec![Content::text(to_json(&output)?)]))
}
