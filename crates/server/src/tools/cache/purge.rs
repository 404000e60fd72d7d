//! cache_purge tool implementation.
//!
//! Evicts least-recently-used pages down to a target entry count.

use mailsnap_core::SnapshotStore;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::render_pages::to_json;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Keep only the N most recently used pages. Omit to remove everything.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of pages deleted.
    pub deleted: usize,
    /// Number of pages left.
    pub remaining: usize,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(store: &SnapshotStore, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = match params.max_entries {
        Some(max_entries) => store.purge_to(max_entries).await?,
        None => store.clear().await?,
    };
    let remaining = store.entry_count().await;
    tracing::info!(deleted, remaining, "purged snapshot cache");

    let output = CachePurgeOutput { deleted, remaining };
    Ok(CallToolResult::success(vec![Content::text(to_json(&output)?)]))
}
