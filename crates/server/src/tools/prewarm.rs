//! prewarm tool implementation.
//!
//! Schedules background rendering of message bodies the client expects to
//! show soon, such as the visible rows of a message list.

use mailsnap_client::{PrewarmReport, PrewarmScheduler, RenderCoordinator, Renderer};
use mailsnap_core::{Error, PageSize};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::render_pages::{resolve_size, to_json};

/// Input parameters for the prewarm tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrewarmParams {
    /// Candidate HTML bodies, most likely to be opened first.
    pub bodies: Vec<String>,

    /// Page width in pixels (default: configured page width).
    #[serde(default)]
    pub width: Option<u32>,

    /// Page height in pixels (default: configured page height).
    #[serde(default)]
    pub height: Option<u32>,

    /// Maximum number of candidates to warm (default: configured cap).
    #[serde(default)]
    pub max_count: Option<usize>,

    /// Wait for the pass to finish and return its report (default: false).
    #[serde(default)]
    pub wait: bool,
}

/// Output structure for the prewarm tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrewarmOutput {
    /// Number of candidates handed to the background task.
    pub scheduled: usize,
    /// Pass report, present when `wait` was set.
    pub report: Option<PrewarmSummary>,
}

/// Counts from a finished prewarm pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrewarmSummary {
    pub considered: usize,
    pub skipped_empty: usize,
    pub already_cached: usize,
    pub rendered: usize,
    pub failed: usize,
}

impl From<PrewarmReport> for PrewarmSummary {
    fn from(r: PrewarmReport) -> Self {
        Self {
            considered: r.considered,
            skipped_empty: r.skipped_empty,
            already_cached: r.already_cached,
            rendered: r.rendered,
            failed: r.failed,
        }
    }
}

/// Implementation of the prewarm tool.
pub async fn prewarm_impl<R: Renderer>(
    coordinator: Option<&RenderCoordinator<R>>, default_size: PageSize, default_cap: usize, params: PrewarmParams,
) -> Result<CallToolResult, McpError> {
    let coordinator = coordinator.ok_or(Error::RenderDisabled)?;
    let size = resolve_size(default_size, params.width, params.height)?;
    let cap = params.max_count.unwrap_or(default_cap);
    let scheduled = params.bodies.len().min(cap);

    let handle = PrewarmScheduler::new(coordinator.clone()).request_prewarm(params.bodies, size, cap);

    let report = if params.wait {
        let report = handle
            .await
            .map_err(|e| Error::RenderFailed(format!("prewarm task failed: {e}")))?;
        Some(report.into())
    } else {
        None
    };

    let output = PrewarmOutput { scheduled, report };
    Ok(CallToolResult::success(vec![Content::text(to_json(&output)?)]))
}
