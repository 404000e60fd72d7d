//! Unified error types for mailsnap.
//!
//! Codes follow the same `CODE: detail` layout the MCP tools report.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error types for the mailsnap cache and server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty HTML, zero width).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Filesystem operation on the cache directory failed.
    #[error("CACHE_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest could not be encoded.
    #[error("CACHE_ERROR: manifest encoding failed: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Key string does not have the `<base>#p<index>` layout.
    #[error("INVALID_INPUT: invalid key format: {0}")]
    InvalidKey(String),

    /// The background writer has shut down.
    #[error("CACHE_ERROR: store writer closed")]
    StoreClosed,

    /// Render mode is disabled.
    #[error("RENDER_DISABLED")]
    RenderDisabled,

    /// Render failed.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Io(e) => (-32002, e.to_string()),
            Error::Manifest(e) => (-32002, e.to_string()),
            Error::InvalidKey(key) => (-32602, format!("Invalid key format: {key}")),
            Error::StoreClosed => (-32002, "Cache writer closed".to_string()),
            Error::RenderDisabled => (-32011, "Render mode is disabled".to_string()),
            Error::RenderFailed(msg) => (-32012, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
