//! cache_get tool implementation.
//!
//! Retrieves one cached page image by its page key.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailsnap_core::{Error, PageKey, SnapshotStore};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Page key as returned by render_pages, e.g. `<base>#p0`.
    pub key: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(store: &SnapshotStore, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let key: PageKey = params.key.parse()?;
    let png = store
        .get(&key)
        .await
        .ok_or_else(|| Error::CacheMiss(params.key.clone()))?;

    Ok(CallToolResult::success(vec![Content::image(STANDARD.encode(&png), "image/png")]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::open_store;
    use bytes::Bytes;
    use mailsnap_core::{BaseKey, PageSize};

    #[tokio::test]
    async fn test_get_impl_missing() {
        let (_dir, store) = open_store().await;
        let key = BaseKey::new("<p>x</p>", PageSize::new(360, 400)).page(0);

        let result = get_impl(&store, CacheGetParams { key: key.to_string() }).await;
        assert_eq!(result.unwrap_err().code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_invalid_key() {
        let (_dir, store) = open_store().await;
        let result = get_impl(&store, CacheGetParams { key: "no-page-suffix".into() }).await;
        assert_eq!(result.unwrap_err().code.0, -32602);
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let (_dir, store) = open_store().await;
        let key = BaseKey::new("<p>x</p>", PageSize::new(360, 400)).page(1);
        store.put(key.clone(), Bytes::from_static(b"\x89PNG"));

        let result = get_impl(&store, CacheGetParams { key: key.to_string() }).await.unwrap();
        let content = serde_json::to_value(&result.content[0]).unwrap();
        assert_eq!(content["type"], "image");
        assert_eq!(content["mimeType"], "image/png");
        assert_eq!(content["data"], STANDARD.encode(b"\x89PNG"));
    }
}
