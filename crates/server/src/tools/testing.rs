//! Test fixtures shared by the tool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use mailsnap_client::{CaptureRect, ContentSize, RenderCoordinator, RenderError, Renderer, SettleStrategy};
use mailsnap_core::{SnapshotStore, StoreConfig};
use rmcp::model::CallToolResult;
use tempfile::TempDir;

/// Renderer that lays every document out as `height` pixels tall.
pub struct StubRenderer {
    height: f64,
    fail: bool,
    pub loads: AtomicUsize,
}

impl StubRenderer {
    pub fn new(height: f64) -> Self {
        Self { height, fail: false, loads: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new(100.0) }
    }
}

#[async_trait::async_trait]
impl Renderer for StubRenderer {
    type Surface = ();

    async fn load(&self, _html: &str, _width: u32) -> Result<(), RenderError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail { Err(RenderError::Load("stub failure".into())) } else { Ok(()) }
    }

    async fn measure(&self, _surface: &()) -> Result<ContentSize, RenderError> {
        Ok(ContentSize::new(100.0, self.height))
    }

    async fn scale(&self, _surface: &(), factor: f64) -> Result<f64, RenderError> {
        Ok(self.height * factor)
    }

    async fn resize(&self, _surface: &(), _width: u32, _height: u32) -> Result<(), RenderError> {
        Ok(())
    }

    async fn capture(&self, _surface: &(), rect: CaptureRect) -> Result<Bytes, RenderError> {
        Ok(Bytes::from(format!("png@{}", rect.y)))
    }

    async fn dispose(&self, _surface: ()) {}
}

pub async fn open_store() -> (TempDir, SnapshotStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(StoreConfig::new(dir.path().to_path_buf())).await;
    (dir, store)
}

pub async fn coordinator(renderer: StubRenderer) -> (TempDir, Arc<StubRenderer>, RenderCoordinator<StubRenderer>) {
    let (dir, store) = open_store().await;
    let renderer = Arc::new(renderer);
    let coordinator = RenderCoordinator::new(renderer.clone(), store, SettleStrategy::Fixed(Duration::ZERO));
    (dir, renderer, coordinator)
}

/// Parse the JSON text block of a tool result.
pub fn json_output<T: serde::de::DeserializeOwned>(result: &CallToolResult) -> T {
    let content = result
        .content
        .iter()
        .map(|c| serde_json::to_value(c).unwrap())
        .find(|v| v.get("type").and_then(|t| t.as_str()) == Some("text"))
        .expect("Expected a text block in content");
    serde_json::from_str(content["text"].as_str().unwrap()).unwrap()
}

pub fn image_count(result: &CallToolResult) -> usize {
    result
        .content
        .iter()
        .filter(|c| serde_json::to_value(c).unwrap().get("type").and_then(|t| t.as_str()) == Some("image"))
        .count()
}
