//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mailsnap server. Render tools
//! are generic over the [`Renderer`](mailsnap_client::Renderer) so they can be
//! exercised without a browser.

pub mod cache;
pub mod prewarm;
pub mod render_pages;

#[cfg(test)]
pub(crate) mod testing;

pub use prewarm::{PrewarmParams, prewarm_impl};
pub use render_pages::{RenderPagesParams, render_pages_impl};
