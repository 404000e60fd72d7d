//! Content-addressed key and filename generation.

use sha2::{Digest, Sha256};

/// Compute the content fingerprint for one HTML body rendered at one size.
///
/// The digest covers the HTML and both target dimensions, so the same body
/// at a different size is a different render job.
pub fn compute_base_key(html: &str, width: u32, height: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hasher.update(b"\n");
    hasher.update(width.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(height.to_string().as_bytes());
    format!("{}_{width}x{height}", hex::encode(hasher.finalize()))
}

/// Derive the blob filename for a page key string.
///
/// Distinct keys hashing to the same name are not reconciled.
pub fn blob_filename(page_key: &str) -> String {
    let digest = Sha256::digest(page_key.as_bytes());
    format!("{}.png", hex::encode(digest))
}
