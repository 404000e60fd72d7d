//! Snapshot key types.
//!
//! A [`BaseKey`] names one render job (an HTML body at one target size) and a
//! [`PageKey`] names one stored raster page of that job.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::hash::{blob_filename, compute_base_key};
use crate::Error;

/// Target render size in CSS pixels.
///
/// `height` doubles as the page height used for pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Fingerprint of (HTML content hash, target width, target height).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseKey(String);

impl BaseKey {
    /// Fingerprint an HTML body at the given size.
    pub fn new(html: &str, size: PageSize) -> Self {
        Self(compute_base_key(html, size.width, size.height))
    }

    /// Key for page `index` of this job.
    pub fn page(&self, index: u32) -> PageKey {
        PageKey { base: self.clone(), index }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BaseKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains('#') {
            return Err(Error::InvalidKey(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Identifies one stored raster page: a base key plus a page index.
///
/// Serialized as `<base>#p<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageKey {
    pub base: BaseKey,
    pub index: u32,
}

impl PageKey {
    /// Filename of the blob backing this page.
    pub fn filename(&self) -> String {
        blob_filename(&self.to_string())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#p{}", self.base, self.index)
    }
}

impl FromStr for PageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, index) = s.rsplit_once("#p").ok_or_else(|| Error::InvalidKey(s.to_string()))?;
        let index = index.parse().map_err(|_| Error::InvalidKey(s.to_string()))?;
        Ok(Self { base: base.parse()?, index })
    }
}

impl TryFrom<String> for PageKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PageKey> for String {
    fn from(key: PageKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_key_round_trip() {
        let base = BaseKey::new("<p>hi</p>", PageSize::new(360, 400));
        let key = base.page(7);
        let parsed: PageKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.index, 7);
    }

    #[test]
    fn test_page_key_rejects_garbage() {
        assert!("no-index".parse::<PageKey>().is_err());
        assert!("abc#pX".parse::<PageKey>().is_err());
        assert!("#p1".parse::<PageKey>().is_err());
    }

    #[test]
    fn test_page_key_serializes_as_string() {
        let key = BaseKey::new("<p>hi</p>", PageSize::new(360, 400)).page(2);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
        let back: PageKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_pages_have_distinct_filenames() {
        let base = BaseKey::new("<p>hi</p>", PageSize::new(360, 400));
        assert_ne!(base.page(0).filename(), base.page(1).filename());
    }
}
