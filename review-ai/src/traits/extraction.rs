//! Text extraction trait.

use crate::Error;
use async_trait::async_trait;
use std::path::Path;

/// Pulls plain text out of an uploaded file.
///
/// Fails with [`Error::UnsupportedFormat`] for file types the extractor cannot
/// read and [`Error::NoTextExtracted`] when reading succeeded but yielded no text.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract_text(&self, path: &Path, content_type: &str) -> Result<String, Error>;
}
