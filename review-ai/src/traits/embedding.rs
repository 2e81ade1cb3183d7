//! Embedding provider trait.

use crate::Error;
use async_trait::async_trait;

/// Abstraction for text embedding models.
///
/// Implementations turn a piece of text into a dense vector whose length is
/// fixed for the provider's model, so vectors from the same provider can be
/// compared with cosine similarity.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Compute the embedding vector for `text`.
    ///
    /// Implementations must return exactly [`Provider::dimensions`] values or an error.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Return unique identifier for this provider (e.g., "gemini").
    fn provider_id(&self) -> &str;
}
