//! Document analysis provider trait.

use crate::types::analysis::{DocumentAnalysis, FileHandle, Question, Upload};
use crate::Error;
use async_trait::async_trait;

/// Abstraction for LLM-powered contract review.
///
/// Providers keep uploaded documents in their own file store and refer to them
/// by an opaque name. A document is uploaded once and reused across analysis
/// runs and chat questions while the provider still holds it.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Upload a document to the provider's file store.
    async fn upload(&self, upload: Upload) -> Result<FileHandle, Error>;

    /// Look up a previously uploaded file, `None` once the provider has dropped it.
    ///
    /// Providers expire uploads, so a stored name must be checked before reuse.
    async fn find_file(&self, name: &str) -> Result<Option<FileHandle>, Error>;

    /// Review an uploaded document against the given policies and rules.
    ///
    /// `rules_text` is the plain-text rendering of the applicable policies.
    async fn analyze(&self, file: &FileHandle, rules_text: &str)
        -> Result<DocumentAnalysis, Error>;

    /// Answer a question about an uploaded document.
    async fn ask(&self, question: Question) -> Result<String, Error>;

    /// Return unique identifier for this provider (e.g., "gemini").
    fn provider_id(&self) -> &str;
}
