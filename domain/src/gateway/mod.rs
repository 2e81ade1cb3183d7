//! Clients for the services a review depends on, behind the `review-ai` traits.
use crate::error::Error;
use review_ai::traits::{analysis, embedding, extraction::Extractor};
use service::config::Config;
use std::sync::Arc;

pub mod extraction;
pub mod gemini;

/// The collaborators an operation may call, shared between requests.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn embedding::Provider>,
    pub analyzer: Arc<dyn analysis::Provider>,
    pub extractor: Arc<dyn Extractor>,
}

impl Providers {
    /// Gemini for embeddings and analysis, local parsing for text extraction.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let gemini = Arc::new(gemini::GeminiClient::new(config)?);
        Ok(Self {
            embedder: gemini.clone(),
            analyzer: gemini,
            extractor: Arc::new(extraction::LocalExtractor),
        })
    }
}
