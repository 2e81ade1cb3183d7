//! Abstraction layer for the AI services a document review depends on.
//!
//! This crate provides trait-based abstractions for:
//! - Embedding providers that turn text into fixed-length vectors
//! - Document analyzers that review an uploaded contract and answer questions about it
//! - Text extractors that pull plain text out of uploaded files
//!
//! The design is provider-agnostic, so the review workflow does not change
//! when a different model vendor or extraction backend is plugged in.

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::Error;
pub use types::analysis::{DocumentAnalysis, FileHandle, Question, Upload};
