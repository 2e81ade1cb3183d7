pub mod analysis;
pub mod embedding;
pub mod extraction;
