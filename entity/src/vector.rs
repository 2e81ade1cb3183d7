use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// A dense embedding vector stored as a JSON array of floats.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Vector(pub Vec<f32>);

impl Vector {
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Cosine similarity between two vectors.
    ///
    /// Returns `None` when the vectors differ in length, are empty, or either
    /// has zero magnitude.
    pub fn cosine_similarity(&self, other: &[f32]) -> Option<f64> {
        let a = &self.0;
        if a.len() != other.len() || a.is_empty() {
            return None;
        }

        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;
        for (x, y) in a.iter().zip(other.iter()) {
            let (x, y) = (*x as f64, *y as f64);
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }

        if norm_a == 0.0 || norm_b == 0.0 {
            return None;
        }

        Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
    }
}

impl From<Vec<f32>> for Vector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
