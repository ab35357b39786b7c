//! Embedding provider capability and vector types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Raw output of one embedding call, tagged with the backend that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub provider_name: String,
    pub dimension: usize,
    pub values: Vec<f32>,
}

/// An embedding bound to the code unit it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub unit_id: String,
    pub provider_name: String,
    pub dimension: usize,
    pub values: Vec<f32>,
}

impl EmbeddingVector {
    /// Bind `embedding` to `unit_id`. A length that disagrees with the
    /// producer's declared dimension is rejected, never padded or truncated.
    pub fn new(unit_id: &str, embedding: Embedding) -> Result<Self, ProviderError> {
        if embedding.values.len() != embedding.dimension {
            return Err(ProviderError::DimensionMismatch {
                provider: embedding.provider_name,
                expected: embedding.dimension,
                actual: embedding.values.len(),
            });
        }

        Ok(Self {
            unit_id: unit_id.to_string(),
            provider_name: embedding.provider_name,
            dimension: embedding.dimension,
            values: embedding.values,
        })
    }
}

/// Turns text into a fixed-dimension vector.
///
/// Implementations make exactly one attempt per call; retry and backoff
/// belong to the caller.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, ProviderError>;

    /// Dimension of vectors produced by the currently active backend.
    fn dimension(&self) -> usize;

    /// Name of the currently active backend. Vectors are comparable only
    /// when they share this name and dimension.
    fn name(&self) -> String;

    /// Human-readable description for status output.
    fn describe(&self) -> String {
        self.name()
    }
}

/// Validate a backend response before it leaves the provider.
pub(crate) fn checked_embedding(
    provider: &str,
    values: Vec<f32>,
    expected: usize,
) -> Result<Embedding, ProviderError> {
    if values.is_empty() {
        return Err(ProviderError::EmptyEmbedding {
            provider: provider.to_string(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ProviderError::Malformed {
            provider: provider.to_string(),
            message: "embedding contains non-finite values".to_string(),
        });
    }
    if values.len() != expected {
        return Err(ProviderError::DimensionMismatch {
            provider: provider.to_string(),
            expected,
            actual: values.len(),
        });
    }

    Ok(Embedding {
        provider_name: provider.to_string(),
        dimension: expected,
        values,
    })
}

/// Classify a transport error from reqwest.
pub(crate) fn request_error(provider: &str, timeout_secs: u64, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            secs: timeout_secs,
        }
    } else {
        ProviderError::Request {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_embedding_rejects_bad_responses() {
        assert!(matches!(
            checked_embedding("p", vec![], 3),
            Err(ProviderError::EmptyEmbedding { .. })
        ));
        assert!(matches!(
            checked_embedding("p", vec![1.0, f32::NAN, 0.0], 3),
            Err(ProviderError::Malformed { .. })
        ));
        assert!(matches!(
            checked_embedding("p", vec![1.0, 2.0], 3),
            Err(ProviderError::DimensionMismatch { expected: 3, actual: 2, .. })
        ));

        let ok = checked_embedding("p", vec![1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(ok.dimension, 3);
        assert_eq!(ok.provider_name, "p");
    }

    #[test]
    fn test_vector_rejects_dimension_mismatch() {
        let embedding = Embedding {
            provider_name: "p".to_string(),
            dimension: 4,
            values: vec![0.0; 3],
        };
        assert!(EmbeddingVector::new("u1", embedding).is_err());

        let embedding = Embedding {
            provider_name: "p".to_string(),
            dimension: 3,
            values: vec![0.5; 3],
        };
        let vector = EmbeddingVector::new("u1", embedding).unwrap();
        assert_eq!(vector.unit_id, "u1");
        assert_eq!(vector.dimension, 3);
    }
}
