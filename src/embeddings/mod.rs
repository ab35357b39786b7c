//! Embedding providers
//!
//! Local (Ollama), remote (OpenAI-compatible) and the hybrid provider that
//! prefers local and fails over to remote.

pub mod hybrid;
pub mod ollama;
pub mod openai;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use hybrid::{ActiveBackend, HybridProvider};
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use provider::{Embedding, EmbeddingProvider, EmbeddingVector};

use std::sync::Arc;
use tracing::debug;

use crate::config::{EmbeddingMode, EmbeddingsConfig};
use crate::error::ProviderError;

/// Build the provider selected by `config.mode`.
pub fn create_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    let remote = OpenAiEmbedder::from_config(&config.remote)?;

    match config.mode {
        EmbeddingMode::Local => {
            debug!("Using local embeddings at {}", config.local.endpoint);
            Ok(Arc::new(OllamaEmbedder::new(&config.local)?))
        }
        EmbeddingMode::Remote => match remote {
            Some(remote) => Ok(Arc::new(remote)),
            None => Err(ProviderError::Unconfigured(format!(
                "openai (set {})",
                config.remote.api_key_env
            ))),
        },
        EmbeddingMode::Hybrid => {
            let remote: Option<Arc<dyn EmbeddingProvider>> =
                remote.map(|r| Arc::new(r) as Arc<dyn EmbeddingProvider>);

            if !config.local.enabled {
                return remote.ok_or_else(|| {
                    ProviderError::Unconfigured(format!(
                        "local embeddings are disabled and {} is not set",
                        config.remote.api_key_env
                    ))
                });
            }

            let local: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(&config.local)?);
            debug!(
                "Using hybrid embeddings (remote fallback: {})",
                if remote.is_some() { "yes" } else { "no" }
            );
            Ok(Arc::new(HybridProvider::new(local, remote)))
        }
    }
}
