//! Ollama embedder - local embedding backend
//!
//! Talks to a locally running Ollama server. No API key needed. Liveness is
//! probed once, before the first embedding request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use super::provider::{checked_embedding, request_error, Embedding, EmbeddingProvider};
use crate::config::LocalEmbeddingConfig;
use crate::error::ProviderError;

/// Default Ollama server URL
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default embedding model
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

/// Dimension of nomic-embed-text
pub const DEFAULT_DIMENSION: usize = 768;

const PROVIDER_NAME: &str = "ollama";

/// Embedding request
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Embedding response
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// List models response
#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

/// Local embedding backend served by Ollama
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
    client: reqwest::Client,
    liveness: OnceCell<bool>,
}

impl OllamaEmbedder {
    /// Create an embedder from configuration
    pub fn new(config: &LocalEmbeddingConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER_NAME.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout_secs: config.timeout_secs,
            client,
            liveness: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check if Ollama is running
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ollama liveness probe failed: {}", e);
                false
            }
        }
    }

    /// List models pulled into the local server
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER_NAME, self.timeout_secs, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request {
                provider: PROVIDER_NAME.to_string(),
                message: format!("listing models failed: {}", response.status()),
            });
        }

        let models: ModelsResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;

        Ok(models.models)
    }

    async fn ensure_live(&self) -> bool {
        *self
            .liveness
            .get_or_init(|| async { self.is_available().await })
            .await
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, ProviderError> {
        if !self.ensure_live().await {
            return Err(ProviderError::Unavailable(format!(
                "Ollama is not reachable at {}",
                self.base_url
            )));
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER_NAME, self.timeout_secs, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request {
                provider: PROVIDER_NAME.to_string(),
                message: format!("status {}: {}", status, body),
            });
        }

        let body: EmbeddingResponse =
            response.json().await.map_err(|e| ProviderError::Malformed {
                provider: PROVIDER_NAME.to_string(),
                message: e.to_string(),
            })?;

        checked_embedding(PROVIDER_NAME, body.embedding, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> String {
        PROVIDER_NAME.to_string()
    }

    fn describe(&self) -> String {
        format!("Ollama (local, {})", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> LocalEmbeddingConfig {
        LocalEmbeddingConfig {
            endpoint: endpoint.to_string(),
            timeout_secs: 2,
            ..LocalEmbeddingConfig::default()
        }
    }

    #[test]
    fn test_embedder_creation() {
        let embedder = OllamaEmbedder::new(&config("http://localhost:11434/")).unwrap();
        assert_eq!(embedder.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(embedder.model(), DEFAULT_MODEL);
        assert_eq!(embedder.dimension(), DEFAULT_DIMENSION);
        assert_eq!(embedder.name(), "ollama");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let embedder = OllamaEmbedder::new(&config("http://127.0.0.1:9")).unwrap();
        let err = embedder.generate_embedding("fn main() {}").await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
