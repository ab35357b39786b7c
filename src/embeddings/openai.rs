//! OpenAI-compatible embeddings client - remote embedding backend

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{checked_embedding, request_error, Embedding, EmbeddingProvider};
use crate::config::RemoteEmbeddingConfig;
use crate::error::ProviderError;

const PROVIDER_NAME: &str = "openai";

/// Request body for the embeddings endpoint
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Error response from the API
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    message: String,
}

/// Remote embedding backend
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    /// Create a new client with an explicit key
    pub fn new(api_key: String, config: &RemoteEmbeddingConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Request {
                provider: PROVIDER_NAME.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Create a client when the configured key variable is set.
    ///
    /// Returns `Ok(None)` when no key is available; the remote backend is
    /// then simply absent.
    pub fn from_config(config: &RemoteEmbeddingConfig) -> Result<Option<Self>, ProviderError> {
        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Self::new(key, config).map(Some),
            _ => Ok(None),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER_NAME, self.timeout_secs, e))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiError>(&error_text) {
                Ok(api_error) => format!(
                    "{} ({}): {}",
                    status,
                    api_error.error.error_type.unwrap_or_else(|| "error".to_string()),
                    api_error.error.message
                ),
                Err(_) => format!("{}: {}", status, error_text),
            };
            return Err(ProviderError::Request {
                provider: PROVIDER_NAME.to_string(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| ProviderError::Malformed {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })?;

        let values = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();

        checked_embedding(PROVIDER_NAME, values, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> String {
        PROVIDER_NAME.to_string()
    }

    fn describe(&self) -> String {
        format!("OpenAI (API, {})", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_means_no_backend() {
        let config = RemoteEmbeddingConfig {
            api_key_env: "CODESIM_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..RemoteEmbeddingConfig::default()
        };
        assert!(OpenAiEmbedder::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_client_creation() {
        let config = RemoteEmbeddingConfig {
            endpoint: "https://api.openai.com/v1/".to_string(),
            ..RemoteEmbeddingConfig::default()
        };
        let client = OpenAiEmbedder::new("sk-test".to_string(), &config).unwrap();
        assert_eq!(client.endpoint, "https://api.openai.com/v1");
        assert_eq!(client.model(), "text-embedding-3-small");
        assert_eq!(client.dimension(), 1536);
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn test_api_error_parsing() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        let parsed: ApiError = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Incorrect API key provided");
        assert_eq!(parsed.error.error_type.as_deref(), Some("invalid_request_error"));
    }
}
