//! In-process embedding backends for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::provider::{Embedding, EmbeddingProvider};
use crate::error::ProviderError;

/// Backend whose health is flipped by the test.
pub(crate) struct ScriptedBackend {
    name: String,
    dimension: usize,
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedBackend {
    async fn generate_embedding(&self, _text: &str) -> Result<Embedding, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(ProviderError::Request {
                provider: self.name.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(Embedding {
            provider_name: self.name.clone(),
            dimension: self.dimension,
            values: vec![1.0; self.dimension],
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Bag-of-tokens embedder: texts sharing most identifiers score close to 1.
pub(crate) struct HashingEmbedder {
    name: String,
    dimension: usize,
    failing_markers: Vec<String>,
    unavailable: AtomicBool,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::named("hashing", 256)
    }

    pub fn named(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            failing_markers: Vec::new(),
            unavailable: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call whose text contains `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.failing_markers.push(marker.to_string());
        self
    }

    /// Answer every call with `Unavailable`.
    pub fn unavailable(self) -> Self {
        self.unavailable.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            values[fnv1a(token) % self.dimension] += 1.0;
        }
        values
    }
}

fn fnv1a(token: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash as usize
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(text.to_string());

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable(format!("{} is down", self.name)));
        }
        if self.failing_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(ProviderError::Request {
                provider: self.name.clone(),
                message: "rejected input".to_string(),
            });
        }

        let mut values = self.vectorize(text);
        if values.iter().all(|v| *v == 0.0) {
            values[0] = 1.0;
        }
        Ok(Embedding {
            provider_name: self.name.clone(),
            dimension: self.dimension,
            values,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
