//! Hybrid provider: local first, sticky failover to remote
//!
//! The first local failure flips the provider to the remote backend for the
//! rest of its lifetime, even if the local backend recovers. The switch is a
//! single transition guarded by a mutex, so concurrent callers observe it at
//! most once and it is logged once.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use super::provider::{Embedding, EmbeddingProvider};
use crate::error::ProviderError;

/// Backend currently answering requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend {
    Local,
    Remote,
    /// Local failed and no remote is configured.
    None,
}

pub struct HybridProvider {
    local: Arc<dyn EmbeddingProvider>,
    remote: Option<Arc<dyn EmbeddingProvider>>,
    local_usable: Mutex<bool>,
}

impl HybridProvider {
    pub fn new(
        local: Arc<dyn EmbeddingProvider>,
        remote: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            local,
            remote,
            local_usable: Mutex::new(true),
        }
    }

    pub fn active_backend(&self) -> ActiveBackend {
        if *self.local_usable.lock() {
            ActiveBackend::Local
        } else if self.remote.is_some() {
            ActiveBackend::Remote
        } else {
            ActiveBackend::None
        }
    }

    fn mark_local_failed(&self, err: &ProviderError) {
        let mut usable = self.local_usable.lock();
        if *usable {
            *usable = false;
            match &self.remote {
                Some(remote) => warn!(
                    "Local embeddings failed ({}), switching to {} for the rest of this run",
                    err,
                    remote.name()
                ),
                None => warn!(
                    "Local embeddings failed ({}) and no remote provider is configured",
                    err
                ),
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HybridProvider {
    async fn generate_embedding(&self, text: &str) -> Result<Embedding, ProviderError> {
        let local_usable = *self.local_usable.lock();

        if local_usable {
            match self.local.generate_embedding(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(err) => self.mark_local_failed(&err),
            }
        }

        match &self.remote {
            Some(remote) => remote.generate_embedding(text).await,
            None => Err(ProviderError::Unavailable(format!(
                "{} failed earlier and no remote provider is configured",
                self.local.name()
            ))),
        }
    }

    fn dimension(&self) -> usize {
        match (self.active_backend(), &self.remote) {
            (ActiveBackend::Remote, Some(remote)) => remote.dimension(),
            _ => self.local.dimension(),
        }
    }

    /// Space of the active backend. With no backend left this stays the
    /// local space, so vectors produced before the failure remain valid.
    fn name(&self) -> String {
        match (self.active_backend(), &self.remote) {
            (ActiveBackend::Remote, Some(remote)) => remote.name(),
            _ => self.local.name(),
        }
    }

    fn describe(&self) -> String {
        match (self.active_backend(), &self.remote) {
            (ActiveBackend::Local, _) => self.local.describe(),
            (ActiveBackend::Remote, Some(remote)) => remote.describe(),
            _ => format!("{} (unavailable, no remote configured)", self.local.describe()),
        }
    }
}
