//! Similarity search over a loaded index
//!
//! Callers depend only on `search(vector, k)`. The reference backend is a
//! linear scan with heap-based top-K selection; anything implementing
//! `SimilarityBackend` can replace it.

pub mod duplicates;

use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::core::unit::CodeUnit;
use crate::embeddings::EmbeddingProvider;
use crate::error::SearchError;
use crate::index::{Index, IndexEntry};

pub use duplicates::{DuplicateClassifier, DuplicateMatch, SimilarityLevel, DEFAULT_THRESHOLD};

/// Cosine similarity, 0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub unit: CodeUnit,
    pub score: f32,
}

impl SimilarityResult {
    pub fn level(&self) -> SimilarityLevel {
        SimilarityLevel::from_score(self.score)
    }
}

/// Nearest-neighbour contract.
///
/// Results are ordered by descending score, ties broken by ascending unit id.
/// `k` is clamped to the number of entries.
pub trait SimilarityBackend: Send + Sync {
    fn search(&self, query: &[f32], k: usize) -> Vec<SimilarityResult>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive scan over every entry.
pub struct LinearScan {
    index: Arc<Index>,
}

impl LinearScan {
    pub fn new(index: Arc<Index>) -> Self {
        Self { index }
    }
}

struct Candidate<'a> {
    score: f32,
    entry: &'a IndexEntry,
}

impl Ord for Candidate<'_> {
    /// Greater means ranked earlier.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.entry.id().cmp(self.entry.id()))
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

impl SimilarityBackend for LinearScan {
    fn search(&self, query: &[f32], k: usize) -> Vec<SimilarityResult> {
        let k = k.min(self.index.len());
        if k == 0 {
            return Vec::new();
        }

        // Min-heap of the best k seen so far
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(k + 1);
        for entry in &self.index.entries {
            heap.push(Reverse(Candidate {
                score: cosine_similarity(query, &entry.vector),
                entry,
            }));
            if heap.len() > k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|Reverse(candidate)| SimilarityResult {
                unit: candidate.entry.unit.clone(),
                score: candidate.score,
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// Query front end bound to one index.
pub struct SimilaritySearch {
    index: Arc<Index>,
    backend: Box<dyn SimilarityBackend>,
}

impl SimilaritySearch {
    pub fn new(index: Index) -> Self {
        let index = Arc::new(index);
        let backend = Box::new(LinearScan::new(index.clone()));
        Self { index, backend }
    }

    pub fn with_backend(index: Arc<Index>, backend: Box<dyn SimilarityBackend>) -> Self {
        Self { index, backend }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Rank index entries against `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SimilarityResult>, SearchError> {
        if query.len() != self.index.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.index.dimension,
                actual: query.len(),
            });
        }
        Ok(self.backend.search(query, k))
    }

    /// Every entry, ranked.
    pub fn rank_all(&self, query: &[f32]) -> Result<Vec<SimilarityResult>, SearchError> {
        self.search(query, self.backend.len())
    }

    /// Embed `text` with `provider` and search with the result.
    ///
    /// The provider must be the one the index was built with.
    pub async fn search_text(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<SimilarityResult>, SearchError> {
        let query = self.embed_query(provider, text).await?;
        self.search(&query, k)
    }

    pub(crate) async fn embed_query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
    ) -> Result<Vec<f32>, SearchError> {
        self.check_provider(&provider.name())?;
        let embedding = provider.generate_embedding(text).await?;
        // Failover may have happened during the call
        self.check_provider(&embedding.provider_name)?;
        Ok(embedding.values)
    }

    fn check_provider(&self, name: &str) -> Result<(), SearchError> {
        if name != self.index.provider_name {
            return Err(SearchError::ProviderMismatch {
                query: name.to_string(),
                index: self.index.provider_name.clone(),
            });
        }
        Ok(())
    }
}
