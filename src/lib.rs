//! codesim - function-level semantic index and duplicate detection
//!
//! Source files are split into functions with tree-sitter, each function is
//! embedded through a local or remote provider, and the resulting vectors are
//! persisted as a per-repository index. The index answers "which functions
//! look like this one" and flags likely copies in new or changed code.

pub mod config;
pub mod core;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod search;
pub mod vcs;

pub use crate::core::{CodeParser, CodeUnit, FileExtraction, Language, LineMetrics};
pub use embeddings::{create_provider, Embedding, EmbeddingProvider, EmbeddingVector};
pub use index::{BuildOptions, BuildReport, BuildState, CancelToken, Index, IndexBuilder, IndexEntry};
pub use search::{
    DuplicateClassifier, DuplicateMatch, SimilarityBackend, SimilarityLevel, SimilarityResult,
    SimilaritySearch,
};
