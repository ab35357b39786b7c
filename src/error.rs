//! Error types for extraction, embedding, persistence and queries
//!
//! Recoverable errors (extraction, per-unit embedding) are collected into a
//! build report instead of being propagated. Only persistence and
//! configuration failures abort a build.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to extract code units from a single file.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is larger than the {limit_mb} MB limit")]
    TooLarge { path: PathBuf, limit_mb: u32 },

    #[error("failed to initialize {language} parser: {message}")]
    Parser { language: String, message: String },

    #[error("syntax errors in {path} (first at line {line})")]
    Syntax { path: PathBuf, line: usize },

    #[error("tree-sitter produced no tree for {path}")]
    NoTree { path: PathBuf },
}

impl ExtractionError {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ExtractionError::Read { path, .. }
            | ExtractionError::TooLarge { path, .. }
            | ExtractionError::Syntax { path, .. }
            | ExtractionError::NoTree { path } => Some(path),
            ExtractionError::Parser { .. } => None,
        }
    }
}

/// Failure of a single embedding call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("no embedding provider available ({0})")]
    Unavailable(String),

    #[error("provider {0} is not configured")]
    Unconfigured(String),

    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} request timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("{provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },

    #[error("{provider} returned an empty embedding")]
    EmptyEmbedding { provider: String },

    #[error("{provider} returned {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        provider: String,
        expected: usize,
        actual: usize,
    },

    #[error("embedding from {produced_by} discarded, index space is {active}")]
    ProviderSwitched { produced_by: String, active: String },

    #[error("cancelled before the call was issued")]
    Cancelled,
}

impl ProviderError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_) | ProviderError::Unconfigured(_))
    }
}

/// A unit that was omitted from the index because its embedding failed.
#[derive(Debug, Clone, Error)]
#[error("embedding failed for {symbol_name} ({file_path}): {source}")]
pub struct EmbeddingCallError {
    pub unit_id: String,
    pub file_path: String,
    pub symbol_name: String,
    #[source]
    pub source: ProviderError,
}

/// Failure while writing the index. The previous index on disk is untouched.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create index directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to replace {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A persisted index that cannot be used. Callers treat this as "no index".
#[derive(Debug, Error)]
pub enum IndexFormatError {
    #[error("failed to read index: {0}")]
    Read(#[from] std::io::Error),

    #[error("index document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("unsupported index format {found} (expected major version {expected})")]
    VersionMismatch { found: String, expected: u32 },

    #[error("entry {unit_id} has {actual} dimensions, index declares {expected}")]
    MixedDimensions {
        unit_id: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query has {actual} dimensions, index has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("query embedded by {query}, index was built with {index}")]
    ProviderMismatch { query: String, index: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("unit {0} is not in the index")]
    UnitNotIndexed(String),

    #[error("threshold {0} must be between 0 and 1")]
    InvalidThreshold(f32),

    #[error(transparent)]
    Search(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),
}

/// Failure to compute a changed-file set from version control.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git: {0}")]
    Git(#[from] git2::Error),

    #[error("repository at {0} has no working directory")]
    Bare(PathBuf),

    #[error("failed to resolve {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
