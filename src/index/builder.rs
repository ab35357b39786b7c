//! Index construction
//!
//! Drives files through extraction and embedding and persists the result.
//! Full and incremental builds share one pipeline: an incremental build
//! starts from a baseline index, carries entries for unchanged files over
//! and recomputes only the changed files.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::scan::{self, SourceFile};
use super::{index_path, Index, IndexEntry};
use crate::config::IndexConfig;
use crate::core::metrics::LineMetrics;
use crate::core::parser::{CodeParser, FileExtraction};
use crate::core::unit::CodeUnit;
use crate::embeddings::{EmbeddingProvider, EmbeddingVector};
use crate::error::{EmbeddingCallError, ExtractionError, PersistenceError, ProviderError};

/// Re-embedding rounds allowed after a provider switch.
const MAX_RECONCILE_ROUNDS: usize = 3;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub root: PathBuf,
    pub index_dir: String,
    pub exclude_patterns: Vec<String>,
    pub max_file_size_mb: u32,
    /// Maximum number of in-flight embedding calls
    pub concurrency: usize,
    /// Ignore any existing index
    pub force: bool,
    /// Relative paths that changed since the baseline. `None` means full build.
    pub changed_files: Option<Vec<String>>,
}

impl BuildOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &IndexConfig::default())
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &IndexConfig) -> Self {
        Self {
            root: root.into(),
            index_dir: config.directory.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            max_file_size_mb: config.max_file_size_mb,
            concurrency: config.concurrency,
            force: false,
            changed_files: None,
        }
    }

    pub fn with_changed_files(mut self, files: Vec<String>) -> Self {
        self.changed_files = Some(files);
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Cooperative cancellation for a build.
///
/// Once cancelled, no new embedding calls are issued. Calls already in
/// flight finish or fail on their own.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildState {
    #[default]
    Idle,
    Scanning,
    Extracting,
    Embedding,
    Assembling,
    Persisted,
    /// Persisted with some units omitted (failed embeddings or cancellation)
    PersistedPartial,
    Failed,
}

impl BuildState {
    pub fn label(&self) -> &'static str {
        match self {
            BuildState::Idle => "idle",
            BuildState::Scanning => "scanning",
            BuildState::Extracting => "extracting",
            BuildState::Embedding => "embedding",
            BuildState::Assembling => "assembling",
            BuildState::Persisted => "persisted",
            BuildState::PersistedPartial => "persisted (partial)",
            BuildState::Failed => "failed",
        }
    }
}

/// Progress notifications for interactive front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEvent {
    State(BuildState),
    FilesFound(usize),
    EmbeddingStarted(usize),
    UnitEmbedded,
}

type Observer = Arc<dyn Fn(BuildEvent) + Send + Sync>;

/// Everything recoverable that happened during a build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub state: BuildState,
    pub full_rebuild: bool,
    pub files_scanned: usize,
    pub files_extracted: usize,
    pub units_extracted: usize,
    /// Units carried over from the baseline without re-embedding
    pub units_reused: usize,
    pub units_embedded: usize,
    /// Units never sent because the build was cancelled
    pub units_cancelled: usize,
    pub line_metrics: LineMetrics,
    pub extraction_errors: Vec<ExtractionError>,
    pub embedding_errors: Vec<EmbeddingCallError>,
    pub provider_name: String,
    pub dimension: usize,
    pub duration: Duration,
}

impl BuildReport {
    pub fn is_partial(&self) -> bool {
        !self.embedding_errors.is_empty() || self.units_cancelled > 0
    }
}

#[derive(Debug)]
pub struct BuildOutcome {
    /// The persisted index, absent when the build failed before persisting
    pub index: Option<Index>,
    pub report: BuildReport,
    pub index_path: PathBuf,
}

struct PendingUnit {
    unit: CodeUnit,
    text: String,
}

/// Baseline entries for files outside the changed set.
struct Carried {
    provider_name: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl Carried {
    fn none() -> Self {
        Self {
            provider_name: String::new(),
            dimension: 0,
            entries: Vec::new(),
        }
    }

    fn in_space(&self, provider_name: &str, dimension: usize) -> bool {
        self.provider_name == provider_name && self.dimension == dimension
    }
}

pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    options: BuildOptions,
    state: Mutex<BuildState>,
    observer: Option<Observer>,
}

impl IndexBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: BuildOptions) -> Self {
        Self {
            provider,
            options,
            state: Mutex::new(BuildState::Idle),
            observer: None,
        }
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(BuildEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn state(&self) -> BuildState {
        *self.state.lock()
    }

    pub fn index_path(&self) -> PathBuf {
        index_path(&self.options.root, &self.options.index_dir)
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn enter(&self, state: BuildState, report: &mut BuildReport) {
        *self.state.lock() = state;
        report.state = state;
        debug!("Build state: {}", state.label());
        self.emit(BuildEvent::State(state));
    }

    /// Run a build. Only a failure to write the index is returned as an error;
    /// everything else is recorded in the report.
    pub async fn build(&self, cancel: &CancelToken) -> Result<BuildOutcome, PersistenceError> {
        let started = Instant::now();
        let mut report = BuildReport::default();
        let index_path = self.index_path();

        self.enter(BuildState::Scanning, &mut report);
        let (files, mut carried) = self.plan(&index_path, &mut report);
        report.files_scanned = files.len();
        self.emit(BuildEvent::FilesFound(files.len()));

        self.enter(BuildState::Extracting, &mut report);
        let pending = self.extract(files, &mut report).await;

        self.enter(BuildState::Embedding, &mut report);
        self.emit(BuildEvent::EmbeddingStarted(pending.len()));
        let mut fresh = self.embed(pending, cancel, &mut report).await;

        // Failover is one-way, so this settles after at most a couple of rounds.
        let mut round = 0;
        let (target_name, target_dimension) = loop {
            let target_name = self.provider.name();
            let target_dimension = self.provider.dimension();

            let mut requeue: Vec<(PendingUnit, String)> = Vec::new();

            if !carried.entries.is_empty() && !carried.in_space(&target_name, target_dimension) {
                info!(
                    "Embedding provider is now {}; recomputing {} units carried from {}",
                    target_name,
                    carried.entries.len(),
                    carried.provider_name
                );
                let files: BTreeSet<String> = carried
                    .entries
                    .drain(..)
                    .map(|e| e.unit.file_path)
                    .collect();
                let sources: Vec<SourceFile> = files.iter().map(|f| SourceFile::new(f)).collect();
                requeue.extend(
                    self.extract(sources, &mut report)
                        .await
                        .into_iter()
                        .map(|p| (p, carried.provider_name.clone())),
                );
            }

            let (kept, stale): (Vec<_>, Vec<_>) = fresh.into_iter().partition(|(_, vector)| {
                vector.provider_name == target_name && vector.dimension == target_dimension
            });
            fresh = kept;
            requeue.extend(stale.into_iter().map(|(p, v)| (p, v.provider_name)));

            if requeue.is_empty() {
                break (target_name, target_dimension);
            }

            if round == MAX_RECONCILE_ROUNDS || cancel.is_cancelled() {
                warn!(
                    "Dropping {} units embedded outside the {} space",
                    requeue.len(),
                    target_name
                );
                for (pending, produced_by) in requeue {
                    report.embedding_errors.push(call_error(
                        &pending.unit,
                        ProviderError::ProviderSwitched {
                            produced_by,
                            active: target_name.clone(),
                        },
                    ));
                }
                break (target_name, target_dimension);
            }

            round += 1;
            debug!("Re-embedding {} units (round {})", requeue.len(), round);
            let pending = requeue.into_iter().map(|(p, _)| p).collect();
            fresh.extend(self.embed(pending, cancel, &mut report).await);
        };

        report.provider_name = target_name.clone();
        report.dimension = target_dimension;

        let attempted = fresh.len() + report.embedding_errors.len();
        let unavailable = report.embedding_errors.iter().any(|e| e.source.is_unavailable());
        if attempted > 0 && fresh.is_empty() && carried.entries.is_empty() && unavailable {
            error!("No embedding backend could embed any unit; keeping the previous index");
            self.enter(BuildState::Failed, &mut report);
            report.duration = started.elapsed();
            return Ok(BuildOutcome {
                index: None,
                report,
                index_path,
            });
        }

        self.enter(BuildState::Assembling, &mut report);
        report.units_reused = carried.entries.len();
        report.units_embedded = fresh.len();

        let mut entries = carried.entries;
        entries.extend(fresh.into_iter().map(|(pending, vector)| IndexEntry {
            unit: pending.unit,
            vector: vector.values,
        }));

        // Units left out here would otherwise never come back through an
        // incremental build, so such an index is not a baseline.
        let complete = !cancel.is_cancelled() && !report.is_partial();
        let index = Index::new(&target_name, target_dimension, complete, entries);

        if let Err(err) = index.save(&index_path).await {
            error!("Failed to persist index: {}", err);
            self.enter(BuildState::Failed, &mut report);
            return Err(err);
        }

        let state = if report.is_partial() {
            BuildState::PersistedPartial
        } else {
            BuildState::Persisted
        };
        self.enter(state, &mut report);
        report.duration = started.elapsed();

        info!(
            "Indexed {} units ({} embedded, {} reused) with {}",
            index.len(),
            report.units_embedded,
            report.units_reused,
            report.provider_name
        );

        Ok(BuildOutcome {
            index: Some(index),
            report,
            index_path,
        })
    }

    /// Decide between a full and an incremental build.
    fn plan(&self, index_path: &Path, report: &mut BuildReport) -> (Vec<SourceFile>, Carried) {
        let options = &self.options;

        if let Some(changed) = &options.changed_files {
            if let Some(baseline) = self.usable_baseline(index_path) {
                let changed_set: HashSet<String> = changed
                    .iter()
                    .map(|p| SourceFile::new(p).relative_path)
                    .collect();
                let files = scan::changed_sources(&options.root, changed, &options.exclude_patterns);

                let entries: Vec<IndexEntry> = baseline
                    .entries
                    .into_iter()
                    .filter(|e| !changed_set.contains(&e.unit.file_path))
                    .collect();

                debug!(
                    "Incremental build: {} changed files, {} carried entries",
                    files.len(),
                    entries.len()
                );
                return (
                    files,
                    Carried {
                        provider_name: baseline.provider_name,
                        dimension: baseline.dimension,
                        entries,
                    },
                );
            }
        }

        report.full_rebuild = true;
        let files = scan::collect_files(&options.root, &options.exclude_patterns);
        (files, Carried::none())
    }

    fn usable_baseline(&self, index_path: &Path) -> Option<Index> {
        if self.options.force {
            return None;
        }

        let baseline = match Index::load_or_none(index_path) {
            Some(baseline) => baseline,
            None => {
                info!("No usable index found; running a full build");
                return None;
            }
        };

        let name = self.provider.name();
        let dimension = self.provider.dimension();
        if baseline.provider_name != name || baseline.dimension != dimension {
            info!(
                "Index was built with {} ({} dims), provider is {} ({} dims); running a full build",
                baseline.provider_name, baseline.dimension, name, dimension
            );
            return None;
        }
        if !baseline.complete {
            info!("Previous build left units out; running a full build");
            return None;
        }

        Some(baseline)
    }

    /// Extract all files on the blocking pool.
    async fn extract(&self, files: Vec<SourceFile>, report: &mut BuildReport) -> Vec<PendingUnit> {
        let root = self.options.root.clone();
        let max_file_size_mb = self.options.max_file_size_mb;
        let languages: Vec<String> = files.iter().map(|f| f.language.to_string()).collect();

        let results = match tokio::task::spawn_blocking(move || {
            extract_all(&root, &files, max_file_size_mb)
        })
        .await
        {
            Ok(results) => results,
            Err(err) => {
                error!("Extraction worker failed: {}", err);
                languages
                    .into_iter()
                    .map(|language| {
                        Err(ExtractionError::Parser {
                            language,
                            message: err.to_string(),
                        })
                    })
                    .collect()
            }
        };

        let mut pending = Vec::new();
        for result in results {
            match result {
                Ok(extraction) => {
                    report.files_extracted += 1;
                    report.units_extracted += extraction.units.len();
                    report.line_metrics.add(&extraction.metrics);
                    pending.extend(extraction.units_with_text().map(|(unit, text)| PendingUnit {
                        unit: unit.clone(),
                        text,
                    }));
                }
                Err(err) => {
                    warn!("{}", err);
                    report.extraction_errors.push(err);
                }
            }
        }

        pending
    }

    /// Embed `pending` through a bounded pool. Completion order is irrelevant.
    async fn embed(
        &self,
        pending: Vec<PendingUnit>,
        cancel: &CancelToken,
        report: &mut BuildReport,
    ) -> Vec<(PendingUnit, EmbeddingVector)> {
        let provider = &self.provider;

        let results: Vec<(PendingUnit, Result<EmbeddingVector, ProviderError>)> = stream::iter(pending)
            .map(|pending| async move {
                if cancel.is_cancelled() {
                    return (pending, Err(ProviderError::Cancelled));
                }
                let result = provider
                    .generate_embedding(&pending.text)
                    .await
                    .and_then(|embedding| EmbeddingVector::new(&pending.unit.id, embedding));
                self.emit(BuildEvent::UnitEmbedded);
                (pending, result)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut embedded = Vec::with_capacity(results.len());
        for (pending, result) in results {
            match result {
                Ok(vector) => embedded.push((pending, vector)),
                Err(ProviderError::Cancelled) => report.units_cancelled += 1,
                Err(err) => {
                    debug!("Embedding failed for {}: {}", pending.unit.symbol_name, err);
                    report.embedding_errors.push(call_error(&pending.unit, err));
                }
            }
        }

        embedded
    }
}

/// Extract files in parallel, one parser per worker thread.
fn extract_all(
    root: &Path,
    files: &[SourceFile],
    max_file_size_mb: u32,
) -> Vec<Result<FileExtraction, ExtractionError>> {
    files
        .par_iter()
        .map_init(CodeParser::new, |parser, file| match parser {
            Ok(parser) => {
                parser.extract_file(root, &file.relative_path, file.language, max_file_size_mb)
            }
            Err(err) => Err(ExtractionError::Parser {
                language: file.language.to_string(),
                message: err.to_string(),
            }),
        })
        .collect()
}

fn call_error(unit: &CodeUnit, source: ProviderError) -> EmbeddingCallError {
    EmbeddingCallError {
        unit_id: unit.id.clone(),
        file_path: unit.file_path.clone(),
        symbol_name: unit.symbol_name.clone(),
        source,
    }
}
