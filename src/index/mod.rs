//! The persisted similarity index
//!
//! One JSON document per project root. All vectors in a document come from a
//! single provider and share one dimension. Writes go to a temporary file
//! that is renamed over the previous document, so readers see either the old
//! index or the new one.

pub mod builder;
pub mod scan;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::unit::CodeUnit;
use crate::error::{IndexFormatError, PersistenceError};

pub use builder::{
    BuildEvent, BuildOptions, BuildOutcome, BuildReport, BuildState, CancelToken, IndexBuilder,
};

/// Current document format.
pub const FORMAT_VERSION: &str = "1.0";
const FORMAT_MAJOR: u32 = 1;

/// File name of the index document inside the index directory.
pub const INDEX_FILE: &str = "index.json";

/// A code unit together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub unit: CodeUnit,
    pub vector: Vec<f32>,
}

impl IndexEntry {
    pub fn id(&self) -> &str {
        &self.unit.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub format_version: String,
    pub provider_name: String,
    pub dimension: usize,
    /// False when the build that produced this index was cancelled or left
    /// units out. Such an index is never an incremental baseline.
    pub complete: bool,
    pub built_at: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: String,
}

impl Index {
    /// Assemble an index. Entries are put in `(file_path, start_line, id)` order.
    pub fn new(provider_name: &str, dimension: usize, complete: bool, mut entries: Vec<IndexEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.unit
                .file_path
                .cmp(&b.unit.file_path)
                .then(a.unit.start_line.cmp(&b.unit.start_line))
                .then(a.unit.id.cmp(&b.unit.id))
        });

        Self {
            format_version: FORMAT_VERSION.to_string(),
            provider_name: provider_name.to_string(),
            dimension,
            complete,
            built_at: Utc::now(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, unit_id: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.unit.id == unit_id)
    }

    pub fn entries_for_file<'a>(&'a self, file_path: &'a str) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        self.entries.iter().filter(move |e| e.unit.file_path == file_path)
    }

    /// Find a unit by file and symbol name.
    pub fn find_symbol(&self, file_path: &str, symbol_name: &str) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.unit.file_path == file_path && e.unit.symbol_name == symbol_name)
    }

    pub fn files(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.unit.file_path.as_str()).collect()
    }

    /// Check the invariants a loaded document must satisfy.
    pub fn validate(&self) -> Result<(), IndexFormatError> {
        check_version(&self.format_version)?;
        for entry in &self.entries {
            if entry.vector.len() != self.dimension {
                return Err(IndexFormatError::MixedDimensions {
                    unit_id: entry.unit.id.clone(),
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, IndexFormatError> {
        let probe: VersionProbe = serde_json::from_str(json)?;
        check_version(&probe.format_version)?;

        let index: Index = serde_json::from_str(json)?;
        index.validate()?;
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self, IndexFormatError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load the index at `path`; an absent or unusable document means "no index".
    pub fn load_or_none(path: &Path) -> Option<Self> {
        match Self::load(path) {
            Ok(index) => Some(index),
            Err(IndexFormatError::Read(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No index at {}", path.display());
                None
            }
            Err(err) => {
                warn!("Ignoring index at {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Write the document next to `path` without touching `path` itself.
    pub async fn stage(&self, path: &Path) -> Result<PathBuf, PersistenceError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PersistenceError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| PersistenceError::Write {
                path: tmp.clone(),
                source,
            })?;
        Ok(tmp)
    }

    /// Replace `path` with a staged document.
    pub async fn commit(staged: &Path, path: &Path) -> Result<(), PersistenceError> {
        tokio::fs::rename(staged, path)
            .await
            .map_err(|source| PersistenceError::Rename {
                path: path.to_path_buf(),
                source,
            })
    }

    pub async fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let staged = self.stage(path).await?;
        Self::commit(&staged, path).await?;
        debug!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }
}

fn check_version(found: &str) -> Result<(), IndexFormatError> {
    let major = found.split('.').next().and_then(|m| m.parse::<u32>().ok());
    if major == Some(FORMAT_MAJOR) {
        Ok(())
    } else {
        Err(IndexFormatError::VersionMismatch {
            found: found.to_string(),
            expected: FORMAT_MAJOR,
        })
    }
}

/// Location of the index document for a project root.
pub fn index_path(root: &Path, directory: &str) -> PathBuf {
    root.join(directory).join(INDEX_FILE)
}

/// Remove the index directory. Returns whether anything was removed.
pub fn clear(root: &Path, directory: &str) -> std::io::Result<bool> {
    let dir = root.join(directory);
    if !dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(&dir)?;
    Ok(true)
}
