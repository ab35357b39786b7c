//! CLI command implementations

pub mod dupes;
pub mod index;
pub mod info;
pub mod search;
pub mod ui;

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use codesim::config::Config;
use codesim::core::{CodeParser, FileExtraction, Language};
use codesim::index::scan::normalize;
use codesim::index::{index_path, Index};

/// Resolve the project root, defaulting to the current directory.
pub fn project_root(path: Option<&str>) -> Result<PathBuf> {
    let path = Path::new(path.unwrap_or("."));
    path.canonicalize()
        .with_context(|| format!("Invalid path: {}", path.display()))
}

/// Load the index for `root`, or explain how to create one.
pub fn load_index(root: &Path, config: &Config) -> Result<Index> {
    let path = index_path(root, &config.index.directory);
    match Index::load_or_none(&path) {
        Some(index) => Ok(index),
        None => bail!(
            "No index found at {}. Run `codesim index` first.",
            path.display()
        ),
    }
}

/// Path of `file` relative to `root`, in index form.
pub fn relative_to_root(root: &Path, file: &str) -> Result<String> {
    let absolute = Path::new(file)
        .canonicalize()
        .with_context(|| format!("File not found: {}", file))?;
    let relative = absolute
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", file, root.display()))?;
    Ok(normalize(relative))
}

/// Extract `relative` under `root` on the spot.
pub fn extract(root: &Path, relative: &str, config: &Config) -> Result<FileExtraction> {
    let language = Language::from_path(Path::new(relative));
    if language == Language::Unknown {
        bail!("Unsupported file type: {}", relative);
    }

    let mut parser = CodeParser::new().context("Failed to initialize code parser")?;
    parser
        .extract_file(root, relative, language, config.index.max_file_size_mb)
        .with_context(|| format!("Failed to extract {}", relative))
}
