//! Source file discovery

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::parser::Language;

/// A file selected for extraction, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub relative_path: String,
    pub language: Language,
}

impl SourceFile {
    pub fn new(relative_path: &str) -> Self {
        let relative_path = normalize(Path::new(relative_path));
        let language = Language::from_path(Path::new(&relative_path));
        Self {
            relative_path,
            language,
        }
    }

    pub fn absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_path)
    }
}

/// Relative paths always use `/`, whatever the host separator.
pub fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}

fn build_matcher(root: &Path, exclude_patterns: &[String]) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);

    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists() {
        if let Some(err) = builder.add(&gitignore_path) {
            warn!("Ignoring malformed .gitignore: {}", err);
        }
    }
    for pattern in exclude_patterns {
        if let Err(err) = builder.add_line(None, pattern) {
            warn!("Ignoring exclude pattern {:?}: {}", pattern, err);
        }
    }

    builder.build().unwrap_or_else(|err| {
        warn!("Failed to build ignore rules: {}", err);
        Gitignore::empty()
    })
}

/// Collect every supported source file under `root`, sorted by path.
///
/// Hidden entries, `.gitignore` matches and `exclude_patterns` are skipped.
/// Unreadable directories are logged and skipped.
pub fn collect_files(root: &Path, exclude_patterns: &[String]) -> Vec<SourceFile> {
    let matcher = build_matcher(root, exclude_patterns);
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            !matcher
                .matched(e.path(), e.file_type().is_dir())
                .is_ignore()
        })
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let language = Language::from_path(entry.path());
        if language == Language::Unknown {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(SourceFile {
            relative_path: normalize(relative),
            language,
        });
    }

    debug!("Discovered {} source files under {}", files.len(), root.display());
    files
}

/// Resolve a changed-file set against `root`.
///
/// Deleted, unsupported and excluded paths are dropped; the caller still
/// treats them as changed so their old entries disappear.
pub fn changed_sources(root: &Path, changed: &[String], exclude_patterns: &[String]) -> Vec<SourceFile> {
    let matcher = build_matcher(root, exclude_patterns);
    let mut files: Vec<SourceFile> = changed
        .iter()
        .map(|path| SourceFile::new(path))
        .filter(|file| {
            let relative = Path::new(&file.relative_path);
            if relative.is_absolute()
                || relative
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                warn!("Ignoring changed path outside the project: {}", file.relative_path);
                return false;
            }
            file.language != Language::Unknown
                && file.absolute(root).is_file()
                && !matcher
                    .matched_path_or_any_parents(relative, false)
                    .is_ignore()
        })
        .collect();

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_collect_files_honours_excludes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "src/lib.rs");
        touch(root, "src/util.py");
        touch(root, "README.md");
        touch(root, "node_modules/pkg/index.js");
        touch(root, ".hidden/secret.rs");
        touch(root, "generated/out.ts");
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();

        let files = collect_files(root, &["node_modules".to_string()]);
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();

        assert_eq!(paths, vec!["src/lib.rs", "src/util.py"]);
        assert_eq!(files[0].language, Language::Rust);
    }

    #[test]
    fn test_changed_sources_drops_deleted_and_excluded() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "src/a.rs");
        touch(root, "vendor/b.rs");

        let changed = vec![
            "src/a.rs".to_string(),
            "src/deleted.rs".to_string(),
            "vendor/b.rs".to_string(),
            "notes.txt".to_string(),
            "../outside.rs".to_string(),
            "src/a.rs".to_string(),
        ];
        let files = changed_sources(root, &changed, &["vendor".to_string()]);
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.rs"]);
    }

    #[test]
    fn test_source_file_normalizes_path() {
        let file = SourceFile::new("./src/app.tsx");
        assert_eq!(file.relative_path, "src/app.tsx");
        assert_eq!(file.language, Language::Tsx);
    }
}
