//! Changed-file discovery from git

use git2::{DiffOptions, Repository};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::error::VcsError;
use crate::index::scan::normalize;

/// Files under `root` that differ between `rev` and the working tree
/// (staged, unstaged and untracked), relative to `root`.
///
/// Both sides of a rename are reported so the old path's entries are dropped.
pub fn changed_files_since(root: &Path, rev: &str) -> Result<Vec<String>, VcsError> {
    let repo = Repository::discover(root)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| VcsError::Bare(repo.path().to_path_buf()))?;
    let workdir = canonical(workdir)?;
    let root = canonical(root)?;

    let tree = repo.revparse_single(rev)?.peel_to_tree()?;

    let mut options = DiffOptions::new();
    options.include_untracked(true).recurse_untracked_dirs(true);
    let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), Some(&mut options))?;

    let mut changed = BTreeSet::new();
    for delta in diff.deltas() {
        for path in [delta.old_file().path(), delta.new_file().path()].into_iter().flatten() {
            let absolute = workdir.join(path);
            if let Ok(relative) = absolute.strip_prefix(&root) {
                changed.insert(normalize(relative));
            }
        }
    }

    debug!("{} files changed since {}", changed.len(), rev);
    Ok(changed.into_iter().collect())
}

fn canonical(path: &Path) -> Result<std::path::PathBuf, VcsError> {
    path.canonicalize().map_err(|source| VcsError::Path {
        path: path.to_path_buf(),
        source,
    })
}
