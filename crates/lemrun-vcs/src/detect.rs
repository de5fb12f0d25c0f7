use std::path::{Path, PathBuf};

use lemrun_core::VcsType;

/// Find the nearest enclosing repository of `path` by looking for `.jj` or `.git`.
///
/// A directory holding both (a colocated jj repo) reports jj. `path` may name a
/// file; the search then starts at its parent. Returns the marker's directory.
pub fn detect_repository(path: &Path) -> Option<(VcsType, PathBuf)> {
    let start = if path.is_dir() { path } else { path.parent()? };
    for dir in start.ancestors() {
        if dir.join(".jj").is_dir() {
            return Some((VcsType::Jj, dir.to_path_buf()));
        }
        // `.git` is a file in worktrees and submodules.
        if dir.join(".git").exists() {
            return Some((VcsType::Git, dir.to_path_buf()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_nearest_marker_from_file() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("model");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::create_dir_all(repo.join("drivers")).unwrap();
        let script = repo.join("drivers").join("sim.py");
        std::fs::write(&script, "print('x')").unwrap();

        let (kind, root) = detect_repository(&script).unwrap();
        assert_eq!(kind, VcsType::Git);
        assert_eq!(root, repo);
    }

    #[test]
    fn colocated_reports_jj() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::create_dir_all(dir.path().join(".jj")).unwrap();
        let (kind, _) = detect_repository(dir.path()).unwrap();
        assert_eq!(kind, VcsType::Jj);
    }

    #[test]
    fn plain_directory_has_no_repository() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("a").join("b");
        std::fs::create_dir_all(&inner).unwrap();
        // tempdir may itself live inside a checkout; only assert nothing below it matched.
        if let Some((_, root)) = detect_repository(&inner) {
            assert!(!root.starts_with(dir.path()));
        }
    }
}
