use std::path::{Path, PathBuf};

use lemrun_core::{repo_label, JobSpec, LaunchError, VcsType};
use lemrun_vcs::{detect_repository, RevisionAdapter};
use lemrun_vcs_git::GitAdapter;
use lemrun_vcs_jj::JjAdapter;
use serde::{Deserialize, Serialize};

pub fn adapter_for(vcs: VcsType) -> Box<dyn RevisionAdapter> {
    match vcs {
        VcsType::Git => Box::new(GitAdapter::new()),
        VcsType::Jj => Box::new(JjAdapter::new()),
    }
}

/// How a tracked repository gets its label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelFrom {
    /// Name of the repository's top-level directory (the driver's repo).
    RepoRoot,
    /// Last component of the path as written in the job spec.
    GivenPath,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedPath {
    pub path: PathBuf,
    pub label_from: LabelFrom,
}

/// The driver's owning repository first, then the extra repositories in order.
pub fn tracked_paths(job: &JobSpec) -> Vec<TrackedPath> {
    let mut out = vec![TrackedPath {
        path: job.driver_script_path.clone(),
        label_from: LabelFrom::RepoRoot,
    }];
    out.extend(job.extra_repo_paths.iter().map(|p| TrackedPath {
        path: p.clone(),
        label_from: LabelFrom::GivenPath,
    }));
    out
}

/// One resolved revision, as recorded in `run_record.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoProvenance {
    pub label: String,
    pub path: PathBuf,
    pub repo_root: PathBuf,
    pub vcs: VcsType,
    pub revision: String,
    pub dirty: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvenanceReport {
    pub repositories: Vec<RepoProvenance>,
    /// Repositories skipped under the warn policy, one message each.
    pub warnings: Vec<String>,
}

/// Resolve the label and current revision of the repository holding `tracked.path`.
pub fn resolve_revision(tracked: &TrackedPath) -> Result<RepoProvenance, LaunchError> {
    let path = &tracked.path;
    let unavailable = |reason: String| LaunchError::ProvenanceUnavailable { path: path.clone(), reason };

    if !path.exists() {
        return Err(unavailable("path does not exist".into()));
    }
    let (mut vcs, root) = detect_repository(path)
        .ok_or_else(|| unavailable("not inside a git or jj repository".into()))?;

    let label_source: &Path = match tracked.label_from {
        LabelFrom::RepoRoot => &root,
        LabelFrom::GivenPath => path,
    };
    let label = repo_label(label_source)
        .ok_or_else(|| unavailable(format!("cannot derive a label from {}", label_source.display())))?;

    let mut adapter = adapter_for(vcs);
    let revision = match adapter.current_revision(&root) {
        Ok(rev) => rev,
        // Colocated checkout: git can still answer when jj is missing or fails.
        Err(jj_err) if vcs == VcsType::Jj && root.join(".git").exists() => {
            tracing::debug!(repo = %root.display(), "jj lookup failed, trying git: {jj_err:#}");
            let git = adapter_for(VcsType::Git);
            let rev = git.current_revision(&root).map_err(|git_err| {
                unavailable(format!("jj: {jj_err:#}; git: {git_err:#}"))
            })?;
            vcs = VcsType::Git;
            adapter = git;
            rev
        }
        Err(e) => return Err(unavailable(format!("{e:#}"))),
    };
    // A dirty tree still runs; the flag only lands in the record.
    let dirty = match adapter.is_clean(&root) {
        Ok(clean) => !clean,
        Err(e) => {
            tracing::warn!(repo = %root.display(), "could not check working tree state: {e:#}");
            false
        }
    };

    Ok(RepoProvenance { label, path: path.clone(), repo_root: root, vcs, revision, dirty })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemrun_vcs::contract::{git_head, init_git_repo};
    use tempfile::tempdir;

    #[test]
    fn colocated_repo_falls_back_to_git() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("landlab");
        std::fs::create_dir_all(&repo).unwrap();
        init_git_repo(&repo).unwrap();
        // An empty `.jj` is not a usable jj repo, whether or not jj is installed.
        std::fs::create_dir_all(repo.join(".jj")).unwrap();

        let tracked = TrackedPath { path: repo.clone(), label_from: LabelFrom::GivenPath };
        let prov = resolve_revision(&tracked).unwrap();

        assert_eq!(prov.vcs, VcsType::Git);
        assert_eq!(prov.label, "landlab");
        assert_eq!(prov.revision, git_head(&repo).unwrap());
    }

    #[test]
    fn unversioned_directory_is_unavailable() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain");
        std::fs::create_dir_all(&plain).unwrap();

        let tracked = TrackedPath { path: plain, label_from: LabelFrom::GivenPath };
        assert!(matches!(
            resolve_revision(&tracked),
            Err(LaunchError::ProvenanceUnavailable { .. })
        ));
    }
}
