use std::path::{Path, PathBuf};

use anyhow::Result;
use lemrun_core::VcsType;

pub type RevId = String;

/// Read-only view of a source-control checkout, enough to record provenance.
pub trait RevisionAdapter: Send + Sync {
    fn vcs_type(&self) -> VcsType;

    /// Top-level directory of the repository containing `path`.
    fn repo_root(&self, path: &Path) -> Result<PathBuf>;

    /// Revision the checkout is currently at. Never empty on success.
    fn current_revision(&self, repo_root: &Path) -> Result<RevId>;

    fn is_clean(&self, repo_root: &Path) -> Result<bool>;
}
