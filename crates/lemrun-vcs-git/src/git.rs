use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use lemrun_core::VcsType;
use lemrun_vcs::{RevId, RevisionAdapter};

#[derive(Clone, Debug, Default)]
pub struct GitAdapter;

impl GitAdapter {
    pub fn new() -> Self {
        Self
    }

    fn run(repo: &Path, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(args[0]);
        cmd.args(&args[1..]).current_dir(repo);
        let out = cmd.output().with_context(|| format!("run {:?}", args))?;
        if !out.status.success() {
            return Err(anyhow!(
                "command failed: {:?}\nstdout:{}\nstderr:{}",
                args,
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl RevisionAdapter for GitAdapter {
    fn vcs_type(&self) -> VcsType {
        VcsType::Git
    }

    fn repo_root(&self, path: &Path) -> Result<PathBuf> {
        let dir = if path.is_dir() { path } else { path.parent().unwrap_or(path) };
        let top = Self::run(dir, &["git", "rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(top))
    }

    fn current_revision(&self, repo_root: &Path) -> Result<RevId> {
        // --verify fails cleanly on an unborn branch instead of echoing "HEAD".
        let rev = Self::run(repo_root, &["git", "rev-parse", "--verify", "HEAD"])
            .context("resolve HEAD")?;
        if rev.is_empty() {
            return Err(anyhow!("git rev-parse returned an empty revision"));
        }
        Ok(rev)
    }

    fn is_clean(&self, repo_root: &Path) -> Result<bool> {
        let out = Self::run(repo_root, &["git", "status", "--porcelain", "--untracked-files=no"])?;
        if !out.is_empty() {
            tracing::debug!(repo = %repo_root.display(), "git status: {out}");
        }
        Ok(out.is_empty())
    }
}
