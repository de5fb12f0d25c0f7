use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use lemrun_core::VcsType;
use lemrun_vcs::{RevId, RevisionAdapter};

/// Revision lookup for Jujutsu checkouts (colocated or not).
///
/// The recorded revision is the commit id of the working-copy commit `@`. jj
/// snapshots the working copy on every command, so `@` reflects the files that
/// will actually run.
#[derive(Clone, Debug, Default)]
pub struct JjAdapter;

impl JjAdapter {
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

    fn ensure_jj_available() -> Result<()> {
        let out = Command::new("jj").arg("--version").output();
        match out {
            Ok(o) if o.status.success() => Ok(()),
            _ => Err(anyhow!("jj not found on PATH")),
        }
    }
}

impl RevisionAdapter for JjAdapter {
    fn vcs_type(&self) -> VcsType {
        VcsType::Jj
    }

    fn repo_root(&self, path: &Path) -> Result<PathBuf> {
        Self::ensure_jj_available()?;
        let dir = if path.is_dir() { path } else { path.parent().unwrap_or(path) };
        Ok(PathBuf::from(Self::run(dir, &["jj", "root"])?))
    }

    fn current_revision(&self, repo_root: &Path) -> Result<RevId> {
        Self::ensure_jj_available()?;
        let out = Self::run(repo_root, &["jj", "log", "-r", "@", "--no-graph", "-T", "commit_id"])?;
        let id = out.lines().next().unwrap_or("").trim().to_string();
        if id.is_empty() {
            return Err(anyhow!("jj log returned no commit id for @"));
        }
        Ok(id)
    }

    fn is_clean(&self, repo_root: &Path) -> Result<bool> {
        Self::ensure_jj_available()?;
        let out = Self::run(repo_root, &["jj", "diff", "-r", "@", "--summary"])?;
        Ok(out.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemrun_vcs::contract::{init_git_repo, run_revision_contract_suite};
    use tempfile::tempdir;

    fn jj_available() -> bool {
        Command::new("jj").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
    }

    #[test]
    fn jj_adapter_contract_if_available() {
        if !jj_available() {
            eprintln!("jj not available; skipping");
            return;
        }

        let dir = tempdir().unwrap();
        init_git_repo(dir.path()).unwrap();

        let out = Command::new("jj")
            .args(["git", "init", "--colocate"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        if !out.status.success() {
            eprintln!("jj git init failed; skipping\n{}", String::from_utf8_lossy(&out.stderr));
            return;
        }

        run_revision_contract_suite(&JjAdapter::new(), dir.path()).unwrap();
    }
}
