use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Context, Result};

use crate::types::RevisionAdapter;

/// Shared adapter contract suite, run against both the git and jj adapters.
///
/// `repo_root` must be a clean checkout with at least one commit and a `README.md`.
pub fn run_revision_contract_suite(adapter: &dyn RevisionAdapter, repo_root: &Path) -> Result<()> {
    if !adapter.is_clean(repo_root)? {
        return Err(anyhow!("repo root must be clean for contract tests"));
    }

    let first = adapter.current_revision(repo_root)?;
    if first.is_empty() {
        return Err(anyhow!("expected non-empty revision"));
    }
    let second = adapter.current_revision(repo_root)?;
    if first != second {
        return Err(anyhow!("revision changed between calls: {first} vs {second}"));
    }

    let nested = repo_root.join("nested").join("deeper");
    std::fs::create_dir_all(&nested)?;
    let root = adapter.repo_root(&nested)?;
    let want = repo_root.canonicalize()?;
    if root.canonicalize()? != want {
        return Err(anyhow!("repo_root from subdirectory resolved to {}", root.display()));
    }

    std::fs::write(repo_root.join("README.md"), "changed")?;
    if adapter.is_clean(repo_root)? {
        return Err(anyhow!("expected dirty tree after editing a tracked file"));
    }
    Ok(())
}

/// Initialize a minimal git repo fixture with one commit.
pub fn init_git_repo(dir: &Path) -> Result<()> {
    run(dir, &["git", "init"])?;
    run(dir, &["git", "config", "user.email", "lemrun@example.com"])?;
    run(dir, &["git", "config", "user.name", "lemrun"])?;
    run(dir, &["git", "config", "commit.gpgsign", "false"])?;
    std::fs::write(dir.join("README.md"), "fixture")?;
    run(dir, &["git", "add", "."])?;
    run(dir, &["git", "commit", "-m", "init"])?;
    Ok(())
}

/// Write `name` with `contents` and commit it.
pub fn commit_file(dir: &Path, name: &str, contents: &str) -> Result<()> {
    std::fs::write(dir.join(name), contents)?;
    run(dir, &["git", "add", name])?;
    run(dir, &["git", "commit", "-m", &format!("add {name}")])?;
    Ok(())
}

/// `git rev-parse HEAD`, for asserting against what the adapters report.
pub fn git_head(dir: &Path) -> Result<String> {
    run(dir, &["git", "rev-parse", "HEAD"])
}

fn run(dir: &Path, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(args[0]);
    cmd.args(&args[1..]).current_dir(dir);
    let out = cmd.output().with_context(|| format!("run {:?}", args))?;
    if !out.status.success() {
        return Err(anyhow!("command failed: {:?}\nstdout:{}\nstderr:{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
