use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn resolve_git_bin() -> Result<PathBuf> {
    if let Ok(raw) = env::var("DEVTO_MIRROR_GIT_BIN")
        && !raw.trim().is_empty()
    {
        let bin = PathBuf::from(raw.trim());
        if bin.exists() {
            return Ok(bin);
        }
    }
    which::which("git").context("git binary not found in DEVTO_MIRROR_GIT_BIN or PATH")
}

/// `backup/<UTC timestamp>`, using only characters git accepts in refs.
pub fn backup_branch_name(at: DateTime<Utc>) -> String {
    format!("backup/{}", at.format("%Y%m%dT%H%M%SZ"))
}

fn run_git(bin: &Path, repo: &Path, args: &[&str]) -> Result<Output> {
    Command::new(bin)
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .with_context(|| format!("failed to run `{} {}`", bin.display(), args.join(" ")))
}

pub fn is_work_tree(bin: &Path, repo: &Path) -> Result<bool> {
    if !repo.is_dir() {
        return Ok(false);
    }
    let output = run_git(bin, repo, &["rev-parse", "--verify", "--quiet", "HEAD"])?;
    Ok(output.status.success())
}

/// Point a new branch at the current commit of `repo`. Existing branches
/// are never moved or deleted.
pub fn create_backup_branch(bin: &Path, repo: &Path, at: DateTime<Utc>) -> Result<String> {
    if !is_work_tree(bin, repo)? {
        anyhow::bail!("{} is not inside a git work tree with commits", repo.display());
    }

    let branch = backup_branch_name(at);
    let output = run_git(bin, repo, &["branch", &branch, "HEAD"])?;
    if !output.status.success() {
        anyhow::bail!(
            "git branch {branch} failed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(branch)
}
