use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;

use crate::commands::CommandReport;
use crate::mirror::git;
use crate::mirror::lock::RunLock;
use crate::mirror::paths::{MirrorPaths, resolve_paths};

fn remove_entry(path: &Path) -> Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.with_context(|| format!("failed to remove {}", path.display()))
}

fn backup_first(paths: &MirrorPaths, report: &mut CommandReport) -> bool {
    let Ok(bin) = git::resolve_git_bin() else {
        report.detail("git unavailable; skipping backup branch");
        return true;
    };
    match git::is_work_tree(&bin, &paths.root) {
        Ok(true) => {}
        Ok(false) => {
            report.detail("not a git work tree; skipping backup branch");
            return true;
        }
        Err(err) => {
            report.issue(format!("git probe failed: {err:#}"));
            return false;
        }
    }
    match git::create_backup_branch(&bin, &paths.root, Utc::now()) {
        Ok(branch) => {
            report.detail(format!("created backup branch {branch}"));
            true
        }
        Err(err) => {
            report.issue(format!("backup failed, nothing removed: {err:#}"));
            false
        }
    }
}

pub fn run(yes: bool) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("reset");

    let present = paths
        .generated_entries()
        .into_iter()
        .filter(|p| p.exists())
        .map(Path::to_path_buf)
        .collect::<Vec<_>>();
    if present.is_empty() {
        report.detail("nothing to remove");
        return Ok(report);
    }

    if !yes {
        for path in &present {
            report.detail(format!("would remove {}", path.display()));
        }
        report.detail("rerun with --yes to remove");
        return Ok(report);
    }

    let _lock = RunLock::acquire(&paths)?;
    if !backup_first(&paths, &mut report) {
        return Ok(report);
    }
    for path in &present {
        match remove_entry(path) {
            Ok(()) => report.detail(format!("removed {}", path.display())),
            Err(err) => report.issue(format!("{err:#}")),
        }
    }
    Ok(report)
}
