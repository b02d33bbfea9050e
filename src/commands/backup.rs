use anyhow::Result;
use chrono::Utc;

use crate::commands::CommandReport;
use crate::mirror::git;
use crate::mirror::paths::resolve_paths;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("backup");

    let bin = git::resolve_git_bin()?;
    match git::create_backup_branch(&bin, &paths.root, Utc::now()) {
        Ok(branch) => report.detail(format!("created branch {branch}")),
        Err(err) => report.issue(format!("backup failed: {err:#}")),
    }
    Ok(report)
}
