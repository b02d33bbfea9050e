use crate::mirror::paths::MirrorPaths;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Fetch,
    Merge,
    Render,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub at_epoch_secs: i64,
    pub phase: Phase,
    pub status: Status,
    pub message: String,
}

pub fn append_event(paths: &MirrorPaths, phase: Phase, status: Status, message: &str) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let event = AuditEvent {
        at_epoch_secs: Utc::now().timestamp(),
        phase,
        status,
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = paths.logs_dir.join("audit.log");
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Audit logging never fails a run; a broken log only produces a warning.
pub fn record(paths: &MirrorPaths, phase: Phase, status: Status, message: &str) {
    if let Err(err) = append_event(paths, phase, status, message) {
        crate::mirror::warn::emit(
            "AUDIT_WRITE",
            "audit",
            "continue",
            &paths.logs_dir.display().to_string(),
            &format!("{err:#}"),
        );
    }
}
