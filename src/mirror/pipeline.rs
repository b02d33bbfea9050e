use crate::mirror::archive::{self, Archive, MergeOutcome};
use crate::mirror::client::ArticleSource;
use crate::mirror::filter::filter_page;
use crate::mirror::ledger;
use crate::mirror::paths::MirrorPaths;
use crate::mirror::warn;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Everything a run reads before it starts and hands over when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorState {
    pub archive: Archive,
    pub watermark: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Incremental,
    Full,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub mode: RunMode,
    pub source: String,
    pub pages_requested: u32,
    pub fetched: usize,
    pub added: usize,
    pub updated: usize,
    pub stopped_early: bool,
    pub total: usize,
}

impl RunOutcome {
    pub fn merge(&self) -> MergeOutcome {
        MergeOutcome {
            added: self.added,
            updated: self.updated,
        }
    }

    /// An incremental run that found nothing past the watermark.
    pub fn nothing_new(&self) -> bool {
        self.mode == RunMode::Incremental && self.fetched == 0
    }
}

/// A forced full run never reads the ledger, so `--force-full` also
/// recovers from a corrupt one.
pub fn load_state(paths: &MirrorPaths, force_full: bool) -> Result<MirrorState> {
    let archive = archive::load(&paths.archive_file)?;
    let watermark = if force_full {
        None
    } else {
        ledger::read(&paths.ledger_file)?
    };
    Ok(MirrorState { archive, watermark })
}

/// Fetch, filter and merge against `previous`. Touches nothing but the
/// source; any error leaves the caller holding the untouched previous state.
pub fn run(
    previous: MirrorState,
    source: &mut dyn ArticleSource,
    started_at: DateTime<Utc>,
    force_full: bool,
) -> Result<(MirrorState, RunOutcome)> {
    let watermark = if force_full { None } else { previous.watermark };
    let mode = if watermark.is_some() {
        RunMode::Incremental
    } else {
        RunMode::Full
    };

    let mut summaries = Vec::new();
    let mut page = 1u32;
    let mut pages_requested = 0u32;
    let mut stopped_early = false;
    loop {
        let items = source
            .fetch_page(page)
            .with_context(|| format!("failed to fetch page {page}"))?;
        pages_requested += 1;
        if items.is_empty() {
            break;
        }
        let verdict = filter_page(items, watermark);
        summaries.extend(verdict.fresh);
        if verdict.stop {
            stopped_early = true;
            break;
        }
        page += 1;
    }

    let mut fresh = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let id = summary.id;
        fresh.push(
            source
                .fetch_full(summary)
                .with_context(|| format!("failed to fetch article {id}"))?,
        );
    }
    let fetched = fresh.len();

    let mut archive = previous.archive;
    let merged = archive.merge(fresh);
    let watermark = match previous.watermark {
        Some(prev) if prev > started_at => prev,
        _ => started_at,
    };

    let outcome = RunOutcome {
        started_at,
        mode,
        source: source.label().to_string(),
        pages_requested,
        fetched,
        added: merged.added,
        updated: merged.updated,
        stopped_early,
        total: archive.len(),
    };
    Ok((
        MirrorState {
            archive,
            watermark: Some(watermark),
        },
        outcome,
    ))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub archive_written: bool,
    pub ledger_written: bool,
}

/// Persist a finished run: archive first, ledger last. The ledger only
/// moves once the archive is safely on disk.
pub fn commit(paths: &MirrorPaths, next: &MirrorState, outcome: &RunOutcome) -> Result<CommitReport> {
    let mut report = CommitReport::default();
    if outcome.merge().changed() || !paths.archive_file.exists() {
        archive::save(&paths.archive_file, &next.archive)?;
        report.archive_written = true;
    }
    if let Some(watermark) = next.watermark {
        ledger::write(&paths.ledger_file, watermark)?;
        report.ledger_written = true;
    }
    Ok(report)
}

/// Where GitHub Actions collects step outputs, when running there.
#[derive(Debug, Clone, Default)]
pub struct ActionsOutputs<'a> {
    pub output_file: Option<&'a Path>,
    pub step_summary: Option<&'a Path>,
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Raise or clear the no-op marker. Failures here are reported but never
/// undo a committed run.
pub fn signal_outcome(paths: &MirrorPaths, outcome: &RunOutcome, actions: &ActionsOutputs<'_>) {
    if !outcome.nothing_new() {
        if paths.no_new_posts_flag.exists()
            && let Err(err) = fs::remove_file(&paths.no_new_posts_flag)
        {
            warn::emit(
                "FLAG_CLEAR",
                "commit",
                "continue",
                &paths.no_new_posts_flag.display().to_string(),
                &err.to_string(),
            );
        }
        return;
    }

    let mut results = vec![(
        paths.no_new_posts_flag.clone(),
        fs::write(&paths.no_new_posts_flag, "true").map_err(anyhow::Error::from),
    )];
    if let Some(path) = actions.output_file {
        results.push((path.to_path_buf(), append_line(path, "no_new_posts=true")));
    }
    if let Some(path) = actions.step_summary {
        results.push((
            path.to_path_buf(),
            append_line(path, "No new posts found since last run. Skipping generation."),
        ));
    }
    for (path, result) in results {
        if let Err(err) = result {
            warn::emit(
                "FLAG_WRITE",
                "commit",
                "continue",
                &path.display().to_string(),
                &format!("{err:#}"),
            );
        }
    }
}
