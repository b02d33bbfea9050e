use anyhow::{Context, Result};
use chrono::Utc;
use std::env;
use std::path::PathBuf;

use crate::commands::{CommandReport, prepare, site_context};
use crate::error::error_code;
use crate::mirror::audit::{self, Phase, Status};
use crate::mirror::client::{DevToClient, FixtureSource};
use crate::mirror::comments;
use crate::mirror::config::MirrorConfig;
use crate::mirror::ledger;
use crate::mirror::lock::RunLock;
use crate::mirror::paths::MirrorPaths;
use crate::mirror::pipeline::{self, ActionsOutputs, MirrorState, RunOutcome};
use crate::mirror::site;
use crate::mirror::warn;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub force_full: bool,
    pub dry_run: bool,
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn fail(paths: &MirrorPaths, phase: Phase, stage: &str, err: anyhow::Error) -> anyhow::Error {
    let message = format!("{err:#}");
    audit::record(paths, phase, Status::Failed, &message);
    warn::emit(error_code(&err), stage, "abort", &paths.root.display().to_string(), &message);
    err
}

fn outcome_details(report: &mut CommandReport, outcome: &RunOutcome) {
    report.detail(format!("mode={}", outcome.mode.as_str()));
    report.detail(format!("source={}", outcome.source));
    report.detail(format!("started_at={}", ledger::format_timestamp(outcome.started_at)));
    report.detail(format!("pages_requested={}", outcome.pages_requested));
    report.detail(format!("fetched={}", outcome.fetched));
    report.detail(format!("added={}", outcome.added));
    report.detail(format!("updated={}", outcome.updated));
    report.detail(format!("stopped_early={}", outcome.stopped_early));
    report.detail(format!("total={}", outcome.total));
}

fn run_dry(paths: &MirrorPaths, cfg: &MirrorConfig) -> Result<CommandReport> {
    let mut report = CommandReport::new("sync");
    report.detail("dry_run=true");

    let scratch = tempfile::tempdir().context("failed to create dry-run output dir")?;
    let out_paths = paths.with_output_root(scratch.path());
    let mut source = FixtureSource::new(&cfg.source.username, cfg.run.fixture_empty);
    let (next, outcome) =
        pipeline::run(MirrorState::default(), &mut source, Utc::now(), true)?;
    outcome_details(&mut report, &outcome);

    let notes = comments::load_manifest(&paths.comments_manifest)?;
    let rendered = site::regenerate(&out_paths, &next.archive, &notes, &site_context(cfg)?)?;
    report.detail(format!("rendered_posts={}", rendered.post_pages));
    report.detail(format!("rendered_comments={}", rendered.comment_pages));
    for artifact in [&out_paths.index_file, &out_paths.sitemap_file, &out_paths.robots_file] {
        if !artifact.is_file() {
            report.issue(format!("dry run did not produce {}", artifact.display()));
        }
    }
    report.detail("state=untouched");
    Ok(report)
}

pub fn run(opts: &SyncOptions) -> Result<CommandReport> {
    let (paths, cfg) = prepare(|cfg| {
        cfg.run.force_full |= opts.force_full;
        cfg.run.dry_run |= opts.dry_run;
    })?;
    if cfg.run.dry_run {
        return run_dry(&paths, &cfg);
    }

    let _lock = RunLock::acquire(&paths)?;
    let started_at = Utc::now();
    let mut report = CommandReport::new("sync");

    let previous = pipeline::load_state(&paths, cfg.run.force_full)
        .map_err(|err| fail(&paths, Phase::Fetch, "load", err))?;
    let mut client = DevToClient::from_config(&cfg)?;
    let (next, outcome) = pipeline::run(previous, &mut client, started_at, cfg.run.force_full)
        .map_err(|err| fail(&paths, Phase::Fetch, "fetch", err))?;
    audit::record(
        &paths,
        Phase::Fetch,
        Status::Ok,
        &format!(
            "pages={} fetched={} requests={}",
            outcome.pages_requested,
            outcome.fetched,
            client.requests_sent()
        ),
    );
    let merge_status = if outcome.merge().changed() { Status::Ok } else { Status::Skipped };
    audit::record(
        &paths,
        Phase::Merge,
        merge_status,
        &format!("added={} updated={} total={}", outcome.added, outcome.updated, outcome.total),
    );
    outcome_details(&mut report, &outcome);

    if outcome.nothing_new() && paths.index_file.exists() {
        audit::record(&paths, Phase::Render, Status::Skipped, "no new posts");
        report.detail("render=skipped");
    } else {
        let notes = comments::load_manifest(&paths.comments_manifest)?;
        let rendered = site::regenerate(&paths, &next.archive, &notes, &site_context(&cfg)?)
            .map_err(|err| fail(&paths, Phase::Render, "render", err))?;
        audit::record(
            &paths,
            Phase::Render,
            Status::Ok,
            &format!("posts={} comments={}", rendered.post_pages, rendered.comment_pages),
        );
        report.detail(format!("rendered_posts={}", rendered.post_pages));
        report.detail(format!("rendered_comments={}", rendered.comment_pages));
    }

    let committed = pipeline::commit(&paths, &next, &outcome)
        .map_err(|err| fail(&paths, Phase::Commit, "commit", err))?;
    audit::record(
        &paths,
        Phase::Commit,
        Status::Ok,
        &format!(
            "archive_written={} ledger_written={}",
            committed.archive_written, committed.ledger_written
        ),
    );
    report.detail(format!("archive_written={}", committed.archive_written));
    if let Some(watermark) = next.watermark {
        report.detail(format!("last_run={}", ledger::format_timestamp(watermark)));
    }

    let output_file = env_path("GITHUB_OUTPUT");
    let step_summary = env_path("GITHUB_STEP_SUMMARY");
    pipeline::signal_outcome(
        &paths,
        &outcome,
        &ActionsOutputs {
            output_file: output_file.as_deref(),
            step_summary: step_summary.as_deref(),
        },
    );
    report.detail(format!("no_new_posts={}", outcome.nothing_new()));
    Ok(report)
}
