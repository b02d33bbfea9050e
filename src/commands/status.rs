use anyhow::Result;
use std::fs;

use crate::commands::CommandReport;
use crate::env_loader::unknown_mirror_env_keys;
use crate::mirror::archive;
use crate::mirror::config::{load_config, validate_config};
use crate::mirror::ledger;
use crate::mirror::paths::resolve_paths;
use crate::mirror::robots;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("root={}", paths.root.display()));
    report.detail(format!("archive_file={}", paths.archive_file.display()));
    report.detail(format!("ledger_file={}", paths.ledger_file.display()));
    report.detail(format!("state_dir={}", paths.state_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    match load_config(&paths.root) {
        Ok(cfg) => {
            report.detail(format!("username={}", cfg.source.username));
            report.detail(format!("api_base={}", cfg.source.api_base));
            report.detail(format!("page_size={}", cfg.source.page_size));
            report.detail(format!("api_key_set={}", cfg.source.api_key.is_some()));
            if let Ok(urls) = cfg.site_urls() {
                report.detail(format!("home={}", urls.home));
                report.detail(format!("site_root={}", urls.root_home));
            }
            if let Err(err) = validate_config(&cfg) {
                report.issue(format!("{err:#}"));
            }
        }
        Err(err) => report.issue(format!("config: {err:#}")),
    }

    match archive::load(&paths.archive_file) {
        Ok(archive) => {
            report.detail(format!("archive_items={}", archive.len()));
            if let Some(newest) = archive.items().first() {
                report.detail(format!(
                    "newest_post={}",
                    ledger::format_timestamp(newest.published_at)
                ));
            }
            match archive.digest() {
                Ok(digest) => report.detail(format!("archive_sha256={digest}")),
                Err(err) => report.issue(format!("archive digest: {err:#}")),
            }
        }
        Err(err) => report.issue(format!("archive: {err:#}")),
    }

    match ledger::read(&paths.ledger_file) {
        Ok(Some(ts)) => report.detail(format!("last_run={}", ledger::format_timestamp(ts))),
        Ok(None) => report.detail("last_run=none (next sync backfills everything)"),
        Err(err) => report.issue(format!("ledger: {err:#}")),
    }
    report.detail(format!("no_new_posts_flag={}", paths.no_new_posts_flag.exists()));

    if paths.robots_file.is_file() {
        let raw = fs::read_to_string(&paths.robots_file)?;
        let summary = robots::parse(&raw);
        report.detail(format!(
            "robots allowed_agents={} universal_allow={} restrictions={}",
            summary.allowed_agents.len(),
            summary.allows_everyone(),
            summary.has_restrictions()
        ));
        match summary.sitemap {
            Some(url) => report.detail(format!("robots sitemap={url}")),
            None => report.issue("robots.txt has no Sitemap directive"),
        }
    } else {
        report.detail("robots=not generated");
    }

    for key in unknown_mirror_env_keys() {
        report.issue(format!("unknown environment key {key}"));
    }
    Ok(report)
}
