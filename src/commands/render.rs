use anyhow::Result;

use crate::commands::{CommandReport, prepare, site_context};
use crate::mirror::archive;
use crate::mirror::audit::{self, Phase, Status};
use crate::mirror::comments;
use crate::mirror::lock::RunLock;
use crate::mirror::site;

pub fn run() -> Result<CommandReport> {
    let (paths, cfg) = prepare(|_| {})?;
    let _lock = RunLock::acquire(&paths)?;
    let mut report = CommandReport::new("render");

    let archive = archive::load(&paths.archive_file)?;
    if archive.is_empty() {
        report.detail(format!(
            "archive {} is empty; rendering an empty site",
            paths.archive_file.display()
        ));
    }
    let notes = comments::load_manifest(&paths.comments_manifest)?;
    let rendered = match site::regenerate(&paths, &archive, &notes, &site_context(&cfg)?) {
        Ok(rendered) => rendered,
        Err(err) => {
            audit::record(&paths, Phase::Render, Status::Failed, &format!("{err:#}"));
            return Err(err);
        }
    };
    audit::record(
        &paths,
        Phase::Render,
        Status::Ok,
        &format!("posts={} comments={}", rendered.post_pages, rendered.comment_pages),
    );

    report.detail(format!("rendered_posts={}", rendered.post_pages));
    report.detail(format!("rendered_comments={}", rendered.comment_pages));
    report.detail(format!("index={}", paths.index_file.display()));
    report.detail(format!("sitemap={}", paths.sitemap_file.display()));
    Ok(report)
}
