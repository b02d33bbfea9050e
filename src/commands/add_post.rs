use anyhow::Result;

use crate::commands::{CommandReport, prepare, site_context};
use crate::mirror::archive;
use crate::mirror::audit::{self, Phase, Status};
use crate::mirror::client::DevToClient;
use crate::mirror::comments;
use crate::mirror::lock::RunLock;
use crate::mirror::site;

/// Pull one article by slug into the archive and re-render. The ledger
/// is left alone so the next `sync` still sees everything since its
/// own last run.
pub fn run(slug: &str) -> Result<CommandReport> {
    let (paths, cfg) = prepare(|_| {})?;
    let _lock = RunLock::acquire(&paths)?;
    let mut report = CommandReport::new("add-post");

    let mut archive = archive::load(&paths.archive_file)?;
    let mut client = DevToClient::from_config(&cfg)?;
    let item = match client.fetch_by_slug(slug) {
        Ok(item) => item,
        Err(err) => {
            audit::record(&paths, Phase::Fetch, Status::Failed, &format!("{err:#}"));
            return Err(err);
        }
    };
    let id = item.id;
    let previously_archived = archive.get(id).is_some();
    audit::record(&paths, Phase::Fetch, Status::Ok, &format!("article={id}"));

    let merged = archive.merge(vec![item]);
    report.detail(format!("id={id}"));
    report.detail(format!("previously_archived={previously_archived}"));
    report.detail(format!("added={}", merged.added));
    report.detail(format!("updated={}", merged.updated));

    let notes = comments::load_manifest(&paths.comments_manifest)?;
    site::regenerate(&paths, &archive, &notes, &site_context(&cfg)?)?;
    audit::record(&paths, Phase::Render, Status::Ok, &format!("posts={}", archive.len()));

    if merged.changed() || !paths.archive_file.exists() {
        archive::save(&paths.archive_file, &archive)?;
        audit::record(&paths, Phase::Commit, Status::Ok, "archive_written=true ledger_written=false");
    } else {
        audit::record(&paths, Phase::Commit, Status::Skipped, "article already current");
    }
    report.detail(format!("total={}", archive.len()));
    Ok(report)
}
