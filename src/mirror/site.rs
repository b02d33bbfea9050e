use crate::mirror::archive::Archive;
use crate::mirror::comments::CommentNote;
use crate::mirror::item::Item;
use crate::mirror::paths::MirrorPaths;
use crate::mirror::robots;
use crate::mirror::urls::{SiteUrls, build_post_url};
use crate::mirror::util::{safe_file_stem, write_atomic};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;

const STEM_CHARS: usize = 120;
const NOTE_DESCRIPTION_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct SiteContext {
    pub username: String,
    pub urls: SiteUrls,
}

impl SiteContext {
    fn title(&self) -> String {
        format!("{} - Dev.to Mirror", self.username)
    }

    fn profile_url(&self) -> String {
        format!("https://dev.to/{}", self.username)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    pub post_pages: usize,
    pub comment_pages: usize,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn lastmod(item: &Item) -> DateTime<Utc> {
    item.updated_at
        .map_or(item.published_at, |updated| updated.max(item.published_at))
}

fn w3c(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// File stem of each item's page, in archive order. Lower ids claim a
/// stem first, so a later post never takes over an existing URL. A taken
/// stem gets `-<id>`, then `-<id>-<n>`, until it is free.
pub fn post_stems(items: &[Item]) -> Vec<String> {
    let mut order = (0..items.len()).collect::<Vec<_>>();
    order.sort_by_key(|&idx| items[idx].id);

    let mut used = BTreeSet::new();
    let mut stems = vec![String::new(); items.len()];
    for idx in order {
        let item = &items[idx];
        let mut base = safe_file_stem(&item.slug, STEM_CHARS);
        if base.trim_matches('-').is_empty() {
            base = format!("post-{}", item.id);
        }
        let mut stem = base.clone();
        let mut attempt = 1u32;
        while used.contains(&stem) {
            stem = if attempt == 1 {
                format!("{base}-{}", item.id)
            } else {
                format!("{base}-{}-{attempt}", item.id)
            };
            attempt += 1;
        }
        used.insert(stem.clone());
        stems[idx] = stem;
    }
    stems
}

pub fn render_post_page(item: &Item, stem: &str, ctx: &SiteContext) -> Result<String> {
    let title = escape_html(&item.title);
    let canonical = escape_html(&item.link);
    let description = escape_html(&item.description);
    let page_url = escape_html(&build_post_url(&ctx.urls.home, stem)?);
    let author = escape_html(&ctx.username);

    let mut out = String::new();
    out.push_str("<!doctype html><html lang=\"en\"><head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    writeln!(out, "<title>{title}</title>")?;
    writeln!(out, "<link rel=\"canonical\" href=\"{canonical}\">")?;
    writeln!(out, "<meta name=\"description\" content=\"{description}\">")?;
    writeln!(out, "<meta name=\"author\" content=\"{author}\">")?;
    if !item.tags.is_empty() {
        writeln!(
            out,
            "<meta name=\"keywords\" content=\"{}\">",
            escape_html(&item.tags.join(", "))
        )?;
    }
    out.push_str("<meta property=\"og:type\" content=\"article\">\n");
    writeln!(out, "<meta property=\"og:url\" content=\"{page_url}\">")?;
    writeln!(out, "<meta property=\"og:title\" content=\"{title}\">")?;
    writeln!(out, "<meta property=\"og:description\" content=\"{description}\">")?;
    writeln!(
        out,
        "<meta property=\"og:site_name\" content=\"{}\">",
        escape_html(&ctx.title())
    )?;
    writeln!(
        out,
        "<meta property=\"article:published_time\" content=\"{}\">",
        w3c(item.published_at)
    )?;
    out.push_str("<meta name=\"twitter:card\" content=\"summary_large_image\">\n");
    writeln!(out, "<meta name=\"twitter:title\" content=\"{title}\">")?;
    writeln!(out, "<meta name=\"twitter:description\" content=\"{description}\">")?;
    if !item.cover_image.is_empty() {
        let cover = escape_html(&item.cover_image);
        writeln!(out, "<meta property=\"og:image\" content=\"{cover}\">")?;
        writeln!(out, "<meta name=\"twitter:image\" content=\"{cover}\">")?;
    }
    out.push_str("</head><body>\n<main>\n");
    writeln!(out, "  <h1><a href=\"{canonical}\">{title}</a></h1>")?;
    if !item.cover_image.is_empty() {
        writeln!(
            out,
            "  <img src=\"{}\" alt=\"Banner image for {title}\" style=\"width:100%;max-width:1000px;height:auto;margin:1em 0;\">",
            escape_html(&item.cover_image)
        )?;
    }
    writeln!(
        out,
        "  <p><em>Published: {}</em></p>",
        item.published_at.format("%Y-%m-%d")
    )?;
    if !item.tags.is_empty() {
        let tags = item
            .tags
            .iter()
            .map(|tag| format!("<span>#{}</span>", escape_html(tag)))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "  <p><strong>Tags:</strong> {tags}</p>")?;
    }
    if !item.description.is_empty() {
        writeln!(out, "  <p><em>{description}</em></p>")?;
    }
    writeln!(out, "  <article>{}</article>", item.body_html)?;
    writeln!(out, "  <p><a href=\"{canonical}\">Read on Dev.to</a></p>")?;
    out.push_str("</main>\n</body></html>\n");
    Ok(out)
}

pub fn render_comment_page(note: &CommentNote, ctx: &SiteContext) -> Result<String> {
    let url = escape_html(&note.url);
    let context: String = note.context.chars().take(NOTE_DESCRIPTION_CHARS).collect();
    let description = if context.is_empty() {
        "Comment note".to_string()
    } else {
        escape_html(&context)
    };

    let mut out = String::new();
    out.push_str("<!doctype html><html lang=\"en\"><head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Comment note</title>\n");
    writeln!(out, "<link rel=\"canonical\" href=\"{url}\">")?;
    writeln!(out, "<meta name=\"description\" content=\"{description}\">")?;
    writeln!(
        out,
        "<meta name=\"author\" content=\"{}\">",
        escape_html(&ctx.username)
    )?;
    out.push_str("<meta property=\"og:type\" content=\"article\">\n");
    out.push_str("<meta property=\"og:title\" content=\"Comment note\">\n");
    writeln!(out, "<meta property=\"og:description\" content=\"{description}\">")?;
    writeln!(
        out,
        "<meta property=\"og:site_name\" content=\"{}\">",
        escape_html(&ctx.title())
    )?;
    out.push_str("</head><body>\n<main>\n  <h1>Comment note</h1>\n");
    if !note.context.is_empty() {
        writeln!(out, "  <p>{}</p>", escape_html(&note.context))?;
    }
    writeln!(out, "  <p><a href=\"{url}\">Open on Dev.to</a></p>")?;
    out.push_str("</main>\n</body></html>\n");
    Ok(out)
}

pub fn render_index(
    items: &[Item],
    stems: &[String],
    notes: &[CommentNote],
    ctx: &SiteContext,
) -> Result<String> {
    let title = escape_html(&ctx.title());
    let site_description = escape_html(&format!(
        "Mirror of {}'s Dev.to blog posts. Canonical lives on Dev.to. This is just a crawler-friendly mirror.",
        ctx.username
    ));
    let home = escape_html(&ctx.urls.home);

    let mut out = String::new();
    out.push_str("<!doctype html><html lang=\"en\"><head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    writeln!(out, "<title>{title}</title>")?;
    writeln!(
        out,
        "<link rel=\"canonical\" href=\"{}\">",
        escape_html(&ctx.profile_url())
    )?;
    writeln!(out, "<meta name=\"description\" content=\"{site_description}\">")?;
    out.push_str("<meta property=\"og:type\" content=\"website\">\n");
    writeln!(out, "<meta property=\"og:url\" content=\"{home}\">")?;
    writeln!(out, "<meta property=\"og:title\" content=\"{title}\">")?;
    writeln!(out, "<meta property=\"og:description\" content=\"{site_description}\">")?;
    writeln!(
        out,
        "<meta name=\"author\" content=\"{}\">",
        escape_html(&ctx.username)
    )?;
    out.push_str("</head><body>\n<main>\n");
    writeln!(out, "  <h1>{title}</h1>")?;
    out.push_str("  <ul>\n");
    for (item, stem) in items.iter().zip(stems) {
        write!(
            out,
            "    <li><a href=\"posts/{}.html\">{}</a>",
            escape_html(stem),
            escape_html(&item.title)
        )?;
        if !item.description.is_empty() {
            write!(out, " - {}", escape_html(&item.description))?;
        }
        if !item.tags.is_empty() {
            let tags = item
                .tags
                .iter()
                .map(|tag| format!("#{}", escape_html(tag)))
                .collect::<Vec<_>>()
                .join(", ");
            write!(out, " - <small>Tags: {tags}</small>")?;
        }
        writeln!(
            out,
            " - <small>{}</small></li>",
            item.published_at.format("%Y-%m-%d")
        )?;
    }
    out.push_str("  </ul>\n");
    if !notes.is_empty() {
        out.push_str("  <h2>Comment Notes</h2>\n  <ul>\n");
        for note in notes {
            writeln!(
                out,
                "    <li><a href=\"{}\">{}</a></li>",
                escape_html(&note.local_path()),
                escape_html(&note.label)
            )?;
        }
        out.push_str("  </ul>\n");
    }
    out.push_str("  <p>Canonical lives on Dev.to. This is just a crawler-friendly mirror.</p>\n");
    out.push_str("</main>\n</body></html>\n");
    Ok(out)
}

pub fn render_sitemap(
    items: &[Item],
    stems: &[String],
    notes: &[CommentNote],
    urls: &SiteUrls,
) -> Result<String> {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    let home = escape_html(&urls.home);
    match items.iter().map(lastmod).max() {
        Some(newest) => writeln!(
            out,
            "  <url><loc>{home}</loc><lastmod>{}</lastmod></url>",
            w3c(newest)
        )?,
        None => writeln!(out, "  <url><loc>{home}</loc></url>")?,
    }
    for (item, stem) in items.iter().zip(stems) {
        writeln!(
            out,
            "  <url><loc>{}</loc><lastmod>{}</lastmod></url>",
            escape_html(&build_post_url(&urls.home, stem)?),
            w3c(lastmod(item))
        )?;
    }
    for note in notes {
        writeln!(
            out,
            "  <url><loc>{home}{}</loc></url>",
            escape_html(&note.local_path())
        )?;
    }
    out.push_str("</urlset>\n");
    Ok(out)
}

/// Rebuild every derived artifact under `paths` from the archive.
pub fn regenerate(
    paths: &MirrorPaths,
    archive: &Archive,
    notes: &[CommentNote],
    ctx: &SiteContext,
) -> Result<RenderReport> {
    let items = archive.items();
    let stems = post_stems(items);

    fs::create_dir_all(&paths.posts_dir)
        .with_context(|| format!("failed to create {}", paths.posts_dir.display()))?;
    for (item, stem) in items.iter().zip(&stems) {
        let page = render_post_page(item, stem, ctx)
            .with_context(|| format!("failed to render post {}", item.id))?;
        write_atomic(&paths.posts_dir.join(format!("{stem}.html")), page.as_bytes())?;
    }

    if !notes.is_empty() {
        fs::create_dir_all(&paths.comments_dir)
            .with_context(|| format!("failed to create {}", paths.comments_dir.display()))?;
    }
    for note in notes {
        let page = render_comment_page(note, ctx)?;
        write_atomic(&paths.comments_dir.join(format!("{}.html", note.id)), page.as_bytes())?;
    }

    write_atomic(
        &paths.index_file,
        render_index(items, &stems, notes, ctx)?.as_bytes(),
    )?;
    write_atomic(
        &paths.sitemap_file,
        render_sitemap(items, &stems, notes, &ctx.urls)?.as_bytes(),
    )?;
    let sitemap_url = format!("{}sitemap.xml", ctx.urls.home);
    write_atomic(&paths.robots_file, robots::render(&sitemap_url).as_bytes())?;

    Ok(RenderReport {
        post_pages: items.len(),
        comment_pages: notes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::comments::parse_manifest;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn ctx() -> SiteContext {
        SiteContext {
            username: "alice".into(),
            urls: SiteUrls {
                home: "https://alice.github.io/devto-mirror/".into(),
                root_home: "https://alice.github.io/".into(),
            },
        }
    }

    fn item(id: u64, slug: &str, day: u32) -> Item {
        Item {
            id,
            title: format!("Post <{id}> & more"),
            link: format!("https://dev.to/alice/{slug}"),
            slug: slug.to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap(),
            updated_at: None,
            description: "A \"quoted\" summary".into(),
            cover_image: String::new(),
            tags: vec!["rust".into(), "web".into()],
            body_html: "<p>Hello</p>".into(),
        }
    }

    #[test]
    fn text_is_escaped_but_body_is_kept() {
        let page = render_post_page(&item(1, "hello-1", 1), "hello-1", &ctx()).expect("page");
        assert!(page.contains("<title>Post &lt;1&gt; &amp; more</title>"));
        assert!(page.contains("content=\"A &quot;quoted&quot; summary\""));
        assert!(page.contains("<article><p>Hello</p></article>"));
        assert!(page.contains("<link rel=\"canonical\" href=\"https://dev.to/alice/hello-1\">"));
        assert!(page.contains("<meta name=\"keywords\" content=\"rust, web\">"));
        assert!(page.contains("Read on Dev.to"));
    }

    #[test]
    fn stems_are_sanitized_and_deduplicated() {
        let items = vec![
            item(3, "../../etc/passwd", 3),
            item(2, "same", 2),
            item(1, "same", 1),
            item(4, "///", 1),
        ];
        let stems = post_stems(&items);
        assert_eq!(stems[0], "------etc-passwd");
        assert_eq!(stems[1], "same-2");
        assert_eq!(stems[2], "same");
        assert_eq!(stems[3], "post-4");
    }

    #[test]
    fn suffixed_stem_never_lands_on_another_post() {
        let items = vec![item(5, "same-1", 5), item(2, "same", 2), item(1, "same", 1)];
        let stems = post_stems(&items);
        assert_eq!(stems, vec!["same-1", "same-2", "same"]);

        let items = vec![item(9, "x-2", 9), item(2, "x", 2), item(1, "x", 1), item(8, "x", 8)];
        let stems = post_stems(&items);
        let unique = stems.iter().collect::<BTreeSet<_>>();
        assert_eq!(unique.len(), items.len(), "{stems:?}");
        assert_eq!(stems[2], "x");
        assert_eq!(stems[1], "x-2");
    }

    #[test]
    fn newer_colliding_post_keeps_older_url() {
        let older = vec![item(1, "hello", 1)];
        let before = post_stems(&older);
        let grown = vec![item(7, "hello", 7), item(1, "hello", 1)];
        let after = post_stems(&grown);
        assert_eq!(after[1], before[0]);
        assert_eq!(after[0], "hello-7");
    }

    #[test]
    fn sitemap_lists_home_posts_and_notes_with_lastmod() {
        let mut newest = item(2, "b-2", 5);
        newest.updated_at = Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let items = vec![newest, item(1, "a-1", 1)];
        let stems = post_stems(&items);
        let notes = parse_manifest("https://dev.to/alice/comment/x1 | hi\n");
        let xml = render_sitemap(&items, &stems, &notes, &ctx().urls).expect("sitemap");

        assert!(xml.contains(
            "<url><loc>https://alice.github.io/devto-mirror/</loc><lastmod>2024-03-01T00:00:00+00:00</lastmod></url>"
        ));
        assert!(xml.contains(
            "<url><loc>https://alice.github.io/devto-mirror/posts/a-1.html</loc><lastmod>2024-02-01T09:00:00+00:00</lastmod></url>"
        ));
        assert!(xml.contains("<loc>https://alice.github.io/devto-mirror/comments/x1.html</loc>"));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn index_lists_posts_then_comment_notes() {
        let items = vec![item(2, "b-2", 2), item(1, "a-1", 1)];
        let stems = post_stems(&items);
        let notes = parse_manifest("https://dev.to/alice/comment/x1 | first <note>\n");
        let html = render_index(&items, &stems, &notes, &ctx()).expect("index");
        let b = html.find("posts/b-2.html").expect("b");
        let a = html.find("posts/a-1.html").expect("a");
        let note = html.find("comments/x1.html").expect("note");
        assert!(b < a && a < note);
        assert!(html.contains("first &lt;note&gt;"));
    }

    #[test]
    fn regenerate_is_deterministic() {
        let tmp = tempdir().expect("tempdir");
        let paths = MirrorPaths::under(tmp.path());
        let archive = Archive::from_items(vec![item(1, "a-1", 1), item(2, "b-2", 2)]);
        let notes = parse_manifest("https://dev.to/alice/comment/x1 | hi\n");

        let report = regenerate(&paths, &archive, &notes, &ctx()).expect("first");
        assert_eq!(report.post_pages, 2);
        assert_eq!(report.comment_pages, 1);
        let snapshot = |p: &MirrorPaths| {
            [
                p.index_file.clone(),
                p.sitemap_file.clone(),
                p.robots_file.clone(),
                p.posts_dir.join("a-1.html"),
                p.comments_dir.join("x1.html"),
            ]
            .iter()
            .map(|f| fs::read(f).expect("read artifact"))
            .collect::<Vec<_>>()
        };
        let first = snapshot(&paths);
        regenerate(&paths, &archive, &notes, &ctx()).expect("second");
        assert_eq!(snapshot(&paths), first);

        let robots = fs::read_to_string(&paths.robots_file).expect("robots");
        assert!(robots.contains("Sitemap: https://alice.github.io/devto-mirror/sitemap.xml"));
    }
}
