use crate::mirror::util::{safe_file_stem, slugify, truncate_with_ellipsis};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const ID_FALLBACK_CHARS: usize = 48;
const LABEL_CHARS: usize = 80;

/// One line of `comments.txt`: a Dev.to comment worth its own note page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNote {
    pub id: String,
    pub url: String,
    pub context: String,
    pub label: String,
}

impl CommentNote {
    pub fn local_path(&self) -> String {
        format!("comments/{}.html", self.id)
    }
}

fn take_id_chars(rest: &str, allow: impl Fn(char) -> bool) -> Option<String> {
    let id: String = rest.chars().take_while(|c| allow(*c)).collect();
    (!id.is_empty()).then_some(id)
}

fn comment_id(url: &str) -> String {
    let from_path = url
        .split_once("/comment/")
        .and_then(|(_, rest)| take_id_chars(rest, |c| c.is_ascii_alphanumeric()));
    let from_fragment = || {
        url.split_once("#comment-").and_then(|(_, rest)| {
            take_id_chars(rest, |c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
    };
    let id = from_path
        .or_else(from_fragment)
        .unwrap_or_else(|| slugify(url).chars().take(ID_FALLBACK_CHARS).collect());
    let id = safe_file_stem(&id, 120);
    if id.is_empty() { "comment".to_string() } else { id }
}

pub fn parse_line(raw: &str) -> Option<CommentNote> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (url, context) = match line.split_once('|') {
        Some((url, context)) => (url.trim(), context.trim()),
        None => (line, ""),
    };
    if url.is_empty() {
        return None;
    }
    let label = if context.is_empty() { url } else { context };
    Some(CommentNote {
        id: comment_id(url),
        url: url.to_string(),
        context: context.to_string(),
        label: truncate_with_ellipsis(label, LABEL_CHARS),
    })
}

/// Notes in file order, first occurrence of each URL wins.
pub fn parse_manifest(raw: &str) -> Vec<CommentNote> {
    let mut seen = BTreeSet::new();
    raw.lines()
        .filter_map(parse_line)
        .filter(|note| seen.insert(note.url.clone()))
        .collect()
}

pub fn load_manifest(path: &Path) -> Result<Vec<CommentNote>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_manifest(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_come_from_path_or_fragment() {
        let note = parse_line("https://dev.to/alice/comment/2k3j9 | Great thread").expect("note");
        assert_eq!(note.id, "2k3j9");
        assert_eq!(note.label, "Great thread");
        assert_eq!(note.local_path(), "comments/2k3j9.html");

        let note = parse_line("https://dev.to/alice/post-1#comment-ab_c-9").expect("note");
        assert_eq!(note.id, "ab_c-9");
        assert_eq!(note.label, "https://dev.to/alice/post-1#comment-ab_c-9");
    }

    #[test]
    fn fallback_id_is_truncated_url_slug() {
        let url = format!("https://example.com/{}", "segment/".repeat(10));
        let note = parse_line(&url).expect("note");
        assert_eq!(note.id.chars().count(), 48);
        assert!(note.id.starts_with("https-example-com-segment"));
    }

    #[test]
    fn skips_blank_and_comment_lines_and_dedupes() {
        let raw = "\n# notes\nhttps://dev.to/a/comment/1 | one\n   \nhttps://dev.to/a/comment/1 | again\nhttps://dev.to/a/comment/2\n";
        let notes = parse_manifest(raw);
        assert_eq!(notes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(notes[0].context, "one");
    }

    #[test]
    fn long_labels_are_truncated() {
        let line = format!("https://dev.to/a/comment/9 | {}", "word ".repeat(40));
        let note = parse_line(&line).expect("note");
        assert_eq!(note.label.chars().count(), 80);
        assert!(note.label.ends_with("..."));
    }
}
