use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Truncate `input` to at most `max_chars` characters, stripping control
/// characters and appending `...` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    let clean: String = input.chars().filter(|c| !c.is_control()).collect();
    if clean.chars().count() > max_chars {
        let keep = max_chars.saturating_sub(3);
        let mut s: String = clean.chars().take(keep).collect();
        s.push_str("...");
        s
    } else {
        clean
    }
}

/// Lowercase ASCII slug with single dashes between alphanumeric runs.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Filename-safe stem: anything outside `[A-Za-z0-9_-]` becomes `-`.
pub fn safe_file_stem(input: &str, max_chars: usize) -> String {
    input
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '-'
            }
        })
        .take(max_chars)
        .collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Replace `path` with whatever `fill` writes, or leave it untouched.
///
/// The content goes to a temp file next to `path` which is renamed over it
/// only after `fill` and the fsync succeed. The temp file is removed on
/// every error path.
pub fn write_atomic_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    fill(tmp.as_file_mut()).with_context(|| format!("failed to write {}", path.display()))?;
    tmp.as_file_mut()
        .sync_all()
        .with_context(|| format!("failed to sync {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, |file| file.write_all(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn slug_and_stem_sanitization() {
        assert_eq!(slugify("Hello, World #1"), "hello-world-1");
        assert_eq!(slugify("---"), "");
        assert_eq!(safe_file_stem("../../etc/passwd", 120), "------etc-passwd");
        assert_eq!(safe_file_stem("abc", 2), "ab");
    }

    #[test]
    fn truncation_appends_ascii_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 80), "short");
        let long = "x".repeat(100);
        let got = truncate_with_ellipsis(&long, 80);
        assert_eq!(got.chars().count(), 80);
        assert!(got.ends_with("..."));
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = tempdir().expect("tempdir");
        let target = tmp.path().join("data.json");
        fs::write(&target, "old").expect("seed");
        write_atomic(&target, b"new").expect("write");
        assert_eq!(fs::read_to_string(&target).expect("read"), "new");
        assert_eq!(dir_entries(tmp.path()), vec!["data.json".to_string()]);
    }

    #[test]
    fn failed_fill_leaves_target_and_no_temp_files() {
        let tmp = tempdir().expect("tempdir");
        let target = tmp.path().join("data.json");
        fs::write(&target, "old").expect("seed");

        let err = write_atomic_with(&target, |file| {
            file.write_all(b"half-writ")?;
            Err(std::io::Error::other("disk full"))
        })
        .expect_err("must fail");

        assert!(format!("{err:#}").contains("disk full"));
        assert_eq!(fs::read_to_string(&target).expect("read"), "old");
        assert_eq!(dir_entries(tmp.path()), vec!["data.json".to_string()]);
    }
}
