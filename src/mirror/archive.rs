use crate::error::MirrorError;
use crate::mirror::item::Item;
use crate::mirror::util::{sha256_hex, write_atomic_with};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Every known item keyed by id, listed newest-first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    items: Vec<Item>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub updated: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.added + self.updated > 0
    }
}

fn sort_newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

impl Archive {
    /// Build from a persisted sequence. Duplicate ids collapse through the
    /// same policy as `merge`.
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut archive = Self::default();
        archive.merge(items);
        archive
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Insert-or-replace by id, then re-sort. Never removes an item.
    pub fn merge(&mut self, incoming: Vec<Item>) -> MergeOutcome {
        let mut by_id: BTreeMap<u64, Item> = std::mem::take(&mut self.items)
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let mut out = MergeOutcome::default();
        for item in incoming {
            match by_id.get_mut(&item.id) {
                Some(existing) => {
                    let before = existing.clone();
                    existing.absorb(item);
                    if *existing != before {
                        out.updated += 1;
                    }
                }
                None => {
                    by_id.insert(item.id, item);
                    out.added += 1;
                }
            }
        }

        let mut items = by_id.into_values().collect::<Vec<_>>();
        sort_newest_first(&mut items);
        self.items = items;
        out
    }

    pub fn to_json(&self) -> Result<String> {
        let data = serde_json::to_string_pretty(&self.items)?;
        Ok(format!("{data}\n"))
    }

    pub fn digest(&self) -> Result<String> {
        Ok(sha256_hex(self.to_json()?.as_bytes()))
    }
}

/// Missing file is an empty archive. A present one must parse, blank
/// included.
pub fn load(path: &Path) -> Result<Archive> {
    if !path.exists() {
        return Ok(Archive::default());
    }

    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let items: Vec<Item> = serde_json::from_str(&raw).map_err(|err| {
        MirrorError::StateCorrupt(format!(
            "failed to parse {}: {err}; restore it, or delete it together with last_run.txt to backfill",
            path.display()
        ))
    })?;
    Ok(Archive::from_items(items))
}

pub fn save(path: &Path, archive: &Archive) -> Result<()> {
    let data = archive.to_json()?;
    save_with(path, |file| file.write_all(data.as_bytes()))
}

/// `save` with the write step supplied by the caller.
pub fn save_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    write_atomic_with(path, fill)
        .with_context(|| format!("failed to save archive {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()
    }

    fn item(id: u64, published_at: DateTime<Utc>) -> Item {
        Item {
            id,
            title: format!("Post {id}"),
            link: format!("https://dev.to/alice/post-{id}"),
            slug: format!("post-{id}"),
            published_at,
            updated_at: None,
            description: String::new(),
            cover_image: String::new(),
            tags: vec!["rust".into()],
            body_html: format!("<p>{id}</p>"),
        }
    }

    fn ids(archive: &Archive) -> Vec<u64> {
        archive.items().iter().map(|i| i.id).collect()
    }

    #[test]
    fn merge_sorts_newest_first_with_id_tiebreak() {
        let mut archive = Archive::default();
        let out = archive.merge(vec![item(1, at(1)), item(3, at(3)), item(2, at(3))]);
        assert_eq!(out, MergeOutcome { added: 3, updated: 0 });
        assert_eq!(ids(&archive), vec![3, 2, 1]);
    }

    #[test]
    fn merge_replaces_payload_and_reorders_on_newer_publish_time() {
        let mut archive = Archive::from_items(vec![item(1, at(1)), item(2, at(2))]);
        let mut edited = item(1, at(5));
        edited.title = "Edited".into();
        let out = archive.merge(vec![edited]);
        assert_eq!(out, MergeOutcome { added: 0, updated: 1 });
        assert_eq!(ids(&archive), vec![1, 2]);
        assert_eq!(archive.get(1).expect("item").title, "Edited");
    }

    #[test]
    fn merge_of_identical_item_is_not_an_update() {
        let mut archive = Archive::from_items(vec![item(1, at(1))]);
        let out = archive.merge(vec![item(1, at(1))]);
        assert!(!out.changed());
    }

    #[test]
    fn merge_ignoring_every_difference_is_not_an_update() {
        let mut archive = Archive::from_items(vec![item(1, at(3))]);
        let before = archive.to_json().expect("json");
        let mut moved = item(1, at(1));
        moved.link = "https://dev.to/alice/renamed-1".into();
        moved.slug = "renamed-1".into();

        let out = archive.merge(vec![moved]);
        assert_eq!(out, MergeOutcome::default());
        assert_eq!(archive.to_json().expect("json"), before);
    }

    #[test]
    fn merge_never_deletes_missing_items() {
        let mut archive = Archive::from_items(vec![item(1, at(1)), item(2, at(2))]);
        archive.merge(vec![item(3, at(3))]);
        assert_eq!(ids(&archive), vec![3, 2, 1]);
    }

    #[test]
    fn save_load_is_stable_and_pretty() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("posts_data.json");
        let archive = Archive::from_items(vec![item(1, at(1)), item(2, at(2) + Duration::hours(1))]);
        save(&path, &archive).expect("save");

        let first = fs::read_to_string(&path).expect("read");
        assert!(first.starts_with("[\n  {"));
        assert!(first.ends_with("}\n]\n"));

        let loaded = load(&path).expect("load");
        assert_eq!(loaded, archive);
        save(&path, &loaded).expect("save again");
        assert_eq!(fs::read_to_string(&path).expect("read"), first);
    }

    #[test]
    fn missing_file_loads_empty_but_garbage_is_fatal() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("posts_data.json");
        assert!(load(&path).expect("empty").is_empty());

        for garbage in ["{not json", "", "  \n"] {
            fs::write(&path, garbage).expect("write");
            let err = load(&path).expect_err("corrupt");
            assert_eq!(error_code(&err), "E005_STATE_CORRUPT", "{garbage:?}");
            assert!(format!("{err:#}").contains("last_run.txt"));
        }
    }

    #[test]
    fn failed_save_keeps_previous_document() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("posts_data.json");
        let before = Archive::from_items(vec![item(1, at(1))]);
        save(&path, &before).expect("seed");
        let seeded = fs::read(&path).expect("read");

        let result = save_with(&path, |file| {
            file.write_all(b"[\n  {\"id\": 9")?;
            Err(std::io::Error::other("no space left on device"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read(&path).expect("read"), seeded);
        assert_eq!(fs::read_dir(tmp.path()).expect("dir").count(), 1);
    }
}
