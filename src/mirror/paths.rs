use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct MirrorPaths {
    pub root: PathBuf,
    pub archive_file: PathBuf,
    pub ledger_file: PathBuf,
    pub no_new_posts_flag: PathBuf,
    pub comments_manifest: PathBuf,
    pub posts_dir: PathBuf,
    pub comments_dir: PathBuf,
    pub index_file: PathBuf,
    pub sitemap_file: PathBuf,
    pub robots_file: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl MirrorPaths {
    pub fn under(root: &Path) -> Self {
        let state_dir = root.join(".devto-mirror");
        Self {
            root: root.to_path_buf(),
            archive_file: root.join("posts_data.json"),
            ledger_file: root.join("last_run.txt"),
            no_new_posts_flag: root.join("no_new_posts.flag"),
            comments_manifest: root.join("comments.txt"),
            posts_dir: root.join("posts"),
            comments_dir: root.join("comments"),
            index_file: root.join("index.html"),
            sitemap_file: root.join("sitemap.xml"),
            robots_file: root.join("robots.txt"),
            logs_dir: state_dir.join("logs"),
            lock_file: root.join(".devto-mirror.lock"),
            state_dir,
        }
    }

    /// Same layout with the generated output redirected to `out`, keeping
    /// the state files of `self`.
    pub fn with_output_root(&self, out: &Path) -> Self {
        let redirected = Self::under(out);
        Self {
            root: self.root.clone(),
            archive_file: self.archive_file.clone(),
            ledger_file: self.ledger_file.clone(),
            no_new_posts_flag: self.no_new_posts_flag.clone(),
            comments_manifest: self.comments_manifest.clone(),
            state_dir: self.state_dir.clone(),
            logs_dir: self.logs_dir.clone(),
            lock_file: self.lock_file.clone(),
            ..redirected
        }
    }

    /// Everything `reset` removes, in removal order.
    pub fn generated_entries(&self) -> Vec<&Path> {
        vec![
            self.posts_dir.as_path(),
            self.comments_dir.as_path(),
            self.index_file.as_path(),
            self.sitemap_file.as_path(),
            self.robots_file.as_path(),
            self.archive_file.as_path(),
            self.ledger_file.as_path(),
            self.no_new_posts_flag.as_path(),
        ]
    }
}

pub fn resolve_paths() -> Result<MirrorPaths> {
    let root = match env::var("DEVTO_MIRROR_ROOT") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => env::current_dir().context("failed to resolve current directory")?,
    };
    Ok(MirrorPaths::under(&root))
}
