use crate::error::MirrorError;
use crate::mirror::paths::MirrorPaths;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

/// Exclusive hold on `.devto-mirror.lock` for the lifetime of a run.
/// Released when dropped; the file itself is left in place.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl RunLock {
    pub fn acquire(paths: &MirrorPaths) -> Result<Self> {
        fs::create_dir_all(&paths.root)
            .with_context(|| format!("failed to create {}", paths.root.display()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&paths.lock_file)
            .with_context(|| format!("failed to open {}", paths.lock_file.display()))?;

        if file.try_lock_exclusive().is_err() {
            let holder = fs::read_to_string(&paths.lock_file).unwrap_or_default();
            let holder = holder.trim();
            return Err(MirrorError::Locked(format!(
                "{} (pid {})",
                paths.lock_file.display(),
                if holder.is_empty() { "unknown" } else { holder }
            ))
            .into());
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
