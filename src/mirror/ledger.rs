use crate::error::MirrorError;
use crate::mirror::item::parse_timestamp;
use crate::mirror::util::write_atomic;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::Path;

/// Watermark of the last fully successful run. `None` means the file is
/// absent or blank and the next run backfills everything.
pub fn read(path: &Path) -> Result<Option<DateTime<Utc>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let line = raw.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }
    let ts = parse_timestamp(line).ok_or_else(|| {
        MirrorError::StateCorrupt(format!(
            "unparseable timestamp `{line}` in {}; rerun with --force-full to rebuild",
            path.display()
        ))
    })?;
    Ok(Some(ts))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Record `started_at` (the start of the run being committed, not now).
pub fn write(path: &Path, started_at: DateTime<Utc>) -> Result<()> {
    write_atomic(path, format_timestamp(started_at).as_bytes())
        .with_context(|| format!("failed to write ledger {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn absent_and_blank_ledgers_mean_backfill() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("last_run.txt");
        assert_eq!(read(&path).expect("absent"), None);
        fs::write(&path, "  \n").expect("write");
        assert_eq!(read(&path).expect("blank"), None);
    }

    #[test]
    fn write_then_read_uses_offset_form() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("last_run.txt");
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        write(&path, ts).expect("write");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "2024-06-01T08:30:00.000000+00:00"
        );
        assert_eq!(read(&path).expect("read"), Some(ts));
    }

    #[test]
    fn accepts_zulu_suffix() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("last_run.txt");
        fs::write(&path, "2024-06-01T08:30:00Z\n").expect("write");
        assert_eq!(
            read(&path).expect("read"),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn garbage_is_reported_as_corrupt_state() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("last_run.txt");
        fs::write(&path, "last tuesday").expect("write");
        let err = read(&path).expect_err("corrupt");
        assert_eq!(error_code(&err), "E005_STATE_CORRUPT");
    }
}
