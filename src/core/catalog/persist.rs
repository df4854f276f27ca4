//! Crash-safe replacement of the catalog file.
//!
//! The document is written to `<file>.tmp_<8 hex>`, fsynced, and renamed
//! over the target. A crash at any point leaves either the old file, its
//! `.bak`, or the new file on disk, never a truncated catalog.

use crate::error::StoreError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// How often and how patiently the final rename is retried.
///
/// The rename can fail transiently when another process (a virus scanner,
/// a sync client) has the target open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total rename attempts, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(100),
        }
    }
}

/// `<file>.bak`
pub fn backup_path(target: &Path) -> PathBuf {
    with_suffix(target, ".bak")
}

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Move the current file aside as `.bak`. Failures are logged and ignored.
pub fn backup_existing(target: &Path) {
    if !target.exists() {
        return;
    }
    let backup = backup_path(target);
    if let Err(e) = fs::rename(target, &backup) {
        tracing::warn!(
            "catalog backup of {} failed, continuing without it: {}",
            target.display(),
            e
        );
    }
}

/// A fully written, fsynced temp file waiting to replace its target.
///
/// Dropping an uncommitted write deletes the temp file.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Write `bytes` next to `target` and flush them to disk
    pub fn stage(target: &Path, bytes: &[u8]) -> Result<Self, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let temp = with_suffix(target, &format!(".tmp_{}", &id[..8]));

        let staged = Self {
            target: target.to_path_buf(),
            temp,
            committed: false,
        };

        let io_err = |source| StoreError::Io {
            path: staged.temp.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staged.temp)
            .map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        Ok(staged)
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Rename the temp file over the target, retrying per `policy`
    pub fn commit(mut self, policy: &RetryPolicy) -> Result<(), StoreError> {
        let attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match fs::rename(&self.temp, &self.target) {
                Ok(()) => {
                    self.committed = true;
                    sync_parent(&self.target);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        "catalog rename attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        self.target.display(),
                        e
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        thread::sleep(policy.delay);
                    }
                }
            }
        }

        Err(StoreError::WriteFailure {
            path: self.target.clone(),
            attempts,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Replace `target` with `bytes` using the backup / temp / rename protocol.
pub fn write_atomic(
    target: &Path,
    bytes: &[u8],
    backup: bool,
    policy: &RetryPolicy,
) -> Result<(), StoreError> {
    if backup {
        backup_existing(target);
    }
    StagedWrite::stage(target, bytes)?.commit(policy)
}

#[cfg(unix)]
fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_target: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.contains(".tmp_"))
            .collect()
    }

    #[test]
    fn default_policy_is_five_attempts_100ms() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(100));
    }

    #[test]
    fn write_replaces_content_and_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("QualityRecord.json");
        fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"new", true, &RetryPolicy::default()).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert_eq!(fs::read(backup_path(&target)).unwrap(), b"old");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn temp_name_has_eight_hex_suffix() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("QualityRecord.json");
        let staged = StagedWrite::stage(&target, b"{}").unwrap();

        let name = staged.temp_path().file_name().unwrap().to_string_lossy().into_owned();
        let suffix = name.strip_prefix("QualityRecord.json.tmp_").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn dropped_stage_removes_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("QualityRecord.json");
        let staged = StagedWrite::stage(&target, b"{}").unwrap();
        assert_eq!(leftovers(dir.path()).len(), 1);

        drop(staged);
        assert!(leftovers(dir.path()).is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn failed_commit_reports_attempts_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory in the way makes every rename fail.
        let target = dir.path().join("QualityRecord.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("occupied"), b"x").unwrap();

        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result = StagedWrite::stage(&target, b"{}").unwrap().commit(&policy);

        match result {
            Err(StoreError::WriteFailure { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected WriteFailure, got {:?}", other),
        }
        assert!(leftovers(dir.path()).is_empty());
    }
}
