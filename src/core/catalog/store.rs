//! Lock-serialized access to one folder's catalog file.

use super::persist::{self, RetryPolicy};
use super::types::{Catalog, CatalogStats, PhotoRecord, RecordPatch};
use crate::core::fingerprint::format_naive;
use crate::error::StoreError;
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File name of the catalog inside a photo folder
pub const CATALOG_FILE_NAME: &str = "QualityRecord.json";

/// Path of the catalog file for a folder
pub fn catalog_path(folder: &Path) -> PathBuf {
    folder.join(CATALOG_FILE_NAME)
}

/// What one [`CatalogStore::apply_batch`] changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWrite {
    /// Records appended
    pub appended: usize,
    /// Patched fingerprints with no record; nothing was inserted for them
    pub missing: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Last `last_updated` this handle wrote
    last_stamp: Option<NaiveDateTime>,
}

/// Handle to `<folder>/QualityRecord.json`.
///
/// Every operation holds one lock for its whole read-modify-write cycle, so
/// concurrent callers sharing a handle never lose each other's updates.
/// Separate handles (or processes) on the same folder are not coordinated.
#[derive(Debug)]
pub struct CatalogStore {
    folder: PathBuf,
    path: PathBuf,
    backup: bool,
    retry: RetryPolicy,
    state: Mutex<StoreState>,
}

impl CatalogStore {
    /// Open the catalog of `folder`. Nothing is read or created yet.
    pub fn open(folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        Self {
            path: catalog_path(&folder),
            folder,
            backup: true,
            retry: RetryPolicy::default(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Keep a `.bak` of the previous file on every write (default: on)
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        persist::backup_path(&self.path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Current catalog, `None` if the folder has none yet.
    ///
    /// Falls back to the `.bak` file when the main file is missing (a crash
    /// between backup and rename). A malformed file is an error, never an
    /// empty catalog.
    pub fn read(&self) -> Result<Option<Catalog>, StoreError> {
        let _guard = self.lock()?;
        self.load()
    }

    /// Persist a whole catalog, stamping `last_updated` and `total_photos`
    pub fn write(&self, catalog: &mut Catalog) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        self.save(&mut state, catalog)
    }

    /// Add one record unless its fingerprint is already cataloged.
    ///
    /// Returns whether the record was added.
    pub fn append(&self, record: PhotoRecord) -> Result<bool, StoreError> {
        Ok(self.append_batch(vec![record])? == 1)
    }

    /// Add records in order, skipping fingerprints already present (in the
    /// catalog or earlier in the batch). One write for the whole batch.
    pub fn append_batch(&self, records: Vec<PhotoRecord>) -> Result<usize, StoreError> {
        Ok(self.apply_batch(records, Vec::new())?.appended)
    }

    /// Apply a patch to the record with this fingerprint
    pub fn update(&self, fingerprint: &str, patch: RecordPatch) -> Result<(), StoreError> {
        let missing = self.update_many(vec![(fingerprint.to_string(), patch)])?;
        match missing.into_iter().next() {
            Some(fingerprint) => Err(StoreError::NotFound { fingerprint }),
            None => Ok(()),
        }
    }

    /// Apply several patches in one write.
    ///
    /// Returns the fingerprints that were not found; those patches are
    /// dropped, nothing is inserted.
    pub fn update_many(
        &self,
        patches: Vec<(String, RecordPatch)>,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self.apply_batch(Vec::new(), patches)?.missing)
    }

    /// Patch existing records and append new ones in a single write, so
    /// either all of it lands or none of it does.
    ///
    /// Patches only see records that were cataloged before the call.
    /// The catalog is created lazily, and only when there is something to
    /// append.
    pub fn apply_batch(
        &self,
        records: Vec<PhotoRecord>,
        patches: Vec<(String, RecordPatch)>,
    ) -> Result<BatchWrite, StoreError> {
        let mut state = self.lock()?;
        let mut catalog = match self.load()? {
            Some(catalog) => catalog,
            None if records.is_empty() => {
                return Ok(BatchWrite {
                    appended: 0,
                    missing: patches.into_iter().map(|(fp, _)| fp).collect(),
                })
            }
            None => self.new_catalog(),
        };

        // First occurrence wins when a hand-edited file repeats a fingerprint
        let index: HashMap<String, usize> = catalog
            .photos
            .iter()
            .enumerate()
            .rev()
            .map(|(i, p)| (p.fingerprint().to_string(), i))
            .collect();

        let mut write = BatchWrite::default();
        let mut patched = 0;
        for (fingerprint, patch) in patches {
            match index.get(&fingerprint) {
                Some(&i) => {
                    patch.apply(&mut catalog.photos[i]);
                    patched += 1;
                }
                None => {
                    tracing::warn!("catalog: no photo with fingerprint {}", fingerprint);
                    write.missing.push(fingerprint);
                }
            }
        }

        let mut seen: HashSet<String> = index.into_keys().collect();
        for record in records {
            if seen.insert(record.fingerprint().to_string()) {
                catalog.photos.push(record);
                write.appended += 1;
            } else {
                tracing::debug!("catalog: skipping existing {}", record.fingerprint());
            }
        }

        if write.appended + patched > 0 {
            self.save(&mut state, &mut catalog)?;
        }
        Ok(write)
    }

    pub fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        Ok(self.get(fingerprint)?.is_some())
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<PhotoRecord>, StoreError> {
        Ok(self
            .read()?
            .and_then(|c| c.photos.into_iter().find(|p| p.fingerprint() == fingerprint)))
    }

    /// All records in catalog order (empty when there is no catalog)
    pub fn records(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        Ok(self.read()?.map(|c| c.photos).unwrap_or_default())
    }

    pub fn fingerprints(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .records()?
            .into_iter()
            .map(|p| p.file_info.fingerprint)
            .collect())
    }

    /// Summary with a tag frequency table, `None` without a catalog
    pub fn stats(&self) -> Result<Option<CatalogStats>, StoreError> {
        Ok(self.read()?.map(|c| c.stats()))
    }

    /// Fingerprints that occur more than once (only hand-edited or merged
    /// files can contain them), in first-seen order
    pub fn duplicate_fingerprints(&self) -> Result<Vec<String>, StoreError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order = Vec::new();
        for record in self.records()? {
            let count = counts.entry(record.file_info.fingerprint.clone()).or_insert(0);
            if *count == 0 {
                order.push(record.file_info.fingerprint);
            }
            *count += 1;
        }
        Ok(order.into_iter().filter(|fp| counts[fp] > 1).collect())
    }

    /// Append the records of another catalog file whose fingerprints are new
    /// here. Returns how many were merged.
    pub fn merge_from(&self, other: &Path) -> Result<usize, StoreError> {
        let source = match read_catalog_file(other)? {
            Some(catalog) => catalog,
            None => {
                return Err(StoreError::Io {
                    path: other.to_path_buf(),
                    source: std::io::Error::from(ErrorKind::NotFound),
                })
            }
        };
        let merged = self.append_batch(source.photos)?;
        tracing::info!(
            "merged {} photos from {} into {}",
            merged,
            other.display(),
            self.path.display()
        );
        Ok(merged)
    }

    fn load(&self) -> Result<Option<Catalog>, StoreError> {
        if let Some(catalog) = read_catalog_file(&self.path)? {
            return Ok(Some(catalog));
        }
        let backup = self.backup_path();
        let catalog = read_catalog_file(&backup)?;
        if catalog.is_some() {
            tracing::warn!(
                "catalog {} missing, recovered from {}",
                self.path.display(),
                backup.display()
            );
        }
        Ok(catalog)
    }

    fn new_catalog(&self) -> Catalog {
        Catalog::new(
            self.folder.to_string_lossy(),
            format_naive(&Local::now().naive_local()),
        )
    }

    fn save(&self, state: &mut StoreState, catalog: &mut Catalog) -> Result<(), StoreError> {
        let stamp = next_stamp(
            Local::now().naive_local(),
            state.last_stamp,
            &catalog.last_updated,
        );
        catalog.last_updated = format_naive(&stamp);
        catalog.total_photos = catalog.photos.len() as u64;

        let bytes =
            serde_json::to_vec_pretty(catalog).map_err(|e| StoreError::Serialize(e.to_string()))?;
        persist::write_atomic(&self.path, &bytes, self.backup, &self.retry)?;

        state.last_stamp = Some(stamp);
        tracing::debug!(
            "catalog: wrote {} photos to {}",
            catalog.total_photos,
            self.path.display()
        );
        Ok(())
    }
}

/// `now`, or just after the newest stamp seen, whichever is later.
///
/// Compared at microsecond precision, the precision stamps are stored with.
fn next_stamp(
    now: NaiveDateTime,
    last_written: Option<NaiveDateTime>,
    current: &str,
) -> NaiveDateTime {
    let now = to_micros(now);
    let floor = [last_written, current.parse::<NaiveDateTime>().ok()]
        .into_iter()
        .flatten()
        .map(to_micros)
        .max();
    match floor {
        Some(floor) if now <= floor => floor + Duration::microseconds(1),
        _ => now,
    }
}

fn to_micros(stamp: NaiveDateTime) -> NaiveDateTime {
    stamp
        .with_nanosecond(stamp.nanosecond() / 1_000 * 1_000)
        .unwrap_or(stamp)
}

fn read_catalog_file(path: &Path) -> Result<Option<Catalog>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StoreError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
