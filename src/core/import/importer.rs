//! Folder import: scan, dedup, extract, thumbnail, one catalog write.

use super::progress::{ProgressSink, ProgressTracker, Tally};
use super::{FileOutcome, ImportResult};
use crate::core::catalog::{CatalogStore, PhotoRecord, RecordPatch};
use crate::core::fingerprint;
use crate::core::metadata::{ExifExtractor, MetadataExtractor};
use crate::core::pool;
use crate::core::scanner::{PhotoScanner, ScanConfig, WalkDirScanner};
use crate::core::thumbnail::{ThumbnailCache, ThumbnailConfig};
use crate::error::StoreError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Import settings
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Worker threads for extraction and thumbnails
    pub workers: usize,
    /// Descend into subfolders
    pub recursive: bool,
    /// Leave already cataloged photos alone. When off, their metadata is
    /// re-read and written over the existing record (quality tags are kept).
    pub skip_existing: bool,
    /// Generate thumbnails during import
    pub thumbnails: bool,
    pub thumbnail_config: ThumbnailConfig,
    /// Keep a `.bak` of the previous catalog on the batch write
    pub backup: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            recursive: false,
            skip_existing: true,
            thumbnails: true,
            thumbnail_config: ThumbnailConfig::default(),
            backup: false,
        }
    }
}

/// Builder for [`Importer`]
pub struct ImporterBuilder {
    config: ImportConfig,
    extractor: Option<Arc<dyn MetadataExtractor>>,
}

impl ImporterBuilder {
    pub fn new() -> Self {
        Self {
            config: ImportConfig::default(),
            extractor: None,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.config.recursive = recursive;
        self
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.config.skip_existing = skip;
        self
    }

    pub fn thumbnails(mut self, enabled: bool) -> Self {
        self.config.thumbnails = enabled;
        self
    }

    pub fn thumbnail_config(mut self, config: ThumbnailConfig) -> Self {
        self.config.thumbnail_config = config;
        self
    }

    pub fn backup(mut self, backup: bool) -> Self {
        self.config.backup = backup;
        self
    }

    /// Replace the metadata backend (defaults to [`ExifExtractor`])
    pub fn extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Importer {
        Importer {
            config: self.config,
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(ExifExtractor::new())),
        }
    }
}

impl Default for ImporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Imports folders into their catalogs
pub struct Importer {
    config: ImportConfig,
    extractor: Arc<dyn MetadataExtractor>,
}

impl Default for Importer {
    fn default() -> Self {
        ImporterBuilder::new().build()
    }
}

impl Importer {
    pub fn builder() -> ImporterBuilder {
        ImporterBuilder::new()
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import every supported photo in `folder` into its catalog.
    ///
    /// Never panics on bad files: each failure is counted and described in
    /// the result, and the rest of the batch goes on.
    pub fn import_folder(&self, folder: &Path, sink: &dyn ProgressSink) -> ImportResult {
        if !folder.exists() {
            return ImportResult::rejected(format!("Folder does not exist: {}", folder.display()));
        }
        if !folder.is_dir() {
            return ImportResult::rejected(format!("Not a folder: {}", folder.display()));
        }

        let store = CatalogStore::open(folder).with_backup(self.config.backup);
        let catalog_path = store.path().to_path_buf();

        let existing = match store.fingerprints() {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!("import: cannot read catalog of {}: {}", folder.display(), e);
                return ImportResult {
                    success: false,
                    errors: vec![e.to_string()],
                    catalog_path: Some(catalog_path),
                    ..Default::default()
                };
            }
        };

        let scanner = WalkDirScanner::new(ScanConfig {
            recursive: self.config.recursive,
            ..Default::default()
        });
        let scan = match scanner.scan(folder) {
            Ok(scan) => scan,
            Err(e) => {
                return ImportResult {
                    success: false,
                    errors: vec![e.to_string()],
                    catalog_path: Some(catalog_path),
                    ..Default::default()
                }
            }
        };

        // Entries the walk could not read are reported, the rest goes on
        let scan_errors: Vec<String> = scan
            .errors
            .iter()
            .map(|e| format!("Scan failed: {}", e))
            .collect();
        let files: Vec<PathBuf> = scan.photos.into_iter().map(|p| p.path).collect();
        let total = files.len();
        if total == 0 {
            tracing::info!("import: no supported photos in {}", folder.display());
            let result = ImportResult {
                success: scan_errors.is_empty(),
                errors: scan_errors,
                catalog_path: Some(catalog_path),
                ..Default::default()
            };
            sink.completed(&result);
            return result;
        }

        tracing::info!(
            "import: {} photos in {} ({} already cataloged)",
            total,
            folder.display(),
            existing.len()
        );
        sink.started(folder, total);

        let seen = Mutex::new(if self.config.skip_existing {
            existing.clone()
        } else {
            HashSet::new()
        });
        let thumbnails = self
            .config
            .thumbnails
            .then(|| ThumbnailCache::new(self.config.thumbnail_config));
        let tracker = ProgressTracker::new(total);
        let collected: Mutex<Vec<(PathBuf, FileOutcome)>> = Mutex::new(Vec::with_capacity(total));

        pool::install(self.config.workers, || {
            files.par_iter().for_each(|path| {
                let outcome = self.process_file(path, &seen, thumbnails.as_ref());
                let tally = match &outcome {
                    FileOutcome::Imported(_) => Tally::Imported,
                    FileOutcome::Skipped => Tally::Skipped,
                    FileOutcome::Failed(message) => {
                        tracing::warn!("import: {}: {}", path.display(), message);
                        sink.file_failed(path, message);
                        Tally::Failed
                    }
                };
                // Collect before reporting so completion order is kept
                let mut collected = pool::lock(&collected);
                collected.push((path.clone(), outcome));
                tracker.record(tally, sink);
            })
        });

        let scan_failed = !scan_errors.is_empty();
        let mut result = ImportResult {
            success: true,
            total_files: total,
            errors: scan_errors,
            catalog_path: Some(catalog_path),
            ..Default::default()
        };
        let mut fresh = Vec::new();
        let mut refreshed = Vec::new();
        for (path, outcome) in collected
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
        {
            match outcome {
                FileOutcome::Imported(record) if existing.contains(record.fingerprint()) => {
                    refreshed.push(*record)
                }
                FileOutcome::Imported(record) => fresh.push(*record),
                FileOutcome::Skipped => result.skipped_files += 1,
                FileOutcome::Failed(message) => {
                    result.error_files += 1;
                    result.errors.push(format!("{}: {}", path.display(), message));
                }
            }
        }
        result.imported_files = fresh.len() + refreshed.len();

        if let Err(e) = persist(&store, &fresh, &refreshed) {
            tracing::warn!("import: catalog write failed: {}", e);
            result.error_files += result.imported_files;
            result.imported_files = 0;
            result.errors.push(format!("Failed to write catalog: {}", e));
            for record in fresh.iter().chain(&refreshed) {
                result
                    .errors
                    .push(format!("Not saved to catalog: {}", record.path()));
            }
        }

        result.success = result.error_files == 0 && !scan_failed;
        tracing::info!(
            "import: {} imported, {} skipped, {} failed",
            result.imported_files,
            result.skipped_files,
            result.error_files
        );
        sink.completed(&result);
        result
    }

    /// Import only what is new in `folder`
    pub fn refresh_folder(&self, folder: &Path, sink: &dyn ProgressSink) -> ImportResult {
        let importer = Importer {
            config: ImportConfig {
                skip_existing: true,
                ..self.config.clone()
            },
            extractor: Arc::clone(&self.extractor),
        };
        importer.import_folder(folder, sink)
    }

    fn process_file(
        &self,
        path: &Path,
        seen: &Mutex<HashSet<String>>,
        thumbnails: Option<&ThumbnailCache>,
    ) -> FileOutcome {
        let fingerprint = match fingerprint::fingerprint_file(path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => return FileOutcome::Failed(e.to_string()),
        };

        // Check-and-insert in one step so two copies in one batch cannot
        // both pass.
        if !pool::lock(seen).insert(fingerprint) {
            tracing::debug!("import: skipping cataloged {}", path.display());
            return FileOutcome::Skipped;
        }

        let mut record = match self.extractor.extract(path) {
            Ok(record) => record,
            Err(e) => return FileOutcome::Failed(e.to_string()),
        };

        if let Some(cache) = thumbnails {
            match cache.get_or_create(path) {
                Ok(thumb) => record.file_info.thumbnail_path = Some(thumb.to_string_lossy().into_owned()),
                Err(e) => tracing::warn!("import: no thumbnail for {}: {}", path.display(), e),
            }
        }

        FileOutcome::Imported(Box::new(record))
    }
}

/// New records and re-read ones go to the catalog in one write
fn persist(
    store: &CatalogStore,
    fresh: &[PhotoRecord],
    refreshed: &[PhotoRecord],
) -> Result<(), StoreError> {
    if fresh.is_empty() && refreshed.is_empty() {
        return Ok(());
    }
    let patches = refreshed
        .iter()
        .map(|record| (record.fingerprint().to_string(), refresh_patch(record)))
        .collect();
    let write = store.apply_batch(fresh.to_vec(), patches)?;
    tracing::debug!(
        "import: appended {}, refreshed {} records",
        write.appended,
        refreshed.len().saturating_sub(write.missing.len())
    );
    Ok(())
}

/// Everything re-read from the file; quality tags stay as reviewed
fn refresh_patch(record: &PhotoRecord) -> RecordPatch {
    RecordPatch {
        quality_tags: None,
        thumbnail_path: Some(record.file_info.thumbnail_path.clone()),
        image_info: Some(record.image_info.clone()),
        camera_info: Some(record.camera_info.clone().unwrap_or_default()),
        exif_data: Some(record.exif_data.clone().unwrap_or_default()),
        gps_info: Some(record.gps_info.clone().unwrap_or_default()),
        additional_info: Some(record.additional_info.clone().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{QualityTag, QualityTags};
    use crate::error::ExtractError;
    use crate::events::ImportProgress;
    use crate::core::import::NoProgress;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    fn save_photo(dir: &Path, name: &str, shade: u8) -> PathBuf {
        let path = dir.join(name);
        ImageBuffer::from_pixel(24, 16, Rgb([shade, shade, shade]))
            .save(&path)
            .unwrap();
        path
    }

    fn importer() -> Importer {
        Importer::builder().thumbnails(false).workers(2).build()
    }

    #[test]
    fn missing_folder_is_rejected() {
        let result = importer().import_folder(Path::new("/no/such/folder"), &NoProgress);
        assert!(!result.success);
        assert!(result.catalog_path.is_none());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn file_instead_of_folder_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = save_photo(dir.path(), "a.png", 10);
        let result = importer().import_folder(&file, &NoProgress);
        assert!(!result.success);
        assert!(result.catalog_path.is_none());
    }

    #[test]
    fn empty_folder_succeeds_without_catalog() {
        let dir = TempDir::new().unwrap();
        let result = importer().import_folder(dir.path(), &NoProgress);
        assert!(result.success);
        assert_eq!(result.total_files, 0);
        assert!(result.catalog_path.is_some());
        assert!(!dir.path().join("QualityRecord.json").exists());
    }

    #[test]
    fn second_import_skips_everything() {
        let dir = TempDir::new().unwrap();
        save_photo(dir.path(), "a.png", 10);
        save_photo(dir.path(), "b.png", 200);

        let first = importer().import_folder(dir.path(), &NoProgress);
        assert_eq!(first.imported_files, 2);

        let second = importer().import_folder(dir.path(), &NoProgress);
        assert!(second.success);
        assert_eq!(second.imported_files, 0);
        assert_eq!(second.skipped_files, 2);
        assert_eq!(CatalogStore::open(dir.path()).records().unwrap().len(), 2);
    }

    #[test]
    fn no_skip_existing_refreshes_but_keeps_tags() {
        let dir = TempDir::new().unwrap();
        let photo = save_photo(dir.path(), "a.png", 10);
        importer().import_folder(dir.path(), &NoProgress);

        let store = CatalogStore::open(dir.path());
        let fingerprint = fingerprint::fingerprint_file(&photo).unwrap();
        store
            .update(&fingerprint, RecordPatch::quality(QualityTags::single(QualityTag::Qualified)))
            .unwrap();

        let result = Importer::builder()
            .thumbnails(false)
            .skip_existing(false)
            .build()
            .import_folder(dir.path(), &NoProgress);

        assert!(result.success);
        assert_eq!(result.imported_files, 1);
        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].quality_tags,
            QualityTags::single(QualityTag::Qualified)
        );
    }

    #[test]
    fn refresh_with_new_photos_is_one_write() {
        let dir = TempDir::new().unwrap();
        save_photo(dir.path(), "a.png", 10);
        importer().import_folder(dir.path(), &NoProgress);
        let catalog = dir.path().join("QualityRecord.json");
        let before = fs::read(&catalog).unwrap();

        save_photo(dir.path(), "b.png", 200);
        let result = Importer::builder()
            .thumbnails(false)
            .skip_existing(false)
            .backup(true)
            .build()
            .import_folder(dir.path(), &NoProgress);

        assert!(result.success);
        assert_eq!(result.imported_files, 2);
        // A second write would have backed up the half-way catalog instead
        assert_eq!(fs::read(dir.path().join("QualityRecord.json.bak")).unwrap(), before);
        assert_eq!(CatalogStore::open(dir.path()).records().unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subfolder_fails_the_import() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        save_photo(dir.path(), "a.png", 10);
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        save_photo(&locked, "b.png", 20);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permissions are not enforced for this user (root)
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = Importer::builder()
            .thumbnails(false)
            .recursive(true)
            .build()
            .import_folder(dir.path(), &NoProgress);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!result.success);
        assert_eq!(result.imported_files, 1);
        assert_eq!(result.error_files, 0);
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("Scan failed") && e.contains("locked")));
    }

    #[test]
    fn thumbnails_are_linked_from_records() {
        let dir = TempDir::new().unwrap();
        save_photo(dir.path(), "a.png", 90);

        let result = Importer::builder().build().import_folder(dir.path(), &NoProgress);
        assert_eq!(result.imported_files, 1);

        let record = &CatalogStore::open(dir.path()).records().unwrap()[0];
        let thumb = record.file_info.thumbnail_path.as_deref().unwrap();
        assert!(thumb.contains(".thumbnails"));
        assert!(Path::new(thumb).exists());
    }

    #[test]
    fn progress_is_monotonic_and_complete() {
        let dir = TempDir::new().unwrap();
        for i in 0..8 {
            save_photo(dir.path(), &format!("p{}.png", i), i * 20);
        }
        fs::write(dir.path().join("bad.jpg"), b"not an image").unwrap();

        let seen = Mutex::new(Vec::new());
        let sink = |p: &ImportProgress| seen.lock().unwrap().push(*p);
        let result = importer().import_folder(dir.path(), &sink);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 9);
        assert!(seen.windows(2).all(|w| w[0].processed < w[1].processed));
        let last = seen.last().unwrap();
        assert_eq!(last.percentage, 100.0);
        assert_eq!(last.errors, 1);
        assert_eq!(last.imported, 8);
        assert_eq!(result.error_files, 1);
        assert!(!result.success);
    }

    struct FailingExtractor;

    impl MetadataExtractor for FailingExtractor {
        fn extract(&self, path: &Path) -> Result<PhotoRecord, ExtractError> {
            Err(ExtractError::Corrupted {
                path: path.to_path_buf(),
                reason: "always fails".to_string(),
            })
        }
    }

    #[test]
    fn extractor_is_pluggable() {
        let dir = TempDir::new().unwrap();
        save_photo(dir.path(), "a.png", 10);

        let result = Importer::builder()
            .thumbnails(false)
            .extractor(Arc::new(FailingExtractor))
            .build()
            .import_folder(dir.path(), &NoProgress);

        assert_eq!(result.error_files, 1);
        assert!(result.errors[0].contains("always fails"));
    }

    #[test]
    fn unreadable_catalog_aborts_import() {
        let dir = TempDir::new().unwrap();
        save_photo(dir.path(), "a.png", 10);
        fs::write(dir.path().join("QualityRecord.json"), "{ broken").unwrap();

        let result = importer().import_folder(dir.path(), &NoProgress);
        assert!(!result.success);
        assert_eq!(result.imported_files, 0);
        assert!(result.catalog_path.is_some());
        // The damaged file is left for the user to recover
        assert_eq!(
            fs::read_to_string(dir.path().join("QualityRecord.json")).unwrap(),
            "{ broken"
        );
    }
}
