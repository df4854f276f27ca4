//! # Import Module
//!
//! Brings a folder's photos into its `QualityRecord.json`.
//!
//! ## Per-file flow
//! Discovered, fingerprinted, then either skipped (already cataloged or a
//! duplicate earlier in the batch) or extracted, thumbnailed and collected.
//! Collected records are written in a single catalog write once all
//! workers are done.
//!
//! A failed thumbnail never fails a file. A failed catalog write turns every
//! collected file into an error. Entries the scan could not read (an
//! unreadable subfolder) are listed in the errors and fail the import.

mod importer;
mod progress;

pub use importer::{ImportConfig, Importer, ImporterBuilder};
pub use progress::{NoProgress, ProgressSink};

use crate::core::catalog::{CatalogStats, CatalogStore, PhotoRecord};
use crate::error::StoreError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How one file ended
#[derive(Debug)]
pub enum FileOutcome {
    Imported(Box<PhotoRecord>),
    /// Already cataloged, or seen earlier in the same batch
    Skipped,
    Failed(String),
}

/// Summary of one import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    /// True when no file failed and the whole folder could be walked
    pub success: bool,
    pub total_files: usize,
    pub imported_files: usize,
    pub skipped_files: usize,
    pub error_files: usize,
    /// Human readable failure lines
    pub errors: Vec<String>,
    /// Catalog of the folder; `None` when the folder itself was invalid
    pub catalog_path: Option<PathBuf>,
}

impl ImportResult {
    fn rejected(message: String) -> Self {
        tracing::warn!("import: {}", message);
        Self {
            success: false,
            errors: vec![message],
            ..Default::default()
        }
    }
}

/// Fingerprints that appear more than once in the folder's catalog
pub fn check_duplicates(folder: &Path) -> Result<Vec<String>, StoreError> {
    let duplicates = CatalogStore::open(folder).duplicate_fingerprints()?;
    tracing::info!("{} duplicated fingerprints in {}", duplicates.len(), folder.display());
    Ok(duplicates)
}

/// Catalog statistics for the folder, `None` if it has no catalog
pub fn import_stats(folder: &Path) -> Result<Option<CatalogStats>, StoreError> {
    CatalogStore::open(folder).stats()
}
