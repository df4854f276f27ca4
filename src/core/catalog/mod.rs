//! # Catalog Module
//!
//! The per-folder catalog document and its crash-safe store.
//!
//! ## File Layout
//! ```text
//! <folder>/QualityRecord.json          current catalog
//! <folder>/QualityRecord.json.bak      previous version (when backups are on)
//! <folder>/QualityRecord.json.tmp_XXXX in-flight write, removed on failure
//! ```
//!
//! ## Invariants
//! - Fingerprints are unique; appending a known fingerprint is a skip.
//! - `total_photos == photos.len()` after every write.
//! - `last_updated` strictly advances across writes made through one store.

mod compat;
mod persist;
mod store;
mod types;

pub use persist::{backup_path, backup_existing, write_atomic, RetryPolicy, StagedWrite};
pub use store::{catalog_path, BatchWrite, CatalogStore, CATALOG_FILE_NAME};
pub use types::{
    AdditionalInfo, CameraInfo, Catalog, CatalogStats, ExifData, FileInfo, GpsInfo, ImageInfo,
    PhotoRecord, QualityTag, QualityTags, RecordPatch, CATALOG_VERSION,
};
