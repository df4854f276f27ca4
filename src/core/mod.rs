//! # Core Module
//!
//! The GUI-agnostic cataloging engine.
//!
//! ## Modules
//! - `scanner` - Discovers photos in a folder
//! - `fingerprint` - Metadata fingerprints used for deduplication
//! - `decode` - Pixel decoding (zune-jpeg fast path, image fallback)
//! - `metadata` - Builds catalog records from files and their EXIF
//! - `thumbnail` - Cached JPEG previews in `.thumbnails`
//! - `exposure` - Over/underexposure classification
//! - `catalog` - The `QualityRecord.json` document and its store
//! - `import` - Orchestrates a folder import

pub mod catalog;
pub mod decode;
pub mod exposure;
pub mod fingerprint;
pub mod import;
pub mod metadata;
mod pool;
pub mod scanner;
pub mod thumbnail;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogStore, PhotoRecord, QualityTag, QualityTags, RecordPatch};
pub use exposure::{ExposureClassifier, ExposureConfig, ExposureReport};
pub use import::{ImportResult, Importer, ProgressSink};
pub use metadata::{ExifExtractor, MetadataExtractor};
pub use scanner::PhotoFile;
pub use thumbnail::{FitMode, ThumbnailCache, ThumbnailConfig};
