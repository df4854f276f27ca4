//! # Scanner Module
//!
//! Discovers photo files in a catalog folder.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg, .jpe, .jfif)
//! - PNG (.png)
//! - BMP (.bmp, .dib)
//! - TIFF (.tiff, .tif)
//! - GIF (.gif)
//! - WebP (.webp)
//! - HEIC / HEIF (.heic, .heif) - iPhone photos
//!
//! The thumbnail cache directory (`.thumbnails`) is always skipped so the
//! previews we generate are never imported as photos.
//!
//! ## Example
//! ```rust,ignore
//! use photo_catalog::core::scanner::{PhotoScanner, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/Users/me/Pictures/trip"))?;
//! ```

mod filter;
mod walker;

pub use filter::ImageFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Represents a discovered photo file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoFile {
    /// Path to the photo file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Detected image format
    pub format: ImageFormat,
}

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    Gif,
    WebP,
    Heic,
    Heif,
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jfif" => ImageFormat::Jpeg,
            "png" => ImageFormat::Png,
            "bmp" | "dib" => ImageFormat::Bmp,
            "tiff" | "tif" => ImageFormat::Tiff,
            "gif" => ImageFormat::Gif,
            "webp" => ImageFormat::WebP,
            "heic" => ImageFormat::Heic,
            "heif" => ImageFormat::Heif,
            _ => ImageFormat::Unknown,
        }
    }

    /// Detect format from a path's extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(ImageFormat::from_extension)
            .unwrap_or(ImageFormat::Unknown)
    }

    /// Check if this format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, ImageFormat::Unknown)
    }

    /// Format tag stored in the catalog (`file_info.file_format`)
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Jpeg => Some("JPEG"),
            ImageFormat::Png => Some("PNG"),
            ImageFormat::Bmp => Some("BMP"),
            ImageFormat::Tiff => Some("TIFF"),
            ImageFormat::Gif => Some("GIF"),
            ImageFormat::WebP => Some("WebP"),
            ImageFormat::Heic => Some("HEIC"),
            ImageFormat::Heif => Some("HEIF"),
            ImageFormat::Unknown => None,
        }
    }

    /// Whether this is one of the HEIF-family containers
    pub fn is_heif(&self) -> bool {
        matches!(self, ImageFormat::Heic | ImageFormat::Heif)
    }
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Discovered photos, sorted by path
    pub photos: Vec<PhotoFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for photo scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait PhotoScanner: Send + Sync {
    /// Scan a folder and return discovered photos
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_format_from_extension_lowercase() {
        assert_eq!(ImageFormat::from_extension("jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("jfif"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("dib"), ImageFormat::Bmp);
        assert_eq!(ImageFormat::from_extension("heic"), ImageFormat::Heic);
    }

    #[test]
    fn image_format_from_extension_uppercase() {
        assert_eq!(ImageFormat::from_extension("JPG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("TIF"), ImageFormat::Tiff);
        assert_eq!(ImageFormat::from_extension("HEIF"), ImageFormat::Heif);
    }

    #[test]
    fn unknown_extension_is_not_supported() {
        assert_eq!(ImageFormat::from_extension("txt"), ImageFormat::Unknown);
        assert!(!ImageFormat::Unknown.is_supported());
        assert!(ImageFormat::Jpeg.is_supported());
    }

    #[test]
    fn catalog_tags_match_stored_format_names() {
        assert_eq!(ImageFormat::Jpeg.tag(), Some("JPEG"));
        assert_eq!(ImageFormat::WebP.tag(), Some("WebP"));
        assert_eq!(ImageFormat::Unknown.tag(), None);
    }
}
