//! # Error Module
//!
//! Error types for the photo catalog.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, fingerprints, what went wrong
//! - **Keep batches alive** - per-file errors are values the orchestrator collects

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Metadata error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Thumbnail error: {0}")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Catalog error: {0}")]
    Store(#[from] StoreError),

    #[error("Exposure error: {0}")]
    Exposure(#[from] ExposureError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The import ran to the end but some entries failed; the details are
    /// in its `ImportResult`
    #[error("Import of {folder} finished with {failed} failures")]
    ImportIncomplete { folder: PathBuf, failed: usize },
}

/// Errors that occur during folder scanning
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced while reading a photo's metadata or pixels
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported image format '{extension}': {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image is corrupted or not an image {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

impl ExtractError {
    /// Classify an I/O error against the file it happened on
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => ExtractError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => ExtractError::PermissionDenied { path },
            _ => ExtractError::Unreadable { path, source },
        }
    }

    /// The file the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            ExtractError::UnsupportedFormat { path, .. }
            | ExtractError::NotFound { path }
            | ExtractError::PermissionDenied { path }
            | ExtractError::Unreadable { path, .. }
            | ExtractError::Corrupted { path, .. } => path,
        }
    }
}

/// Errors from the thumbnail cache
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Invalid thumbnail box {width}x{height}")]
    InvalidBox { width: u32, height: u32 },

    #[error("Cannot decode source for thumbnail: {0}")]
    Decode(#[from] ExtractError),

    #[error("Failed to resize {path}: {reason}")]
    Resize { path: PathBuf, reason: String },

    #[error("Failed to encode thumbnail {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Thumbnail I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the catalog store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write catalog {path} after {attempts} attempts: {reason}")]
    WriteFailure {
        path: PathBuf,
        attempts: u32,
        reason: String,
    },

    #[error("No photo with fingerprint {fingerprint} in the catalog")]
    NotFound { fingerprint: String },

    #[error("Catalog {path} is not valid: {reason}. Restore it from the .bak file or move it aside.")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Catalog I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize catalog: {0}")]
    Serialize(String),

    #[error("Catalog lock was poisoned by a panicking writer")]
    LockPoisoned,
}

/// Errors from the exposure classifier
#[derive(Error, Debug)]
pub enum ExposureError {
    #[error("Cannot read pixels: {0}")]
    Unreadable(#[from] ExtractError),

    #[error("Invalid exposure configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Catalog update failed: {0}")]
    Store(#[from] StoreError),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;
