//! # Fingerprint Module
//!
//! Stable identity keys for catalog deduplication.
//!
//! A fingerprint is the SHA-256 of a file's name, path, size, format tag and
//! creation timestamp. It is derived from a single `stat` call and never
//! reads file content, so two different files that agree on all five fields
//! collide, and moving a file or touching its timestamp gives it a new
//! fingerprint even though its bytes are unchanged.

use crate::core::scanner::ImageFormat;
use crate::error::ExtractError;
use chrono::{DateTime, Local, Timelike};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Compute the fingerprint of a file from its catalog fields.
pub fn fingerprint(
    name: &str,
    path: &str,
    size_bytes: u64,
    format: &str,
    creation_time: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(size_bytes.to_string().as_bytes());
    hasher.update(format.as_bytes());
    hasher.update(creation_time.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fingerprint a file on disk (stat only).
pub fn fingerprint_file(path: &Path) -> Result<String, ExtractError> {
    Ok(FileIdentity::from_path(path)?.fingerprint())
}

/// The filesystem-level facts a catalog record is keyed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    pub name: String,
    /// Absolute path as stored in the catalog
    pub path: String,
    pub size_bytes: u64,
    /// Upper-case format tag (`JPEG`, `PNG`, ...)
    pub format: String,
    /// Lower-case extension without the dot
    pub extension: String,
    pub creation_time: String,
    pub modification_time: String,
}

impl FileIdentity {
    /// Read identity fields for a file with one `stat` call
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let absolute = absolute_path(path).map_err(|e| ExtractError::from_io(path, e))?;
        let metadata = fs::metadata(&absolute).map_err(|e| ExtractError::from_io(path, e))?;

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let modification_time = iso_timestamp(modified);
        let creation_time = creation_timestamp(&metadata).unwrap_or_else(|| modification_time.clone());

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        Ok(Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: absolute.to_string_lossy().into_owned(),
            size_bytes: metadata.len(),
            format: format_tag(&extension),
            extension,
            creation_time,
            modification_time,
        })
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(
            &self.name,
            &self.path,
            self.size_bytes,
            &self.format,
            &self.creation_time,
        )
    }
}

/// Catalog format tag for an extension; unknown extensions are upper-cased.
pub fn format_tag(extension: &str) -> String {
    match ImageFormat::from_extension(extension).tag() {
        Some(tag) => tag.to_string(),
        None => extension.to_uppercase(),
    }
}

/// ISO-8601 local time, microseconds only when non-zero.
pub fn iso_timestamp(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    format_naive(&local.naive_local())
}

pub(crate) fn format_naive(naive: &chrono::NaiveDateTime) -> String {
    if naive.nanosecond() / 1_000 == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

#[cfg(windows)]
fn creation_timestamp(metadata: &fs::Metadata) -> Option<String> {
    metadata.created().ok().map(iso_timestamp)
}

// Outside Windows the "creation" field has always been the mtime.
#[cfg(not(windows))]
fn creation_timestamp(_metadata: &fs::Metadata) -> Option<String> {
    None
}

fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint("a.jpg", "/p/a.jpg", 1024, "JPEG", "2024-01-01T10:00:00");
        let b = fingerprint("a.jpg", "/p/a.jpg", 1024, "JPEG", "2024-01-01T10:00:00");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_is_sha256_of_concatenated_fields() {
        let expected = hex::encode(Sha256::digest(b"a.jpg/p/a.jpg1024JPEG2024-01-01T10:00:00"));
        assert_eq!(
            fingerprint("a.jpg", "/p/a.jpg", 1024, "JPEG", "2024-01-01T10:00:00"),
            expected
        );
    }

    #[test]
    fn any_field_change_changes_fingerprint() {
        let base = fingerprint("a.jpg", "/p/a.jpg", 1024, "JPEG", "t");
        assert_ne!(base, fingerprint("b.jpg", "/p/a.jpg", 1024, "JPEG", "t"));
        assert_ne!(base, fingerprint("a.jpg", "/q/a.jpg", 1024, "JPEG", "t"));
        assert_ne!(base, fingerprint("a.jpg", "/p/a.jpg", 1025, "JPEG", "t"));
        assert_ne!(base, fingerprint("a.jpg", "/p/a.jpg", 1024, "PNG", "t"));
        assert_ne!(base, fingerprint("a.jpg", "/p/a.jpg", 1024, "JPEG", "u"));
    }

    #[test]
    fn fingerprint_ignores_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("same.jpg");
        fs::write(&path, b"AAAA").unwrap();
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        let before = fingerprint_file(&path).unwrap();

        // Same length, different bytes, same timestamp.
        let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.write_all(b"BBBB").unwrap();
        file.set_modified(mtime).unwrap();
        drop(file);

        assert_eq!(before, fingerprint_file(&path).unwrap());
    }

    #[test]
    fn identity_reads_file_facts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("旅行.JPG");
        fs::write(&path, b"12345").unwrap();

        let identity = FileIdentity::from_path(&path).unwrap();
        assert_eq!(identity.name, "旅行.JPG");
        assert_eq!(identity.size_bytes, 5);
        assert_eq!(identity.format, "JPEG");
        assert_eq!(identity.extension, "jpg");
        assert!(Path::new(&identity.path).is_absolute());
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = fingerprint_file(Path::new("/nonexistent/photo.jpg"));
        assert!(matches!(result, Err(ExtractError::NotFound { .. })));
    }

    #[test]
    fn timestamps_drop_zero_microseconds() {
        let whole = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert!(!iso_timestamp(whole).contains('.'));

        let fractional = whole + Duration::from_micros(250);
        assert!(iso_timestamp(fractional).ends_with(".000250"));
    }

    #[test]
    fn unknown_extension_is_upper_cased() {
        assert_eq!(format_tag("xyz"), "XYZ");
        assert_eq!(format_tag("tif"), "TIFF");
    }
}
