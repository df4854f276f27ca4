//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, ImageFilter};
use super::{PhotoFile, PhotoScanner, ScanResult};
use crate::core::thumbnail::THUMBNAIL_DIR;
use crate::error::ScanError;
use std::fs;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Descend into subfolders (default: only the folder itself)
    pub recursive: bool,
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Directory names that are never entered, hidden or not
    pub excluded_dirs: Vec<String>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            follow_symlinks: false,
            include_hidden: false,
            excluded_dirs: vec![THUMBNAIL_DIR.to_string()],
            extensions: None,
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = ImageFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions.clone());
        }

        Self { config, filter }
    }

    /// Whether the walker may enter this directory
    fn enter_directory(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if self.config.excluded_dirs.iter().any(|d| d.as_str() == name) {
            return false;
        }
        self.config.include_hidden || !is_hidden(entry.path())
    }
}

impl PhotoScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        if !root.exists() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let mut photos = Vec::new();
        let mut errors = Vec::new();

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.enter_directory(entry));

        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: std::io::Error::other(e.to_string()),
                        }
                    };
                    tracing::warn!("scan: {}", error);
                    errors.push(error);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() && !path.is_file() {
                continue;
            }
            if !self.filter.should_include(path) {
                continue;
            }

            match fs::metadata(path) {
                Ok(metadata) => photos.push(PhotoFile {
                    path: path.to_path_buf(),
                    size: metadata.len(),
                    modified: metadata
                        .modified()
                        .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                    format: self.filter.get_format(path),
                }),
                Err(e) => {
                    let error = ScanError::ReadDirectory {
                        path: path.to_path_buf(),
                        source: e,
                    };
                    tracing::warn!("scan: {}", error);
                    errors.push(error);
                }
            }
        }

        photos.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("scan: {} photos in {}", photos.len(), root.display());

        Ok(ScanResult { photos, errors })
    }
}
