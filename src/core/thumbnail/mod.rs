//! # Thumbnail Module
//!
//! Cached JPEG previews stored next to the photos.
//!
//! A thumbnail for `<dir>/<stem>.<ext>` at box `W`x`H` lives at
//! `<dir>/.thumbnails/<stem>_<W>x<H>.jpg`. It is reused while its mtime is
//! strictly newer than the source's and regenerated otherwise.
//!
//! Note that two sources that differ only by extension (`a.jpg`, `a.png`)
//! share a cache key; the last one generated wins.

mod resize;

pub use resize::FastResizer;

use crate::core::decode;
use crate::error::ThumbnailError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the hidden cache directory inside a photo folder
pub const THUMBNAIL_DIR: &str = ".thumbnails";

/// How the source is fitted into the thumbnail box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to fill the box, center crop the overflow
    #[default]
    Cover,
    /// Scale to fit inside the box, keep aspect ratio
    Contain,
    /// Stretch to the box
    Fill,
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "fill" => Ok(FitMode::Fill),
            other => Err(format!("unknown fit mode '{}'", other)),
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FitMode::Cover => "cover",
            FitMode::Contain => "contain",
            FitMode::Fill => "fill",
        })
    }
}

/// Thumbnail box, JPEG quality and fit mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Box width and height in pixels
    pub size: (u32, u32),
    /// JPEG quality, clamped to 1-100
    pub quality: u8,
    pub fit_mode: FitMode,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: (200, 200),
            quality: 85,
            fit_mode: FitMode::Cover,
        }
    }
}

/// Directory holding the thumbnails of photos in `folder`
pub fn thumbnail_dir(folder: &Path) -> PathBuf {
    folder.join(THUMBNAIL_DIR)
}

/// Remove every cached thumbnail of `folder`. Returns how many were removed.
pub fn clear(folder: &Path) -> Result<usize, ThumbnailError> {
    let dir = thumbnail_dir(folder);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ThumbnailError::Io { path: dir, source: e }),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry
            .map_err(|e| ThumbnailError::Io {
                path: dir.clone(),
                source: e,
            })?
            .path();
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| ThumbnailError::Io { path, source: e })?;
            removed += 1;
        }
    }
    tracing::info!("removed {} thumbnails from {}", removed, dir.display());
    Ok(removed)
}

/// Total bytes of cached thumbnails in `folder`
pub fn cache_size(folder: &Path) -> Result<u64, ThumbnailError> {
    let dir = thumbnail_dir(folder);
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ThumbnailError::Io { path: dir, source: e }),
    };

    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum())
}

/// Generates and reuses thumbnails for one configuration
#[derive(Debug, Clone, Default)]
pub struct ThumbnailCache {
    config: ThumbnailConfig,
}

impl ThumbnailCache {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Cache location for a source photo
    pub fn thumbnail_path(&self, source: &Path) -> PathBuf {
        let (width, height) = self.config.size;
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let folder = source.parent().unwrap_or_else(|| Path::new(""));
        thumbnail_dir(folder).join(format!("{}_{}x{}.jpg", stem, width, height))
    }

    /// True when a cached thumbnail exists and is newer than the source
    pub fn is_fresh(&self, source: &Path) -> bool {
        let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
        match (modified(&self.thumbnail_path(source)), modified(source)) {
            (Some(thumb), Some(src)) => thumb > src,
            _ => false,
        }
    }

    /// Path of an up-to-date thumbnail for `source`, generating it if needed
    pub fn get_or_create(&self, source: &Path) -> Result<PathBuf, ThumbnailError> {
        let (width, height) = self.config.size;
        if width == 0 || height == 0 {
            return Err(ThumbnailError::InvalidBox { width, height });
        }

        let target = self.thumbnail_path(source);
        if self.is_fresh(source) {
            tracing::debug!("thumbnail: reusing {}", target.display());
            return Ok(target);
        }

        let image = decode::decode_oriented(source)?;
        let rgb = flatten_on_white(image);

        let resized = FastResizer::new()
            .resize(&rgb, width, height, self.config.fit_mode)
            .map_err(|reason| ThumbnailError::Resize {
                path: source.to_path_buf(),
                reason,
            })?;

        self.write_jpeg(&resized, &target)?;
        tracing::debug!("thumbnail: generated {}", target.display());
        Ok(target)
    }

    /// Thumbnails for many photos in parallel; results in input order
    pub fn generate_batch(
        &self,
        sources: &[PathBuf],
    ) -> Vec<(PathBuf, Result<PathBuf, ThumbnailError>)> {
        sources
            .par_iter()
            .map(|source| (source.clone(), self.get_or_create(source)))
            .collect()
    }

    /// Encode into a temp file in the cache dir, then atomically move it
    /// into place so readers never see a partial JPEG.
    fn write_jpeg(&self, image: &RgbImage, target: &Path) -> Result<(), ThumbnailError> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| ThumbnailError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ThumbnailError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            let quality = self.config.quality.clamp(1, 100);
            JpegEncoder::new_with_quality(&mut writer, quality)
                .encode_image(image)
                .map_err(|e| ThumbnailError::Encode {
                    path: target.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        temp.persist(target).map_err(|e| ThumbnailError::Io {
            path: target.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// JPEG has no alpha: composite transparent pixels over white
fn flatten_on_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
