//! # Metadata Module
//!
//! Builds a catalog record from a photo file.
//!
//! ## Extracted Fields
//! - File facts and fingerprint (one `stat`)
//! - Dimensions, color mode and bit depth (image header probe)
//! - Camera, exposure settings, capture date, GPS (EXIF, when present)
//!
//! ## Supported Formats
//! EXIF is read from JPEG, TIFF, PNG, WebP and HEIF containers. Files
//! without EXIF are cataloged with those sections left out.

mod tags;

pub use tags::{dms_to_decimal, exif_datetime_to_iso, read_orientation};

use crate::core::catalog::{CameraInfo, FileInfo, ImageInfo, PhotoRecord, QualityTags};
use crate::core::fingerprint::FileIdentity;
use crate::core::scanner::ImageFormat;
use crate::error::ExtractError;
use image::{ColorType, ImageDecoder, ImageReader};
use std::path::Path;

/// Produces a catalog record for one file.
///
/// Implement this trait to swap the extraction backend (e.g. in tests).
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<PhotoRecord, ExtractError>;
}

/// Default extractor: `image` header probe plus kamadak-exif
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifExtractor;

impl ExifExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<PhotoRecord, ExtractError> {
        let format = ImageFormat::from_path(path);
        if !format.is_supported() {
            return Err(ExtractError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default(),
            });
        }

        let identity = FileIdentity::from_path(path)?;
        let image_info = image_info(path, format)?;

        let (camera_info, exif_data, gps_info, additional_info) = match tags::read_exif(path) {
            Some(ref exif) => (
                Some(tags::camera_info(exif)).filter(|s| !s.is_empty()),
                Some(tags::exif_data(exif)).filter(|s| !s.is_empty()),
                Some(tags::gps_info(exif)).filter(|s| !s.is_empty()),
                Some(tags::additional_info(exif)).filter(|s| !s.is_empty()),
            ),
            None => (None, None, None, None),
        };

        let fingerprint = identity.fingerprint();
        Ok(PhotoRecord {
            file_info: FileInfo {
                file_name: identity.name,
                file_path: identity.path,
                file_size_bytes: identity.size_bytes,
                file_format: identity.format,
                file_extension: identity.extension,
                creation_time: identity.creation_time,
                modification_time: Some(identity.modification_time),
                fingerprint,
                thumbnail_path: None,
            },
            image_info,
            camera_info,
            exif_data,
            gps_info,
            additional_info,
            quality_tags: QualityTags::default(),
        })
    }
}

/// Dimensions and pixel layout without decoding the whole image
fn image_info(path: &Path, format: ImageFormat) -> Result<ImageInfo, ExtractError> {
    let (width, height, color) = if format.is_heif() {
        // No header probe for HEIF; decode through the platform converter.
        let image = crate::core::decode::decode(path)?;
        (image.width(), image.height(), Some(image.color()))
    } else {
        let decoder = ImageReader::open(path)
            .map_err(|e| ExtractError::from_io(path, e))?
            .with_guessed_format()
            .map_err(|e| ExtractError::from_io(path, e))?
            .into_decoder()
            .map_err(|e| ExtractError::Corrupted {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let (width, height) = decoder.dimensions();
        (width, height, Some(decoder.color_type()))
    };

    if width == 0 || height == 0 {
        return Err(ExtractError::Corrupted {
            path: path.to_path_buf(),
            reason: format!("image has zero size ({}x{})", width, height),
        });
    }

    Ok(ImageInfo {
        width_px: width,
        height_px: height,
        aspect_ratio: Some(width as f64 / height as f64),
        color_mode: color.and_then(color_mode).map(String::from),
        bits_per_sample: color.map(|c| c.bits_per_pixel() as u32 / c.channel_count().max(1) as u32),
    })
}

/// Short color mode names as stored in catalogs
fn color_mode(color: ColorType) -> Option<&'static str> {
    match color {
        ColorType::L8 => Some("L"),
        ColorType::La8 => Some("LA"),
        ColorType::Rgb8 => Some("RGB"),
        ColorType::Rgba8 => Some("RGBA"),
        ColorType::L16 => Some("I;16"),
        ColorType::La16 => Some("LA;16"),
        ColorType::Rgb16 => Some("RGB;16"),
        ColorType::Rgba16 => Some("RGBA;16"),
        ColorType::Rgb32F | ColorType::Rgba32F => Some("F"),
        _ => None,
    }
}

impl CameraInfo {
    /// "Make Model" without repeating the make
    pub fn camera_display(&self) -> Option<String> {
        match (&self.make, &self.model) {
            (Some(make), Some(model)) => {
                // Avoid duplication like "Apple Apple iPhone"
                if model.starts_with(make.as_str()) {
                    Some(model.clone())
                } else {
                    Some(format!("{} {}", make, model))
                }
            }
            (None, Some(model)) => Some(model.clone()),
            (Some(make), None) => Some(make.clone()),
            (None, None) => None,
        }
    }
}

impl ImageInfo {
    pub fn megapixels(&self) -> f64 {
        (self.width_px as f64 * self.height_px as f64) / 1_000_000.0
    }
}
