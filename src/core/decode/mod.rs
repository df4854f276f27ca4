//! # Decode Module
//!
//! Turns photo files into pixel buffers.
//!
//! Uses zune-jpeg for JPEG files (1.5-2x faster than the image crate) and
//! falls back to the image crate, with content sniffing, for everything else.
//! HEIC/HEIF is converted through `sips` on macOS and unsupported elsewhere.

use crate::core::scanner::ImageFormat;
use crate::error::ExtractError;
use image::{DynamicImage, ImageBuffer, ImageReader, Luma, Rgb, RgbImage, Rgba};
use std::fs;
use std::path::Path;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Decode a photo using the fastest available decoder.
pub fn decode(path: &Path) -> Result<DynamicImage, ExtractError> {
    match ImageFormat::from_path(path) {
        ImageFormat::Jpeg => match decode_jpeg(path) {
            Err(ExtractError::Corrupted { .. }) => decode_fallback(path),
            other => other,
        },
        format if format.is_heif() => match decode_heic(path) {
            Err(ExtractError::Corrupted { .. }) => decode_fallback(path),
            other => other,
        },
        _ => decode_fallback(path),
    }
}

/// Decode with EXIF orientation applied (what a viewer would show).
pub fn decode_oriented(path: &Path) -> Result<DynamicImage, ExtractError> {
    let image = decode(path)?;
    let orientation = crate::core::metadata::read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(image, orientation))
}

/// Decode to an 8-bit RGB buffer for pixel statistics.
pub fn decode_rgb8(path: &Path) -> Result<RgbImage, ExtractError> {
    Ok(decode(path)?.to_rgb8())
}

/// Rotate/flip an image according to an EXIF orientation value (1-8).
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

fn corrupted(path: &Path, reason: impl Into<String>) -> ExtractError {
    ExtractError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn decode_jpeg(path: &Path) -> Result<DynamicImage, ExtractError> {
    let file_bytes = fs::read(path).map_err(|e| ExtractError::from_io(path, e))?;

    let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(&file_bytes, options);

    let pixels = decoder
        .decode()
        .map_err(|e| corrupted(path, format!("zune-jpeg decode failed: {:?}", e)))?;

    let info = decoder
        .info()
        .ok_or_else(|| corrupted(path, "missing JPEG header info"))?;

    let width = info.width as u32;
    let height = info.height as u32;

    // zune may pick a different output colorspace than requested
    let out_colorspace = decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB);

    let image = match out_colorspace {
        ColorSpace::RGB => {
            let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels)
                    .ok_or_else(|| corrupted(path, "short RGB buffer"))?;
            DynamicImage::ImageRgb8(buffer)
        }
        ColorSpace::RGBA => {
            let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels)
                    .ok_or_else(|| corrupted(path, "short RGBA buffer"))?;
            DynamicImage::ImageRgba8(buffer)
        }
        ColorSpace::Luma => {
            let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels)
                    .ok_or_else(|| corrupted(path, "short Luma buffer"))?;
            DynamicImage::ImageLuma8(buffer)
        }
        _ => return decode_fallback(path),
    };

    Ok(image)
}

#[cfg(target_os = "macos")]
fn decode_heic(path: &Path) -> Result<DynamicImage, ExtractError> {
    use std::process::Command;

    if !path.exists() {
        return Err(ExtractError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let temp = tempfile::Builder::new()
        .prefix("photo_catalog_heic_")
        .suffix(".jpg")
        .tempfile()
        .map_err(|e| ExtractError::from_io(path, e))?;

    let output = Command::new("sips")
        .arg("-s")
        .arg("format")
        .arg("jpeg")
        .arg(path)
        .arg("--out")
        .arg(temp.path())
        .output()
        .map_err(|e| corrupted(path, format!("failed to run sips: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(corrupted(path, format!("sips conversion failed: {}", stderr)));
    }

    image::open(temp.path())
        .map_err(|e| corrupted(path, format!("failed to read converted HEIC: {}", e)))
}

#[cfg(not(target_os = "macos"))]
fn decode_heic(path: &Path) -> Result<DynamicImage, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Err(ExtractError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
    })
}

fn decode_fallback(path: &Path) -> Result<DynamicImage, ExtractError> {
    let reader = ImageReader::open(path)
        .map_err(|e| ExtractError::from_io(path, e))?
        .with_guessed_format()
        .map_err(|e| ExtractError::from_io(path, e))?;
    reader.decode().map_err(|e| corrupted(path, e.to_string()))
}
