//! SIMD-accelerated thumbnail resizing.
//!
//! Uses fast_image_resize (AVX2/NEON when available) with a Lanczos3
//! filter on 8-bit RGB.

use super::FitMode;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbImage;

/// Reusable resizer; keeps its scratch buffers between calls
pub struct FastResizer {
    resizer: Resizer,
}

impl FastResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Resize `source` into a `width` x `height` box using `mode`.
    ///
    /// `Contain` may return a smaller image than the box on one axis.
    pub fn resize(
        &mut self,
        source: &RgbImage,
        width: u32,
        height: u32,
        mode: FitMode,
    ) -> Result<RgbImage, String> {
        let (src_width, src_height) = source.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err("invalid source dimensions".to_string());
        }
        if width == 0 || height == 0 {
            return Err("invalid destination dimensions".to_string());
        }

        let plan = plan(src_width, src_height, width, height, mode);

        let src_image = Image::from_vec_u8(
            src_width,
            src_height,
            source.as_raw().clone(),
            PixelType::U8x3,
        )
        .map_err(|e| format!("failed to wrap source image: {}", e))?;

        let mut dst_image = Image::new(plan.width, plan.height, PixelType::U8x3);

        let mut options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
        if let Some((left, top, crop_width, crop_height)) = plan.crop {
            options = options.crop(left, top, crop_width, crop_height);
        }

        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| format!("resize failed: {}", e))?;

        RgbImage::from_raw(plan.width, plan.height, dst_image.into_vec())
            .ok_or_else(|| "resized buffer has the wrong length".to_string())
    }
}

impl Default for FastResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Output size and source crop for one resize
#[derive(Debug, Clone, Copy, PartialEq)]
struct Plan {
    width: u32,
    height: u32,
    /// left, top, width, height in source pixels
    crop: Option<(f64, f64, f64, f64)>,
}

fn plan(src_width: u32, src_height: u32, width: u32, height: u32, mode: FitMode) -> Plan {
    let (sw, sh) = (src_width as f64, src_height as f64);
    let (w, h) = (width as f64, height as f64);

    match mode {
        FitMode::Fill => Plan {
            width,
            height,
            crop: None,
        },
        FitMode::Contain => {
            let scale = (w / sw).min(h / sh);
            Plan {
                width: ((sw * scale).round() as u32).clamp(1, width),
                height: ((sh * scale).round() as u32).clamp(1, height),
                crop: None,
            }
        }
        FitMode::Cover => {
            // Largest centered source region with the box's aspect ratio
            let scale = (w / sw).max(h / sh);
            let crop_width = (w / scale).min(sw);
            let crop_height = (h / scale).min(sh);
            Plan {
                width,
                height,
                crop: Some((
                    (sw - crop_width) / 2.0,
                    (sh - crop_height) / 2.0,
                    crop_width,
                    crop_height,
                )),
            }
        }
    }
}
