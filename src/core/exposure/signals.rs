//! Pixel statistics behind the exposure verdicts.

use image::RgbImage;
use serde::Serialize;
use std::collections::VecDeque;

/// Luma at or above this is a highlight pixel
pub const HIGHLIGHT_LUMA: u8 = 245;
/// A channel sample at or above this is clipped
pub const CLIPPED_CHANNEL: u8 = 250;
/// First histogram bin of the highlight band (inclusive, up to 255)
pub const HISTOGRAM_HIGHLIGHT_START: usize = 240;
/// Luma at or below this is a shadow pixel
pub const SHADOW_LUMA: u8 = 50;
/// A channel sample at or below this is crushed
pub const CRUSHED_CHANNEL: u8 = 30;
/// Last histogram bin of the shadow band (inclusive, from 0)
pub const HISTOGRAM_SHADOW_END: usize = 40;

/// ITU-R BT.601 luma in 14-bit fixed point, rounded
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

/// Raw measurements of one image
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Signals {
    pub highlight_pixel_ratio: f64,
    pub rgb_max_channel_ratio: f64,
    pub histogram_highlight_ratio: f64,
    pub connected_overexposed_area_ratio: f64,
    pub shadow_pixel_ratio: f64,
    pub rgb_min_channel_ratio: f64,
    pub histogram_shadow_ratio: f64,
    pub average_brightness: f64,
}

/// Measure every signal in one pass over the pixels plus one flood fill.
///
/// An empty image measures as all zeros.
pub fn measure(image: &RgbImage) -> Signals {
    let (width, height) = image.dimensions();
    let total = width as usize * height as usize;
    if total == 0 {
        return Signals::default();
    }

    let mut histogram = [0u64; 256];
    let mut clipped = [0u64; 3];
    let mut crushed = [0u64; 3];
    let mut luma_sum = 0u64;
    let mut bright = vec![false; total];

    for (index, pixel) in image.pixels().enumerate() {
        let [r, g, b] = pixel.0;
        let y = luma(r, g, b);
        histogram[y as usize] += 1;
        luma_sum += y as u64;
        bright[index] = y >= HIGHLIGHT_LUMA;

        for (channel, &sample) in pixel.0.iter().enumerate() {
            if sample >= CLIPPED_CHANNEL {
                clipped[channel] += 1;
            }
            if sample <= CRUSHED_CHANNEL {
                crushed[channel] += 1;
            }
        }
    }

    let t = total as f64;
    let ratio = |count: u64| count as f64 / t;
    let band = |range: std::ops::RangeInclusive<usize>| histogram[range].iter().sum::<u64>();

    Signals {
        highlight_pixel_ratio: ratio(band(HIGHLIGHT_LUMA as usize..=255)),
        rgb_max_channel_ratio: ratio(clipped.into_iter().max().unwrap_or(0)),
        histogram_highlight_ratio: ratio(band(HISTOGRAM_HIGHLIGHT_START..=255)),
        connected_overexposed_area_ratio: ratio(
            largest_component(&mut bright, width as usize, height as usize) as u64,
        ),
        shadow_pixel_ratio: ratio(band(0..=SHADOW_LUMA as usize)),
        rgb_min_channel_ratio: ratio(crushed.into_iter().max().unwrap_or(0)),
        histogram_shadow_ratio: ratio(band(0..=HISTOGRAM_SHADOW_END)),
        average_brightness: luma_sum as f64 / t,
    }
}

/// Size of the largest 8-connected region of `true` cells.
///
/// Clears the mask as it visits cells.
fn largest_component(mask: &mut [bool], width: usize, height: usize) -> usize {
    let mut largest = 0;
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if !mask[start] {
            continue;
        }
        mask[start] = false;
        queue.push_back(start);
        let mut size = 0;

        while let Some(index) = queue.pop_front() {
            size += 1;
            let (x, y) = (index % width, index / width);
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    let neighbor = ny as usize * width + nx as usize;
                    if mask[neighbor] {
                        mask[neighbor] = false;
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        largest = largest.max(size);
    }
    largest
}
