//! EXIF tag reading with kamadak-exif.
//!
//! Every helper returns `None` for a missing or oddly typed tag; EXIF is
//! best-effort and never fails extraction.

use crate::core::catalog::{AdditionalInfo, CameraInfo, ExifData, GpsInfo};
use crate::core::fingerprint::format_naive;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Parse the EXIF block of a file, if it has one
pub fn read_exif(path: &Path) -> Option<Exif> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Some(exif),
        Err(e) => {
            tracing::debug!("no EXIF in {}: {}", path.display(), e);
            None
        }
    }
}

/// EXIF orientation (1-8) of a file
pub fn read_orientation(path: &Path) -> Option<u32> {
    read_exif(path).and_then(|exif| get_uint(&exif, Tag::Orientation))
}

fn field(exif: &Exif, tag: Tag) -> Option<&Field> {
    exif.get_field(tag, In::PRIMARY)
}

fn get_string(exif: &Exif, tag: Tag) -> Option<String> {
    field(exif, tag).and_then(|f| ascii_value(&f.value))
}

/// Human readable value (`"auto"`, `"sRGB"`, ...) for enum-like tags
fn get_display(exif: &Exif, tag: Tag) -> Option<String> {
    field(exif, tag)
        .map(|f| f.display_value().to_string())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn get_uint(exif: &Exif, tag: Tag) -> Option<u32> {
    field(exif, tag).and_then(|f| f.value.get_uint(0))
}

fn get_f64(exif: &Exif, tag: Tag) -> Option<f64> {
    field(exif, tag).and_then(|f| rational_at(&f.value, 0))
}

fn ascii_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

fn rational_at(value: &Value, index: usize) -> Option<f64> {
    let f = match value {
        Value::Rational(v) => v.get(index).map(|r| r.to_f64()),
        Value::SRational(v) => v.get(index).map(|r| r.to_f64()),
        Value::Float(v) => v.get(index).map(|f| *f as f64),
        Value::Double(v) => v.get(index).copied(),
        other => other.get_uint(index).map(f64::from),
    }?;
    f.is_finite().then_some(f)
}

/// `deg + min/60 + sec/3600`, negated for the southern/western hemisphere
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: &str) -> f64 {
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    if matches!(reference.trim(), "S" | "W" | "s" | "w") {
        -decimal
    } else {
        decimal
    }
}

/// `YYYY:MM:DD HH:MM:SS` to ISO-8601
pub fn exif_datetime_to_iso(raw: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| format_naive(&dt))
}

fn coordinate(exif: &Exif, tag: Tag, ref_tag: Tag) -> Option<f64> {
    let value = &field(exif, tag)?.value;
    let degrees = rational_at(value, 0)?;
    let minutes = rational_at(value, 1).unwrap_or(0.0);
    let seconds = rational_at(value, 2).unwrap_or(0.0);
    let reference = get_string(exif, ref_tag).unwrap_or_default();
    Some(dms_to_decimal(degrees, minutes, seconds, &reference))
}

fn gps_date_time(exif: &Exif) -> Option<String> {
    let date = get_string(exif, Tag::GPSDateStamp)?;
    let date = NaiveDate::parse_from_str(&date, "%Y:%m:%d").ok()?;
    let time = &field(exif, Tag::GPSTimeStamp)?.value;
    let time = NaiveTime::from_hms_opt(
        rational_at(time, 0)? as u32,
        rational_at(time, 1)? as u32,
        rational_at(time, 2)? as u32,
    )?;
    Some(format_naive(&date.and_time(time)))
}

pub fn camera_info(exif: &Exif) -> CameraInfo {
    CameraInfo {
        make: get_string(exif, Tag::Make),
        model: get_string(exif, Tag::Model),
        lens_make: get_string(exif, Tag::LensMake),
        lens_model: get_string(exif, Tag::LensModel),
        focal_length: get_f64(exif, Tag::FocalLength),
        aperture: get_f64(exif, Tag::FNumber),
        iso: get_uint(exif, Tag::PhotographicSensitivity),
        shutter_speed: get_f64(exif, Tag::ExposureTime),
        exposure_mode: get_display(exif, Tag::ExposureMode),
    }
}

pub fn exif_data(exif: &Exif) -> ExifData {
    ExifData {
        date_time_original: get_string(exif, Tag::DateTimeOriginal)
            .and_then(|raw| exif_datetime_to_iso(&raw)),
        orientation: get_uint(exif, Tag::Orientation),
        flash_used: get_uint(exif, Tag::Flash).map(|flash| flash & 1 == 1),
        white_balance: get_display(exif, Tag::WhiteBalance),
        metering_mode: get_display(exif, Tag::MeteringMode),
    }
}

pub fn gps_info(exif: &Exif) -> GpsInfo {
    let latitude = coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
    let longitude = coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);

    // AltitudeRef 1 means below sea level
    let altitude = get_f64(exif, Tag::GPSAltitude).map(|alt| {
        if get_uint(exif, Tag::GPSAltitudeRef) == Some(1) {
            -alt
        } else {
            alt
        }
    });

    GpsInfo {
        latitude,
        longitude,
        altitude,
        gps_date_time: gps_date_time(exif),
        coordinates: match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some(format!("{}, {}", lat, lon)),
            _ => None,
        },
    }
}

pub fn additional_info(exif: &Exif) -> AdditionalInfo {
    AdditionalInfo {
        color_space: get_display(exif, Tag::ColorSpace),
        compression: get_display(exif, Tag::Compression),
        software: get_string(exif, Tag::Software),
    }
}
