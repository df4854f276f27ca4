//! Lenient deserializers for catalog files written by older tools.
//!
//! Older catalogs stored every number as a float (`"width_px": 4032.0`) and
//! enum-like EXIF values as numeric codes (`"white_balance": 0.0`). These
//! helpers accept both shapes so such files load without losing records.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

fn number_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(|f| {
            (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
        }),
        _ => None,
    }
}

/// Parse a float, a numeric string, or an EXIF-style `"1/125"` fraction.
fn number_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            match s.split_once('/') {
                Some((num, den)) => {
                    let num: f64 = num.trim().parse().ok()?;
                    let den: f64 = den.trim().parse().ok()?;
                    (den != 0.0).then(|| num / den)
                }
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(match n.as_f64() {
            // 3.0 -> "3", keep real fractions
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn u64_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    number_to_u64(&value)
        .ok_or_else(|| D::Error::custom(format!("expected non-negative integer, got {}", value)))
}

pub fn u32_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = u64_lenient(deserializer)?;
    u32::try_from(value).map_err(D::Error::custom)
}

pub fn opt_u32_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u32>, D::Error> {
    // Unparseable values become None rather than failing the whole catalog.
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_to_u64)
        .and_then(|v| u32::try_from(v).ok()))
}

pub fn opt_f64_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_to_f64))
}

pub fn opt_string_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

pub fn string_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(opt_string_lenient(deserializer)?.unwrap_or_default())
}

pub fn opt_bool_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// `photos` entries are wrapped as `{"photo_metadata": {...}}` on disk.
pub mod wrapped_photos {
    use super::*;
    use crate::core::catalog::PhotoRecord;

    #[derive(Serialize)]
    struct WrappedRef<'a> {
        photo_metadata: &'a PhotoRecord,
    }

    #[derive(Deserialize)]
    struct Wrapped {
        photo_metadata: PhotoRecord,
    }

    pub fn serialize<S: Serializer>(
        photos: &[PhotoRecord],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            photos
                .iter()
                .map(|photo_metadata| WrappedRef { photo_metadata }),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<PhotoRecord>, D::Error> {
        let wrapped = Option::<Vec<Wrapped>>::deserialize(deserializer)?;
        Ok(wrapped
            .unwrap_or_default()
            .into_iter()
            .map(|w| w.photo_metadata)
            .collect())
    }
}
