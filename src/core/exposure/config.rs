//! Exposure thresholds and their JSON file.
//!
//! Two layouts are accepted:
//!
//! ```json
//! { "overexposure": { "highlight_pixel_ratio_threshold": 0.05 },
//!   "underexposure": { "average_brightness_threshold": 80.0 } }
//! ```
//!
//! or the same keys flat at the top level. Keys that are missing keep
//! their default; unknown keys are ignored.

use crate::error::ExposureError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the user config directory
pub const CONFIG_FILE_NAME: &str = "exposure_config.json";

/// Thresholds for the exposure verdicts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureConfig {
    pub highlight_pixel_ratio_threshold: f64,
    pub rgb_max_channel_ratio_threshold: f64,
    pub histogram_highlight_ratio_threshold: f64,
    /// Kept for file compatibility; the largest bright area is reported but
    /// does not take part in the verdict.
    pub connected_overexposed_area_threshold: f64,
    pub shadow_pixel_ratio_threshold: f64,
    pub rgb_min_channel_ratio_threshold: f64,
    pub histogram_shadow_ratio_threshold: f64,
    /// Mean luma below this is underexposed
    pub average_brightness_threshold: f64,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            highlight_pixel_ratio_threshold: 0.05,
            rgb_max_channel_ratio_threshold: 0.03,
            histogram_highlight_ratio_threshold: 0.08,
            connected_overexposed_area_threshold: 0.02,
            shadow_pixel_ratio_threshold: 0.15,
            rgb_min_channel_ratio_threshold: 0.10,
            histogram_shadow_ratio_threshold: 0.20,
            average_brightness_threshold: 80.0,
        }
    }
}

impl ExposureConfig {
    /// `<config dir>/photo-catalog/exposure_config.json`, if the platform has
    /// a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photo-catalog").join(CONFIG_FILE_NAME))
    }

    /// Load thresholds from `path`, or from [`Self::default_path`] when `None`.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ExposureError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "exposure config {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ExposureError::Config {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        let config = Self::from_json(&text).map_err(|reason| ExposureError::Config {
            path: path.clone(),
            reason,
        })?;
        tracing::info!("loaded exposure config from {}", path.display());
        Ok(config)
    }

    /// Parse either layout; see the module docs
    pub fn from_json(text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let root = value
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        let mut config = Self::default();
        config.merge(root)?;
        for section in ["overexposure", "underexposure"] {
            match root.get(section) {
                Some(Value::Object(inner)) => config.merge(inner)?,
                Some(Value::Null) | None => {}
                Some(_) => return Err(format!("'{}' must be an object", section)),
            }
        }
        Ok(config)
    }

    /// Nested layout, as written by [`Self::save`]
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "overexposure": {
                "highlight_pixel_ratio_threshold": self.highlight_pixel_ratio_threshold,
                "rgb_max_channel_ratio_threshold": self.rgb_max_channel_ratio_threshold,
                "histogram_highlight_ratio_threshold": self.histogram_highlight_ratio_threshold,
                "connected_overexposed_area_threshold": self.connected_overexposed_area_threshold,
            },
            "underexposure": {
                "shadow_pixel_ratio_threshold": self.shadow_pixel_ratio_threshold,
                "rgb_min_channel_ratio_threshold": self.rgb_min_channel_ratio_threshold,
                "histogram_shadow_ratio_threshold": self.histogram_shadow_ratio_threshold,
                "average_brightness_threshold": self.average_brightness_threshold,
            }
        })
    }

    /// Write the nested layout to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ExposureError> {
        let to_error = |reason: String| ExposureError::Config {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| to_error(e.to_string()))?;
        }
        let text = serde_json::to_string_pretty(&self.to_json()).map_err(|e| to_error(e.to_string()))?;
        fs::write(path, text).map_err(|e| to_error(e.to_string()))
    }

    fn merge(&mut self, values: &Map<String, Value>) -> Result<(), String> {
        for (key, slot) in self.slots() {
            match values.get(key) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    *slot = value
                        .as_f64()
                        .ok_or_else(|| format!("'{}' must be a number", key))?;
                }
            }
        }
        Ok(())
    }

    fn slots(&mut self) -> [(&'static str, &mut f64); 8] {
        [
            ("highlight_pixel_ratio_threshold", &mut self.highlight_pixel_ratio_threshold),
            ("rgb_max_channel_ratio_threshold", &mut self.rgb_max_channel_ratio_threshold),
            ("histogram_highlight_ratio_threshold", &mut self.histogram_highlight_ratio_threshold),
            ("connected_overexposed_area_threshold", &mut self.connected_overexposed_area_threshold),
            ("shadow_pixel_ratio_threshold", &mut self.shadow_pixel_ratio_threshold),
            ("rgb_min_channel_ratio_threshold", &mut self.rgb_min_channel_ratio_threshold),
            ("histogram_shadow_ratio_threshold", &mut self.histogram_shadow_ratio_threshold),
            ("average_brightness_threshold", &mut self.average_brightness_threshold),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn nested_layout_overrides_some_keys() {
        let config = ExposureConfig::from_json(
            r#"{
                "version": "1.0",
                "overexposure": { "highlight_pixel_ratio_threshold": 0.2 },
                "underexposure": { "average_brightness_threshold": 40 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.highlight_pixel_ratio_threshold, 0.2);
        assert_eq!(config.average_brightness_threshold, 40.0);
        assert_eq!(config.rgb_max_channel_ratio_threshold, 0.03);
        assert_eq!(config.shadow_pixel_ratio_threshold, 0.15);
    }

    #[test]
    fn flat_layout_is_accepted() {
        let config =
            ExposureConfig::from_json(r#"{"shadow_pixel_ratio_threshold": 0.5}"#).unwrap();
        assert_eq!(config.shadow_pixel_ratio_threshold, 0.5);
        assert_eq!(config.highlight_pixel_ratio_threshold, 0.05);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(
            ExposureConfig::from_json("{}").unwrap(),
            ExposureConfig::default()
        );
    }

    #[test]
    fn non_numeric_threshold_is_rejected() {
        let result = ExposureConfig::from_json(
            r#"{"underexposure": {"average_brightness_threshold": "dark"}}"#,
        );
        assert!(result.unwrap_err().contains("average_brightness_threshold"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ExposureConfig::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config, ExposureConfig::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ExposureConfig::load(Some(&path)),
            Err(ExposureError::Config { .. })
        ));
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = ExposureConfig {
            histogram_shadow_ratio_threshold: 0.33,
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(ExposureConfig::load(Some(&path)).unwrap(), config);
    }
}
