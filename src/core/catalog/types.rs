//! Catalog document types.

use super::compat;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Catalog schema version written by this crate
pub const CATALOG_VERSION: &str = "1.0";

/// Quality label attached to a photo. A photo may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityTag {
    Unreviewed,
    Qualified,
    Overexposed,
    Underexposed,
    Failed,
}

impl QualityTag {
    pub const ALL: [QualityTag; 5] = [
        QualityTag::Unreviewed,
        QualityTag::Qualified,
        QualityTag::Overexposed,
        QualityTag::Underexposed,
        QualityTag::Failed,
    ];

    /// Label stored in catalog files
    pub fn label(&self) -> &'static str {
        match self {
            QualityTag::Unreviewed => "未审查",
            QualityTag::Qualified => "合格",
            QualityTag::Overexposed => "过曝",
            QualityTag::Underexposed => "欠曝",
            QualityTag::Failed => "检测失败",
        }
    }

    /// English display name
    pub fn name(&self) -> &'static str {
        match self {
            QualityTag::Unreviewed => "Unreviewed",
            QualityTag::Qualified => "Qualified",
            QualityTag::Overexposed => "Overexposed",
            QualityTag::Underexposed => "Underexposed",
            QualityTag::Failed => "Failed",
        }
    }

    /// Parse either the stored label or the English name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.label() == s || tag.name().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for QualityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for QualityTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for QualityTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        QualityTag::parse(&s).ok_or_else(|| D::Error::custom(format!("unknown quality tag '{}'", s)))
    }
}

/// Set of quality tags on a record. Defaults to `{Unreviewed}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityTags(BTreeSet<QualityTag>);

impl QualityTags {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn single(tag: QualityTag) -> Self {
        Self(BTreeSet::from([tag]))
    }

    pub fn insert(&mut self, tag: QualityTag) -> bool {
        self.0.insert(tag)
    }

    pub fn contains(&self, tag: QualityTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = QualityTag> + '_ {
        self.0.iter().copied()
    }

    /// Tags as counted in statistics; an empty set counts as unreviewed.
    pub fn counted(&self) -> Vec<QualityTag> {
        if self.0.is_empty() {
            vec![QualityTag::Unreviewed]
        } else {
            self.iter().collect()
        }
    }
}

impl Default for QualityTags {
    fn default() -> Self {
        Self::single(QualityTag::Unreviewed)
    }
}

impl FromIterator<QualityTag> for QualityTags {
    fn from_iter<I: IntoIterator<Item = QualityTag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for QualityTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(|t| t.name()).collect();
        write!(f, "{}", names.join(", "))
    }
}

impl Serialize for QualityTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for QualityTags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(QualityTag),
            Many(Vec<QualityTag>),
        }

        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            Some(OneOrMany::One(tag)) => Self::single(tag),
            Some(OneOrMany::Many(tags)) => tags.into_iter().collect(),
            None => Self::empty(),
        })
    }
}

/// Filesystem facts and the fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_name: String,
    pub file_path: String,
    #[serde(deserialize_with = "compat::u64_lenient")]
    pub file_size_bytes: u64,
    pub file_format: String,
    #[serde(default)]
    pub file_extension: String,
    #[serde(default, deserialize_with = "compat::string_lenient")]
    pub creation_time: String,
    #[serde(
        default,
        deserialize_with = "compat::opt_string_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub modification_time: Option<String>,
    /// Metadata fingerprint; the on-disk key predates the name
    #[serde(rename = "hash")]
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(deserialize_with = "compat::u32_lenient")]
    pub width_px: u32,
    #[serde(deserialize_with = "compat::u32_lenient")]
    pub height_px: u32,
    #[serde(
        default,
        deserialize_with = "compat::opt_f64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub aspect_ratio: Option<f64>,
    #[serde(
        default,
        deserialize_with = "compat::opt_string_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub color_mode: Option<String>,
    #[serde(
        default,
        deserialize_with = "compat::opt_u32_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub bits_per_sample: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub lens_make: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,
    /// Millimetres
    #[serde(default, deserialize_with = "compat::opt_f64_lenient", skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    /// f-number
    #[serde(default, deserialize_with = "compat::opt_f64_lenient", skip_serializing_if = "Option::is_none")]
    pub aperture: Option<f64>,
    #[serde(default, deserialize_with = "compat::opt_u32_lenient", skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    /// Exposure time in seconds
    #[serde(default, deserialize_with = "compat::opt_f64_lenient", skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<f64>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub exposure_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifData {
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub date_time_original: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_u32_lenient", skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
    #[serde(default, deserialize_with = "compat::opt_bool_lenient", skip_serializing_if = "Option::is_none")]
    pub flash_used: Option<bool>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub white_balance: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub metering_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsInfo {
    #[serde(default, deserialize_with = "compat::opt_f64_lenient", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "compat::opt_f64_lenient", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "compat::opt_f64_lenient", skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub gps_date_time: Option<String>,
    /// `"lat, lon"` when both are known
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default, deserialize_with = "compat::opt_string_lenient", skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
}

macro_rules! impl_is_empty {
    ($($ty:ty),*) => {
        $(impl $ty {
            /// True when no field is known
            pub fn is_empty(&self) -> bool {
                *self == Self::default()
            }
        })*
    };
}

impl_is_empty!(CameraInfo, ExifData, GpsInfo, AdditionalInfo);

/// One cataloged photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub file_info: FileInfo,
    pub image_info: ImageInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_info: Option<CameraInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif_data: Option<ExifData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_info: Option<GpsInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<AdditionalInfo>,
    #[serde(rename = "quality", default)]
    pub quality_tags: QualityTags,
}

impl PhotoRecord {
    pub fn fingerprint(&self) -> &str {
        &self.file_info.fingerprint
    }

    pub fn path(&self) -> &str {
        &self.file_info.file_path
    }
}

/// Changes applied to an existing record by fingerprint.
///
/// A patch can never change a record's identity (`file_info` other than the
/// thumbnail path).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub quality_tags: Option<QualityTags>,
    /// `Some(None)` clears the thumbnail path
    pub thumbnail_path: Option<Option<String>>,
    pub image_info: Option<ImageInfo>,
    pub camera_info: Option<CameraInfo>,
    pub exif_data: Option<ExifData>,
    pub gps_info: Option<GpsInfo>,
    pub additional_info: Option<AdditionalInfo>,
}

impl RecordPatch {
    pub fn quality(tags: QualityTags) -> Self {
        Self {
            quality_tags: Some(tags),
            ..Default::default()
        }
    }

    pub fn apply(&self, record: &mut PhotoRecord) {
        if let Some(tags) = &self.quality_tags {
            record.quality_tags = tags.clone();
        }
        if let Some(thumbnail) = &self.thumbnail_path {
            record.file_info.thumbnail_path = thumbnail.clone();
        }
        if let Some(info) = &self.image_info {
            record.image_info = info.clone();
        }
        if let Some(info) = &self.camera_info {
            record.camera_info = Some(info.clone()).filter(|i| !i.is_empty());
        }
        if let Some(info) = &self.exif_data {
            record.exif_data = Some(info.clone()).filter(|i| !i.is_empty());
        }
        if let Some(info) = &self.gps_info {
            record.gps_info = Some(info.clone()).filter(|i| !i.is_empty());
        }
        if let Some(info) = &self.additional_info {
            record.additional_info = Some(info.clone()).filter(|i| !i.is_empty());
        }
    }
}

/// The per-folder catalog document (`QualityRecord.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_version", deserialize_with = "compat::string_lenient")]
    pub version: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub folder_path: String,
    #[serde(default, deserialize_with = "compat::u64_lenient")]
    pub total_photos: u64,
    #[serde(default, with = "compat::wrapped_photos")]
    pub photos: Vec<PhotoRecord>,
}

fn default_version() -> String {
    CATALOG_VERSION.to_string()
}

impl Catalog {
    /// A new, empty catalog for a folder, stamped with `now`
    pub fn new(folder_path: impl Into<String>, now: String) -> Self {
        Self {
            version: default_version(),
            created_time: now.clone(),
            last_updated: now,
            folder_path: folder_path.into(),
            total_photos: 0,
            photos: Vec::new(),
        }
    }

    /// Tag frequency table; a record counts once per tag it carries
    pub fn tag_counts(&self) -> BTreeMap<QualityTag, usize> {
        let mut counts = BTreeMap::new();
        for photo in &self.photos {
            for tag in photo.quality_tags.counted() {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            version: self.version.clone(),
            created_time: self.created_time.clone(),
            last_updated: self.last_updated.clone(),
            folder_path: self.folder_path.clone(),
            total_photos: self.photos.len(),
            quality_stats: self.tag_counts(),
        }
    }
}

/// Summary of a catalog for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub version: String,
    pub created_time: String,
    pub last_updated: String,
    pub folder_path: String,
    pub total_photos: usize,
    pub quality_stats: BTreeMap<QualityTag, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fingerprint: &str) -> PhotoRecord {
        PhotoRecord {
            file_info: FileInfo {
                file_name: format!("{}.jpg", fingerprint),
                file_path: format!("/photos/{}.jpg", fingerprint),
                file_size_bytes: 1024,
                file_format: "JPEG".to_string(),
                file_extension: "jpg".to_string(),
                creation_time: "2024-01-01T10:00:00".to_string(),
                modification_time: Some("2024-01-01T10:00:00".to_string()),
                fingerprint: fingerprint.to_string(),
                thumbnail_path: None,
            },
            image_info: ImageInfo {
                width_px: 4,
                height_px: 3,
                aspect_ratio: Some(4.0 / 3.0),
                color_mode: Some("RGB".to_string()),
                bits_per_sample: Some(8),
            },
            camera_info: None,
            exif_data: None,
            gps_info: None,
            additional_info: None,
            quality_tags: QualityTags::default(),
        }
    }

    #[test]
    fn tags_serialize_with_stored_labels() {
        let tags: QualityTags = [QualityTag::Underexposed, QualityTag::Overexposed]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"["过曝","欠曝"]"#);
    }

    #[test]
    fn tags_accept_bare_string_and_english_names() {
        let single: QualityTags = serde_json::from_str(r#""合格""#).unwrap();
        assert_eq!(single, QualityTags::single(QualityTag::Qualified));

        let english: QualityTags = serde_json::from_str(r#"["overexposed", "Failed"]"#).unwrap();
        assert!(english.contains(QualityTag::Overexposed));
        assert!(english.contains(QualityTag::Failed));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(serde_json::from_str::<QualityTags>(r#"["blurry"]"#).is_err());
    }

    #[test]
    fn empty_tag_set_counts_as_unreviewed() {
        let mut catalog = Catalog::new("/photos", "t".to_string());
        let mut empty = record("a");
        empty.quality_tags = QualityTags::empty();
        catalog.photos.push(empty);

        assert_eq!(catalog.tag_counts().get(&QualityTag::Unreviewed), Some(&1));
    }

    #[test]
    fn record_with_two_tags_counts_twice() {
        let mut catalog = Catalog::new("/photos", "t".to_string());
        let mut both = record("a");
        both.quality_tags = [QualityTag::Overexposed, QualityTag::Underexposed]
            .into_iter()
            .collect();
        catalog.photos.push(both);

        let stats = catalog.stats();
        assert_eq!(stats.total_photos, 1);
        assert_eq!(stats.quality_stats.values().sum::<usize>(), 2);
    }

    #[test]
    fn photos_are_wrapped_on_disk() {
        let mut catalog = Catalog::new("/photos", "t".to_string());
        catalog.photos.push(record("abc"));

        let value = serde_json::to_value(&catalog).unwrap();
        assert_eq!(value["photos"][0]["photo_metadata"]["file_info"]["hash"], "abc");
        assert_eq!(value["photos"][0]["photo_metadata"]["quality"][0], "未审查");
        // Unknown optional sections are omitted, not null
        assert!(value["photos"][0]["photo_metadata"].get("gps_info").is_none());
    }

    #[test]
    fn legacy_document_loads() {
        let json = r#"{
            "version": "1.0",
            "created_time": "2024-05-01T08:00:00.123456",
            "last_updated": "2024-05-01T08:00:01",
            "folder_path": "/photos",
            "total_photos": 1.0,
            "photos": [{"photo_metadata": {
                "file_info": {"file_name": "a.jpg", "file_path": "/photos/a.jpg",
                    "file_size_bytes": 2048.0, "file_format": "JPEG",
                    "file_extension": "jpg", "creation_time": "2024-05-01T08:00:00",
                    "modification_time": null, "hash": "ff00"},
                "image_info": {"width_px": 640.0, "height_px": 480.0,
                    "aspect_ratio": 1.3333, "color_mode": "RGB", "bits_per_sample": null},
                "camera_info": {"make": "Canon", "focal_length": 50.0, "iso": 100.0,
                    "shutter_speed": 0.004, "exposure_mode": 0.0},
                "exif_data": {"orientation": 1.0, "flash_used": false, "white_balance": 0.0},
                "gps_info": {"latitude": null},
                "additional_info": {"color_space": 1.0},
                "quality": "过曝"
            }}]
        }"#;

        let catalog: Catalog = serde_json::from_str(json).unwrap();
        let photo = &catalog.photos[0];
        assert_eq!(photo.fingerprint(), "ff00");
        assert_eq!(photo.file_info.file_size_bytes, 2048);
        assert_eq!(photo.image_info.width_px, 640);
        let camera = photo.camera_info.as_ref().unwrap();
        assert_eq!(camera.iso, Some(100));
        assert_eq!(camera.exposure_mode.as_deref(), Some("0"));
        assert_eq!(photo.quality_tags, QualityTags::single(QualityTag::Overexposed));
    }

    #[test]
    fn null_modification_time_stays_absent() {
        let json = r#"{"file_name": "a.jpg", "file_path": "/photos/a.jpg",
            "file_size_bytes": 10, "file_format": "JPEG",
            "creation_time": "2024-05-01T08:00:00",
            "modification_time": null, "hash": "ff00"}"#;

        let info: FileInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.modification_time, None);

        let value = serde_json::to_value(&info).unwrap();
        assert!(value.get("modification_time").is_none());
        assert_eq!(value["creation_time"], "2024-05-01T08:00:00");
    }

    #[test]
    fn patch_keeps_identity() {
        let mut photo = record("abc");
        RecordPatch {
            quality_tags: Some(QualityTags::single(QualityTag::Qualified)),
            thumbnail_path: Some(Some("/photos/.thumbnails/abc_200x200.jpg".to_string())),
            ..Default::default()
        }
        .apply(&mut photo);

        assert_eq!(photo.fingerprint(), "abc");
        assert!(photo.quality_tags.contains(QualityTag::Qualified));
        assert!(photo.file_info.thumbnail_path.is_some());
    }
}
