//! # Exposure Module
//!
//! Flags over- and underexposed photos from pixel statistics.
//!
//! ## Signals
//! Four overexposure measurements (highlight luma, clipped channels,
//! histogram highlight band, largest connected bright area) and four
//! underexposure measurements (shadow luma, crushed channels, histogram
//! shadow band, mean brightness). Luma is BT.601.
//!
//! ## Verdicts
//! A photo is overexposed when any of the first three highlight signals
//! reaches its threshold; the connected area is reported only. It is
//! underexposed when any shadow ratio reaches its threshold or the mean
//! brightness is below its threshold. Both verdicts can hold at once.

mod config;
mod signals;

pub use config::{ExposureConfig, CONFIG_FILE_NAME};
pub use signals::{luma, Signals};

use crate::core::catalog::{CatalogStore, QualityTag, QualityTags, RecordPatch};
use crate::core::{decode, fingerprint, pool};
use crate::error::ExposureError;
use crate::events::{ClassifyEvent, ClassifyProgress, Event, EventSender};
use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Measurements and verdicts for one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExposureReport {
    #[serde(flatten)]
    pub signals: Signals,
    pub is_overexposed: bool,
    pub is_underexposed: bool,
}

impl ExposureReport {
    /// `Overexposed` and/or `Underexposed`, or `Qualified` when neither
    pub fn tags(&self) -> QualityTags {
        let mut tags = QualityTags::empty();
        if self.is_overexposed {
            tags.insert(QualityTag::Overexposed);
        }
        if self.is_underexposed {
            tags.insert(QualityTag::Underexposed);
        }
        if tags.is_empty() {
            tags.insert(QualityTag::Qualified);
        }
        tags
    }

    /// Signal name to measured value
    pub fn signals(&self) -> BTreeMap<&'static str, f64> {
        let s = &self.signals;
        BTreeMap::from([
            ("highlight_pixel_ratio", s.highlight_pixel_ratio),
            ("rgb_max_channel_ratio", s.rgb_max_channel_ratio),
            ("histogram_highlight_ratio", s.histogram_highlight_ratio),
            ("connected_overexposed_area_ratio", s.connected_overexposed_area_ratio),
            ("shadow_pixel_ratio", s.shadow_pixel_ratio),
            ("rgb_min_channel_ratio", s.rgb_min_channel_ratio),
            ("histogram_shadow_ratio", s.histogram_shadow_ratio),
            ("average_brightness", s.average_brightness),
        ])
    }
}

/// Result of classifying one file in a batch
#[derive(Debug)]
pub struct ClassifyOutcome {
    pub path: PathBuf,
    pub result: Result<ExposureReport, ExposureError>,
}

impl ClassifyOutcome {
    /// Tags to store: the verdict tags, or `Failed` if the file was unreadable
    pub fn tags(&self) -> QualityTags {
        match &self.result {
            Ok(report) => report.tags(),
            Err(_) => QualityTags::single(QualityTag::Failed),
        }
    }
}

/// Totals of a catalog classification run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifySummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records carrying each tag after the run
    pub tag_counts: BTreeMap<QualityTag, usize>,
}

/// Applies an [`ExposureConfig`] to images, files and catalogs
#[derive(Debug, Clone, Default)]
pub struct ExposureClassifier {
    config: ExposureConfig,
}

impl ExposureClassifier {
    pub fn new(config: ExposureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExposureConfig {
        &self.config
    }

    pub fn classify_image(&self, image: &RgbImage) -> ExposureReport {
        let signals = signals::measure(image);
        let c = &self.config;

        let is_overexposed = signals.highlight_pixel_ratio >= c.highlight_pixel_ratio_threshold
            || signals.rgb_max_channel_ratio >= c.rgb_max_channel_ratio_threshold
            || signals.histogram_highlight_ratio >= c.histogram_highlight_ratio_threshold;

        let is_underexposed = signals.shadow_pixel_ratio >= c.shadow_pixel_ratio_threshold
            || signals.rgb_min_channel_ratio >= c.rgb_min_channel_ratio_threshold
            || signals.histogram_shadow_ratio >= c.histogram_shadow_ratio_threshold
            || signals.average_brightness < c.average_brightness_threshold;

        ExposureReport {
            signals,
            is_overexposed,
            is_underexposed,
        }
    }

    pub fn classify_file(&self, path: &Path) -> Result<ExposureReport, ExposureError> {
        let image = decode::decode_rgb8(path)?;
        Ok(self.classify_image(&image))
    }

    /// Classify `paths` on `workers` threads. Outcomes arrive in completion
    /// order; a failed file never stops the batch.
    pub fn classify_batch(&self, paths: &[PathBuf], workers: usize) -> Vec<ClassifyOutcome> {
        let outcomes = Mutex::new(Vec::with_capacity(paths.len()));
        pool::install(workers, || {
            paths.par_iter().for_each(|path| {
                let outcome = ClassifyOutcome {
                    path: path.clone(),
                    result: self.classify_file(path),
                };
                pool::lock(&outcomes).push(outcome);
            })
        });
        outcomes.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Classify every record in the catalog and write the tags back in one
    /// catalog write. Unreadable photos are tagged `Failed`.
    pub fn classify_catalog(
        &self,
        store: &CatalogStore,
        workers: usize,
        events: &EventSender,
    ) -> Result<ClassifySummary, ExposureError> {
        let targets: Vec<(String, PathBuf)> = store
            .records()?
            .into_iter()
            .map(|record| {
                let path = PathBuf::from(record.path());
                (record.file_info.fingerprint, path)
            })
            .collect();
        let total = targets.len();
        events.send(Event::Classify(ClassifyEvent::Started {
            total_photos: total,
        }));
        tracing::info!("classifying {} photos in {}", total, store.folder().display());

        // (completed, collected) under one lock so progress is monotonic
        let progress: Mutex<(usize, Vec<(String, QualityTags, bool)>)> =
            Mutex::new((0, Vec::with_capacity(total)));

        pool::install(workers, || {
            targets.par_iter().for_each(|(fingerprint, path)| {
                let outcome = ClassifyOutcome {
                    path: path.clone(),
                    result: self.classify_file(path),
                };
                if let Err(ref e) = outcome.result {
                    tracing::warn!("exposure check failed for {}: {}", path.display(), e);
                    events.send(Event::Classify(ClassifyEvent::Failed {
                        path: path.clone(),
                        message: e.to_string(),
                    }));
                }
                let tags = outcome.tags();

                let mut progress = pool::lock(&progress);
                progress.0 += 1;
                progress
                    .1
                    .push((fingerprint.clone(), tags, outcome.result.is_ok()));
                events.send(Event::Classify(ClassifyEvent::Progress(ClassifyProgress {
                    completed: progress.0,
                    total,
                    current_path: path.clone(),
                })));
            })
        });

        let (_, results) = progress
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut summary = ClassifySummary {
            total,
            ..Default::default()
        };
        let mut updates = Vec::with_capacity(results.len());
        for (fingerprint, tags, ok) in results {
            if ok {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            for tag in tags.counted() {
                *summary.tag_counts.entry(tag).or_insert(0) += 1;
            }
            updates.push((fingerprint, RecordPatch::quality(tags)));
        }

        if !updates.is_empty() {
            let missing = store.update_many(updates)?;
            for fingerprint in missing {
                tracing::warn!("record {} disappeared before its tags were written", fingerprint);
            }
        }

        events.send(Event::Classify(ClassifyEvent::Completed {
            succeeded: summary.succeeded,
            failed: summary.failed,
        }));
        tracing::info!(
            "classification done: {} ok, {} failed",
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }

    /// Classify one photo and store its tags on the matching record.
    ///
    /// The record is found by the fingerprint of `path` as it is now.
    pub fn classify_and_update(
        &self,
        store: &CatalogStore,
        path: &Path,
    ) -> Result<QualityTags, ExposureError> {
        let report = self.classify_file(path)?;
        let tags = report.tags();
        let fingerprint = fingerprint::fingerprint_file(path)?;
        store.update(&fingerprint, RecordPatch::quality(tags.clone()))?;
        tracing::info!("updated quality for {}: {}", path.display(), tags);
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{ExifExtractor, MetadataExtractor};
    use crate::events::{null_sender, EventChannel};
    use crate::error::StoreError;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    fn uniform(value: [u8; 3]) -> RgbImage {
        ImageBuffer::from_pixel(32, 32, Rgb(value))
    }

    fn save(dir: &Path, name: &str, value: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        uniform(value).save(&path).unwrap();
        path
    }

    #[test]
    fn white_is_overexposed_only() {
        let report = ExposureClassifier::default().classify_image(&uniform([255, 255, 255]));
        assert!(report.is_overexposed);
        assert!(!report.is_underexposed);
        assert_eq!(report.tags(), QualityTags::single(QualityTag::Overexposed));
    }

    #[test]
    fn black_is_underexposed_only() {
        let report = ExposureClassifier::default().classify_image(&uniform([0, 0, 0]));
        assert!(!report.is_overexposed);
        assert!(report.is_underexposed);
        assert_eq!(report.tags(), QualityTags::single(QualityTag::Underexposed));
    }

    #[test]
    fn mid_gray_is_qualified() {
        let report = ExposureClassifier::default().classify_image(&uniform([128, 128, 128]));
        assert_eq!(report.tags(), QualityTags::single(QualityTag::Qualified));
    }

    #[test]
    fn half_white_half_black_carries_both_tags() {
        let image = ImageBuffer::from_fn(20, 20, |x, _| {
            if x < 10 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let tags = ExposureClassifier::default().classify_image(&image).tags();
        assert!(tags.contains(QualityTag::Overexposed));
        assert!(tags.contains(QualityTag::Underexposed));
        assert!(!tags.contains(QualityTag::Qualified));
    }

    #[test]
    fn connected_area_does_not_decide() {
        // One bright pixel in 400: under every highlight threshold, yet its
        // connected area would pass a zero area threshold.
        let image = ImageBuffer::from_fn(20, 20, |x, y| {
            if x == 0 && y == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([128, 128, 128])
            }
        });
        let classifier = ExposureClassifier::new(ExposureConfig {
            rgb_max_channel_ratio_threshold: 0.5,
            connected_overexposed_area_threshold: 0.0,
            ..Default::default()
        });
        assert!(!classifier.classify_image(&image).is_overexposed);
    }

    #[test]
    fn thresholds_come_from_config() {
        let classifier = ExposureClassifier::new(ExposureConfig {
            average_brightness_threshold: 200.0,
            ..Default::default()
        });
        assert!(classifier.classify_image(&uniform([128, 128, 128])).is_underexposed);
    }

    #[test]
    fn empty_image_has_zero_ratios() {
        let report = ExposureClassifier::default().classify_image(&RgbImage::new(0, 0));
        assert!(report.signals().values().all(|v| *v == 0.0));
        assert!(!report.is_overexposed);
    }

    #[test]
    fn signals_map_has_all_eight() {
        let report = ExposureClassifier::default().classify_image(&uniform([10, 20, 30]));
        let signals = report.signals();
        assert_eq!(signals.len(), 8);
        assert!(signals.contains_key("connected_overexposed_area_ratio"));
        assert!(signals.contains_key("average_brightness"));
    }

    #[test]
    fn unreadable_file_is_an_error_and_failed_tag() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.jpg");
        fs::write(&bad, b"garbage").unwrap();
        let good = save(dir.path(), "good.png", [128, 128, 128]);

        let outcomes = ExposureClassifier::default().classify_batch(&[bad.clone(), good], 2);

        assert_eq!(outcomes.len(), 2);
        let failed = outcomes.iter().find(|o| o.path == bad).unwrap();
        assert!(matches!(failed.result, Err(ExposureError::Unreadable(_))));
        assert_eq!(failed.tags(), QualityTags::single(QualityTag::Failed));
    }

    #[test]
    fn classify_catalog_writes_tags_back() {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::open(dir.path());
        let extractor = ExifExtractor::new();
        let white = save(dir.path(), "white.png", [255, 255, 255]);
        let black = save(dir.path(), "black.png", [0, 0, 0]);
        let gray = save(dir.path(), "gray.png", [128, 128, 128]);
        let records = [&white, &black, &gray]
            .iter()
            .map(|p| extractor.extract(p).unwrap())
            .collect();
        store.append_batch(records).unwrap();
        // Disappears after import
        fs::remove_file(&gray).unwrap();

        let (sender, receiver) = EventChannel::new();
        let summary = ExposureClassifier::default()
            .classify_catalog(&store, 2, &sender)
            .unwrap();
        drop(sender);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.tag_counts.get(&QualityTag::Failed), Some(&1));

        let tags_of = |path: &Path| {
            let name = path.file_name().unwrap().to_string_lossy();
            store
                .records()
                .unwrap()
                .into_iter()
                .find(|r| r.file_info.file_name == name)
                .unwrap()
                .quality_tags
        };
        assert_eq!(tags_of(&white), QualityTags::single(QualityTag::Overexposed));
        assert_eq!(tags_of(&black), QualityTags::single(QualityTag::Underexposed));
        assert_eq!(tags_of(&gray), QualityTags::single(QualityTag::Failed));

        let events: Vec<_> = receiver.iter().collect();
        assert!(matches!(
            events.last(),
            Some(Event::Classify(ClassifyEvent::Completed { succeeded: 2, failed: 1 }))
        ));
    }

    #[test]
    fn classify_catalog_on_missing_catalog_is_empty() {
        let dir = TempDir::new().unwrap();
        let summary = ExposureClassifier::default()
            .classify_catalog(&CatalogStore::open(dir.path()), 1, &null_sender())
            .unwrap();
        assert_eq!(summary.total, 0);
        assert!(!dir.path().join("QualityRecord.json").exists());
    }

    #[test]
    fn classify_and_update_single_photo() {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::open(dir.path());
        let photo = save(dir.path(), "white.png", [255, 255, 255]);
        store.append(ExifExtractor::new().extract(&photo).unwrap()).unwrap();

        let tags = ExposureClassifier::default()
            .classify_and_update(&store, &photo)
            .unwrap();

        assert_eq!(tags, QualityTags::single(QualityTag::Overexposed));
        let fingerprint = fingerprint::fingerprint_file(&photo).unwrap();
        assert_eq!(store.get(&fingerprint).unwrap().unwrap().quality_tags, tags);
    }

    #[test]
    fn classify_and_update_unknown_photo_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::open(dir.path());
        let photo = save(dir.path(), "gray.png", [128, 128, 128]);

        let result = ExposureClassifier::default().classify_and_update(&store, &photo);
        assert!(matches!(
            result,
            Err(ExposureError::Store(StoreError::NotFound { .. }))
        ));
    }
}
