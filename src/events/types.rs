//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the catalog engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Folder import events
    Import(ImportEvent),
    /// Exposure classification events
    Classify(ClassifyEvent),
}

/// Events during a folder import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImportEvent {
    /// Candidate files were discovered and workers are starting
    Started { folder: PathBuf, total_files: usize },
    /// A file finished (imported, skipped or failed)
    Progress(ImportProgress),
    /// A file could not be imported; the batch continues
    FileFailed { path: PathBuf, message: String },
    /// The batch was written (or failed to write) to the catalog
    Completed {
        imported_files: usize,
        skipped_files: usize,
        error_files: usize,
    },
}

/// Snapshot of import progress, sent after each file completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Files in this batch
    pub total: usize,
    /// Files finished so far, in any outcome
    pub processed: usize,
    /// Files whose record was collected
    pub imported: usize,
    /// Files that failed
    pub errors: usize,
    /// Files skipped as already cataloged
    pub skipped: usize,
    /// `processed / total * 100`, 0 for an empty batch
    pub percentage: f64,
}

/// Events during exposure classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifyEvent {
    /// Classification has started
    Started { total_photos: usize },
    /// Progress update
    Progress(ClassifyProgress),
    /// A photo could not be classified and was tagged as failed
    Failed { path: PathBuf, message: String },
    /// Classification finished
    Completed { succeeded: usize, failed: usize },
}

/// Progress information during classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyProgress {
    /// Photos classified so far
    pub completed: usize,
    /// Total photos to classify
    pub total: usize,
    /// Photo that just finished
    pub current_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Import(ImportEvent::Progress(ImportProgress {
            total: 10,
            processed: 5,
            imported: 4,
            errors: 1,
            skipped: 0,
            percentage: 50.0,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Import(ImportEvent::Progress(p)) => {
                assert_eq!(p.processed, 5);
                assert_eq!(p.percentage, 50.0);
            }
            _ => panic!("Wrong event type"),
        }
    }
}
