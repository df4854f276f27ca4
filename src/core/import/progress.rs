//! Import progress accounting and the sink it is reported to.

use super::ImportResult;
use crate::core::pool;
use crate::events::{Event, EventSender, ImportEvent, ImportProgress};
use std::path::Path;
use std::sync::Mutex;

/// Receives import progress. Called synchronously from worker threads.
///
/// Only [`ProgressSink::progress`] is required; the lifecycle hooks default
/// to doing nothing.
pub trait ProgressSink: Sync {
    /// Called once per finished file, in processing order
    fn progress(&self, progress: &ImportProgress);

    fn started(&self, _folder: &Path, _total_files: usize) {}

    fn file_failed(&self, _path: &Path, _message: &str) {}

    fn completed(&self, _result: &ImportResult) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ImportProgress) + Sync,
{
    fn progress(&self, progress: &ImportProgress) {
        self(progress)
    }
}

impl ProgressSink for EventSender {
    fn progress(&self, progress: &ImportProgress) {
        self.send(Event::Import(ImportEvent::Progress(*progress)));
    }

    fn started(&self, folder: &Path, total_files: usize) {
        self.send(Event::Import(ImportEvent::Started {
            folder: folder.to_path_buf(),
            total_files,
        }));
    }

    fn file_failed(&self, path: &Path, message: &str) {
        self.send(Event::Import(ImportEvent::FileFailed {
            path: path.to_path_buf(),
            message: message.to_string(),
        }));
    }

    fn completed(&self, result: &ImportResult) {
        self.send(Event::Import(ImportEvent::Completed {
            imported_files: result.imported_files,
            skipped_files: result.skipped_files,
            error_files: result.error_files,
        }));
    }
}

/// Sink that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _progress: &ImportProgress) {}
}

/// How a file finished, for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tally {
    Imported,
    Skipped,
    Failed,
}

/// Shared counters; each update is reported while the lock is held so
/// sinks see `processed` strictly increasing.
pub(crate) struct ProgressTracker {
    state: Mutex<ImportProgress>,
}

impl ProgressTracker {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(ImportProgress {
                total,
                ..Default::default()
            }),
        }
    }

    pub(crate) fn record(&self, tally: Tally, sink: &dyn ProgressSink) {
        let mut state = pool::lock(&self.state);
        state.processed += 1;
        match tally {
            Tally::Skipped => state.skipped += 1,
            Tally::Failed => state.errors += 1,
            Tally::Imported => {}
        }
        state.imported = state.processed - state.errors - state.skipped;
        state.percentage = if state.total > 0 {
            state.processed as f64 / state.total as f64 * 100.0
        } else {
            0.0
        };
        sink.progress(&state);
    }

    pub(crate) fn snapshot(&self) -> ImportProgress {
        *pool::lock(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventChannel;

    #[test]
    fn counts_and_percentage() {
        let tracker = ProgressTracker::new(4);
        tracker.record(Tally::Imported, &NoProgress);
        tracker.record(Tally::Skipped, &NoProgress);
        tracker.record(Tally::Failed, &NoProgress);

        let progress = tracker.snapshot();
        assert_eq!(progress.processed, 3);
        assert_eq!(progress.imported, 1);
        assert_eq!(progress.skipped, 1);
        assert_eq!(progress.errors, 1);
        assert_eq!(progress.percentage, 75.0);
    }

    #[test]
    fn empty_batch_is_zero_percent() {
        let tracker = ProgressTracker::new(0);
        assert_eq!(tracker.snapshot().percentage, 0.0);
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |p: &ImportProgress| seen.lock().unwrap().push(p.processed);
        let tracker = ProgressTracker::new(2);
        tracker.record(Tally::Imported, &sink);
        tracker.record(Tally::Imported, &sink);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn event_sender_emits_import_events() {
        let (sender, receiver) = EventChannel::new();
        let tracker = ProgressTracker::new(1);
        sender.started(Path::new("/photos"), 1);
        tracker.record(Tally::Failed, &sender);
        sender.file_failed(Path::new("/photos/a.jpg"), "broken");
        drop(sender);

        let events: Vec<_> = receiver.iter().collect();
        assert!(matches!(
            events[0],
            Event::Import(ImportEvent::Started { total_files: 1, .. })
        ));
        assert!(matches!(
            events[1],
            Event::Import(ImportEvent::Progress(ImportProgress { errors: 1, .. }))
        ));
        assert!(matches!(events[2], Event::Import(ImportEvent::FileFailed { .. })));
    }
}
