use logmon_types::LevelValue;

use crate::event::{ArcRecord, MonitorEvent, Snapshot};
use crate::filter::CompiledFilter;

/// Consumer-side copy of a monitor's record list, kept in step by applying
/// notifications in delivery order.
#[derive(Clone, Debug, Default)]
pub struct RecordView {
    records: Vec<ArcRecord>,
    file_exists: bool,
    is_running: bool,
    version: u64,
}

impl RecordView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the monitor's current state
    pub fn from_snapshot(snapshot: Snapshot, file_exists: bool) -> Self {
        Self {
            records: snapshot.records,
            file_exists,
            is_running: false,
            version: snapshot.version,
        }
    }

    /// Apply one notification. Returns the records appended by it, if any.
    pub fn apply(&mut self, event: &MonitorEvent) -> &[ArcRecord] {
        let start = match event {
            MonitorEvent::Updated {
                is_clear,
                added,
                version,
            } => {
                if *is_clear {
                    self.records.clear();
                }
                self.version = *version;
                let start = self.records.len();
                if let Some(added) = added {
                    self.records.extend(added.iter().cloned());
                }
                start
            }
            MonitorEvent::FileExistence(exists) => {
                self.file_exists = *exists;
                if !exists {
                    self.records.clear();
                }
                self.records.len()
            }
            MonitorEvent::RunState(running) => {
                self.is_running = *running;
                self.records.len()
            }
        };
        &self.records[start..]
    }

    pub fn records(&self) -> &[ArcRecord] {
        &self.records
    }

    /// Records passing `filter`, in file order
    pub fn filtered<'a>(&'a self, filter: &'a CompiledFilter) -> impl Iterator<Item = &'a ArcRecord> {
        self.records.iter().filter(move |r| filter.matches(r))
    }

    /// Get record count per level
    pub fn level_counts(&self) -> LevelCounts {
        let mut counts = LevelCounts::default();

        for record in &self.records {
            match record.level().and_then(|l| l.parse::<LevelValue>().ok()) {
                Some(LevelValue::Debug) => counts.debug += 1,
                Some(LevelValue::Info) => counts.info += 1,
                Some(LevelValue::Warn) => counts.warn += 1,
                Some(LevelValue::Error) => counts.error += 1,
                Some(LevelValue::Fatal) => counts.fatal += 1,
                None => counts.other += 1,
            }
        }

        counts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn file_exists(&self) -> bool {
        self.file_exists
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Version of the last applied update
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get the last N records
    pub fn tail(&self, n: usize) -> &[ArcRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }
}

/// Counts per level
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub debug: usize,
    pub info: usize,
    pub warn: usize,
    pub error: usize,
    pub fatal: usize,
    /// Level text that is none of the known values, or no level at all
    pub other: usize,
}

impl LevelCounts {
    pub fn total(&self) -> usize {
        self.debug + self.info + self.warn + self.error + self.fatal + self.other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use logmon_types::ColumnMapping;
    use std::sync::Arc;

    fn records(levels: &[&str]) -> Vec<ArcRecord> {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                let fields = ["t", *level, "c", "m"].map(String::from).to_vec();
                Arc::new(Record::from_fields(
                    i,
                    &ColumnMapping::builtin_default(),
                    fields,
                    i.checked_sub(1),
                ))
            })
            .collect()
    }

    fn updated(is_clear: bool, added: Vec<ArcRecord>, version: u64) -> MonitorEvent {
        MonitorEvent::Updated {
            is_clear,
            added: (!added.is_empty()).then_some(added),
            version,
        }
    }

    #[test]
    fn test_append_and_clear() {
        let mut view = RecordView::new();

        let appended = view.apply(&updated(false, records(&["Info", "Warn"]), 1));
        assert_eq!(appended.len(), 2);

        let appended = view.apply(&updated(false, Vec::new(), 1));
        assert!(appended.is_empty());
        assert_eq!(view.len(), 2);

        view.apply(&updated(true, records(&["Error"]), 2));
        assert_eq!(view.len(), 1);
        assert_eq!(view.version(), 2);
    }

    #[test]
    fn test_file_existence() {
        let mut view = RecordView::new();
        view.apply(&MonitorEvent::FileExistence(true));
        view.apply(&updated(false, records(&["Info"]), 1));
        assert!(view.file_exists());

        view.apply(&MonitorEvent::FileExistence(false));
        assert!(!view.file_exists());
        assert!(view.is_empty());
    }

    #[test]
    fn test_run_state() {
        let mut view = RecordView::new();
        view.apply(&MonitorEvent::RunState(true));
        assert!(view.is_running());
        view.apply(&MonitorEvent::RunState(false));
        assert!(!view.is_running());
    }

    #[test]
    fn test_level_counts() {
        let mut view = RecordView::new();
        view.apply(&updated(
            false,
            records(&["Info", "info", "ERROR", "Trace", "Fatal"]),
            1,
        ));

        let counts = view.level_counts();
        assert_eq!(counts.info, 2);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.fatal, 1);
        assert_eq!(counts.other, 1);
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn test_filtered_and_tail() {
        let mut view = RecordView::new();
        view.apply(&updated(false, records(&["Info", "Error", "Info"]), 1));

        let filter = CompiledFilter::default().with_levels([LevelValue::Error]);
        let hits: Vec<_> = view.filtered(&filter).map(|r| r.number()).collect();
        assert_eq!(hits, vec![1]);

        assert_eq!(view.tail(2).len(), 2);
        assert_eq!(view.tail(10).len(), 3);
    }
}
