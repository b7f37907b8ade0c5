use std::sync::Arc;

use tokio::sync::mpsc;

use crate::record::Record;

/// Shared, read-only record handle handed to consumers
pub type ArcRecord = Arc<Record>;

/// Notification pushed by the monitor to every subscriber
#[derive(Clone, Debug)]
pub enum MonitorEvent {
    /// Result of a reload or a clear
    Updated {
        /// The consumer must drop everything it holds before appending
        is_clear: bool,
        /// Appended records in file order; `None` when nothing was appended
        added: Option<Vec<ArcRecord>>,
        /// Record-list version after the mutation
        version: u64,
    },
    /// The target file appeared (`true`) or disappeared (`false`)
    FileExistence(bool),
    /// The running flag flipped
    RunState(bool),
}

/// Immutable view of the record list at one version
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub version: u64,
    pub records: Vec<ArcRecord>,
}

impl Snapshot {
    /// Record preceding `record` in this snapshot
    pub fn previous_of(&self, record: &Record) -> Option<&ArcRecord> {
        record.previous().and_then(|i| self.records.get(i))
    }
}

/// Fan-out of notifications to any number of channel subscribers
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<mpsc::UnboundedSender<MonitorEvent>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Send to every live subscriber, pruning the ones whose receiver is gone
    pub(crate) fn publish(&mut self, event: MonitorEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}
