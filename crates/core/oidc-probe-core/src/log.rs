//! Bounded diagnostic event log.

use crate::types::{LogEntry, LogLevel};
use chrono::Local;
use std::collections::VecDeque;

const MAX_ENTRIES: usize = 100;

/// Append-only, capacity-bounded ring of diagnostic events.
///
/// Single-writer; entries are retained in insertion order and the oldest
/// are evicted once the bound is reached. Ids increase monotonically for
/// the lifetime of the recorder, across clears included.
#[derive(Debug, Default)]
pub struct LogRecorder {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<String>,
    ) -> &LogEntry {
        self.next_id += 1;
        self.entries.push_back(LogEntry {
            id: self.next_id,
            time: Local::now(),
            level,
            message: message.into(),
            data,
        });
        while self.entries.len() > MAX_ENTRIES {
            self.entries.pop_front();
        }
        // Just pushed, never empty here.
        self.entries.back().unwrap()
    }

    /// Empty the log, then record that it was emptied so a user-initiated
    /// clear is never silently invisible.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.append(LogLevel::Info, "Logs cleared", None);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_sequential_ids() {
        let mut log = LogRecorder::new();
        log.append(LogLevel::Info, "one", None);
        log.append(LogLevel::Event, "two", Some("detail".to_string()));

        let ids: Vec<u64> = log.entries().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(log.entries().last().unwrap().data.as_deref(), Some("detail"));
    }

    #[test]
    fn bound_drops_oldest_first() {
        let mut log = LogRecorder::new();
        for i in 0..105 {
            log.append(LogLevel::Info, format!("entry {i}"), None);
        }

        assert_eq!(log.len(), 100);
        // 105 appended, the first five evicted: lowest surviving id is 6.
        let ids: Vec<u64> = log.entries().map(|e| e.id).collect();
        assert_eq!(ids.first(), Some(&6));
        assert_eq!(ids.last(), Some(&105));
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn clear_leaves_a_single_info_entry() {
        let mut log = LogRecorder::new();
        for _ in 0..10 {
            log.append(LogLevel::Error, "noise", None);
        }

        log.clear();

        assert_eq!(log.len(), 1);
        let entry = log.entries().next().unwrap();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "Logs cleared");
        // Id counter survives clears.
        assert_eq!(entry.id, 11);
    }
}
