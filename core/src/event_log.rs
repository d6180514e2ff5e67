// Prefetch event log
//
// Capped FIFO of human-readable prefetch events. Appended entries are also
// pushed through a tokio broadcast channel so live views can stream them.

use crate::model::{PrefetchKind, Surface};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Structured payload of a log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub seq_no: u64,
    pub kind: PrefetchKind,
    pub surface: Option<Surface>,
    pub level: Option<u32>,
    pub elapsed_ms: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub message: String,
    pub data: LogData,
}

pub struct PrefetchLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_id: u64,
    sender: broadcast::Sender<LogEntry>,
}

impl PrefetchLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
            sender,
        }
    }

    /// Append an entry, evicting the oldest ones past capacity
    pub fn append(&mut self, message: impl Into<String>, data: LogData) -> LogEntry {
        let entry = LogEntry {
            id: self.next_id,
            time: Utc::now(),
            message: message.into(),
            data,
        };
        self.next_id += 1;

        self.entries.push_back(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        // Ignore error if no subscribers
        let _ = self.sender.send(entry.clone());
        entry
    }

    /// Entries oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Drop all entries and restart ids at 1
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = 1;
    }
}

impl Default for PrefetchLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

/// Log line for a finished image load
pub fn describe(data: &LogData) -> String {
    match data.kind {
        PrefetchKind::Tile => format!(
            "tile #{} {} L{} loaded in {:.0}ms ({}x{})",
            data.seq_no,
            data.surface.map(|s| s.as_str()).unwrap_or("?"),
            data.level.unwrap_or(0),
            data.elapsed_ms,
            data.width,
            data.height
        ),
        PrefetchKind::Defect => format!(
            "defect #{} {} loaded in {:.0}ms ({}x{})",
            data.seq_no,
            data.surface.map(|s| s.as_str()).unwrap_or("-"),
            data.elapsed_ms,
            data.width,
            data.height
        ),
    }
}
