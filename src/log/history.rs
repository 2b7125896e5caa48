// src/log/history.rs

use std::collections::VecDeque;

use super::{LogLevel, LogMessage};

pub const DEFAULT_HISTORY_CAPACITY: usize = 25_000;

/// Bounded FIFO of log messages.
///
/// Pushing into a full history evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct LogHistory {
    entries: VecDeque<LogMessage>,
    capacity: usize,
}

impl LogHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a message, returning the evicted entry if the history was full.
    pub fn push(&mut self, message: LogMessage) -> Option<LogMessage> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message);
        evicted
    }

    /// Change the capacity, evicting the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogMessage> {
        self.entries.iter()
    }

    /// Entries visible at `threshold`, oldest first.
    pub fn filter(&self, threshold: LogLevel) -> Vec<LogMessage> {
        self.entries
            .iter()
            .filter(|m| m.is_visible_at(threshold))
            .cloned()
            .collect()
    }
}

impl Default for LogHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
