use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of log lines retained per session.
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Bounded FIFO of output lines: the most recent `capacity` lines are kept,
/// oldest dropped first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    /// Lines evicted since the buffer was created.
    dropped: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    /// A capacity of 0 is raised to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Total lines ever pushed (retained + dropped).
    pub fn total_pushed(&self) -> u64 {
        self.dropped + self.lines.len() as u64
    }

    /// Empty the buffer, keeping its capacity.
    pub fn cleared(&self) -> Self {
        Self::with_capacity(self.capacity)
    }
}
