//! Bounded capture of the server's stderr.
//!
//! The client creates one buffer and hands clones to the supervisor (which
//! fills it from the drain task) and the dispatcher (which embeds it in
//! error messages). Oldest lines are evicted once the capacity is reached.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Upper bound on the text embedded in a single error message.
const MAX_SNAPSHOT_CHARS: usize = 2000;

/// Shared, bounded ring of stderr lines.
#[derive(Debug, Clone)]
pub struct StderrBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl StderrBuffer {
    /// Create a buffer that keeps at most `capacity` lines (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a line, evicting the oldest when full.
    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.guard();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Copy of the captured lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.guard().iter().cloned().collect()
    }

    /// Captured lines joined with newlines, truncated for error messages.
    pub fn snapshot(&self) -> String {
        let mut text = self.lines().join("\n");
        if text.len() > MAX_SNAPSHOT_CHARS {
            let cut = (0..=MAX_SNAPSHOT_CHARS)
                .rev()
                .find(|&i| text.is_char_boundary(i))
                .unwrap_or(0);
            text.truncate(cut);
            text.push_str("...(truncated)");
        }
        text
    }
}
