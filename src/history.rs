//! Command history ring with shell-style Up/Down recall

/// Previously submitted command lines plus a browsing cursor.
///
/// `cursor == entries.len()` means "not browsing": the input region holds
/// free text. Recall never changes the stored entries.
#[derive(Debug, Clone, Default)]
pub struct HistoryRing {
    entries: Vec<String>,
    cursor: usize,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Record a submitted line. Empty lines and repeats of the newest entry
    /// are skipped. The cursor always goes back to "not browsing".
    pub fn record(&mut self, line: &str) {
        if !line.is_empty() && self.entries.last().map(String::as_str) != Some(line) {
            self.entries.push(line.to_string());
        }
        self.reset_cursor();
    }

    /// Step back to an older entry (Up).
    ///
    /// Returns `None` when there is nothing to change: the ring is empty or
    /// the cursor already sits on the oldest entry.
    pub fn recall_previous(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Step forward to a newer entry (Down).
    ///
    /// Moving past the newest entry yields an empty line rather than
    /// wrapping around. Returns `None` when not browsing.
    pub fn recall_next(&mut self) -> Option<&str> {
        if self.cursor >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        if self.cursor == self.entries.len() {
            return Some("");
        }
        self.entries.get(self.cursor).map(String::as_str)
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = self.entries.len();
    }
}
