//! Transcript buffer with a protected history region
//!
//! The buffer is one run of text split by the boundary offset:
//! - `[0, boundary)` is history. It is append-only and never edited.
//! - `[boundary, end)` is the input region the user is typing into.
//!
//! All offsets are CHARACTER offsets, not byte offsets.

use std::ops::Range;

/// What a history segment holds, used for styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Prompt,
    Command,
    Output,
    Error,
    Notice,
}

/// A tagged run of history text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub range: Range<usize>,
    pub tag: Tag,
}

/// Kind of edit the front end wants to perform at an offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insert,
    Delete,
    Navigate,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditDecision {
    Allow,
    Deny,
}

impl EditDecision {
    pub fn is_allowed(self) -> bool {
        self == EditDecision::Allow
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("recall started at generation {started} but the transcript is at generation {current}")]
    StaleGeneration { started: u64, current: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    text: String,
    /// Number of characters in `text`
    len: usize,
    boundary: usize,
    /// Byte offset of `boundary` in `text`
    boundary_byte: usize,
    cursor: usize,
    /// Bumped every time the boundary is reset by `clear`
    generation: u64,
    segments: Vec<Segment>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn boundary(&self) -> usize {
        self.boundary
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Everything before the boundary
    pub fn history_text(&self) -> &str {
        &self.text[..self.boundary_byte]
    }

    /// Offsets in the input region are resolved from the cached boundary,
    /// so typing does not rescan the history.
    fn byte_index(&self, char_idx: usize) -> usize {
        let (base_char, base_byte) = if char_idx >= self.boundary {
            (self.boundary, self.boundary_byte)
        } else {
            (0, 0)
        };
        self.text[base_byte..]
            .char_indices()
            .nth(char_idx - base_char)
            .map(|(byte_idx, _)| base_byte + byte_idx)
            .unwrap_or(self.text.len())
    }

    /// Append history text at the end of the buffer.
    ///
    /// The boundary moves to the new end, so whatever was appended (and
    /// anything left in the input region) becomes immutable history.
    pub fn append_history(&mut self, text: &str, tag: Tag) {
        if text.is_empty() {
            return;
        }
        let start = self.len;
        self.text.push_str(text);
        self.len += text.chars().count();
        self.push_segment(start..self.len, tag);
        self.boundary = self.len;
        self.boundary_byte = self.text.len();
        self.cursor = self.len;
    }

    fn push_segment(&mut self, range: Range<usize>, tag: Tag) {
        if let Some(last) = self.segments.last_mut() {
            if last.tag == tag && last.range.end == range.start {
                last.range.end = range.end;
                return;
            }
        }
        self.segments.push(Segment { range, tag });
    }

    /// Append the prompt and start a fresh input region right after it.
    ///
    /// Text inserted exactly at the boundary later lands in the input
    /// region; the boundary itself stays put.
    pub fn open_prompt(&mut self, prompt: &str) {
        self.append_history(prompt, Tag::Prompt);
        self.boundary = self.len;
        self.boundary_byte = self.text.len();
        self.cursor = self.len;
    }

    pub fn read_input_region(&self) -> &str {
        &self.text[self.boundary_byte..]
    }

    /// Remove the input region and return what was in it
    pub fn take_input_region(&mut self) -> String {
        let at = self.boundary_byte;
        let taken = self.text.split_off(at);
        self.len = self.boundary;
        self.cursor = self.len;
        taken
    }

    /// Replace the input region with `text` and put the cursor at the end
    pub fn replace_input_region(&mut self, text: &str) {
        self.text.truncate(self.boundary_byte);
        self.text.push_str(text);
        self.len = self.boundary + text.chars().count();
        self.cursor = self.len;
    }

    /// Replace the input region only if no `clear` happened since `generation`.
    pub fn replace_input_region_checked(
        &mut self,
        generation: u64,
        text: &str,
    ) -> Result<(), TranscriptError> {
        if generation != self.generation {
            return Err(TranscriptError::StaleGeneration {
                started: generation,
                current: self.generation,
            });
        }
        self.replace_input_region(text);
        Ok(())
    }

    /// Decide whether an edit targeting `offset` may proceed.
    pub fn edit_attempt(&self, offset: usize, kind: EditKind) -> EditDecision {
        match kind {
            EditKind::Navigate | EditKind::Copy => EditDecision::Allow,
            EditKind::Insert | EditKind::Delete => {
                if offset < self.boundary || offset > self.len {
                    EditDecision::Deny
                } else {
                    EditDecision::Allow
                }
            }
        }
    }

    /// Insert typed or pasted text at the cursor.
    ///
    /// When the cursor sits in history the insert is denied and the cursor
    /// snaps to the end of the input region, so the next keystroke lands there.
    pub fn insert_at_cursor(&mut self, text: &str) -> EditDecision {
        let decision = self.edit_attempt(self.cursor, EditKind::Insert);
        if !decision.is_allowed() {
            self.cursor = self.len;
            return decision;
        }
        let at = self.byte_index(self.cursor);
        self.text.insert_str(at, text);
        let added = text.chars().count();
        self.len += added;
        self.cursor += added;
        decision
    }

    /// Delete the character before the cursor (Backspace)
    pub fn delete_backward(&mut self) -> EditDecision {
        let Some(target) = self.cursor.checked_sub(1) else {
            return EditDecision::Deny;
        };
        let decision = self.edit_attempt(target, EditKind::Delete);
        if decision.is_allowed() {
            self.remove_char(target);
            self.cursor = target;
        }
        decision
    }

    /// Delete the character under the cursor (Delete)
    pub fn delete_forward(&mut self) -> EditDecision {
        if self.cursor >= self.len {
            return EditDecision::Deny;
        }
        let decision = self.edit_attempt(self.cursor, EditKind::Delete);
        if decision.is_allowed() {
            self.remove_char(self.cursor);
        }
        decision
    }

    fn remove_char(&mut self, char_idx: usize) {
        let start = self.byte_index(char_idx);
        if let Some(ch) = self.text[start..].chars().next() {
            self.text.replace_range(start..start + ch.len_utf8(), "");
            self.len -= 1;
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.len {
            self.cursor += 1;
        }
    }

    /// Jump to the start of the input region
    pub fn move_home(&mut self) {
        self.cursor = self.boundary;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.len;
    }

    /// The full line the cursor is on (read-only, for copying)
    pub fn line_at_cursor(&self) -> &str {
        let at = self.byte_index(self.cursor);
        let start = self.text[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = self.text[at..]
            .find('\n')
            .map(|i| at + i)
            .unwrap_or(self.text.len());
        &self.text[start..end]
    }

    /// Empty the buffer. The caller is expected to open a new prompt.
    pub fn clear(&mut self) {
        self.text.clear();
        self.segments.clear();
        self.len = 0;
        self.boundary = 0;
        self.boundary_byte = 0;
        self.cursor = 0;
        self.generation += 1;
    }
}
