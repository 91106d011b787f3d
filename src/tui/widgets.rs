//! Widgets for the transcript view

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthChar;

use super::shimmer::{shimmer_spans, AnimatedDots};
use super::theme::Theme;
use crate::transcript::TranscriptBuffer;

/// The transcript wrapped to a width, plus where the cursor lands
#[derive(Debug, Clone, Default)]
pub struct TranscriptLayout {
    pub lines: Vec<Line<'static>>,
    /// (row, column) in wrapped lines
    pub cursor: (usize, usize),
}

/// Collects styled characters into lines, grouping runs of the same style
struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    run: String,
    run_style: Style,
    col: usize,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            spans: Vec::new(),
            run: String::new(),
            run_style: Style::default(),
            col: 0,
        }
    }

    fn flush_run(&mut self) {
        if !self.run.is_empty() {
            let run = std::mem::take(&mut self.run);
            self.spans.push(Span::styled(run, self.run_style));
        }
    }

    fn break_line(&mut self) {
        self.flush_run();
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        self.col = 0;
    }

    fn push(&mut self, ch: char, width: usize, style: Style) {
        if style != self.run_style {
            self.flush_run();
            self.run_style = style;
        }
        self.run.push(ch);
        self.col += width;
    }

    fn row(&self) -> usize {
        self.lines.len()
    }
}

pub fn layout_transcript(buffer: &TranscriptBuffer, width: usize) -> TranscriptLayout {
    let width = width.max(1);
    let segments = buffer.segments();
    let mut seg_idx = 0;
    let mut out = LineBuilder::new();
    let mut cursor = None;

    for (idx, ch) in buffer.text().chars().enumerate() {
        let style = if idx >= buffer.boundary() {
            Theme::text()
        } else {
            while seg_idx < segments.len() && segments[seg_idx].range.end <= idx {
                seg_idx += 1;
            }
            segments
                .get(seg_idx)
                .filter(|seg| seg.range.contains(&idx))
                .map(|seg| Theme::for_tag(seg.tag))
                .unwrap_or_else(Theme::text)
        };

        if ch == '\n' {
            if idx == buffer.cursor() {
                cursor = Some((out.row(), out.col));
            }
            out.break_line();
            continue;
        }

        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if out.col > 0 && out.col + ch_width > width {
            out.break_line();
        }
        if idx == buffer.cursor() {
            cursor = Some((out.row(), out.col));
        }
        out.push(ch, ch_width, style);
    }

    if cursor.is_none() && out.col >= width {
        out.break_line();
    }
    let cursor = cursor.unwrap_or((out.row(), out.col));
    out.break_line();

    TranscriptLayout {
        lines: out.lines,
        cursor,
    }
}

/// Title line
pub struct HeaderBar<'a> {
    pub title: &'a str,
    pub cwd: &'a str,
}

impl Widget for HeaderBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 {
            return;
        }
        let title = Line::from(vec![
            Span::styled("◆ ", Theme::border_focused()),
            Span::styled(self.title, Theme::title()),
        ]);
        buf.set_line(area.x + 1, area.y, &title, area.width.saturating_sub(2));

        let cwd = format!("{} ", self.cwd);
        let cwd_len = cwd.chars().count() as u16;
        let cwd_x = area.x + area.width.saturating_sub(cwd_len + 1);
        buf.set_span(cwd_x, area.y, &Span::styled(cwd, Theme::muted()), cwd_len + 1);
    }
}

/// Voice status line
pub struct StatusBar<'a> {
    pub listening: bool,
    pub spinner_frame: usize,
    pub status_text: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = if self.listening {
            let spinner = AnimatedDots::new(self.spinner_frame);
            let mut spans = vec![Span::styled(
                format!("{} ", spinner.current()),
                Theme::listening(),
            )];
            spans.extend(shimmer_spans(self.status_text));
            Line::from(spans)
        } else {
            Line::from(vec![
                Span::styled("● ", Theme::idle()),
                Span::styled(self.status_text, Theme::muted()),
            ])
        };
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(2));
    }
}

/// Key bindings
pub struct HelpBar {
    pub voice_enabled: bool,
    /// A voice request is in flight, so speaking is refused
    pub voice_busy: bool,
}

impl Widget for HelpBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let speak = match (self.voice_enabled, self.voice_busy) {
            (false, _) => "Speak (off)",
            (true, true) => "Speak (busy)",
            (true, false) => "Speak",
        };
        let bindings = [
            ("Enter", "Run"),
            ("↑↓", "History"),
            ("F2", speak),
            ("Ctrl+Y", "Copy line"),
            ("PgUp/PgDn", "Scroll"),
            ("Ctrl+C", "Quit"),
        ];

        let mut spans = vec![Span::raw(" ")];
        for (i, (key, desc)) in bindings.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", Theme::muted()));
            }
            let key_style = if *key == "F2" && self.voice_busy {
                Theme::muted()
            } else {
                Theme::key()
            };
            spans.push(Span::styled(*key, key_style));
            spans.push(Span::styled(format!(" {}", desc), Theme::key_desc()));
        }
        buf.set_line(area.x, area.y, &Line::from(spans), area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Tag;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn texts(layout: &TranscriptLayout) -> Vec<String> {
        layout.lines.iter().map(line_text).collect()
    }

    #[test]
    fn test_newlines_split_lines() {
        let mut buf = TranscriptBuffer::new();
        buf.append_history("ls\n", Tag::Command);
        buf.append_history("a  b\n\n", Tag::Output);
        buf.open_prompt("/tmp $ ");

        let layout = layout_transcript(&buf, 80);
        assert_eq!(texts(&layout), vec!["ls", "a  b", "", "/tmp $ "]);
        assert_eq!(layout.cursor, (3, 7));
    }

    #[test]
    fn test_long_lines_wrap_and_cursor_follows() {
        let mut buf = TranscriptBuffer::new();
        buf.open_prompt("$ ");
        buf.insert_at_cursor("abcdef");

        let layout = layout_transcript(&buf, 4);
        assert_eq!(texts(&layout), vec!["$ ab", "cdef", ""]);
        // Cursor at the end of a full row moves to the next one
        assert_eq!(layout.cursor, (2, 0));

        buf.move_left();
        let layout = layout_transcript(&buf, 4);
        assert_eq!(layout.cursor, (1, 3));
    }

    #[test]
    fn test_wide_characters_wrap_by_display_width() {
        let mut buf = TranscriptBuffer::new();
        buf.open_prompt("$ ");
        buf.insert_at_cursor("\u{4f60}\u{597d}");
        let layout = layout_transcript(&buf, 5);
        assert_eq!(texts(&layout), vec!["$ \u{4f60}", "\u{597d}"]);
        assert_eq!(layout.cursor, (1, 2));
    }

    fn help_text(voice_enabled: bool, voice_busy: bool) -> String {
        let area = Rect::new(0, 0, 120, 1);
        let mut buf = Buffer::empty(area);
        HelpBar {
            voice_enabled,
            voice_busy,
        }
        .render(area, &mut buf);
        (0..area.width)
            .map(|x| buf[(x, 0)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_help_bar_marks_speak_busy_while_listening() {
        assert!(help_text(true, false).contains("F2 Speak │"));
        assert!(help_text(true, true).contains("F2 Speak (busy)"));
        assert!(help_text(false, false).contains("F2 Speak (off)"));
    }

    #[test]
    fn test_history_segments_are_styled_by_tag() {
        let mut buf = TranscriptBuffer::new();
        buf.append_history("oops\n", Tag::Error);
        buf.open_prompt("$ ");
        let layout = layout_transcript(&buf, 80);
        assert_eq!(layout.lines[0].spans[0].style, Theme::error());
        assert_eq!(layout.lines[1].spans[0].style, Theme::prompt());
    }
}
