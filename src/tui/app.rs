//! Main TUI application

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tracing::{debug, warn};

use super::clipboard;
use super::input::{map_key, KeyAction};
use super::theme::Theme;
use super::widgets::{layout_transcript, HeaderBar, HelpBar, StatusBar};
use crate::session::Session;
use crate::voice::VoicePipeline;

/// Lines moved per PageUp/PageDown or wheel step
const SCROLL_STEP: usize = 3;

/// Side effects a key can ask for that need the system outside the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    Quit,
    Copy(String),
    Paste,
}

/// Everything the screen shows, without the terminal
pub struct AppState {
    session: Session,
    voice: Option<VoicePipeline>,
    unavailable_message: String,
    scroll_offset: usize,
    /// Header directory, refreshed only after something ran
    cwd: String,
}

impl AppState {
    pub fn new(
        session: Session,
        voice: Option<VoicePipeline>,
        unavailable_message: impl Into<String>,
    ) -> Self {
        let cwd = session.cwd().unwrap_or_default();
        Self {
            session,
            voice,
            unavailable_message: unavailable_message.into(),
            scroll_offset: 0,
            cwd,
        }
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    fn refresh_cwd(&mut self) {
        self.cwd = self.session.cwd().unwrap_or_default();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice.is_some()
    }

    pub fn listening(&self) -> bool {
        self.voice.as_ref().is_some_and(VoicePipeline::is_busy)
    }

    /// Run queued voice work. Returns true when anything changed.
    pub fn tick(&mut self) -> bool {
        let changed = self.session.drain_handoffs();
        if changed {
            self.scroll_offset = 0;
            self.refresh_cwd();
        }
        changed
    }

    pub fn apply(&mut self, action: KeyAction) -> Effect {
        match action {
            KeyAction::None => return Effect::None,
            KeyAction::Quit => return Effect::Quit,
            KeyAction::Submit => {
                self.scroll_offset = 0;
                self.session.submit_input();
                self.refresh_cwd();
            }
            KeyAction::Speak => self.speak(),
            KeyAction::Insert(c) => {
                self.scroll_offset = 0;
                let mut tmp = [0u8; 4];
                self.session.buffer_mut().insert_at_cursor(c.encode_utf8(&mut tmp));
            }
            KeyAction::Backspace => {
                self.session.buffer_mut().delete_backward();
            }
            KeyAction::Delete => {
                self.session.buffer_mut().delete_forward();
            }
            KeyAction::CursorLeft => self.session.buffer_mut().move_left(),
            KeyAction::CursorRight => self.session.buffer_mut().move_right(),
            KeyAction::CursorHome => self.session.buffer_mut().move_home(),
            KeyAction::CursorEnd => self.session.buffer_mut().move_end(),
            KeyAction::HistoryPrev => {
                self.session.recall_previous();
            }
            KeyAction::HistoryNext => {
                self.session.recall_next();
            }
            KeyAction::ScrollUp => self.scroll_up(SCROLL_STEP),
            KeyAction::ScrollDown => self.scroll_down(SCROLL_STEP),
            KeyAction::CopyLine => {
                return Effect::Copy(self.session.buffer().line_at_cursor().to_string())
            }
            KeyAction::Paste => return Effect::Paste,
        }

        if self.session.is_terminated() {
            Effect::Quit
        } else {
            Effect::None
        }
    }

    /// Insert clipboard text into the input region as one line
    pub fn paste(&mut self, text: &str) {
        let line = clipboard::single_line(text);
        if !line.is_empty() {
            self.scroll_offset = 0;
            self.session.buffer_mut().insert_at_cursor(&line);
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.session.set_status(status);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn speak(&mut self) {
        match &self.voice {
            Some(voice) => {
                if voice.trigger(self.session.handoff_sender()) {
                    debug!("Voice request started");
                } else {
                    self.session.set_status("Voice request already in progress.");
                }
            }
            None => {
                let message = self.unavailable_message.clone();
                self.session.report_pipeline_failure(message);
            }
        }
    }
}

/// First visible row and the clamped scroll for a bottom-anchored view
pub fn visible_window(total: usize, height: usize, scroll_offset: usize) -> (usize, usize) {
    let max_scroll = total.saturating_sub(height);
    let actual_scroll = scroll_offset.min(max_scroll);
    let start = total.saturating_sub(height).saturating_sub(actual_scroll);
    (start, actual_scroll)
}

pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: AppState,
    spinner_frame: usize,
}

impl App {
    pub fn new(state: AppState) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, crossterm::event::EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            state,
            spinner_frame: 0,
        })
    }

    pub async fn run(&mut self) -> io::Result<()> {
        let poll_timeout = Duration::from_millis(16);
        let spinner_interval = Duration::from_millis(80);
        let mut last_spinner_update = Instant::now();

        loop {
            self.state.tick();
            if self.state.session().is_terminated() {
                break;
            }

            if last_spinner_update.elapsed() >= spinner_interval {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
                last_spinner_update = Instant::now();
            }

            let state = &self.state;
            let spinner_frame = self.spinner_frame;
            self.terminal.draw(|f| draw(f, state, spinner_frame))?;

            if event::poll(poll_timeout)? {
                let quit = match event::read()? {
                    Event::Key(key) => {
                        let effect = self.state.apply(map_key(key));
                        self.handle_effect(effect)
                    }
                    Event::Paste(text) => {
                        self.state.paste(&text);
                        false
                    }
                    Event::Mouse(mouse) => {
                        match mouse.kind {
                            MouseEventKind::ScrollUp => self.state.scroll_up(SCROLL_STEP),
                            MouseEventKind::ScrollDown => self.state.scroll_down(SCROLL_STEP),
                            _ => {}
                        }
                        false
                    }
                    _ => false,
                };
                if quit {
                    break;
                }
            }

            // Give voice workers a turn on a current-thread runtime
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn handle_effect(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::None => false,
            Effect::Quit => true,
            Effect::Copy(line) => {
                match clipboard::copy_text(&line) {
                    Ok(()) => self.state.set_status("Copied line to clipboard."),
                    Err(e) => {
                        warn!("Copy failed: {}", e);
                        self.state.set_status(e.to_string());
                    }
                }
                false
            }
            Effect::Paste => {
                match clipboard::paste_text() {
                    Ok(text) => self.state.paste(&text),
                    Err(e) => {
                        warn!("Paste failed: {}", e);
                        self.state.set_status(e.to_string());
                    }
                }
                false
            }
        }
    }
}

fn draw(f: &mut Frame, state: &AppState, spinner_frame: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let session = state.session();
    f.render_widget(
        HeaderBar {
            title: "VoiceOS",
            cwd: state.cwd(),
        },
        chunks[0],
    );
    f.render_widget(
        StatusBar {
            listening: state.listening(),
            spinner_frame,
            status_text: session.status(),
        },
        chunks[1],
    );
    render_transcript(f, chunks[2], state);
    f.render_widget(
        HelpBar {
            voice_enabled: state.voice_enabled(),
            voice_busy: state.listening(),
        },
        chunks[3],
    );
}

fn render_transcript(f: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Theme::border_focused())
        .title_top(Line::styled(" Terminal ", Theme::muted()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let layout = layout_transcript(state.session().buffer(), inner.width as usize);
    let height = inner.height as usize;
    let (start, _) = visible_window(layout.lines.len(), height, state.scroll_offset());
    let (cursor_row, cursor_col) = layout.cursor;

    let visible: Vec<Line> = layout.lines.into_iter().skip(start).take(height).collect();
    f.render_widget(Paragraph::new(visible), inner);

    if cursor_row >= start && cursor_row < start + height {
        f.set_cursor_position((
            inner.x + (cursor_col as u16).min(inner.width.saturating_sub(1)),
            inner.y + (cursor_row - start) as u16,
        ));
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            crossterm::event::DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = self.terminal.show_cursor();
    }
}
