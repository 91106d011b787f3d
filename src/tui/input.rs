//! Key mapping for the TUI
//!
//! The editable text lives in the transcript buffer, so this module only
//! decides what a key means. The app applies it to the session.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    None,
    /// Enter
    Submit,
    Quit,
    /// Start a voice request
    Speak,
    Insert(char),
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    /// Start of the input region
    CursorHome,
    CursorEnd,
    HistoryPrev,
    HistoryNext,
    ScrollUp,
    ScrollDown,
    /// Copy the line under the cursor to the clipboard
    CopyLine,
    Paste,
}

pub fn map_key(key: KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => KeyAction::Quit,
        KeyCode::Char(' ') if ctrl => KeyAction::Speak,
        KeyCode::F(2) => KeyAction::Speak,
        KeyCode::Char('y') if ctrl => KeyAction::CopyLine,
        KeyCode::Char('v') if ctrl => KeyAction::Paste,
        KeyCode::Char('a') if ctrl => KeyAction::CursorHome,
        KeyCode::Char('e') if ctrl => KeyAction::CursorEnd,
        KeyCode::Char(_) if ctrl => KeyAction::None,
        KeyCode::Char(c) => KeyAction::Insert(c),

        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Backspace => KeyAction::Backspace,
        KeyCode::Delete => KeyAction::Delete,
        KeyCode::Left => KeyAction::CursorLeft,
        KeyCode::Right => KeyAction::CursorRight,
        KeyCode::Home => KeyAction::CursorHome,
        KeyCode::End => KeyAction::CursorEnd,
        KeyCode::Up => KeyAction::HistoryPrev,
        KeyCode::Down => KeyAction::HistoryNext,
        KeyCode::PageUp => KeyAction::ScrollUp,
        KeyCode::PageDown => KeyAction::ScrollDown,
        _ => KeyAction::None,
    }
}
