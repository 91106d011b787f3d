//! System clipboard access for copying transcript lines and pasting input

#[derive(Debug, Clone)]
pub enum ClipboardError {
    Unavailable(String),
    Empty(String),
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardError::Unavailable(msg) => write!(f, "clipboard unavailable: {msg}"),
            ClipboardError::Empty(msg) => write!(f, "no text on clipboard: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

pub fn copy_text(text: &str) -> Result<(), ClipboardError> {
    let mut cb =
        arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    cb.set_text(text.to_string())
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))
}

pub fn paste_text() -> Result<String, ClipboardError> {
    let mut cb =
        arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    cb.get_text().map_err(|e| ClipboardError::Empty(e.to_string()))
}

/// Pasted text becomes a single command line
pub fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
