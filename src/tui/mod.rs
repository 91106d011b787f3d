//! Terminal user interface
//!
//! One bordered transcript view between a header, a voice status line and a
//! key help bar. All text editing goes through the session's transcript.

mod app;
mod clipboard;
mod input;
mod shimmer;
mod theme;
mod widgets;

pub use app::{visible_window, App, AppState, Effect};
pub use input::{map_key, KeyAction};
pub use theme::Theme;
pub use widgets::{layout_transcript, TranscriptLayout};
