//! Color theme for the TUI - ANSI colors so it follows the terminal palette

use ratatui::style::{Color, Modifier, Style};

use crate::transcript::Tag;

pub struct Theme;

impl Theme {
    pub const CYAN: Color = Color::Cyan;
    pub const GREEN: Color = Color::Green;
    pub const YELLOW: Color = Color::Yellow;
    pub const RED: Color = Color::Red;
    pub const DARK_GRAY: Color = Color::DarkGray;

    pub fn title() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default()
    }

    pub fn prompt() -> Style {
        Style::default()
            .fg(Self::GREEN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn command() -> Style {
        Style::default().fg(Self::CYAN)
    }

    pub fn error() -> Style {
        Style::default().fg(Self::RED)
    }

    pub fn notice() -> Style {
        Style::default().fg(Self::YELLOW)
    }

    pub fn muted() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::CYAN)
    }

    /// Style for a history segment
    pub fn for_tag(tag: Tag) -> Style {
        match tag {
            Tag::Prompt => Self::prompt(),
            Tag::Command => Self::command(),
            Tag::Output => Self::text(),
            Tag::Error => Self::error(),
            Tag::Notice => Self::notice(),
        }
    }

    pub fn listening() -> Style {
        Style::default()
            .fg(Self::GREEN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn idle() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }

    pub fn key() -> Style {
        Style::default()
            .fg(Self::CYAN)
            .add_modifier(Modifier::BOLD)
    }

    pub fn key_desc() -> Style {
        Style::default().fg(Self::DARK_GRAY)
    }
}
