//! Animation helpers for the voice status line

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use ratatui::style::{Modifier, Style};
use ratatui::text::Span;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

fn elapsed_since_start() -> Duration {
    PROCESS_START.get_or_init(Instant::now).elapsed()
}

/// Spans with a bright band sweeping across `text`
pub fn shimmer_spans(text: &str) -> Vec<Span<'static>> {
    shimmer_spans_at(text, elapsed_since_start())
}

fn shimmer_spans_at(text: &str, elapsed: Duration) -> Vec<Span<'static>> {
    const PADDING: usize = 10;
    const SWEEP_SECS: f32 = 2.0;
    const BAND_HALF_WIDTH: f32 = 5.0;

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let period = chars.len() + PADDING * 2;
    let phase = (elapsed.as_secs_f32() % SWEEP_SECS) / SWEEP_SECS;
    let band_center = (phase * period as f32) as isize;

    chars
        .iter()
        .enumerate()
        .map(|(i, ch)| {
            let dist = ((i + PADDING) as isize - band_center).abs() as f32;
            let intensity = if dist <= BAND_HALF_WIDTH {
                0.5 * (1.0 + (std::f32::consts::PI * dist / BAND_HALF_WIDTH).cos())
            } else {
                0.0
            };
            Span::styled(ch.to_string(), style_for_intensity(intensity))
        })
        .collect()
}

fn style_for_intensity(intensity: f32) -> Style {
    if intensity < 0.2 {
        Style::default().add_modifier(Modifier::DIM)
    } else if intensity < 0.6 {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

/// Braille spinner
pub struct AnimatedDots {
    frame: usize,
}

impl AnimatedDots {
    const FRAMES: &'static [&'static str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

    pub fn new(frame: usize) -> Self {
        Self { frame }
    }

    pub fn current(&self) -> &'static str {
        Self::FRAMES[self.frame % Self::FRAMES.len()]
    }
}
