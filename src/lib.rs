//! VoiceOS - a transcript-style filesystem shell
//!
//! Commands come from the keyboard or from a voice pipeline
//! (speech-to-text, then a chat model mapping speech to a command):
//! - The transcript keeps history immutable behind an input boundary
//! - Every command runs through one serialized session loop
//! - Voice results are handed back to the loop over a channel

pub mod command;
pub mod config;
pub mod dispatch;
pub mod fs;
pub mod history;
pub mod session;
pub mod transcript;
pub mod tui;
pub mod voice;

pub use command::{parse, CommandName, Parsed, ParsedCommand};
pub use config::VoiceosConfig;
pub use dispatch::{DispatchError, Dispatcher, Reply};
pub use fs::{Filesystem, FsFailure, OsFilesystem};
pub use history::HistoryRing;
pub use session::{Handoff, LoopState, Producer, Session, Submission};
pub use transcript::{Tag, TranscriptBuffer};
pub use voice::{PipelineError, VoicePipeline};

/// Result type for VoiceOS operations
pub type Result<T> = std::result::Result<T, VoiceosError>;

/// Errors that can occur outside a single command
#[derive(Debug, thiserror::Error)]
pub enum VoiceosError {
    #[error("Config error: {0}")]
    Config(String),
}
