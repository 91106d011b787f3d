//! Voice request pipeline
//!
//! One request runs capture, then speech-to-text, then command translation,
//! entirely off the owning context. The worker only ever talks back through
//! the session's handoff channel: status text while it works, then exactly
//! one submission (a resolved command line or a failure message).

pub mod capture;
mod http;
pub mod transcribe;
pub mod translator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::command::{CommandName, ParsedCommand};
use crate::config::VoiceosConfig;
use crate::session::{Handoff, Producer, Submission};

pub use capture::{default_capture, Segmenter};
pub use http::HttpError;
pub use transcribe::HttpTranscriber;
pub use translator::HttpTranslator;

/// Mono 16-bit PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Limits for one listen
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// How long to wait for speech to start
    pub listen_timeout: Duration,
    /// Longest phrase recorded once speech started
    pub phrase_limit: Duration,
    /// Trailing silence that ends a phrase
    pub pause_threshold: Duration,
    /// RMS level (16-bit scale) counted as speech
    pub energy_threshold: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            listen_timeout: Duration::from_secs(7),
            phrase_limit: Duration::from_secs(12),
            pause_threshold: Duration::from_millis(800),
            energy_threshold: 300.0,
        }
    }
}

/// What the translator made of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub name: CommandName,
    pub argument: String,
}

impl ResolvedCommand {
    pub fn unknown() -> Self {
        Self {
            name: CommandName::Unknown,
            argument: String::new(),
        }
    }

    /// The command line the session will run
    pub fn to_line(&self) -> String {
        ParsedCommand::new(self.name, self.argument.as_str()).raw
    }
}

/// Why a voice request produced no command. The display text is what the
/// user sees in the transcript and status line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("No speech detected. Try again.")]
    TimedOut,

    #[error("Mic error: {0}")]
    Mic(String),

    #[error("Speech recognition could not understand audio.")]
    Unrecognized,

    #[error("Speech recognition service error; {0}")]
    SpeechService(String),

    #[error("AI Error: {0}")]
    Translator(String),

    #[error("Sorry, I didn't understand that command.")]
    NotUnderstood,
}

/// Blocking audio capture. Runs on the blocking pool.
pub trait SpeechCapture: Send + Sync {
    fn capture(&self, settings: &CaptureSettings) -> Result<RawAudio, PipelineError>;
}

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: RawAudio) -> BoxFuture<'_, Result<String, PipelineError>>;
}

pub trait CommandResolver: Send + Sync {
    fn resolve<'a>(&'a self, text: &'a str)
        -> BoxFuture<'a, Result<ResolvedCommand, PipelineError>>;
}

#[derive(Clone)]
pub struct VoicePipeline {
    capture: Arc<dyn SpeechCapture>,
    transcriber: Arc<dyn Transcriber>,
    resolver: Arc<dyn CommandResolver>,
    settings: CaptureSettings,
    in_flight: Arc<AtomicBool>,
}

impl VoicePipeline {
    pub fn new(
        capture: Arc<dyn SpeechCapture>,
        transcriber: Arc<dyn Transcriber>,
        resolver: Arc<dyn CommandResolver>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            capture,
            transcriber,
            resolver,
            settings,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// HTTP-backed pipeline for `config`, or `None` when an API key is missing
    pub fn from_config(config: &VoiceosConfig) -> Option<Self> {
        let transcriber_key = config.transcriber.api_key()?;
        let translator_key = config.translator.api_key()?;
        info!(
            "Voice pipeline: stt={} ({}), translator={} ({})",
            config.transcriber.model,
            config.transcriber.base_url,
            config.translator.model,
            config.translator.base_url
        );
        Some(Self::new(
            default_capture(),
            Arc::new(HttpTranscriber::new(
                &config.transcriber.base_url,
                &config.transcriber.model,
                transcriber_key,
            )),
            Arc::new(HttpTranslator::new(
                &config.translator.base_url,
                &config.translator.model,
                translator_key,
            )),
            config.capture_settings(),
        ))
    }

    /// True while a request is running; the speak affordance is disabled
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start one voice request on a worker task.
    ///
    /// Returns false without doing anything when a request is already in
    /// flight. Must be called from inside a tokio runtime.
    pub fn trigger(&self, handoff: UnboundedSender<Handoff>) -> bool {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("Voice request already in flight");
            return false;
        }

        let pipeline = self.clone();
        tokio::spawn(async move {
            let submission = match pipeline.run(&handoff).await {
                Ok(line) => Submission::Line {
                    producer: Producer::Voice,
                    line,
                },
                Err(err) => {
                    warn!("Voice request failed: {}", err);
                    Submission::PipelineFailure(err.to_string())
                }
            };
            // Release the gate first so the next request can start as soon
            // as the owner sees this submission
            pipeline.in_flight.store(false, Ordering::SeqCst);
            let _ = handoff.send(Handoff::Submit(submission));
        });
        true
    }

    /// Run one request to completion, reporting progress on `handoff`.
    /// Returns the command line to submit.
    pub async fn run(&self, handoff: &UnboundedSender<Handoff>) -> Result<String, PipelineError> {
        let status = |text: String| {
            let _ = handoff.send(Handoff::Status(text));
        };

        status("Listening...".to_string());
        let capture = Arc::clone(&self.capture);
        let settings = self.settings.clone();
        let audio = tokio::task::spawn_blocking(move || capture.capture(&settings))
            .await
            .map_err(|e| PipelineError::Mic(e.to_string()))??;
        debug!("Captured {:?} of audio", audio.duration());

        status("Recognizing speech...".to_string());
        let heard = self.transcriber.transcribe(audio).await?;
        let heard = heard.trim().to_lowercase();
        if heard.is_empty() {
            return Err(PipelineError::Unrecognized);
        }
        info!("Heard: {}", heard);
        status(format!("Heard: {heard}. Processing with AI..."));

        let resolved = self.resolver.resolve(&heard).await?;
        if resolved.name == CommandName::Unknown {
            return Err(PipelineError::NotUnderstood);
        }

        let line = resolved.to_line();
        status(format!("AI Mapped to: {line}"));
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct FixedCapture(Result<RawAudio, PipelineError>);

    impl SpeechCapture for FixedCapture {
        fn capture(&self, _settings: &CaptureSettings) -> Result<RawAudio, PipelineError> {
            self.0.clone()
        }
    }

    struct FixedTranscriber(Result<String, PipelineError>);

    impl Transcriber for FixedTranscriber {
        fn transcribe(&self, _audio: RawAudio) -> BoxFuture<'_, Result<String, PipelineError>> {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    struct RecordingResolver {
        seen: Mutex<Vec<String>>,
        answer: ResolvedCommand,
    }

    impl CommandResolver for RecordingResolver {
        fn resolve<'a>(
            &'a self,
            text: &'a str,
        ) -> BoxFuture<'a, Result<ResolvedCommand, PipelineError>> {
            self.seen.lock().unwrap().push(text.to_string());
            let answer = self.answer.clone();
            Box::pin(async move { Ok(answer) })
        }
    }

    fn audio() -> RawAudio {
        RawAudio {
            samples: vec![0; 1600],
            sample_rate: 16_000,
        }
    }

    fn pipeline(
        capture: Result<RawAudio, PipelineError>,
        heard: Result<String, PipelineError>,
        answer: ResolvedCommand,
    ) -> (VoicePipeline, Arc<RecordingResolver>) {
        let resolver = Arc::new(RecordingResolver {
            seen: Mutex::new(Vec::new()),
            answer,
        });
        let pipeline = VoicePipeline::new(
            Arc::new(FixedCapture(capture)),
            Arc::new(FixedTranscriber(heard)),
            resolver.clone(),
            CaptureSettings::default(),
        );
        (pipeline, resolver)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Handoff>) -> Vec<Handoff> {
        let mut out = Vec::new();
        while let Ok(h) = rx.try_recv() {
            out.push(h);
        }
        out
    }

    #[tokio::test]
    async fn test_successful_request_reports_progress() {
        let (pipeline, resolver) = pipeline(
            Ok(audio()),
            Ok("Remove the Old_Stuff directory".to_string()),
            ResolvedCommand {
                name: CommandName::RemoveTree,
                argument: "old_stuff".to_string(),
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let line = pipeline.run(&tx).await.unwrap();
        assert_eq!(line, "rm -r old_stuff");
        assert_eq!(
            resolver.seen.lock().unwrap().as_slice(),
            &["remove the old_stuff directory"]
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                Handoff::Status("Listening...".to_string()),
                Handoff::Status("Recognizing speech...".to_string()),
                Handoff::Status(
                    "Heard: remove the old_stuff directory. Processing with AI...".to_string()
                ),
                Handoff::Status("AI Mapped to: rm -r old_stuff".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_map_to_user_messages() {
        let (tx, _rx) = mpsc::unbounded_channel();

        let (p, _) = pipeline(
            Err(PipelineError::TimedOut),
            Ok(String::new()),
            ResolvedCommand::unknown(),
        );
        let err = p.run(&tx).await.unwrap_err();
        assert_eq!(err.to_string(), "No speech detected. Try again.");

        let (p, _) = pipeline(Ok(audio()), Ok("   ".to_string()), ResolvedCommand::unknown());
        assert_eq!(p.run(&tx).await.unwrap_err(), PipelineError::Unrecognized);

        let (p, _) = pipeline(
            Ok(audio()),
            Ok("what is two plus two".to_string()),
            ResolvedCommand::unknown(),
        );
        assert_eq!(
            p.run(&tx).await.unwrap_err().to_string(),
            "Sorry, I didn't understand that command."
        );

        let (p, _) = pipeline(
            Ok(audio()),
            Err(PipelineError::SpeechService("503".to_string())),
            ResolvedCommand::unknown(),
        );
        assert_eq!(
            p.run(&tx).await.unwrap_err().to_string(),
            "Speech recognition service error; 503"
        );
    }

    #[tokio::test]
    async fn test_trigger_is_single_flight() {
        let (pipeline, _) = pipeline(
            Ok(audio()),
            Ok("where am i".to_string()),
            ResolvedCommand {
                name: CommandName::Pwd,
                argument: String::new(),
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(pipeline.trigger(tx.clone()));
        assert!(pipeline.is_busy());
        assert!(!pipeline.trigger(tx.clone()));

        let submission = loop {
            match rx.recv().await {
                Some(Handoff::Submit(s)) => break s,
                Some(Handoff::Status(_)) => continue,
                None => panic!("channel closed"),
            }
        };
        assert_eq!(
            submission,
            Submission::Line {
                producer: Producer::Voice,
                line: "pwd".to_string()
            }
        );
        assert!(!pipeline.is_busy());
        assert!(pipeline.trigger(tx));
    }

    #[test]
    fn test_resolved_command_line() {
        let cmd = ResolvedCommand {
            name: CommandName::MakeDir,
            argument: " test results ".to_string(),
        };
        assert_eq!(cmd.to_line(), "mkdir test results");
        assert_eq!(audio().duration(), Duration::from_millis(100));
    }
}
