//! Integration tests for the VoiceOS session core

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedSender;
use voiceos::command::CommandName;
use voiceos::fs::Outcome;
use voiceos::voice::{
    CaptureSettings, CommandResolver, RawAudio, ResolvedCommand, SpeechCapture, Transcriber,
};
use voiceos::{
    Dispatcher, Filesystem, FsFailure, Handoff, LoopState, OsFilesystem, PipelineError, Producer,
    Session, Submission, VoicePipeline,
};

const PROMPT: &str = "/mock $ ";

/// Shared view into what the mock filesystem was asked to do
#[derive(Clone, Default)]
struct Probe {
    calls: Arc<Mutex<Vec<String>>>,
    /// Handed off from inside the next `list` call, while the session is busy
    inject: Arc<Mutex<Option<(UnboundedSender<Handoff>, String)>>>,
}

impl Probe {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

struct MockFs {
    probe: Probe,
    entries: Vec<String>,
}

impl Filesystem for MockFs {
    fn list(&self) -> Result<Vec<String>, FsFailure> {
        self.probe.record("list".to_string());
        if let Some((tx, line)) = self.probe.inject.lock().unwrap().take() {
            tx.send(Handoff::Submit(Submission::Line {
                producer: Producer::Voice,
                line,
            }))
            .unwrap();
        }
        Ok(self.entries.clone())
    }

    fn pwd(&self) -> Result<String, FsFailure> {
        Ok("/mock".to_string())
    }

    fn change_dir(&mut self, path: &str) -> Outcome {
        self.probe.record(format!("cd {path}"));
        Ok(format!("Changed to {path}"))
    }

    fn make_dir(&mut self, name: &str) -> Outcome {
        self.probe.record(format!("mkdir {name}"));
        Ok(format!("Directory '{name}' created."))
    }

    fn touch(&mut self, name: &str) -> Outcome {
        self.probe.record(format!("touch {name}"));
        Ok(format!("File '{name}' ensured/created."))
    }

    fn remove_file(&mut self, name: &str) -> Outcome {
        self.probe.record(format!("rm {name}"));
        Ok(format!("File '{name}' removed."))
    }

    fn remove_tree(&mut self, name: &str) -> Outcome {
        self.probe.record(format!("rm -r {name}"));
        Ok(format!("Directory '{name}' and its contents removed."))
    }

    fn recover_cwd(&mut self) -> Result<String, FsFailure> {
        Ok("/mock".to_string())
    }
}

fn mock_session(entries: &[&str]) -> (Session, Probe) {
    let probe = Probe::default();
    let fs = MockFs {
        probe: probe.clone(),
        entries: entries.iter().map(|s| s.to_string()).collect(),
    };
    (Session::new(Dispatcher::new(Box::new(fs))), probe)
}

fn real_session(dir: &TempDir) -> Session {
    Session::new(Dispatcher::new(Box::new(OsFilesystem::tracked(dir.path()))))
}

fn type_and_submit(session: &mut Session, line: &str) -> LoopState {
    session.buffer_mut().insert_at_cursor(line);
    session.submit_input()
}

fn assert_prompt_at_end(session: &Session) {
    let buf = session.buffer();
    assert_eq!(buf.boundary(), buf.len());
    assert!(buf.history_text().ends_with(" $ "));
}

#[test]
fn test_mkdir_echoes_reports_and_prompts() {
    let (mut session, probe) = mock_session(&[]);
    type_and_submit(&mut session, "mkdir reports");

    assert_eq!(
        session.buffer().text(),
        format!("{PROMPT}mkdir reports\nDirectory 'reports' created.\n\n{PROMPT}")
    );
    assert_eq!(probe.calls(), vec!["mkdir reports"]);
    assert_prompt_at_end(&session);
}

#[test]
fn test_missing_argument_never_reaches_filesystem() {
    let (mut session, probe) = mock_session(&[]);
    type_and_submit(&mut session, "touch ");

    assert_eq!(
        session.buffer().text(),
        format!("{PROMPT}touch\ntouch: argument required\n\n{PROMPT}")
    );
    assert!(probe.calls().is_empty());
}

#[test]
fn test_recall_walks_history() {
    let (mut session, _probe) = mock_session(&["a.txt"]);
    type_and_submit(&mut session, "ls");
    type_and_submit(&mut session, "pwd");

    assert!(session.recall_previous());
    assert_eq!(session.buffer().read_input_region(), "pwd");
    assert!(session.recall_previous());
    assert_eq!(session.buffer().read_input_region(), "ls");
    assert!(session.recall_next());
    assert_eq!(session.buffer().read_input_region(), "pwd");
    assert!(session.recall_next());
    assert_eq!(session.buffer().read_input_region(), "");
}

#[test]
fn test_recall_round_trip_restores_input() {
    let (mut session, _probe) = mock_session(&[]);
    for line in ["mkdir a", "touch b", "pwd"] {
        type_and_submit(&mut session, line);
    }
    let before = session.buffer().text().to_string();

    for _ in 0..3 {
        session.recall_previous();
    }
    assert_eq!(session.buffer().read_input_region(), "mkdir a");
    for _ in 0..3 {
        session.recall_next();
    }
    assert_eq!(session.buffer().read_input_region(), "");
    assert_eq!(session.buffer().text(), before);
}

#[test]
fn test_voice_handoff_waits_for_running_command() {
    let (mut session, probe) = mock_session(&["notes.txt", "old_stuff"]);
    *probe.inject.lock().unwrap() = Some((
        session.handoff_sender(),
        "rm -r old_stuff".to_string(),
    ));

    type_and_submit(&mut session, "ls");
    // Only the keyboard command has run so far
    assert_eq!(probe.calls(), vec!["list"]);

    assert!(session.drain_handoffs());
    assert_eq!(probe.calls(), vec!["list", "rm -r old_stuff"]);
    assert_eq!(
        session.buffer().text(),
        format!(
            "{PROMPT}ls\nnotes.txt  old_stuff\n\n{PROMPT}rm -r old_stuff\n\
             Directory 'old_stuff' and its contents removed.\n\n{PROMPT}"
        )
    );
}

#[test]
fn test_rm_missing_file_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let mut session = real_session(&dir);
    type_and_submit(&mut session, "rm x.txt");

    let text = session.buffer().history_text();
    assert!(text.contains("rm x.txt\nFile 'x.txt' not found.\n\n"));
    assert_prompt_at_end(&session);
}

#[test]
fn test_every_command_kind_opens_one_prompt() {
    let (mut session, _probe) = mock_session(&["a"]);
    let lines = [
        "ls",
        "pwd",
        "cd sub",
        "mkdir d",
        "touch f",
        "rm f",
        "rm -r d",
        "frobnicate",
        "",
        "   ",
        "mkdir",
    ];
    for line in lines {
        let prompts_before = session.buffer().history_text().matches(PROMPT).count();
        type_and_submit(&mut session, line);
        let prompts_after = session.buffer().history_text().matches(PROMPT).count();
        assert_eq!(prompts_after, prompts_before + 1, "line {line:?}");
        assert_prompt_at_end(&session);
        assert_eq!(session.state(), LoopState::Idle);
    }
}

#[test]
fn test_history_skips_duplicates_clear_and_empty() {
    let (mut session, _probe) = mock_session(&[]);
    for line in ["pwd", "pwd", "", "clear", "ls"] {
        type_and_submit(&mut session, line);
    }
    assert_eq!(session.history().entries(), &["pwd", "ls"]);
}

#[test]
fn test_clear_leaves_only_a_prompt() {
    let (mut session, _probe) = mock_session(&[]);
    type_and_submit(&mut session, "pwd");
    let generation = session.buffer().generation();
    type_and_submit(&mut session, "clear");

    assert_eq!(session.buffer().text(), PROMPT);
    assert!(session.buffer().generation() > generation);
}

#[test]
fn test_handoffs_run_in_order() {
    let (mut session, probe) = mock_session(&[]);
    let tx = session.handoff_sender();
    for line in ["mkdir first", "mkdir second"] {
        tx.send(Handoff::Submit(Submission::Line {
            producer: Producer::Voice,
            line: line.to_string(),
        }))
        .unwrap();
    }
    // A keyboard line submitted now runs after both
    type_and_submit(&mut session, "touch third");

    assert_eq!(
        probe.calls(),
        vec!["mkdir first", "mkdir second", "touch third"]
    );
    let text = session.buffer().text();
    let first = text.find("Directory 'first' created.").unwrap();
    let second = text.find("Directory 'second' created.").unwrap();
    let third = text.find("File 'third' ensured/created.").unwrap();
    assert!(first < second && second < third);
}

#[test]
fn test_exit_stops_everything_after_it() {
    let (mut session, probe) = mock_session(&[]);
    let tx = session.handoff_sender();
    for line in ["exit", "mkdir late"] {
        tx.send(Handoff::Submit(Submission::Line {
            producer: Producer::Voice,
            line: line.to_string(),
        }))
        .unwrap();
    }
    session.drain_handoffs();

    assert!(session.is_terminated());
    assert!(probe.calls().is_empty());
    assert_eq!(type_and_submit(&mut session, "mkdir later"), LoopState::Terminated);
    assert!(probe.calls().is_empty());
}

#[test]
fn test_draft_survives_voice_command() {
    let (mut session, _probe) = mock_session(&[]);
    session.buffer_mut().insert_at_cursor("touch dra");
    session
        .handoff_sender()
        .send(Handoff::Submit(Submission::Line {
            producer: Producer::Voice,
            line: "pwd".to_string(),
        }))
        .unwrap();
    session.drain_handoffs();

    assert_eq!(session.buffer().read_input_region(), "touch dra");
    assert!(session.buffer().history_text().contains("pwd\n/mock\n\n"));
}

#[test]
fn test_real_filesystem_session() {
    let dir = TempDir::new().unwrap();
    let mut session = real_session(&dir);

    type_and_submit(&mut session, "mkdir projects");
    type_and_submit(&mut session, "cd projects");
    type_and_submit(&mut session, "touch readme.md");
    type_and_submit(&mut session, "ls");

    assert!(dir.path().join("projects").join("readme.md").is_file());
    let text = session.buffer().history_text();
    assert!(text.contains("ls\nreadme.md\n\n"));
    assert!(text.trim_end().ends_with("projects $"));

    type_and_submit(&mut session, "cd ..");
    type_and_submit(&mut session, "rm -r projects");
    assert!(!dir.path().join("projects").exists());
}

struct SilentCapture;

impl SpeechCapture for SilentCapture {
    fn capture(&self, _settings: &CaptureSettings) -> Result<RawAudio, PipelineError> {
        Ok(RawAudio {
            samples: vec![0; 160],
            sample_rate: 16_000,
        })
    }
}

struct FixedTranscriber(&'static str);

impl Transcriber for FixedTranscriber {
    fn transcribe(&self, _audio: RawAudio) -> BoxFuture<'_, Result<String, PipelineError>> {
        let heard = self.0.to_string();
        Box::pin(async move { Ok(heard) })
    }
}

struct FixedResolver(ResolvedCommand);

impl CommandResolver for FixedResolver {
    fn resolve<'a>(
        &'a self,
        _text: &'a str,
    ) -> BoxFuture<'a, Result<ResolvedCommand, PipelineError>> {
        let answer = self.0.clone();
        Box::pin(async move { Ok(answer) })
    }
}

async fn drain_until(session: &mut Session, needle: &str) {
    for _ in 0..200 {
        session.drain_handoffs();
        if session.buffer().history_text().contains(needle) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transcript never contained {needle:?}");
}

#[tokio::test]
async fn test_spoken_command_runs_through_session() {
    let (mut session, probe) = mock_session(&[]);
    let pipeline = VoicePipeline::new(
        Arc::new(SilentCapture),
        Arc::new(FixedTranscriber("Make a folder called Music")),
        Arc::new(FixedResolver(ResolvedCommand {
            name: CommandName::MakeDir,
            argument: "music".to_string(),
        })),
        CaptureSettings::default(),
    );

    assert!(pipeline.trigger(session.handoff_sender()));
    drain_until(&mut session, "Directory 'music' created.").await;

    assert_eq!(probe.calls(), vec!["mkdir music"]);
    assert!(session.history().entries().iter().any(|e| e == "mkdir music"));
    assert!(!pipeline.is_busy());
}

#[tokio::test]
async fn test_unknown_spoken_command_reports_inline() {
    let (mut session, probe) = mock_session(&[]);
    let pipeline = VoicePipeline::new(
        Arc::new(SilentCapture),
        Arc::new(FixedTranscriber("sing me a song")),
        Arc::new(FixedResolver(ResolvedCommand::unknown())),
        CaptureSettings::default(),
    );

    assert!(pipeline.trigger(session.handoff_sender()));
    drain_until(&mut session, "Sorry, I didn't understand that command.").await;

    assert!(probe.calls().is_empty());
    assert_eq!(session.status(), "Sorry, I didn't understand that command.");
    assert_prompt_at_end(&session);
}
