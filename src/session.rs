//! The session loop
//!
//! [`Session`] is the single owner of the transcript and the history ring.
//! Keyboard submissions run inline; the voice worker hands resolved command
//! lines (or failures and status text) back through an unbounded channel,
//! and the owner drains that channel between keystrokes. Either way every
//! command goes through the same FIFO and runs one at a time.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::{self, CommandName, Parsed};
use crate::dispatch::{Dispatcher, Reply};
use crate::history::HistoryRing;
use crate::transcript::{Tag, TranscriptBuffer};

pub const CWD_LOST_MESSAGE: &str = "Current directory was lost. Reverted to home.";

/// Who produced a command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Producer {
    Keyboard,
    Voice,
}

/// Work for the session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Line { producer: Producer, line: String },
    /// A voice request that ended without a command
    PipelineFailure(String),
}

/// Message from a worker to the owning context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    Submit(Submission),
    /// Status line text. Never touches the transcript.
    Status(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Executing,
    Terminated,
}

pub struct Session {
    buffer: TranscriptBuffer,
    history: HistoryRing,
    dispatcher: Dispatcher,
    state: LoopState,
    pending: VecDeque<Submission>,
    handoff_tx: mpsc::UnboundedSender<Handoff>,
    handoff_rx: mpsc::UnboundedReceiver<Handoff>,
    status: String,
}

impl Session {
    /// Start a session and open the first prompt
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_greeting(dispatcher, None)
    }

    /// Like [`Session::new`], with a notice line shown above the first prompt
    pub fn with_greeting(dispatcher: Dispatcher, greeting: Option<&str>) -> Self {
        let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();
        let mut session = Self {
            buffer: TranscriptBuffer::new(),
            history: HistoryRing::new(),
            dispatcher,
            state: LoopState::Idle,
            pending: VecDeque::new(),
            handoff_tx,
            handoff_rx,
            status: "Ready.".to_string(),
        };
        if let Some(greeting) = greeting {
            session
                .buffer
                .append_history(&format!("{greeting}\n"), Tag::Notice);
        }
        session.open_prompt();
        session
    }

    pub fn buffer(&self) -> &TranscriptBuffer {
        &self.buffer
    }

    /// Mutable access for cursor movement and editing in the input region
    pub fn buffer_mut(&mut self) -> &mut TranscriptBuffer {
        &mut self.buffer
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Live working directory, if it can be read
    pub fn cwd(&self) -> Option<String> {
        self.dispatcher.cwd().ok()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == LoopState::Terminated
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Number of submissions waiting to run
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Sender handed to workers. Cloning is cheap.
    pub fn handoff_sender(&self) -> mpsc::UnboundedSender<Handoff> {
        self.handoff_tx.clone()
    }

    /// Submit whatever is in the input region (Enter)
    pub fn submit_input(&mut self) -> LoopState {
        let line = self.buffer.take_input_region();
        self.submit_line(Producer::Keyboard, line)
    }

    /// Submit a line directly, as if typed by `producer`
    pub fn submit_line(&mut self, producer: Producer, line: impl Into<String>) -> LoopState {
        // Anything already handed off goes first
        self.collect_handoffs();
        self.enqueue(Submission::Line {
            producer,
            line: line.into(),
        });
        self.pump();
        self.state
    }

    /// Report a voice request that produced no command
    pub fn report_pipeline_failure(&mut self, message: impl Into<String>) -> LoopState {
        self.collect_handoffs();
        self.enqueue(Submission::PipelineFailure(message.into()));
        self.pump();
        self.state
    }

    /// Pull everything the workers sent and run it. Returns true when
    /// anything arrived, so the caller knows to redraw.
    pub fn drain_handoffs(&mut self) -> bool {
        let arrived = self.collect_handoffs();
        self.pump();
        arrived
    }

    fn collect_handoffs(&mut self) -> bool {
        let mut arrived = false;
        while let Ok(handoff) = self.handoff_rx.try_recv() {
            arrived = true;
            match handoff {
                Handoff::Submit(submission) => self.enqueue(submission),
                Handoff::Status(status) => self.status = status,
            }
        }
        arrived
    }

    fn enqueue(&mut self, submission: Submission) {
        if self.state == LoopState::Terminated {
            debug!("Session terminated, dropping {:?}", submission);
            return;
        }
        self.pending.push_back(submission);
    }

    /// Run queued submissions one at a time, in arrival order
    fn pump(&mut self) {
        if self.state != LoopState::Idle {
            return;
        }
        while let Some(submission) = self.pending.pop_front() {
            self.state = LoopState::Executing;
            self.execute(submission);
            if self.state == LoopState::Terminated {
                self.pending.clear();
                return;
            }
            self.state = LoopState::Idle;
        }
    }

    fn execute(&mut self, submission: Submission) {
        // A half-typed draft is parked while another producer runs, then
        // restored into the next prompt.
        let draft = self.buffer.take_input_region();

        match submission {
            Submission::Line { producer, line } => {
                debug!("Executing {:?} line {:?}", producer, line);
                if !self.run_line(&line) {
                    return;
                }
            }
            Submission::PipelineFailure(message) => {
                self.status = message.clone();
                self.buffer
                    .append_history(&format!("\n{message}\n\n"), Tag::Error);
                self.open_prompt();
            }
        }

        if !draft.is_empty() {
            self.buffer.replace_input_region(&draft);
        }
    }

    /// Echo, dispatch and print one line. Returns false on exit.
    fn run_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        self.buffer
            .append_history(&format!("{trimmed}\n"), Tag::Command);

        let cmd = match command::parse(trimmed) {
            Parsed::Empty => {
                self.history.reset_cursor();
                self.open_prompt();
                return true;
            }
            Parsed::Exit => {
                info!("Exit requested");
                self.state = LoopState::Terminated;
                return false;
            }
            Parsed::Command(cmd) => cmd,
        };

        // Only a bare `clear` stays out of history; `clear foo` is recorded
        if trimmed.eq_ignore_ascii_case(CommandName::Clear.keyword()) {
            self.history.reset_cursor();
        } else {
            self.history.record(trimmed);
        }

        match self.dispatcher.dispatch(&cmd) {
            Ok(Reply::ClearScreen) => self.buffer.clear(),
            Ok(Reply::Text(text)) if text.is_empty() => {
                self.buffer.append_history("\n", Tag::Output);
            }
            Ok(Reply::Text(text)) => {
                self.buffer
                    .append_history(&format!("{text}\n\n"), Tag::Output);
            }
            Err(err) => {
                debug!("Command failed: {}", err);
                self.buffer
                    .append_history(&format!("{err}\n\n"), Tag::Error);
            }
        }
        self.open_prompt();
        true
    }

    fn open_prompt(&mut self) {
        let cwd = match self.dispatcher.cwd() {
            Ok(cwd) => cwd,
            Err(err) => {
                warn!("Working directory unavailable: {}", err);
                match self.dispatcher.recover_cwd() {
                    Ok(home) => {
                        self.buffer
                            .append_history(&format!("{CWD_LOST_MESSAGE}\n"), Tag::Error);
                        home
                    }
                    Err(err) => {
                        self.buffer.append_history(&format!("{err}\n"), Tag::Error);
                        "?".to_string()
                    }
                }
            }
        };
        self.buffer.open_prompt(&format!("{cwd} $ "));
    }

    /// Up: show the previous history entry in the input region
    pub fn recall_previous(&mut self) -> bool {
        let started = self.buffer.generation();
        match self.history.recall_previous() {
            Some(entry) => {
                let entry = entry.to_string();
                self.apply_recall(started, &entry)
            }
            None => false,
        }
    }

    /// Down: show the next history entry, or a blank line past the newest
    pub fn recall_next(&mut self) -> bool {
        let started = self.buffer.generation();
        match self.history.recall_next() {
            Some(entry) => {
                let entry = entry.to_string();
                self.apply_recall(started, &entry)
            }
            None => false,
        }
    }

    fn apply_recall(&mut self, started: u64, entry: &str) -> bool {
        match self.buffer.replace_input_region_checked(started, entry) {
            Ok(()) => true,
            Err(err) => {
                debug!("Dropping recall: {}", err);
                self.history.reset_cursor();
                false
            }
        }
    }
}
