//! VoiceOS CLI
//!
//! A transcript-style filesystem shell driven by keyboard or voice.

use std::fs::OpenOptions;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voiceos::transcript::{Tag, TranscriptBuffer};
use voiceos::tui::{App, AppState};
use voiceos::{Dispatcher, OsFilesystem, Producer, Session, VoicePipeline, VoiceosConfig};

/// VoiceOS - run filesystem commands by typing or speaking
#[derive(Parser, Debug)]
#[command(name = "voiceos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Starting directory (defaults to the process directory)
    #[arg(short = 'C', long)]
    cwd: Option<PathBuf>,

    /// Config file (defaults to <config_dir>/voiceos/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable TUI and use plain line mode
    #[arg(long)]
    no_tui: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging comes up first so config warnings are not lost
    if cli.no_tui {
        init_stderr_logging(cli.verbose);
    } else {
        init_file_logging(cli.verbose);
    }
    let config = load_config(&cli)?;

    if cli.no_tui {
        run_plain_mode(config).await
    } else {
        run_tui_mode(config).await
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<VoiceosConfig> {
    let mut config = VoiceosConfig::load(cli.config.as_deref())?
        .apply_env()
        .with_verbose(cli.verbose);
    if let Some(cwd) = &cli.cwd {
        let cwd = std::fs::canonicalize(cwd)
            .with_context(|| format!("cannot open directory {}", cwd.display()))?;
        config = config.with_cwd(cwd);
    }
    Ok(config)
}

fn build_dispatcher(config: &VoiceosConfig) -> Dispatcher {
    match &config.cwd {
        Some(cwd) => Dispatcher::new(Box::new(OsFilesystem::tracked(cwd))),
        None => Dispatcher::new(Box::new(OsFilesystem::process())),
    }
}

async fn run_tui_mode(config: VoiceosConfig) -> anyhow::Result<()> {
    info!("Starting VoiceOS (TUI mode)");

    let voice = VoicePipeline::from_config(&config);
    let greeting = if voice.is_some() {
        "VoiceOS ready. Type a command, or press F2 to speak."
    } else {
        "VoiceOS ready. Voice input is off until an API key is configured."
    };
    let session = Session::with_greeting(build_dispatcher(&config), Some(greeting));
    let state = AppState::new(session, voice, config.voice_unavailable_message());

    let mut app = App::new(state)?;
    app.run().await?;
    Ok(())
}

/// The TUI owns the screen, so logs go to `<data_dir>/voiceos/voiceos.log`
fn init_file_logging(verbose: bool) {
    let Some(dir) = dirs::data_dir().map(|d| d.join("voiceos")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("voiceos.log"))
    else {
        return;
    };

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

fn init_stderr_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run_plain_mode(config: VoiceosConfig) -> anyhow::Result<()> {
    info!("Starting VoiceOS (plain mode)");
    if let Some(cwd) = &config.cwd {
        info!("Working directory: {:?}", cwd);
    }

    let mut session = Session::new(build_dispatcher(&config));
    let interactive = io::stdin().is_terminal();
    let mut printer = PlainPrinter::new(interactive);

    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    let mut stdout = io::stdout();
    stdout.write_all(printer.take_new(session.buffer()).as_bytes())?;
    stdout.flush()?;

    while let Some(line) = line_rx.recv().await {
        session.submit_line(Producer::Keyboard, line);
        stdout.write_all(printer.take_new(session.buffer()).as_bytes())?;
        stdout.flush()?;
        if session.is_terminated() {
            break;
        }
    }

    if !session.is_terminated() {
        // stdin closed without `exit`
        writeln!(stdout)?;
    }
    Ok(())
}

/// Tracks how much of the transcript history has reached stdout
struct PlainPrinter {
    printed: usize,
    generation: u64,
    /// A terminal already shows what was typed, so command echoes are skipped
    skip_echo: bool,
}

impl PlainPrinter {
    fn new(skip_echo: bool) -> Self {
        Self {
            printed: 0,
            generation: 0,
            skip_echo,
        }
    }

    fn take_new(&mut self, buffer: &TranscriptBuffer) -> String {
        if buffer.generation() != self.generation {
            self.generation = buffer.generation();
            self.printed = 0;
        }

        let text = buffer.history_text();
        let mut out = String::new();
        for seg in buffer.segments() {
            if seg.range.end <= self.printed {
                continue;
            }
            if self.skip_echo && seg.tag == Tag::Command {
                continue;
            }
            let start = seg.range.start.max(self.printed);
            out.extend(text.chars().skip(start).take(seg.range.end - start));
        }
        self.printed = buffer.boundary();
        out
    }
}
