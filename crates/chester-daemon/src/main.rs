//! Chester console daemon.
//!
//! Runs the playback core against the simulated voice transport, reading chat
//! messages from stdin (see [`console`]) and printing replies to stdout.
//! Diagnostics go to stderr through `env_logger`.

mod console;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chester_core::acquisition::YtDlpAcquirer;
use chester_core::logging::Transcript;
use chester_core::voice::{PlaybackClock, SimulatedTransport};
use chester_core::{
    parse_command, BreakRegistry, ChesterConfig, CommandHandlers, EventBus, LibraryCatalog,
    SessionController, SessionEvent,
};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Target};
use log::LevelFilter;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use console::ConsoleInput;

/// Track length assumed when metadata has no usable duration.
const FALLBACK_TRACK_LENGTH: Duration = Duration::from_secs(180);

#[derive(Parser, Debug)]
#[command(name = "chester-daemon")]
#[command(about = "Voice-channel music bot, driven from the console", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "chester.json")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How simulated playbacks end
    #[arg(long, value_enum, default_value_t = Playback::Realtime)]
    playback: Playback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Playback {
    /// Tracks end after their duration
    Realtime,
    /// Tracks end only on `:finish <channel>`
    Manual,
}

impl Playback {
    fn clock(self) -> PlaybackClock {
        match self {
            Playback::Realtime => PlaybackClock::RealTime {
                fallback: FALLBACK_TRACK_LENGTH,
            },
            Playback::Manual => PlaybackClock::Manual,
        }
    }
}

fn init_logging(level: &str) {
    let level = level.parse::<LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Unknown log level {level:?}, using info");
        LevelFilter::Info
    });
    Builder::new()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Warn)
        .filter_module("chester_core", level)
        .filter_module("chester_daemon", level)
        .parse_default_env()
        .init();
}

/// Log every session event until the bus goes away.
async fn log_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => log::debug!("[{}] {:?}", event.channel(), event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("Event log lagged, skipped {} event(s)", n)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

struct Daemon {
    controller: Arc<SessionController>,
    handlers: CommandHandlers,
    transport: SimulatedTransport,
    transcript: Transcript,
}

impl Daemon {
    async fn handle_line(&self, line: &str) {
        match console::parse_line(line) {
            Ok(ConsoleInput::Blank) => {}
            Ok(ConsoleInput::Message { caller, text }) => {
                let command = match parse_command(self.handlers.prefix(), &text) {
                    Ok(Some(command)) => command,
                    Ok(None) => return,
                    Err(e) => {
                        self.reply(&self.handlers.parse_failure(&caller, &e));
                        return;
                    }
                };
                self.transcript
                    .record("CMD", &format!("{} {}", caller.user_id, text));
                let reply = self.handlers.handle(&caller, command).await;
                self.reply(&reply);
            }
            Ok(ConsoleInput::Finish(channel)) => {
                if !self.transport.finish_playback(&channel) {
                    println!("Nothing is playing in {channel}");
                }
            }
            Ok(ConsoleInput::Status(channel)) => {
                let snapshot = self.controller.snapshot(&channel).await;
                println!("{snapshot:?}");
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    fn reply(&self, text: &str) {
        self.transcript.record("REPLY", text);
        println!("{text}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = ChesterConfig::load(&args.config)?;
    let transcript = Transcript::open(config.log_dir.as_deref(), "chester");

    let catalog = Arc::new(LibraryCatalog::new(
        &config.library_dir,
        &config.metadata_dir,
        config.audio_extension.clone(),
    ));
    let count = catalog.load()?;
    log::info!("Library loaded: {} track(s)", count);

    let events = Arc::new(EventBus::new());
    tokio::spawn(log_events(events.subscribe()));

    let transport = SimulatedTransport::new(args.playback.clock());
    let (controller, completions) = SessionController::new(
        catalog,
        BreakRegistry::new(&config.break_registry_path),
        Arc::new(transport.clone()),
        events,
    );
    let controller = Arc::new(controller);
    tokio::spawn(Arc::clone(&controller).run_completions(completions));

    let handlers = CommandHandlers::new(
        Arc::clone(&controller),
        Arc::new(YtDlpAcquirer::new(&config)),
        config.command_prefix.clone(),
    );
    let daemon = Daemon {
        controller: Arc::clone(&controller),
        handlers,
        transport,
        transcript,
    };

    log::info!(
        "Chester ready (prefix {:?}, {:?} playback)",
        config.command_prefix,
        args.playback
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => daemon.handle_line(&line).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    controller.shutdown().await;
    log::info!("Shut down");
    Ok(())
}
