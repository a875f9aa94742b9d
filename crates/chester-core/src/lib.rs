//! # chester-core
//!
//! Core playback logic for Chester, the voice-channel music bot.
//!
//! This crate knows nothing about a particular chat platform. The voice side
//! sits behind [`voice::VoiceTransport`], the chat side behind
//! [`commands::parse_command`] and [`commands::CommandHandlers`], so it can be
//! driven by:
//! - a real chat gateway + audio backend
//! - the console daemon (simulated transport)
//! - tests
//!
//! ## Key Concepts
//!
//! - **Session**: per-voice-channel playback state (connection, active track,
//!   loop and break flags, epoch)
//! - **Epoch**: playback generation counter; completions from older
//!   generations are ignored
//! - **Break track**: a per-user track that loops while the user is on break
//! - **Library**: downloaded audio plus one JSON metadata record per track

pub mod acquisition;
pub mod commands;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod library;
pub mod logging;
pub mod paths;
pub mod registry;
pub mod session;
pub mod shell;
pub mod voice;

// Re-export commonly used types
pub use commands::{parse_command, Command, CommandHandlers};
pub use config::ChesterConfig;
pub use error::{ChesterError, ErrorKind, Result};
pub use event_bus::{EventBus, SessionEvent};
pub use library::{LibraryCatalog, Track, TrackId};
pub use registry::BreakRegistry;
pub use session::{Caller, ChannelId, SessionController, UserId};
