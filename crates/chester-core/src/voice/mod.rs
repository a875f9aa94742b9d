//! Voice transport boundary.
//!
//! The controller only ever talks to audio output through these traits. An
//! implementation wraps whatever the chat service provides (a voice gateway,
//! a local sink, ...). [`SimulatedTransport`] is the in-process
//! implementation used by the daemon and by tests.
//!
//! # Completion callbacks
//!
//! [`VoiceConnection::play`] takes a [`CompletionCallback`] that must be
//! invoked exactly once for every successful call: when the track ends on its
//! own, when it is stopped, when it is superseded by another `play`, or when
//! the connection is torn down. It may be invoked from any thread, so it must
//! not block.

mod simulated;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::library::TrackId;
use crate::session::ChannelId;

pub use simulated::{PlaybackClock, SimulatedTransport, TransportCall};

/// Invoked once when a playback ends for any reason.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// What the transport needs to know to play a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub id: TrackId,
    pub audio_path: PathBuf,
    /// Expected length, if the metadata had a usable duration.
    pub duration: Option<Duration>,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Voice channel unreachable: {0}")]
    ChannelUnreachable(ChannelId),

    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    #[error("Connection closed")]
    Closed,
}

/// Opens audio connections to voice channels.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        channel: &ChannelId,
    ) -> Result<Box<dyn VoiceConnection>, TransportError>;
}

/// A live audio connection to one voice channel.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Start playing `track`, superseding anything currently playing or
    /// paused.
    fn play(&mut self, track: &TrackRef, on_complete: CompletionCallback)
        -> Result<(), TransportError>;

    fn pause(&mut self);

    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    async fn disconnect(&mut self);
}
