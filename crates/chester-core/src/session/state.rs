//! Per-channel playback state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ChesterError, Result};
use crate::library::TrackId;
use crate::voice::VoiceConnection;

/// Identifier of a voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a chat user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Chat mention markup for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Who issued a command and where they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    /// The voice channel the user is currently in, if any.
    pub voice_channel: Option<ChannelId>,
}

impl Caller {
    pub fn new(user_id: impl Into<UserId>, voice_channel: Option<ChannelId>) -> Self {
        Self {
            user_id: user_id.into(),
            voice_channel,
        }
    }

    pub fn in_channel(user_id: &str, channel: &str) -> Self {
        Self::new(UserId::from(user_id), Some(ChannelId::from(channel)))
    }

    pub fn require_voice_channel(&self) -> Result<&ChannelId> {
        self.voice_channel
            .as_ref()
            .ok_or(ChesterError::NotInVoiceChannel)
    }
}

/// Conceptual state, derived from a session's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    ConnectedIdle,
    Playing,
    Looping,
    OnBreak,
}

/// Shared epoch counter.
///
/// Sessions drawing from the same source never see the same epoch twice,
/// even when a channel's session is removed and created again.
#[derive(Debug, Clone, Default)]
pub struct EpochSource(Arc<AtomicU64>);

impl EpochSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last epoch handed out (0 if none).
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Mutable playback state for one voice channel.
///
/// Only the session controller mutates these fields, always while holding
/// the channel's lock from the session store.
pub struct Session {
    pub channel_id: ChannelId,

    /// Live connection, exclusively owned by this session.
    pub connection: Option<Box<dyn VoiceConnection>>,

    /// Track that should currently be audible (the break track during a
    /// break).
    pub active_track_id: Option<TrackId>,

    /// Track to restart when the break ends.
    pub pre_break_track_id: Option<TrackId>,

    pub loop_enabled: bool,

    pub break_active: bool,

    /// Generation guard. Completion notifications carry the epoch they were
    /// issued under and are discarded unless it still matches.
    pub epoch: u64,

    epochs: EpochSource,
}

impl Session {
    /// A standalone session with its own epoch counter.
    pub fn new(channel_id: ChannelId) -> Self {
        Self::with_epochs(channel_id, EpochSource::new())
    }

    /// A session drawing epochs from `epochs`, starting at its current value.
    pub fn with_epochs(channel_id: ChannelId, epochs: EpochSource) -> Self {
        Self {
            channel_id,
            connection: None,
            active_track_id: None,
            pre_break_track_id: None,
            loop_enabled: false,
            break_active: false,
            epoch: epochs.current(),
            epochs,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.connection.is_none() {
            SessionState::Idle
        } else if self.break_active {
            SessionState::OnBreak
        } else if self.active_track_id.is_none() {
            SessionState::ConnectedIdle
        } else if self.loop_enabled {
            SessionState::Looping
        } else {
            SessionState::Playing
        }
    }

    /// Invalidate every completion callback issued so far.
    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch = self.epochs.next();
        self.epoch
    }

    /// Return to the idle shape while keeping the epoch, so callbacks issued
    /// before the reset stay stale.
    pub fn reset(&mut self) {
        self.connection = None;
        self.active_track_id = None;
        self.pre_break_track_id = None;
        self.loop_enabled = false;
        self.break_active = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            channel_id: self.channel_id.clone(),
            state: self.state(),
            connected: self.connection.is_some(),
            active_track_id: self.active_track_id.clone(),
            pre_break_track_id: self.pre_break_track_id.clone(),
            loop_enabled: self.loop_enabled,
            break_active: self.break_active,
            epoch: self.epoch,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("channel_id", &self.channel_id)
            .field("connected", &self.connection.is_some())
            .field("active_track_id", &self.active_track_id)
            .field("pre_break_track_id", &self.pre_break_track_id)
            .field("loop_enabled", &self.loop_enabled)
            .field("break_active", &self.break_active)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// Read-only copy of a session's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub channel_id: ChannelId,
    pub state: SessionState,
    pub connected: bool,
    pub active_track_id: Option<TrackId>,
    pub pre_break_track_id: Option<TrackId>,
    pub loop_enabled: bool,
    pub break_active: bool,
    pub epoch: u64,
}

impl SessionSnapshot {
    /// Snapshot of a session that was never created.
    pub fn idle(channel_id: ChannelId) -> Self {
        Session::new(channel_id).snapshot()
    }
}
