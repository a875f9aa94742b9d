//! Per-channel playback sessions.
//!
//! The [`SessionStore`] owns one [`Session`] per voice channel; the
//! [`SessionController`] is the only thing that mutates them.

mod controller;
mod state;
mod store;

pub use controller::{
    BreakOutcome, CompletionOutcome, CompletionReceiver, PlayOutcome, PlaybackCompleted,
    SessionController, StopOutcome,
};
pub use state::{Caller, ChannelId, EpochSource, Session, SessionSnapshot, SessionState, UserId};
pub use store::{SessionHandle, SessionStore};
