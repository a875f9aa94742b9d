//! Crate-wide error type.
//!
//! Every failure a command can surface maps onto one [`ErrorKind`]. Stale
//! completion notifications are deliberately absent here: they are an
//! outcome of the controller, never an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::library::TrackId;
use crate::registry::RegistryError;
use crate::session::{ChannelId, UserId};
use crate::voice::TransportError;

/// Coarse classification used at the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    IoFailure,
    AcquisitionFailure,
}

#[derive(Error, Debug)]
pub enum ChesterError {
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("No break track registered for user {0}")]
    BreakNotRegistered(UserId),

    #[error("Caller is not connected to a voice channel")]
    NotInVoiceChannel,

    #[error("Voice channel unreachable: {0}")]
    ChannelUnreachable(ChannelId),

    #[error("No voice connection for channel {0}")]
    NoConnection(ChannelId),

    #[error("Audio asset for track {id} missing at {}", path.display())]
    MissingAudioAsset { id: TrackId, path: PathBuf },

    #[error("Invalid metadata record {}: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Break registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Voice transport error: {0}")]
    Transport(String),

    #[error("Track acquisition failed: {0}")]
    Acquisition(String),
}

impl ChesterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChesterError::TrackNotFound(_) | ChesterError::BreakNotRegistered(_) => {
                ErrorKind::NotFound
            }
            ChesterError::NotInVoiceChannel
            | ChesterError::ChannelUnreachable(_)
            | ChesterError::NoConnection(_)
            | ChesterError::Transport(_) => ErrorKind::PreconditionFailed,
            ChesterError::MissingAudioAsset { .. }
            | ChesterError::InvalidMetadata { .. }
            | ChesterError::Io(_)
            | ChesterError::Registry(_) => ErrorKind::IoFailure,
            ChesterError::Acquisition(_) => ErrorKind::AcquisitionFailure,
        }
    }
}

impl From<TransportError> for ChesterError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::ChannelUnreachable(channel) => ChesterError::ChannelUnreachable(channel),
            other => ChesterError::Transport(other.to_string()),
        }
    }
}

pub type Result<T, E = ChesterError> = std::result::Result<T, E>;
