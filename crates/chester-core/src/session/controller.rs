//! SessionController - the per-channel playback state machine.
//!
//! # Completion handoff
//!
//! Every `play` hands the transport a callback that captures the channel id
//! and the session's epoch *by value*. When it fires (on whatever thread the
//! transport likes) it only pushes a [`PlaybackCompleted`] onto an unbounded
//! queue; it never blocks and never touches session state. The queue is
//! drained on the async runtime by [`SessionController::run_completions`],
//! which takes the same per-channel lock the command paths use.
//!
//! # Epochs
//!
//! The epoch is bumped whenever the current playback is invalidated (a new
//! `play`, break on/off, stop, shutdown). A completion whose epoch no longer
//! matches is stale: it is dropped without touching the session or the
//! transport. Loop and break repeats re-read the session flags at each
//! firing, so there is no captured decision that can go out of date.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::{ChesterError, Result};
use crate::event_bus::{EventBus, SessionEvent};
use crate::library::{LibraryCatalog, Track, TrackId};
use crate::registry::BreakRegistry;
use crate::voice::{CompletionCallback, TrackRef, VoiceTransport};

use super::state::{Caller, ChannelId, Session, SessionSnapshot};
use super::store::SessionStore;

/// Notification that a playback issued under `epoch` has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackCompleted {
    pub channel: ChannelId,
    pub epoch: u64,
}

pub type CompletionReceiver = mpsc::UnboundedReceiver<PlaybackCompleted>;

/// Result of a `play` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(Track),
    /// Break mode owns the channel; nothing changed.
    OnBreak,
}

/// Result of toggling break mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakOutcome {
    Started {
        track: Track,
        interrupted: Option<TrackId>,
    },
    /// Break ended; `resumed` is the track restarted from the beginning.
    Ended { resumed: Option<Track> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NothingPlaying,
}

/// What the completion handler did with a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Epoch mismatch (or no session); discarded.
    Stale,
    /// Loop or break mode restarted the track.
    Repeated(TrackId),
    /// Playback ended; connection stays up, idle.
    Finished,
}

pub struct SessionController {
    catalog: Arc<LibraryCatalog>,
    registry: BreakRegistry,
    transport: Arc<dyn VoiceTransport>,
    store: SessionStore,
    events: Arc<EventBus>,
    completions: mpsc::UnboundedSender<PlaybackCompleted>,
}

impl SessionController {
    /// Build a controller plus the receiving end of its completion queue.
    ///
    /// The receiver must be driven by [`run_completions`](Self::run_completions)
    /// (or drained manually) for loop and break repeats to happen.
    pub fn new(
        catalog: Arc<LibraryCatalog>,
        registry: BreakRegistry,
        transport: Arc<dyn VoiceTransport>,
        events: Arc<EventBus>,
    ) -> (Self, CompletionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            catalog,
            registry,
            transport,
            store: SessionStore::new(),
            events,
            completions: tx,
        };
        (controller, rx)
    }

    pub fn catalog(&self) -> &Arc<LibraryCatalog> {
        &self.catalog
    }

    pub fn registry(&self) -> &BreakRegistry {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Process completion notifications until every sender is gone.
    pub async fn run_completions(self: Arc<Self>, mut rx: CompletionReceiver) {
        while let Some(notification) = rx.recv().await {
            self.playback_completed(notification).await;
        }
        log::debug!("Completion queue closed");
    }

    pub async fn snapshot(&self, channel: &ChannelId) -> SessionSnapshot {
        self.store.snapshot(channel).await
    }

    pub fn channels(&self) -> Vec<ChannelId> {
        self.store.channels()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn play(&self, caller: &Caller, track_id: &TrackId) -> Result<PlayOutcome> {
        let channel = caller.require_voice_channel()?;
        let track = self.catalog.get(track_id)?;

        let handle = self.store.get_or_create(channel);
        let mut session = handle.lock().await;

        if session.break_active {
            log::info!("Ignoring play of {} in {}: break is active", track.id, channel);
            return Ok(PlayOutcome::OnBreak);
        }

        self.ensure_connected(&mut session).await?;
        let epoch = session.bump_epoch();
        if let Err(e) = self.start(&mut session, &track) {
            settle_idle(&mut session);
            return Err(e);
        }
        session.active_track_id = Some(track.id.clone());

        log::info!("Playing {} in {} (epoch {})", track.id, channel, epoch);
        self.events.emit(SessionEvent::TrackStarted {
            channel: channel.clone(),
            track: track.id.clone(),
            epoch,
        });
        Ok(PlayOutcome::Started(track))
    }

    /// Flip the channel's loop flag and return the new value.
    pub async fn toggle_loop(&self, caller: &Caller) -> Result<bool> {
        let channel = caller.require_voice_channel()?;
        let handle = self.store.get_or_create(channel);
        let mut session = handle.lock().await;

        session.loop_enabled = !session.loop_enabled;
        log::info!("Loop {} in {}", on_off(session.loop_enabled), channel);
        Ok(session.loop_enabled)
    }

    pub async fn toggle_break(&self, caller: &Caller) -> Result<BreakOutcome> {
        let channel = caller.require_voice_channel()?;
        let handle = self.store.get_or_create(channel);
        let mut session = handle.lock().await;

        if session.break_active {
            self.end_break(&mut session)
        } else {
            self.start_break(caller, &mut session).await
        }
    }

    pub async fn stop(&self, caller: &Caller) -> Result<StopOutcome> {
        let channel = caller.require_voice_channel()?;
        let Some(handle) = self.store.get(channel) else {
            return Ok(StopOutcome::NothingPlaying);
        };
        let mut session = handle.lock().await;

        let Some(mut connection) = session.connection.take() else {
            return Ok(StopOutcome::NothingPlaying);
        };
        session.bump_epoch();
        connection.disconnect().await;
        session.reset();

        log::info!("Left {} (epoch {})", channel, session.epoch);
        self.events.emit(SessionEvent::SessionStopped {
            channel: channel.clone(),
        });
        Ok(StopOutcome::Stopped)
    }

    /// Register `track_id` as the caller's break track.
    ///
    /// Returns the previously registered track, if any.
    pub fn register_break(&self, caller: &Caller, track_id: &TrackId) -> Result<Option<TrackId>> {
        let track = self.catalog.get(track_id)?;
        Ok(self.registry.register(&caller.user_id, &track.id)?)
    }

    /// Disconnect every session and drop it from the store.
    pub async fn shutdown(&self) {
        for channel in self.store.channels() {
            let Some(handle) = self.store.remove(&channel) else {
                continue;
            };
            let mut session = handle.lock().await;
            session.bump_epoch();
            if let Some(mut connection) = session.connection.take() {
                connection.disconnect().await;
                log::info!("Disconnected from {} on shutdown", channel);
            }
            session.reset();
        }
    }

    // ------------------------------------------------------------------
    // Completion handling
    // ------------------------------------------------------------------

    /// Handle one completion notification.
    pub async fn playback_completed(&self, notification: PlaybackCompleted) -> CompletionOutcome {
        let PlaybackCompleted { channel, epoch } = notification;

        let Some(handle) = self.store.get(&channel) else {
            self.discard_stale(&channel, epoch, None);
            return CompletionOutcome::Stale;
        };
        let mut session = handle.lock().await;

        if session.epoch != epoch || session.connection.is_none() {
            self.discard_stale(&channel, epoch, Some(session.epoch));
            return CompletionOutcome::Stale;
        }

        if session.break_active || session.loop_enabled {
            if let Some(track_id) = session.active_track_id.clone() {
                match self.repeat(&mut session, &track_id) {
                    Ok(()) => {
                        self.events.emit(SessionEvent::TrackRepeated {
                            channel: channel.clone(),
                            track: track_id.clone(),
                            epoch,
                        });
                        return CompletionOutcome::Repeated(track_id);
                    }
                    Err(e) => log::warn!("Could not repeat {} in {}: {}", track_id, channel, e),
                }
            }
        }

        if let Some(connection) = session.connection.as_mut() {
            connection.stop();
        }
        session.active_track_id = None;
        log::info!("Playback finished in {}", channel);
        self.events.emit(SessionEvent::PlaybackFinished { channel });
        CompletionOutcome::Finished
    }

    fn discard_stale(&self, channel: &ChannelId, epoch: u64, current: Option<u64>) {
        log::debug!(
            "Discarding stale completion for {} (epoch {}, current {:?})",
            channel,
            epoch,
            current
        );
        self.events.emit(SessionEvent::StaleCompletion {
            channel: channel.clone(),
            epoch,
            current_epoch: current,
        });
    }

    // ------------------------------------------------------------------
    // Internals; all callers hold the session lock.
    // ------------------------------------------------------------------

    async fn start_break(&self, caller: &Caller, session: &mut Session) -> Result<BreakOutcome> {
        let track_id = self
            .registry
            .lookup(&caller.user_id)?
            .ok_or_else(|| ChesterError::BreakNotRegistered(caller.user_id.clone()))?;
        let track = self.catalog.get(&track_id)?;

        self.ensure_connected(session).await?;
        if let Some(connection) = session.connection.as_mut() {
            if connection.is_playing() {
                connection.pause();
            }
        }

        session.bump_epoch();
        if let Err(e) = self.start(session, &track) {
            settle_idle(session);
            return Err(e);
        }
        let interrupted = session.active_track_id.replace(track.id.clone());
        session.pre_break_track_id = interrupted.clone();
        session.break_active = true;

        log::info!(
            "Break started in {} with {} (interrupted {:?})",
            session.channel_id,
            track.id,
            interrupted
        );
        self.events.emit(SessionEvent::BreakStarted {
            channel: session.channel_id.clone(),
            track: track.id.clone(),
            interrupted: interrupted.clone(),
        });
        Ok(BreakOutcome::Started { track, interrupted })
    }

    fn end_break(&self, session: &mut Session) -> Result<BreakOutcome> {
        session.break_active = false;
        session.bump_epoch();
        if let Some(connection) = session.connection.as_mut() {
            connection.stop();
        }
        session.active_track_id = None;

        let resumed = match session.pre_break_track_id.take() {
            Some(track_id) => match self.catalog.get(&track_id) {
                Ok(track) => {
                    if let Err(e) = self.start(session, &track) {
                        settle_idle(session);
                        return Err(e);
                    }
                    session.active_track_id = Some(track.id.clone());
                    Some(track)
                }
                Err(e) => {
                    log::warn!("Cannot resume {} after break: {}", track_id, e);
                    None
                }
            },
            None => None,
        };

        log::info!(
            "Break ended in {} (resumed {:?})",
            session.channel_id,
            resumed.as_ref().map(|t| &t.id)
        );
        self.events.emit(SessionEvent::BreakEnded {
            channel: session.channel_id.clone(),
            resumed: resumed.as_ref().map(|t| t.id.clone()),
        });
        Ok(BreakOutcome::Ended { resumed })
    }

    async fn ensure_connected(&self, session: &mut Session) -> Result<()> {
        if session.connection.is_none() {
            let connection = self.transport.connect(&session.channel_id).await?;
            log::info!("Joined {}", session.channel_id);
            session.connection = Some(connection);
        }
        Ok(())
    }

    /// Restart `track_id` under the session's current epoch.
    fn repeat(&self, session: &mut Session, track_id: &TrackId) -> Result<()> {
        let track = self.catalog.get(track_id)?;
        self.start(session, &track)
    }

    /// Hand `track` to the connection with a callback bound to the current
    /// epoch.
    fn start(&self, session: &mut Session, track: &Track) -> Result<()> {
        let track_ref = TrackRef {
            id: track.id.clone(),
            audio_path: self.catalog.audio_path(&track.id),
            duration: track.duration(),
        };
        let callback = self.completion_callback(session.channel_id.clone(), session.epoch);
        let connection = session
            .connection
            .as_mut()
            .ok_or_else(|| ChesterError::NoConnection(session.channel_id.clone()))?;
        connection.play(&track_ref, callback)?;
        Ok(())
    }

    fn completion_callback(&self, channel: ChannelId, epoch: u64) -> CompletionCallback {
        let tx = self.completions.clone();
        Box::new(move || {
            // Fails only once the controller is gone; nothing left to notify.
            let _ = tx.send(PlaybackCompleted { channel, epoch });
        })
    }
}

/// After a failed `play`, leave the channel connected with nothing active.
/// The epoch was already bumped, so the previous playback's completion is
/// stale and must not be waited for.
fn settle_idle(session: &mut Session) {
    log::warn!("Playback failed to start in {}", session.channel_id);
    if let Some(connection) = session.connection.as_mut() {
        connection.stop();
    }
    session.active_track_id = None;
}

fn on_off(value: bool) -> &'static str {
    if value {
        "enabled"
    } else {
        "disabled"
    }
}
