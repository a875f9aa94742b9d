//! In-process voice transport.
//!
//! No audio is produced. Each `play` installs a playback slot that is
//! completed either by a timer thread ([`PlaybackClock::RealTime`]) or by an
//! explicit [`SimulatedTransport::finish_playback`] ([`PlaybackClock::Manual`]).
//! Natural ends run the callback on a separate thread, as real voice backends
//! do. A superseding `play`, `stop` or `disconnect` runs the pending callback
//! synchronously on the caller's thread, so callbacks must never block or
//! take a lock the caller may hold. Every call is recorded for inspection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;

use crate::library::TrackId;
use crate::session::ChannelId;

use super::{CompletionCallback, TrackRef, TransportError, VoiceConnection, VoiceTransport};

const TICK: Duration = Duration::from_millis(50);

/// How simulated playbacks come to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackClock {
    /// Playbacks only end through [`SimulatedTransport::finish_playback`].
    Manual,
    /// Playbacks end after the track's duration, or `fallback` when the
    /// duration is unknown. Paused time does not count.
    RealTime { fallback: Duration },
}

/// A transport call, as observed by the simulated backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect(ChannelId),
    Play(ChannelId, TrackId),
    Pause(ChannelId),
    Stop(ChannelId),
    Disconnect(ChannelId),
}

struct PlaybackSlot {
    callback: Mutex<Option<CompletionCallback>>,
    paused: AtomicBool,
}

impl PlaybackSlot {
    fn new(callback: CompletionCallback) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
            paused: AtomicBool::new(false),
        }
    }

    fn is_pending(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }

    /// Run the callback if it has not run yet.
    fn fire(&self) -> bool {
        // Release the slot lock before running foreign code.
        let callback = self.callback.lock().unwrap().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<TransportCall>>,
    current: Mutex<HashMap<ChannelId, Arc<PlaybackSlot>>>,
    unreachable: Mutex<HashSet<ChannelId>>,
}

impl Shared {
    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn replace(
        &self,
        channel: &ChannelId,
        slot: Option<Arc<PlaybackSlot>>,
    ) -> Option<Arc<PlaybackSlot>> {
        let mut current = self.current.lock().unwrap();
        match slot {
            Some(slot) => current.insert(channel.clone(), slot),
            None => current.remove(channel),
        }
    }

    fn current(&self, channel: &ChannelId) -> Option<Arc<PlaybackSlot>> {
        self.current.lock().unwrap().get(channel).cloned()
    }

    /// Remove `slot` if it is still the channel's current playback.
    fn take_if_current(&self, channel: &ChannelId, slot: &Arc<PlaybackSlot>) -> bool {
        let mut current = self.current.lock().unwrap();
        match current.get(channel) {
            Some(existing) if Arc::ptr_eq(existing, slot) => {
                current.remove(channel);
                true
            }
            _ => false,
        }
    }
}

/// Voice transport that simulates playback timing without producing audio.
#[derive(Clone)]
pub struct SimulatedTransport {
    clock: PlaybackClock,
    shared: Arc<Shared>,
}

impl SimulatedTransport {
    pub fn new(clock: PlaybackClock) -> Self {
        Self {
            clock,
            shared: Arc::new(Shared::default()),
        }
    }

    /// A transport whose playbacks never end on their own.
    pub fn manual() -> Self {
        Self::new(PlaybackClock::Manual)
    }

    pub fn clock(&self) -> PlaybackClock {
        self.clock
    }

    /// Make `connect` to `channel` fail (or succeed again).
    pub fn set_reachable(&self, channel: &ChannelId, reachable: bool) {
        let mut unreachable = self.shared.unreachable.lock().unwrap();
        if reachable {
            unreachable.remove(channel);
        } else {
            unreachable.insert(channel.clone());
        }
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Drain the recorded calls.
    pub fn take_calls(&self) -> Vec<TransportCall> {
        std::mem::take(&mut *self.shared.calls.lock().unwrap())
    }

    /// Whether `channel` has a playback that is running (not paused).
    pub fn is_playing(&self, channel: &ChannelId) -> bool {
        self.shared
            .current(channel)
            .is_some_and(|slot| slot.is_pending() && !slot.paused.load(Ordering::SeqCst))
    }

    /// End the channel's current playback as if the track ran out.
    ///
    /// The completion callback runs on a freshly spawned thread; this call
    /// waits for it. Returns `false` if nothing was playing.
    pub fn finish_playback(&self, channel: &ChannelId) -> bool {
        let Some(slot) = self.shared.replace(channel, None) else {
            return false;
        };
        thread::spawn(move || slot.fire())
            .join()
            .unwrap_or(false)
    }
}

#[async_trait]
impl VoiceTransport for SimulatedTransport {
    async fn connect(
        &self,
        channel: &ChannelId,
    ) -> Result<Box<dyn VoiceConnection>, TransportError> {
        if self.shared.unreachable.lock().unwrap().contains(channel) {
            return Err(TransportError::ChannelUnreachable(channel.clone()));
        }
        self.shared.record(TransportCall::Connect(channel.clone()));
        Ok(Box::new(SimulatedConnection {
            channel: channel.clone(),
            clock: self.clock,
            shared: Arc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct SimulatedConnection {
    channel: ChannelId,
    clock: PlaybackClock,
    shared: Arc<Shared>,
    closed: bool,
}

impl SimulatedConnection {
    fn start_timer(&self, slot: Arc<PlaybackSlot>, length: Duration) {
        let shared = Arc::clone(&self.shared);
        let channel = self.channel.clone();
        thread::spawn(move || {
            let mut remaining = length;
            while !remaining.is_zero() {
                thread::sleep(TICK.min(remaining));
                if !slot.is_pending() {
                    // Stopped or superseded; whoever did that fired it.
                    return;
                }
                if !slot.paused.load(Ordering::SeqCst) {
                    remaining = remaining.saturating_sub(TICK);
                }
            }
            if shared.take_if_current(&channel, &slot) {
                slot.fire();
            }
        });
    }
}

#[async_trait]
impl VoiceConnection for SimulatedConnection {
    fn play(
        &mut self,
        track: &TrackRef,
        on_complete: CompletionCallback,
    ) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.shared
            .record(TransportCall::Play(self.channel.clone(), track.id.clone()));

        let slot = Arc::new(PlaybackSlot::new(on_complete));
        if let Some(previous) = self.shared.replace(&self.channel, Some(Arc::clone(&slot))) {
            previous.fire();
        }

        if let PlaybackClock::RealTime { fallback } = self.clock {
            self.start_timer(slot, track.duration.unwrap_or(fallback));
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.shared.record(TransportCall::Pause(self.channel.clone()));
        if let Some(slot) = self.shared.current(&self.channel) {
            slot.paused.store(true, Ordering::SeqCst);
        }
    }

    fn stop(&mut self) {
        self.shared.record(TransportCall::Stop(self.channel.clone()));
        if let Some(slot) = self.shared.replace(&self.channel, None) {
            slot.fire();
        }
    }

    fn is_playing(&self) -> bool {
        self.shared
            .current(&self.channel)
            .is_some_and(|slot| slot.is_pending() && !slot.paused.load(Ordering::SeqCst))
    }

    async fn disconnect(&mut self) {
        self.shared
            .record(TransportCall::Disconnect(self.channel.clone()));
        self.closed = true;
        if let Some(slot) = self.shared.replace(&self.channel, None) {
            slot.fire();
        }
    }
}
