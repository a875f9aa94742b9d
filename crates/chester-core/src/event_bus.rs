//! Broadcast of session state changes.
//!
//! The controller publishes a [`SessionEvent`] for every transition it makes,
//! including discarded stale completions. Consumers (the daemon's log
//! forwarder, tests) subscribe independently; nothing in the controller
//! depends on anyone listening.
//!
//! # Example
//!
//! ```rust
//! use chester_core::event_bus::{EventBus, SessionEvent};
//! use chester_core::session::ChannelId;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::SessionStopped { channel: ChannelId::from("lounge") });
//! assert!(matches!(rx.try_recv(), Ok(SessionEvent::SessionStopped { .. })));
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::library::TrackId;
use crate::session::ChannelId;

/// Events beyond this many unread cause slow subscribers to lag.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    TrackStarted {
        channel: ChannelId,
        track: TrackId,
        epoch: u64,
    },
    /// A looping (or break) track was restarted after it ended.
    TrackRepeated {
        channel: ChannelId,
        track: TrackId,
        epoch: u64,
    },
    PlaybackFinished {
        channel: ChannelId,
    },
    BreakStarted {
        channel: ChannelId,
        track: TrackId,
        interrupted: Option<TrackId>,
    },
    BreakEnded {
        channel: ChannelId,
        resumed: Option<TrackId>,
    },
    SessionStopped {
        channel: ChannelId,
    },
    StaleCompletion {
        channel: ChannelId,
        epoch: u64,
        current_epoch: Option<u64>,
    },
}

impl SessionEvent {
    pub fn channel(&self) -> &ChannelId {
        match self {
            SessionEvent::TrackStarted { channel, .. }
            | SessionEvent::TrackRepeated { channel, .. }
            | SessionEvent::PlaybackFinished { channel }
            | SessionEvent::BreakStarted { channel, .. }
            | SessionEvent::BreakEnded { channel, .. }
            | SessionEvent::SessionStopped { channel }
            | SessionEvent::StaleCompletion { channel, .. } => channel,
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns how many subscribers received it; with no
    /// subscribers the event is dropped.
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped(channel: &str) -> SessionEvent {
        SessionEvent::SessionStopped {
            channel: ChannelId::from(channel),
        }
    }

    mod session_event {
        use super::*;

        #[test]
        fn serializes_with_kind_tag() {
            let event = SessionEvent::TrackStarted {
                channel: ChannelId::from("lounge"),
                track: TrackId::from("abc"),
                epoch: 3,
            };
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["kind"], "trackStarted");
            assert_eq!(json["channel"], "lounge");
            assert_eq!(json["track"], "abc");
            assert_eq!(json["epoch"], 3);
        }

        #[test]
        fn channel_accessor() {
            let event = SessionEvent::StaleCompletion {
                channel: ChannelId::from("vc"),
                epoch: 1,
                current_epoch: Some(2),
            };
            assert_eq!(event.channel(), &ChannelId::from("vc"));
        }
    }

    mod event_bus {
        use super::*;

        #[test]
        fn emit_returns_zero_with_no_subscribers() {
            let bus = EventBus::new();
            assert_eq!(bus.emit(stopped("a")), 0);
        }

        #[test]
        fn subscribe_increments_count() {
            let bus = EventBus::default();
            let _rx1 = bus.subscribe();
            let rx2 = bus.subscribe();
            assert_eq!(bus.subscriber_count(), 2);
            drop(rx2);
            assert_eq!(bus.subscriber_count(), 1);
        }

        #[tokio::test]
        async fn events_arrive_in_order() {
            let bus = EventBus::new();
            let mut rx = bus.subscribe();

            bus.emit(stopped("a"));
            bus.emit(stopped("b"));

            assert_eq!(rx.recv().await.unwrap(), stopped("a"));
            assert_eq!(rx.recv().await.unwrap(), stopped("b"));
        }

        #[tokio::test]
        async fn late_subscriber_misses_old_events() {
            let bus = EventBus::new();
            let _early = bus.subscribe();
            bus.emit(stopped("a"));

            let mut late = bus.subscribe();
            bus.emit(stopped("b"));
            assert_eq!(late.recv().await.unwrap(), stopped("b"));
        }

        #[tokio::test]
        async fn slow_subscriber_lags() {
            let bus = EventBus::with_capacity(2);
            let mut rx = bus.subscribe();
            bus.emit(stopped("1"));
            bus.emit(stopped("2"));
            bus.emit(stopped("3"));

            assert!(matches!(
                rx.recv().await,
                Err(broadcast::error::RecvError::Lagged(1))
            ));
        }
    }
}
