//! SessionStore - owns every channel's session.
//!
//! The outer map lock is only held long enough to find or insert a handle;
//! all work on a session happens under that session's own async lock. Two
//! channels therefore never wait on each other, while everything touching
//! one channel is serialized.
//!
//! Every session draws its epochs from one store-wide [`EpochSource`], so a
//! completion issued before [`remove`](SessionStore::remove) can never match
//! a session created for the same channel afterwards.
//!
//! Sessions are created on first use and kept until removed, which only
//! happens on shutdown. The map is bounded by the number of distinct voice
//! channels the bot has been asked to act in; an idle entry holds no
//! connection, only flags.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use super::state::{ChannelId, EpochSource, Session, SessionSnapshot};

/// Shared handle to one channel's session.
pub type SessionHandle = Arc<AsyncMutex<Session>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ChannelId, SessionHandle>>,
    epochs: EpochSource,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the channel's session, creating a zero-valued one if absent.
    pub fn get_or_create(&self, channel_id: &ChannelId) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .entry(channel_id.clone())
            .or_insert_with(|| {
                let session = Session::with_epochs(channel_id.clone(), self.epochs.clone());
                Arc::new(AsyncMutex::new(session))
            })
            .clone()
    }

    /// Get the channel's session without creating one.
    pub fn get(&self, channel_id: &ChannelId) -> Option<SessionHandle> {
        self.sessions.lock().unwrap().get(channel_id).cloned()
    }

    /// Discard the channel's session entirely.
    pub fn remove(&self, channel_id: &ChannelId) -> Option<SessionHandle> {
        self.sessions.lock().unwrap().remove(channel_id)
    }

    /// All channels that currently have a session.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.sessions.lock().unwrap().keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the channel's session, or an idle snapshot if none exists.
    pub async fn snapshot(&self, channel_id: &ChannelId) -> SessionSnapshot {
        match self.get(channel_id) {
            Some(handle) => handle.lock().await.snapshot(),
            None => SessionSnapshot::idle(channel_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_creates_empty_store() {
        let store = SessionStore::new();
        assert!(store.is_empty());
        assert!(store.channels().is_empty());
    }

    #[tokio::test]
    async fn get_or_create_makes_zero_valued_session() {
        let store = SessionStore::new();
        let channel = ChannelId::from("lounge");

        let handle = store.get_or_create(&channel);
        let session = handle.lock().await;
        assert_eq!(session.channel_id, channel);
        assert_eq!(session.epoch, 0);
        assert!(session.connection.is_none());
        assert!(!session.loop_enabled);
    }

    #[tokio::test]
    async fn get_or_create_returns_same_session() {
        let store = SessionStore::new();
        let channel = ChannelId::from("lounge");

        store.get_or_create(&channel).lock().await.loop_enabled = true;
        assert!(store.get_or_create(&channel).lock().await.loop_enabled);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_does_not_create() {
        let store = SessionStore::new();
        assert!(store.get(&ChannelId::from("lounge")).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_discards_session() {
        let store = SessionStore::new();
        let channel = ChannelId::from("lounge");
        store.get_or_create(&channel).lock().await.loop_enabled = true;

        assert!(store.remove(&channel).is_some());
        assert!(store.get(&channel).is_none());
        assert!(!store.get_or_create(&channel).lock().await.loop_enabled);
    }

    #[tokio::test]
    async fn recreated_session_does_not_reuse_epochs() {
        let store = SessionStore::new();
        let channel = ChannelId::from("lounge");
        let old_epoch = store.get_or_create(&channel).lock().await.bump_epoch();

        store.remove(&channel);
        let handle = store.get_or_create(&channel);
        let mut session = handle.lock().await;
        assert_eq!(session.epoch, old_epoch);
        assert!(session.bump_epoch() > old_epoch);
    }

    #[tokio::test]
    async fn channels_share_one_epoch_sequence() {
        let store = SessionStore::new();
        let a = store.get_or_create(&ChannelId::from("a")).lock().await.bump_epoch();
        let b = store.get_or_create(&ChannelId::from("b")).lock().await.bump_epoch();
        assert_ne!(a, b);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let store = SessionStore::new();
        assert!(store.remove(&ChannelId::from("nope")).is_none());
    }

    #[test]
    fn channels_are_sorted() {
        let store = SessionStore::new();
        store.get_or_create(&ChannelId::from("b"));
        store.get_or_create(&ChannelId::from("a"));
        assert_eq!(
            store.channels(),
            vec![ChannelId::from("a"), ChannelId::from("b")]
        );
    }

    #[tokio::test]
    async fn snapshot_of_missing_channel_is_idle() {
        let store = SessionStore::new();
        let snapshot = store.snapshot(&ChannelId::from("lounge")).await;
        assert_eq!(snapshot, SessionSnapshot::idle(ChannelId::from("lounge")));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn locked_channel_does_not_block_other_channels() {
        let store = Arc::new(SessionStore::new());
        let a = ChannelId::from("a");
        let b = ChannelId::from("b");

        let held = store.get_or_create(&a);
        let _guard = held.lock().await;

        let other = store.get_or_create(&b);
        let result = tokio::time::timeout(Duration::from_secs(1), other.lock()).await;
        assert!(result.is_ok());

        let same = store.get_or_create(&a);
        assert!(same.try_lock().is_err());
    }
}
