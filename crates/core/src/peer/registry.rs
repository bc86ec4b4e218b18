//! Replay-latest peer registry and its merge functions

use super::entry::{CallSlot, PeerEntry, PendingCall};
use crate::channels::{DataConnection, MediaConnection};
use crate::raw::Answer;
use crate::reactive::{ReplayLatest, Subscription};
use tracing::debug;

/// Set `peer_id`'s data channel, appending a new entry on first sighting
pub fn merge_data_channel(
    peers: &[PeerEntry],
    peer_id: &str,
    channel: DataConnection,
) -> Vec<PeerEntry> {
    let mut next = peers.to_vec();
    match next.iter_mut().find(|entry| entry.peer_id == peer_id) {
        Some(entry) => entry.data_channel = Some(channel),
        None => next.push(PeerEntry::with_data_channel(peer_id, channel)),
    }
    next
}

/// Set `peer_id`'s call slot to a pending call, appending on first sighting
///
/// A pending call replaces whatever the slot held, an active call included.
pub fn merge_call(peers: &[PeerEntry], peer_id: &str, call: PendingCall) -> Vec<PeerEntry> {
    let mut next = peers.to_vec();
    match next.iter_mut().find(|entry| entry.peer_id == peer_id) {
        Some(entry) => entry.call = Some(CallSlot::Pending(call)),
        None => next.push(PeerEntry::with_call(peer_id, call)),
    }
    next
}

/// Swap `pending` for its answered media connection
///
/// `None` if the peer's slot no longer holds that exact pending call.
pub fn merge_answered(
    peers: &[PeerEntry],
    pending: &PendingCall,
    media: &MediaConnection,
) -> Option<Vec<PeerEntry>> {
    let index = peers.iter().position(|entry| {
        entry.peer_id == pending.peer_id()
            && entry
                .pending_call()
                .is_some_and(|current| current.same_call(pending))
    })?;

    let mut next = peers.to_vec();
    next[index].call = Some(CallSlot::Active(media.clone()));
    Some(next)
}

/// Ordered, replayable list of remote peers
///
/// Mutated only through the session's event loop and by answering a
/// [`PendingCall`]; everyone else reads.
#[derive(Clone)]
pub struct PeerRegistry {
    peers: ReplayLatest<Vec<PeerEntry>>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            peers: ReplayLatest::new(Vec::new()),
        }
    }

    /// Subscribe; the current snapshot comes first
    pub fn subscribe(&self) -> Subscription<Vec<PeerEntry>> {
        self.peers.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Vec<PeerEntry> {
        self.peers.get()
    }

    /// Current entry for `peer_id`
    pub fn get(&self, peer_id: &str) -> Option<PeerEntry> {
        self.peers
            .get()
            .into_iter()
            .find(|entry| entry.peer_id == peer_id)
    }

    /// Number of peers seen
    pub fn len(&self) -> usize {
        self.peers.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a data channel to `peer_id`
    ///
    /// Returns `false` once the registry is closed.
    pub fn upsert_data_channel(&self, peer_id: &str, channel: DataConnection) -> bool {
        debug!("Registry: data channel for {}", peer_id);
        self.peers
            .update(|peers| Some(merge_data_channel(peers, peer_id, channel)))
    }

    /// Record a call offered by `peer_id`
    ///
    /// Returns `false` once the registry is closed.
    pub fn upsert_call(&self, peer_id: &str, answer: Answer) -> bool {
        debug!("Registry: call from {}", peer_id);
        let pending = PendingCall::new(peer_id, answer, self.peers.downgrade());
        self.peers
            .update(|peers| Some(merge_call(peers, peer_id, pending)))
    }

    /// Stop emitting; the last snapshot stays readable
    pub fn close(&self) -> bool {
        self.peers.close()
    }

    pub fn is_closed(&self) -> bool {
        self.peers.is_closed()
    }
}
