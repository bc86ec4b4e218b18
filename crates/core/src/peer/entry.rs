//! Per-peer registry record

use crate::channels::{DataConnection, MediaConnection, MediaStream};
use crate::raw::Answer;
use crate::reactive::WeakReplayLatest;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::registry::merge_answered;

/// Call state of a peer
#[derive(Debug, Clone)]
pub enum CallSlot {
    /// Offered by the remote, not answered yet
    Pending(PendingCall),
    /// Answered
    Active(MediaConnection),
}

/// Everything known about one remote peer
#[derive(Debug, Clone)]
pub struct PeerEntry {
    /// Provider-assigned identity, unique within the registry
    pub peer_id: String,

    /// Latest data channel to this peer
    pub data_channel: Option<DataConnection>,

    /// Latest call with this peer
    pub call: Option<CallSlot>,
}

impl PeerEntry {
    pub(crate) fn with_data_channel(peer_id: impl Into<String>, channel: DataConnection) -> Self {
        Self {
            peer_id: peer_id.into(),
            data_channel: Some(channel),
            call: None,
        }
    }

    pub(crate) fn with_call(peer_id: impl Into<String>, call: PendingCall) -> Self {
        Self {
            peer_id: peer_id.into(),
            data_channel: None,
            call: Some(CallSlot::Pending(call)),
        }
    }

    /// The unanswered call, if any
    pub fn pending_call(&self) -> Option<&PendingCall> {
        match &self.call {
            Some(CallSlot::Pending(pending)) => Some(pending),
            _ => None,
        }
    }

    /// The answered call, if any
    pub fn media_channel(&self) -> Option<&MediaConnection> {
        match &self.call {
            Some(CallSlot::Active(media)) => Some(media),
            _ => None,
        }
    }
}

/// An incoming call that can be answered once
///
/// Clones share the underlying capability. Answering swaps this peer's
/// `CallSlot::Pending` for `CallSlot::Active` in the registry.
#[derive(Clone)]
pub struct PendingCall {
    inner: Arc<PendingInner>,
}

struct PendingInner {
    peer_id: String,
    answer: Mutex<Option<Answer>>,
    registry: WeakReplayLatest<Vec<PeerEntry>>,
}

impl PendingCall {
    pub(crate) fn new(
        peer_id: impl Into<String>,
        answer: Answer,
        registry: WeakReplayLatest<Vec<PeerEntry>>,
    ) -> Self {
        Self {
            inner: Arc::new(PendingInner {
                peer_id: peer_id.into(),
                answer: Mutex::new(Some(answer)),
                registry,
            }),
        }
    }

    /// Calling peer
    pub fn peer_id(&self) -> &str {
        &self.inner.peer_id
    }

    /// Whether `answer` has already been used
    pub fn is_answered(&self) -> bool {
        self.inner.answer.lock().is_none()
    }

    /// Answer with a local stream
    ///
    /// The first call answers and returns the media connection; later calls
    /// return `None` without touching the provider.
    pub fn answer(&self, stream: MediaStream) -> Option<MediaConnection> {
        let Some(answer) = self.inner.answer.lock().take() else {
            debug!("Call from {} already answered", self.inner.peer_id);
            return None;
        };

        let media = answer.answer(stream);

        if let Some(registry) = self.inner.registry.upgrade() {
            let swapped = registry.update(|peers| merge_answered(peers, self, &media));
            if !swapped {
                debug!(
                    "Answered call from {} no longer in registry slot",
                    self.inner.peer_id
                );
            }
        }

        Some(media)
    }

    /// Whether both handles refer to the same offered call
    pub fn same_call(&self, other: &PendingCall) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("peer_id", &self.inner.peer_id)
            .field("answered", &self.is_answered())
            .finish()
    }
}
