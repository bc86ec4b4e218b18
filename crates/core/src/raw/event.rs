//! Events emitted by a raw channel

use crate::channels::{DataConnection, MediaConnection, MediaStream};
use std::fmt;
use std::sync::Arc;

/// Capability asking the provider to re-establish its signalling link
#[derive(Clone)]
pub struct Reconnect(Arc<dyn Fn() + Send + Sync>);

impl Reconnect {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn invoke(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Reconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reconnect(..)")
    }
}

/// Capability answering an incoming call with a local stream
///
/// Consumed by use, so a call can be answered at most once.
pub struct Answer(Box<dyn FnOnce(MediaStream) -> MediaConnection + Send>);

impl Answer {
    pub fn new(f: impl FnOnce(MediaStream) -> MediaConnection + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    pub fn answer(self, stream: MediaStream) -> MediaConnection {
        (self.0)(stream)
    }
}

impl fmt::Debug for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Answer(..)")
    }
}

/// A call offered by (or placed to) a remote peer
#[derive(Debug)]
pub struct CallOffer {
    pub peer_id: String,
    pub answer: Answer,
}

impl CallOffer {
    pub fn new(peer_id: impl Into<String>, answer: Answer) -> Self {
        Self {
            peer_id: peer_id.into(),
            answer,
        }
    }
}

/// Event delivered on a raw channel
#[derive(Debug)]
pub enum RawEvent {
    /// Registration succeeded; `peer_id` is the local identity
    Open { peer_id: String },

    /// Signalling link lost; `reconnect` restores it
    Disconnected { reconnect: Reconnect },

    /// A data channel to `peer_id` is available
    Connection {
        peer_id: String,
        connection: DataConnection,
    },

    /// `peer_id` offered a call
    Call { peer_id: String, answer: Answer },

    /// Event this version does not understand
    Unrecognized {
        kind: String,
        detail: serde_json::Value,
    },
}

impl RawEvent {
    /// Short name for logging
    pub fn kind(&self) -> &str {
        match self {
            RawEvent::Open { .. } => "open",
            RawEvent::Disconnected { .. } => "disconnected",
            RawEvent::Connection { .. } => "connection",
            RawEvent::Call { .. } => "call",
            RawEvent::Unrecognized { kind, .. } => kind,
        }
    }
}
