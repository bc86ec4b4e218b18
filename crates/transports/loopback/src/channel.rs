//! In-memory data channels and calls between two loopback providers
//!
//! A link has two sides: side 0 is the peer that opened the channel or placed
//! the call, side 1 the peer that received it.

use bytes::Bytes;
use parking_lot::Mutex;
use peerstream_core::{
    ChannelError, ConnectOptions, DataChannelEvents, DataChannelHandle, DataConnection,
    MediaCallEvents, MediaCallHandle, MediaConnection, MediaStream, Serialization,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

pub(crate) const OPENER: usize = 0;
pub(crate) const RECEIVER: usize = 1;

fn other(side: usize) -> usize {
    1 - side
}

/// A data channel shared by two peers
pub(crate) struct DataLink {
    open: AtomicBool,
    label: String,
    metadata: Option<serde_json::Value>,
    reliable: bool,
    serialization: Serialization,
    /// Peer id of each side
    ids: [String; 2],
    ends: Mutex<[Option<DataChannelEvents>; 2]>,
}

impl DataLink {
    /// Create a linked pair; returns `(opener_end, receiver_end, link)`
    pub(crate) fn pair(
        opener: &str,
        receiver: &str,
        options: &ConnectOptions,
    ) -> (DataConnection, DataConnection, Arc<DataLink>) {
        let link = Arc::new(DataLink {
            open: AtomicBool::new(true),
            label: options
                .label
                .clone()
                .unwrap_or_else(|| format!("dc_{}", uuid::Uuid::new_v4().simple())),
            metadata: options.metadata.clone(),
            reliable: options.reliable.unwrap_or_default(),
            serialization: options.serialization.unwrap_or_default(),
            ids: [opener.to_string(), receiver.to_string()],
            ends: Mutex::new([None, None]),
        });

        let (opener_end, opener_events) = DataConnection::new(Arc::new(LinkedDataChannel {
            link: Arc::clone(&link),
            side: OPENER,
        }));
        let (receiver_end, receiver_events) = DataConnection::new(Arc::new(LinkedDataChannel {
            link: Arc::clone(&link),
            side: RECEIVER,
        }));
        *link.ends.lock() = [Some(opener_events), Some(receiver_events)];

        debug!("Linked data channel {} ({} -> {})", link.label, opener, receiver);
        (opener_end, receiver_end, link)
    }

    /// Close both ends; later calls do nothing
    pub(crate) fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("Closing data channel {}", self.label);
        let ends = std::mem::take(&mut *self.ends.lock());
        for events in ends.iter().flatten() {
            events.close();
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

struct LinkedDataChannel {
    link: Arc<DataLink>,
    side: usize,
}

impl DataChannelHandle for LinkedDataChannel {
    fn label(&self) -> String {
        self.link.label.clone()
    }

    fn metadata(&self) -> Option<serde_json::Value> {
        self.link.metadata.clone()
    }

    fn is_open(&self) -> bool {
        self.link.is_open()
    }

    fn peer(&self) -> String {
        self.link.ids[other(self.side)].clone()
    }

    fn reliable(&self) -> bool {
        self.link.reliable
    }

    fn serialization(&self) -> Serialization {
        self.link.serialization
    }

    fn send(&self, data: Bytes) -> std::result::Result<(), ChannelError> {
        if !self.link.is_open() {
            return Err(ChannelError::new(format!(
                "data channel {} is closed",
                self.link.label
            )));
        }
        if let Some(remote) = &self.link.ends.lock()[other(self.side)] {
            remote.data(data);
        }
        Ok(())
    }

    fn close(&self) {
        self.link.close();
    }
}

#[derive(Default)]
struct CallSide {
    /// Local stream this side answered with
    stream: Option<MediaStream>,
    events: Option<MediaCallEvents>,
}

/// A media call shared by two peers
///
/// Each side answers with its local stream; once both have, each side's
/// media connection receives the other's stream.
pub(crate) struct CallLink {
    open: AtomicBool,
    metadata: Option<serde_json::Value>,
    ids: [String; 2],
    sides: Mutex<[CallSide; 2]>,
}

impl CallLink {
    pub(crate) fn new(
        caller: &str,
        callee: &str,
        metadata: Option<serde_json::Value>,
    ) -> Arc<CallLink> {
        Arc::new(CallLink {
            open: AtomicBool::new(true),
            metadata,
            ids: [caller.to_string(), callee.to_string()],
            sides: Mutex::new([CallSide::default(), CallSide::default()]),
        })
    }

    pub(crate) fn peer_of(&self, side: usize) -> &str {
        &self.ids[other(side)]
    }

    /// Attach `side`'s local stream and return its media connection
    pub(crate) fn answer(self: &Arc<Self>, side: usize, stream: MediaStream) -> MediaConnection {
        let (connection, events) = MediaConnection::new(Arc::new(LinkedCall {
            link: Arc::clone(self),
            side,
        }));

        if !self.open.load(Ordering::SeqCst) {
            events.close();
            return connection;
        }

        let remote_stream = {
            let mut sides = self.sides.lock();
            sides[side].stream = Some(stream.clone());
            sides[side].events = Some(events);

            let remote_stream = sides[other(side)].stream.clone();
            if remote_stream.is_some() {
                if let Some(remote_events) = &sides[other(side)].events {
                    remote_events.stream(stream);
                }
            }
            remote_stream
        };

        if let Some(remote_stream) = remote_stream {
            debug!(
                "Call between {} and {} established",
                self.ids[OPENER], self.ids[RECEIVER]
            );
            self.deliver_later(side, remote_stream);
        }

        connection
    }

    /// Hand `stream` to `side` after the caller had a chance to subscribe
    fn deliver_later(self: &Arc<Self>, side: usize, stream: MediaStream) {
        let link = Arc::clone(self);
        let deliver = move || {
            if let Some(events) = &link.sides.lock()[side].events {
                events.stream(stream);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    deliver();
                });
            }
            Err(_) => deliver(),
        }
    }

    /// Hang up both sides; later calls do nothing
    pub(crate) fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!("Closing call between {} and {}", self.ids[OPENER], self.ids[RECEIVER]);
        let sides = std::mem::take(&mut *self.sides.lock());
        for events in sides.iter().filter_map(|side| side.events.as_ref()) {
            events.close();
        }
    }

    fn is_established(&self) -> bool {
        self.open.load(Ordering::SeqCst)
            && self.sides.lock().iter().all(|side| side.stream.is_some())
    }
}

struct LinkedCall {
    link: Arc<CallLink>,
    side: usize,
}

impl MediaCallHandle for LinkedCall {
    fn metadata(&self) -> Option<serde_json::Value> {
        self.link.metadata.clone()
    }

    fn is_open(&self) -> bool {
        self.link.is_established()
    }

    fn peer(&self) -> String {
        self.link.peer_of(self.side).to_string()
    }

    fn close(&self) {
        self.link.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_data_link_delivers_both_ways() {
        let (alice, bob, link) = DataLink::pair(
            "alice",
            "bob",
            &ConnectOptions {
                label: Some("chat".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(alice.peer(), "bob");
        assert_eq!(bob.peer(), "alice");
        assert_eq!(bob.properties().label, "chat");

        let mut at_bob = bob.subscribe();
        let mut at_alice = alice.subscribe();

        alice.send(Bytes::from_static(b"hi")).unwrap();
        bob.send(Bytes::from_static(b"hello")).unwrap();

        assert_eq!(at_bob.next().await, Some(Ok(Bytes::from_static(b"hi"))));
        assert_eq!(at_alice.next().await, Some(Ok(Bytes::from_static(b"hello"))));

        link.close();
        assert!(at_bob.next().await.is_none());
        assert!(!alice.properties().open);
        assert!(alice.send(Bytes::from_static(b"late")).is_err());
    }

    #[tokio::test]
    async fn test_closing_one_end_closes_both() {
        let (alice, bob, _link) = DataLink::pair("alice", "bob", &ConnectOptions::default());
        let mut at_alice = alice.subscribe();

        bob.close();
        assert!(at_alice.next().await.is_none());
        assert!(!bob.properties().open);
    }

    #[tokio::test]
    async fn test_call_exchanges_streams_once_both_answer() {
        let link = CallLink::new("alice", "bob", None);

        let alice = link.answer(OPENER, MediaStream::audio("alice-mic"));
        let mut at_alice = tokio_test::task::spawn(alice.subscribe());
        assert!(!alice.properties().open);
        assert_pending!(at_alice.poll_next());

        let bob = link.answer(RECEIVER, MediaStream::audio_video("bob-cam"));
        let mut at_bob = bob.subscribe();
        assert!(bob.properties().open);

        let seen_by_alice = assert_ready!(at_alice.poll_next()).unwrap().unwrap();
        assert_eq!(seen_by_alice.id(), "bob-cam");
        let seen_by_bob = at_bob.next().await.unwrap().unwrap();
        assert_eq!(seen_by_bob.id(), "alice-mic");

        bob.close();
        assert!(at_alice.next().await.is_none());
        assert!(!alice.properties().open);
    }

    #[tokio::test]
    async fn test_answer_after_hangup_is_closed() {
        let link = CallLink::new("alice", "bob", None);
        link.close();

        let bob = link.answer(RECEIVER, MediaStream::audio("bob-mic"));
        let mut at_bob = bob.subscribe();
        assert!(at_bob.next().now_or_never().flatten().is_none());
        assert_eq!(bob.peer(), "alice");
    }
}
