//! Data connection wrapper

use crate::error::ChannelError;
use crate::reactive::{Subject, Subscription};
use crate::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Item delivered to data connection subscribers
///
/// An `Err` is terminal: the stream ends right after it.
pub type ChannelMessage = std::result::Result<Bytes, ChannelError>;

/// Payload serialization negotiated for a data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Serialization {
    /// Binary packing (provider default)
    #[default]
    Binary,
    /// Binary packing with UTF-8 string support
    BinaryUtf8,
    /// JSON text frames
    Json,
    /// Bytes passed through untouched
    Raw,
}

/// Provider-side data channel the wrapper reads from and writes to
pub trait DataChannelHandle: Send + Sync {
    /// Channel label
    fn label(&self) -> String;

    /// Metadata attached by the opening side
    fn metadata(&self) -> Option<serde_json::Value>;

    /// Whether the channel is currently open
    fn is_open(&self) -> bool;

    /// Remote peer id
    fn peer(&self) -> String;

    /// Whether delivery is reliable/ordered
    fn reliable(&self) -> bool;

    /// Payload serialization
    fn serialization(&self) -> Serialization;

    /// Send a payload to the remote side
    fn send(&self, data: Bytes) -> std::result::Result<(), ChannelError>;

    /// Close the channel
    fn close(&self);
}

/// Snapshot of a data channel's provider-side properties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataConnectionProperties {
    pub label: String,
    pub metadata: Option<serde_json::Value>,
    pub open: bool,
    pub peer: String,
    pub reliable: bool,
    pub serialization: Serialization,
}

struct DataInner {
    connection_id: String,
    handle: Arc<dyn DataChannelHandle>,
    incoming: Subject<ChannelMessage>,
}

/// Duplex stream over one negotiated data channel
///
/// Cheap to clone; clones share the same underlying channel.
#[derive(Clone)]
pub struct DataConnection {
    inner: Arc<DataInner>,
}

impl DataConnection {
    /// Wrap a provider data channel
    ///
    /// The returned emitter is handed to the provider, which reports the
    /// channel's data/error/close events through it.
    pub fn new(handle: Arc<dyn DataChannelHandle>) -> (Self, DataChannelEvents) {
        let incoming = Subject::new();
        let connection = Self {
            inner: Arc::new(DataInner {
                connection_id: uuid::Uuid::new_v4().to_string(),
                handle,
                incoming: incoming.clone(),
            }),
        };
        (connection, DataChannelEvents { incoming })
    }

    /// Unique identifier of this wrapper instance
    pub fn connection_id(&self) -> &str {
        &self.inner.connection_id
    }

    /// Remote peer id
    pub fn peer(&self) -> String {
        self.inner.handle.peer()
    }

    /// Subscribe to incoming payloads
    pub fn subscribe(&self) -> Subscription<ChannelMessage> {
        self.inner.incoming.subscribe()
    }

    /// Send a payload to the remote peer
    pub fn send(&self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        debug!(
            "Sending {} bytes on data connection {}",
            data.len(),
            self.inner.connection_id
        );
        self.inner.handle.send(data)?;
        Ok(())
    }

    /// Close the underlying channel
    pub fn close(&self) {
        debug!("Closing data connection {}", self.inner.connection_id);
        self.inner.handle.close();
    }

    /// Read the provider-side properties as they are right now
    pub fn properties(&self) -> DataConnectionProperties {
        let handle = &self.inner.handle;
        DataConnectionProperties {
            label: handle.label(),
            metadata: handle.metadata(),
            open: handle.is_open(),
            peer: handle.peer(),
            reliable: handle.reliable(),
            serialization: handle.serialization(),
        }
    }

    /// Whether both values wrap the same channel
    pub fn same_connection(&self, other: &DataConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DataConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataConnection")
            .field("connection_id", &self.inner.connection_id)
            .field("peer", &self.inner.handle.peer())
            .finish()
    }
}

/// Provider-side emitter for a data connection's events
pub struct DataChannelEvents {
    incoming: Subject<ChannelMessage>,
}

impl DataChannelEvents {
    /// A payload arrived from the remote side
    pub fn data(&self, data: impl Into<Bytes>) -> bool {
        self.incoming.next(Ok(data.into()))
    }

    /// The channel failed; ends every subscription after delivering the error
    pub fn error(&self, error: ChannelError) {
        if self.incoming.next(Err(error)) {
            self.incoming.complete();
        }
    }

    /// The channel closed cleanly
    pub fn close(&self) {
        self.incoming.complete();
    }

    /// Whether any subscriber is listening
    pub fn is_observed(&self) -> bool {
        self.incoming.is_observed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockChannel {
        open: AtomicBool,
        closed: AtomicBool,
        sent: Mutex<Vec<Bytes>>,
    }

    impl DataChannelHandle for MockChannel {
        fn label(&self) -> String {
            "chat".to_string()
        }
        fn metadata(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "room": "lobby" }))
        }
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
        fn peer(&self) -> String {
            "remote-peer".to_string()
        }
        fn reliable(&self) -> bool {
            true
        }
        fn serialization(&self) -> Serialization {
            Serialization::Json
        }
        fn send(&self, data: Bytes) -> std::result::Result<(), ChannelError> {
            self.sent.lock().push(data);
            Ok(())
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn wrap() -> (Arc<MockChannel>, DataConnection, DataChannelEvents) {
        let handle = Arc::new(MockChannel::default());
        let (connection, events) = DataConnection::new(handle.clone());
        (handle, connection, events)
    }

    #[tokio::test]
    async fn test_forwards_incoming_data() {
        let (_handle, connection, events) = wrap();
        let mut incoming = connection.subscribe();

        events.data(Bytes::from_static(b"hello"));
        assert_eq!(incoming.next().await, Some(Ok(Bytes::from_static(b"hello"))));
    }

    #[tokio::test]
    async fn test_close_completes_stream() {
        let (_handle, connection, events) = wrap();
        let incoming = connection.subscribe();

        events.close();
        let items: Vec<ChannelMessage> = incoming.collect().await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let (_handle, connection, events) = wrap();
        let incoming = connection.subscribe();

        events.error(ChannelError::new("ice failed"));
        assert!(!events.data(Bytes::from_static(b"late")));

        let items: Vec<ChannelMessage> = incoming.collect().await;
        assert_eq!(items, vec![Err(ChannelError::new("ice failed"))]);
    }

    #[tokio::test]
    async fn test_send_and_close_reach_handle() {
        let (handle, connection, _events) = wrap();

        connection.send(&b"ping"[..]).unwrap();
        connection.close();

        assert_eq!(handle.sent.lock().as_slice(), &[Bytes::from_static(b"ping")]);
        assert!(handle.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_properties_are_read_live() {
        let (handle, connection, _events) = wrap();
        assert!(!connection.properties().open);

        handle.open.store(true, Ordering::SeqCst);
        let props = connection.properties();
        assert!(props.open);
        assert_eq!(props.label, "chat");
        assert_eq!(props.peer, "remote-peer");
        assert_eq!(props.serialization, Serialization::Json);
        assert_eq!(props.metadata, Some(serde_json::json!({ "room": "lobby" })));
    }

    #[test]
    fn test_identity() {
        let (_handle, connection, _events) = wrap();
        let (_other_handle, other, _other_events) = wrap();

        assert!(connection.same_connection(&connection.clone()));
        assert!(!connection.same_connection(&other));
        assert_ne!(connection.connection_id(), other.connection_id());
    }
}
