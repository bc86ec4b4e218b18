//! Media connection wrapper

use crate::error::ChannelError;
use crate::reactive::{Subject, Subscription};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Kind of track carried by a media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Opaque descriptor of a local or remote media stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    id: String,
    tracks: Vec<TrackKind>,
}

impl MediaStream {
    /// Create a stream descriptor
    pub fn new(id: impl Into<String>, tracks: Vec<TrackKind>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    /// Audio-only stream
    pub fn audio(id: impl Into<String>) -> Self {
        Self::new(id, vec![TrackKind::Audio])
    }

    /// Audio + video stream
    pub fn audio_video(id: impl Into<String>) -> Self {
        Self::new(id, vec![TrackKind::Audio, TrackKind::Video])
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[TrackKind] {
        &self.tracks
    }

    pub fn has_video(&self) -> bool {
        self.tracks.contains(&TrackKind::Video)
    }
}

/// Item delivered to media connection subscribers
pub type MediaMessage = std::result::Result<MediaStream, ChannelError>;

/// Provider-side media call the wrapper reads from
pub trait MediaCallHandle: Send + Sync {
    /// Metadata attached by the calling side
    fn metadata(&self) -> Option<serde_json::Value>;

    /// Whether the call is currently established
    fn is_open(&self) -> bool;

    /// Remote peer id
    fn peer(&self) -> String;

    /// Hang up
    fn close(&self);
}

/// Snapshot of a media call's provider-side properties
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaConnectionProperties {
    pub metadata: Option<serde_json::Value>,
    pub open: bool,
    pub peer: String,
}

struct MediaInner {
    connection_id: String,
    handle: Arc<dyn MediaCallHandle>,
    remote_streams: Subject<MediaMessage>,
}

/// Stream of remote media for one answered or placed call
#[derive(Clone)]
pub struct MediaConnection {
    inner: Arc<MediaInner>,
}

impl MediaConnection {
    /// Wrap a provider media call
    pub fn new(handle: Arc<dyn MediaCallHandle>) -> (Self, MediaCallEvents) {
        let remote_streams = Subject::new();
        let connection = Self {
            inner: Arc::new(MediaInner {
                connection_id: uuid::Uuid::new_v4().to_string(),
                handle,
                remote_streams: remote_streams.clone(),
            }),
        };
        (connection, MediaCallEvents { remote_streams })
    }

    /// Unique identifier of this wrapper instance
    pub fn connection_id(&self) -> &str {
        &self.inner.connection_id
    }

    /// Remote peer id
    pub fn peer(&self) -> String {
        self.inner.handle.peer()
    }

    /// Subscribe to remote media streams
    pub fn subscribe(&self) -> Subscription<MediaMessage> {
        self.inner.remote_streams.subscribe()
    }

    /// Hang up the call
    pub fn close(&self) {
        debug!("Closing media connection {}", self.inner.connection_id);
        self.inner.handle.close();
    }

    /// Read the provider-side properties as they are right now
    pub fn properties(&self) -> MediaConnectionProperties {
        let handle = &self.inner.handle;
        MediaConnectionProperties {
            metadata: handle.metadata(),
            open: handle.is_open(),
            peer: handle.peer(),
        }
    }

    /// Whether both values wrap the same call
    pub fn same_connection(&self, other: &MediaConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaConnection")
            .field("connection_id", &self.inner.connection_id)
            .field("peer", &self.inner.handle.peer())
            .finish()
    }
}

/// Provider-side emitter for a media call's events
pub struct MediaCallEvents {
    remote_streams: Subject<MediaMessage>,
}

impl MediaCallEvents {
    /// The remote side started sending a stream
    pub fn stream(&self, stream: MediaStream) -> bool {
        self.remote_streams.next(Ok(stream))
    }

    /// The call failed
    pub fn error(&self, error: ChannelError) {
        if self.remote_streams.next(Err(error)) {
            self.remote_streams.complete();
        }
    }

    /// The call ended
    pub fn close(&self) {
        self.remote_streams.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockCall {
        open: AtomicBool,
    }

    impl MediaCallHandle for MockCall {
        fn metadata(&self) -> Option<serde_json::Value> {
            None
        }
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
        fn peer(&self) -> String {
            "caller".to_string()
        }
        fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_forwards_remote_streams() {
        let (connection, events) = MediaConnection::new(Arc::new(MockCall::default()));
        let mut remote = connection.subscribe();

        events.stream(MediaStream::audio_video("cam"));
        let stream = remote.next().await.unwrap().unwrap();
        assert_eq!(stream.id(), "cam");
        assert!(stream.has_video());
    }

    #[tokio::test]
    async fn test_close_and_error_complete_stream() {
        let (connection, events) = MediaConnection::new(Arc::new(MockCall::default()));
        let remote = connection.subscribe();

        events.error(ChannelError::new("dtls"));
        events.close();

        let items: Vec<MediaMessage> = remote.collect().await;
        assert_eq!(items, vec![Err(ChannelError::new("dtls"))]);
    }

    #[test]
    fn test_properties_are_read_live() {
        let handle = Arc::new(MockCall::default());
        let (connection, _events) = MediaConnection::new(handle.clone());
        assert!(!connection.properties().open);

        handle.open.store(true, Ordering::SeqCst);
        assert!(connection.properties().open);

        connection.close();
        assert!(!connection.properties().open);
        assert_eq!(connection.properties().peer, "caller");
    }
}
