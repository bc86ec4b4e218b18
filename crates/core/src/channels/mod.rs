//! Per-connection duplex wrappers
//!
//! Each negotiated data channel or media call is exposed as a stream of
//! incoming items plus a small set of outbound operations. These wrappers do
//! pure forwarding: the provider reports open/close/error/data through the
//! paired `*Events` emitter and the wrapper multicasts them to subscribers.
//!
//! # Overview
//!
//! - [`DataConnection`] - incoming `Bytes` stream, `send`, `close`
//! - [`MediaConnection`] - incoming remote [`MediaStream`]s
//! - [`DataConnectionProperties`] / [`MediaConnectionProperties`] - read-only
//!   projections of the provider handle, computed at access time
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//!
//! let mut incoming = connection.subscribe();
//! connection.send(bytes::Bytes::from_static(b"hello"))?;
//! while let Some(message) = incoming.next().await {
//!     println!("{:?}", message?);
//! }
//! ```

mod data_connection;
mod media_connection;

pub use data_connection::{
    ChannelMessage, DataChannelEvents, DataChannelHandle, DataConnection,
    DataConnectionProperties, Serialization,
};
pub use media_connection::{
    MediaCallEvents, MediaCallHandle, MediaConnection, MediaConnectionProperties, MediaMessage,
    MediaStream, TrackKind,
};
