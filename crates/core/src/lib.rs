//! Reactive peer-to-peer session core
//!
//! This crate turns the event/command channel of a peer-connection provider
//! into two independently observable streams:
//!
//! - a **connection state** stream (`Connecting`, `Open`, `Closed`, `Errored`)
//!   with automatic reconnection on transient disconnects, and
//! - a **peer registry** stream: the ordered list of remote peers seen so far,
//!   each carrying its negotiated data channel and/or media call.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  PeerSession                                             │
//! │  ├─ state: ReplayLatest<ConnectionState>                 │
//! │  ├─ peers: PeerRegistry (ReplayLatest<Vec<PeerEntry>>)   │
//! │  ├─ CommandRouter ──────────────┐                        │
//! │  └─ event loop task             │ Command                │
//! │        ▲ RawEvent               ▼                        │
//! │  RawChannel { events, commands }                         │
//! │        ▲                        │                        │
//! │  ProviderChannelFactory (adapter over a Provider)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use peerstream_core::{ReopenPolicy, SessionConfig};
//!
//! let config = SessionConfig {
//!     peer_id: Some("alice".to_string()),
//!     reopen: ReopenPolicy::Rebuild,
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! ```

#![warn(clippy::all)]

pub mod channels;
pub mod config;
pub mod error;
pub mod peer;
pub mod raw;
pub mod reactive;
pub mod session;

pub use channels::{
    ChannelMessage, DataChannelEvents, DataChannelHandle, DataConnection,
    DataConnectionProperties, MediaCallEvents, MediaCallHandle, MediaConnection,
    MediaConnectionProperties, MediaMessage, MediaStream, Serialization, TrackKind,
};
pub use config::{ProviderOptions, ReopenPolicy, SessionConfig, TurnServerConfig};
pub use error::{ChannelError, Error, ProviderError, ProviderErrorKind, Result};
pub use peer::{CallSlot, PeerEntry, PeerRegistry, PendingCall};
pub use raw::{
    Answer, CallOffer, CallOptions, Command, CommandSink, ConnectOptions, Connector,
    EventEmitter, Provider, ProviderChannelFactory, ProviderEvent, RawChannel,
    RawChannelFactory, RawEvent, Reconnect,
};
pub use reactive::{ReplayLatest, Subject, Subscription, WeakReplayLatest};
pub use session::{ConnectionState, PeerSession, Reopen, StateTag};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
    }
}
