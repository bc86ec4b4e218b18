//! In-process loopback provider for PeerStream
//!
//! [`LoopbackNetwork`] plays the signalling server: every session whose raw
//! channel was created through [`LoopbackNetwork::factory`] registers on the
//! same in-memory hub and can open data channels to, or call, the others.
//! Data and media never leave the process.
//!
//! Useful for tests and demos, and as a reference for wiring a real provider
//! behind [`peerstream_core::Connector`].
//!
//! # Example
//!
//! ```no_run
//! use peerstream_core::{ConnectOptions, PeerSession, SessionConfig};
//! use peerstream_loopback::LoopbackNetwork;
//!
//! # async fn demo() -> peerstream_core::Result<()> {
//! let network = LoopbackNetwork::new();
//!
//! let alice = PeerSession::new(
//!     SessionConfig { peer_id: Some("alice".into()), ..Default::default() },
//!     network.factory(),
//! )?;
//! let _bob = PeerSession::new(
//!     SessionConfig { peer_id: Some("bob".into()), ..Default::default() },
//!     network.factory(),
//! )?;
//!
//! alice.connect("bob", ConnectOptions::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

mod channel;
pub mod error;
mod network;
mod provider;

pub use error::{Error, Result};
pub use network::LoopbackNetwork;
pub use provider::LoopbackProvider;
