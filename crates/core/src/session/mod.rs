//! Peer session: connection state machine, command routing and teardown
//!
//! [`PeerSession`] consumes one [`RawChannel`](crate::raw::RawChannel) at a
//! time. Its events are folded into [`ConnectionState`] values and, for
//! incoming data channels and calls, into the [`PeerRegistry`](crate::peer::PeerRegistry).
//! All of that happens on one spawned task, so events are applied strictly in
//! arrival order.

mod peer_session;
mod router;
mod state;

pub use peer_session::PeerSession;
pub use state::{ConnectionState, Reopen, StateTag};
