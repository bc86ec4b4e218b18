//! Registry of remote peers seen by a session
//!
//! Each remote peer gets one [`PeerEntry`] the first time a data channel or a
//! call referencing it arrives. Later events for the same peer merge into the
//! existing entry in place; entries are never removed.

mod entry;
mod registry;

pub use entry::{CallSlot, PeerEntry, PendingCall};
pub use registry::{merge_answered, merge_call, merge_data_channel, PeerRegistry};
