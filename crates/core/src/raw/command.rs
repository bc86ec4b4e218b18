//! Commands accepted by a raw channel

use crate::channels::Serialization;
use serde::{Deserialize, Serialize};

/// Options for opening a data channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Channel label (provider-generated if None)
    pub label: Option<String>,

    /// Metadata delivered to the remote side
    pub metadata: Option<serde_json::Value>,

    /// Payload serialization
    pub serialization: Option<Serialization>,

    /// Reliable/ordered delivery
    pub reliable: Option<bool>,
}

/// Options for placing a call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOptions {
    /// Metadata delivered to the remote side
    pub metadata: Option<serde_json::Value>,
}

/// Command sent down to a raw channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Open a data channel to `peer_id`
    Connect {
        peer_id: String,
        #[serde(default)]
        options: ConnectOptions,
    },

    /// Place a call to `peer_id`
    Call {
        peer_id: String,
        #[serde(default)]
        options: CallOptions,
    },
}

impl Command {
    /// Target peer of the command
    pub fn peer_id(&self) -> &str {
        match self {
            Command::Connect { peer_id, .. } | Command::Call { peer_id, .. } => peer_id,
        }
    }
}

/// Build a `Connect` command
pub fn connect(peer_id: impl Into<String>, options: ConnectOptions) -> Command {
    Command::Connect {
        peer_id: peer_id.into(),
        options,
    }
}

/// Build a `Call` command
pub fn call(peer_id: impl Into<String>, options: CallOptions) -> Command {
    Command::Call {
        peer_id: peer_id.into(),
        options,
    }
}

/// Receiving half of a raw channel's command surface
pub trait CommandSink: Send + Sync {
    /// Execute (or queue) a command
    fn send(&self, command: Command);

    /// Shut the registration down (disconnect and dispose of the provider)
    fn complete(&self);
}
