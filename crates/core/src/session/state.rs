//! Connection lifecycle states

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Lifecycle state of a session
///
/// A transient disconnect is never observable on its own: the session
/// reconnects automatically and reports `Connecting` meanwhile.
#[derive(Debug, Clone)]
pub enum ConnectionState {
    /// Negotiating with the provider (initial state)
    Connecting,

    /// Registered; `peer_id` is the local identity
    Open { peer_id: String },

    /// The provider closed cleanly
    Closed { reopen: Reopen },

    /// The provider failed
    Errored { error: ProviderError, reopen: Reopen },

    /// Diagnostic for an event this version does not understand; not a
    /// lifecycle transition
    Debug { message: String },
}

impl ConnectionState {
    pub fn tag(&self) -> StateTag {
        match self {
            ConnectionState::Connecting => StateTag::Connecting,
            ConnectionState::Open { .. } => StateTag::Open,
            ConnectionState::Closed { .. } => StateTag::Closed,
            ConnectionState::Errored { .. } => StateTag::Error,
            ConnectionState::Debug { .. } => StateTag::Debug,
        }
    }

    /// Local identity, once open
    pub fn peer_id(&self) -> Option<&str> {
        match self {
            ConnectionState::Open { peer_id } => Some(peer_id),
            _ => None,
        }
    }

    /// Capability carried by `Closed` and `Errored`
    pub fn reopen(&self) -> Option<&Reopen> {
        match self {
            ConnectionState::Closed { reopen } | ConnectionState::Errored { reopen, .. } => {
                Some(reopen)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.reopen().is_some()
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Open { peer_id } => write!(f, "open ({})", peer_id),
            ConnectionState::Errored { error, .. } => write!(f, "error ({})", error),
            ConnectionState::Debug { message } => write!(f, "debug ({})", message),
            other => write!(f, "{}", other.tag()),
        }
    }
}

/// Payload-free discriminant of `ConnectionState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateTag {
    Connecting,
    Open,
    Closed,
    Error,
    Debug,
}

impl StateTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateTag::Connecting => "connecting",
            StateTag::Open => "open",
            StateTag::Closed => "closed",
            StateTag::Error => "error",
            StateTag::Debug => "debug",
        }
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control messages from capabilities back into the event loop
#[derive(Debug)]
pub(crate) enum Control {
    Rebuild { generation: u64 },
}

/// Capability to restart a closed or failed session
///
/// Inert unless the session was configured with `ReopenPolicy::Rebuild`.
/// Always safe to call, any number of times.
#[derive(Clone)]
pub struct Reopen {
    target: Option<ReopenTarget>,
}

#[derive(Clone)]
struct ReopenTarget {
    generation: u64,
    control: mpsc::UnboundedSender<Control>,
}

impl Reopen {
    /// A capability that does nothing
    pub fn inert() -> Self {
        Self { target: None }
    }

    pub(crate) fn rebuild(generation: u64, control: mpsc::UnboundedSender<Control>) -> Self {
        Self {
            target: Some(ReopenTarget {
                generation,
                control,
            }),
        }
    }

    pub fn is_inert(&self) -> bool {
        self.target.is_none()
    }

    /// Ask the session to register a fresh raw channel
    ///
    /// Ignored when inert, when the session is gone, or when a newer state
    /// has superseded the one this capability came with.
    pub fn invoke(&self) {
        match &self.target {
            Some(target) => {
                if target
                    .control
                    .send(Control::Rebuild {
                        generation: target.generation,
                    })
                    .is_err()
                {
                    debug!("Reopen ignored: session is gone");
                }
            }
            None => debug!("Reopen ignored: inert"),
        }
    }
}

impl fmt::Debug for Reopen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "Reopen(generation {})", target.generation),
            None => f.write_str("Reopen(inert)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;

    #[test]
    fn test_tags() {
        let error = ProviderError::new(ProviderErrorKind::Network, "lost");
        let states = [
            ConnectionState::Connecting,
            ConnectionState::Open {
                peer_id: "p1".to_string(),
            },
            ConnectionState::Closed {
                reopen: Reopen::inert(),
            },
            ConnectionState::Errored {
                error,
                reopen: Reopen::inert(),
            },
            ConnectionState::Debug {
                message: "?".to_string(),
            },
        ];
        let tags: Vec<String> = states.iter().map(|s| s.tag().to_string()).collect();
        assert_eq!(tags, vec!["connecting", "open", "closed", "error", "debug"]);
        assert_eq!(
            serde_json::to_string(&StateTag::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn test_terminal_states_carry_reopen() {
        assert!(ConnectionState::Connecting.reopen().is_none());
        assert!(ConnectionState::Closed {
            reopen: Reopen::inert()
        }
        .is_terminal());
        assert_eq!(
            ConnectionState::Open {
                peer_id: "me".to_string()
            }
            .peer_id(),
            Some("me")
        );
    }

    #[test]
    fn test_inert_reopen_is_callable() {
        let reopen = Reopen::inert();
        assert!(reopen.is_inert());
        reopen.invoke();
        reopen.invoke();
    }

    #[test]
    fn test_rebuild_reopen_sends_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reopen = Reopen::rebuild(3, tx);
        reopen.invoke();

        match rx.try_recv() {
            Ok(Control::Rebuild { generation }) => assert_eq!(generation, 3),
            other => panic!("unexpected control: {:?}", other),
        }

        drop(rx);
        reopen.invoke();
    }

    #[test]
    fn test_display() {
        let state = ConnectionState::Open {
            peer_id: "p1".to_string(),
        };
        assert_eq!(state.to_string(), "open (p1)");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
