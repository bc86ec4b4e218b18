//! Error types for the loopback provider

use peerstream_core::{ProviderError, ProviderErrorKind};

/// Result type alias using the loopback Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the loopback hub
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No online peer with this id
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// Another provider already holds this id
    #[error("Peer id already taken: {0}")]
    IdTaken(String),

    /// The local provider is not registered with the hub
    #[error("Not registered: {0}")]
    NotRegistered(String),

    /// The requested id cannot be used
    #[error("Invalid peer id: {0:?}")]
    InvalidId(String),
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::UnknownPeer(_) => ProviderErrorKind::PeerUnavailable,
            Error::IdTaken(_) => ProviderErrorKind::UnavailableId,
            Error::NotRegistered(_) => ProviderErrorKind::Disconnected,
            Error::InvalidId(_) => ProviderErrorKind::InvalidId,
        };
        ProviderError::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_provider_error() {
        let err: ProviderError = Error::UnknownPeer("bob".to_string()).into();
        assert_eq!(err.kind, ProviderErrorKind::PeerUnavailable);
        assert!(!err.is_fatal());
        assert_eq!(err.message, "Unknown peer: bob");

        let err: ProviderError = Error::IdTaken("alice".to_string()).into();
        assert_eq!(err.kind, ProviderErrorKind::UnavailableId);
        assert!(err.is_fatal());
    }
}
