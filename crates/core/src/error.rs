//! Error types for the PeerStream session core

use std::fmt;

/// Result type alias using the core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in session operations
///
/// Provider and channel failures never escape the session's event loop as
/// errors; they are folded into `ConnectionState` values. The variants here
/// surface from construction, configuration loading and lifecycle misuse.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation attempted after `destroy()`
    #[error("Session destroyed: {0}")]
    Destroyed(String),

    /// Peer-connection provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Data or media channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidConfig(_) | Error::ConfigParse(_))
    }

    /// Check if this error is a lifecycle misuse (caller error)
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self, Error::Destroyed(_))
    }
}

/// Category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// Lost or failed connection to the signalling server
    Network,
    /// Operation attempted while disconnected from the signalling server
    Disconnected,
    /// The remote peer does not exist or is unreachable
    PeerUnavailable,
    /// The requested local id is already taken
    UnavailableId,
    /// The requested local id is malformed
    InvalidId,
    /// The signalling server rejected the session
    ServerError,
    /// Signalling socket failure
    SocketError,
    /// Native WebRTC failure
    WebRtc,
    /// Anything else
    Other,
}

impl ProviderErrorKind {
    /// Wire-style name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Disconnected => "disconnected",
            ProviderErrorKind::PeerUnavailable => "peer-unavailable",
            ProviderErrorKind::UnavailableId => "unavailable-id",
            ProviderErrorKind::InvalidId => "invalid-id",
            ProviderErrorKind::ServerError => "server-error",
            ProviderErrorKind::SocketError => "socket-error",
            ProviderErrorKind::WebRtc => "webrtc",
            ProviderErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the peer-connection provider
///
/// Delivered as the terminal signal of a raw channel's event stream and
/// carried inside `ConnectionState::Errored`, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// Failure category
    pub kind: ProviderErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl ProviderError {
    /// Create a new provider error
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Check if the provider tears the session down after this error
    ///
    /// Peer-scoped failures (an unreachable remote) leave the local session
    /// usable; everything else destroys it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, ProviderErrorKind::PeerUnavailable)
    }
}

/// Error reported by a single data or media channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ChannelError {
    /// Human-readable detail
    pub message: String,
}

impl ChannelError {
    /// Create a new channel error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("test".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: test");
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(ProviderErrorKind::UnavailableId, "alice is taken");
        assert_eq!(err.to_string(), "unavailable-id: alice is taken");

        let wrapped = Error::from(err);
        assert_eq!(wrapped.to_string(), "Provider error: unavailable-id: alice is taken");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::InvalidConfig("x".to_string()).is_config_error());
        assert!(!Error::Destroyed("x".to_string()).is_config_error());
        assert!(Error::Destroyed("x".to_string()).is_lifecycle_error());
    }

    #[test]
    fn test_provider_error_is_fatal() {
        assert!(ProviderError::new(ProviderErrorKind::Network, "down").is_fatal());
        assert!(!ProviderError::new(ProviderErrorKind::PeerUnavailable, "bob").is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }
}
