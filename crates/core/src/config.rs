//! Configuration types for a peer session

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for `PeerSession`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Requested local peer id (provider-assigned if None)
    pub peer_id: Option<String>,

    /// Options handed to the provider when a raw channel is registered
    pub provider: ProviderOptions,

    /// What `reopen` on a `Closed`/`Errored` state does (default: Inert)
    pub reopen: ReopenPolicy,
}

/// Provider configuration
///
/// Only the fields the core validates are typed; everything else a provider
/// understands goes through `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Signalling server host (provider default if None)
    pub host: Option<String>,

    /// Signalling server port (provider default if None)
    pub port: Option<u16>,

    /// Signalling server path (default: "/")
    pub path: String,

    /// Use TLS for signalling (default: true)
    pub secure: bool,

    /// API key for the signalling server
    pub key: Option<String>,

    /// STUN server URLs
    pub ice_servers: Vec<String>,

    /// TURN server configurations
    pub turn_servers: Vec<TurnServerConfig>,

    /// Provider log verbosity (0-3, default: 0)
    pub debug: u8,

    /// Opaque provider-specific options
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// TURN server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Behaviour of the `reopen` capability carried by terminal states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReopenPolicy {
    /// `reopen` does nothing; construct a new session to start over
    #[default]
    Inert,
    /// `reopen` registers a fresh raw channel and keeps the peer registry
    Rebuild,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            path: "/".to_string(),
            secure: true,
            key: None,
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            turn_servers: Vec::new(),
            debug: 0,
            extra: serde_json::Map::new(),
        }
    }
}

impl ProviderOptions {
    /// Validate provider options
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `port` is 0
    /// - `path` does not start with `/`
    /// - an ICE server URL is not `stun:`, `turn:` or `turns:`
    /// - a TURN server URL is not `turn:` or `turns:`
    /// - `debug` is greater than 3
    pub fn validate(&self) -> Result<()> {
        if self.port == Some(0) {
            return Err(Error::InvalidConfig("port must be non-zero".to_string()));
        }

        if !self.path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "path must start with /, got {}",
                self.path
            )));
        }

        for url in &self.ice_servers {
            if !["stun:", "turn:", "turns:"].iter().any(|s| url.starts_with(s)) {
                return Err(Error::InvalidConfig(format!(
                    "ice server must start with stun:, turn: or turns:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "turn server must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        if self.debug > 3 {
            return Err(Error::InvalidConfig(format!(
                "debug must be in range 0-3, got {}",
                self.debug
            )));
        }

        Ok(())
    }
}

impl SessionConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if `peer_id` is present but empty or contains
    /// whitespace, or if the provider options are invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(peer_id) = &self.peer_id {
            if peer_id.is_empty() || peer_id.chars().any(char::is_whitespace) {
                return Err(Error::InvalidConfig(format!(
                    "peer_id must be non-empty without whitespace, got {:?}",
                    peer_id
                )));
            }
        }

        self.provider.validate()
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; `.json` files are parsed as JSON, anything else
    /// as TOML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&source),
            _ => Self::from_toml_str(&source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reopen, ReopenPolicy::Inert);
        assert_eq!(config.provider.path, "/");
    }

    #[test]
    fn test_rejects_blank_peer_id() {
        let config = SessionConfig {
            peer_id: Some("bad id".to_string()),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_config_error());

        let config = SessionConfig {
            peer_id: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_provider_options() {
        let mut options = ProviderOptions {
            port: Some(0),
            ..Default::default()
        };
        assert!(options.validate().is_err());

        options.port = Some(9000);
        options.ice_servers = vec!["http://example.com".to_string()];
        assert!(options.validate().is_err());

        options.ice_servers = vec!["turns:relay.example.com:443".to_string()];
        options.turn_servers = vec![TurnServerConfig {
            url: "stun:relay.example.com".to_string(),
            username: "u".to_string(),
            credential: "c".to_string(),
        }];
        assert!(options.validate().is_err());

        options.turn_servers.clear();
        options.debug = 4;
        assert!(options.validate().is_err());

        options.debug = 3;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = SessionConfig::from_toml_str(
            r#"
            peer_id = "alice"
            reopen = "rebuild"

            [provider]
            host = "signal.example.com"
            port = 9000
            secure = false
            debug = 2

            [provider.extra]
            pingInterval = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.peer_id.as_deref(), Some("alice"));
        assert_eq!(config.reopen, ReopenPolicy::Rebuild);
        assert_eq!(config.provider.host.as_deref(), Some("signal.example.com"));
        assert_eq!(config.provider.port, Some(9000));
        assert!(!config.provider.secure);
        assert_eq!(config.provider.path, "/");
        assert_eq!(
            config.provider.extra.get("pingInterval"),
            Some(&serde_json::json!(5000))
        );
    }

    #[test]
    fn test_from_toml_str_validates() {
        let err = SessionConfig::from_toml_str("[provider]\ndebug = 9\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = SessionConfig::from_toml_str("peer_id = [").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "peer_id = \"bob\"").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.peer_id.as_deref(), Some("bob"));

        let missing = SessionConfig::from_file("/nonexistent/peerstream.toml");
        assert!(matches!(missing, Err(Error::Io(_))));
    }

    #[test]
    fn test_from_json_str() {
        let config = SessionConfig::from_json_str(
            r#"{ "peer_id": "carol", "reopen": "rebuild", "provider": { "port": 9443 } }"#,
        )
        .unwrap();
        assert_eq!(config.peer_id.as_deref(), Some("carol"));
        assert_eq!(config.reopen, ReopenPolicy::Rebuild);
        assert_eq!(config.provider.port, Some(9443));

        let err = SessionConfig::from_json_str("{ \"peer_id\": ").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));

        let err = SessionConfig::from_json_str(r#"{ "peer_id": "" }"#).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{ "peer_id": "dave" }}"#).unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.peer_id.as_deref(), Some("dave"));
    }
}
