//! Process-local signalling hub

use crate::error::{Error, Result};
use crate::provider::LoopbackProvider;
use parking_lot::Mutex;
use peerstream_core::{
    Connector, EventEmitter, Provider, ProviderChannelFactory, ProviderError, ProviderOptions,
    RawChannelFactory,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Registered peers by id
#[derive(Default)]
pub(crate) struct Hub {
    members: Mutex<HashMap<String, Arc<LoopbackProvider>>>,
}

impl Hub {
    pub(crate) fn member(&self, peer_id: &str) -> Option<Arc<LoopbackProvider>> {
        self.members.lock().get(peer_id).cloned()
    }

    /// Remove `peer_id` if it is still held by `provider`
    pub(crate) fn remove(&self, peer_id: &str, provider: &LoopbackProvider) {
        let mut members = self.members.lock();
        let owned = members
            .get(peer_id)
            .is_some_and(|member| std::ptr::eq(Arc::as_ptr(member), provider));
        if owned {
            members.remove(peer_id);
        }
    }
}

/// In-memory stand-in for a signalling server and the peers behind it
///
/// Every provider opened through the same network can reach the others by
/// id. Cheap to clone; clones share one hub.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    hub: Arc<Hub>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw channel factory registering peers on this network
    pub fn factory(&self) -> Arc<dyn RawChannelFactory> {
        Arc::new(ProviderChannelFactory::new(self.clone()))
    }

    /// Ids of the peers currently connected, sorted
    pub fn online_peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .hub
            .members
            .lock()
            .values()
            .filter(|member| member.is_online())
            .map(|member| member.id().to_string())
            .collect();
        peers.sort();
        peers
    }

    /// Whether `peer_id` is registered (online or not)
    pub fn contains(&self, peer_id: &str) -> bool {
        self.hub.members.lock().contains_key(peer_id)
    }

    /// Drop `peer_id`'s signalling link, as if the server went away
    pub fn disconnect_peer(&self, peer_id: &str) -> Result<()> {
        self.require(peer_id)?.disconnect();
        Ok(())
    }

    /// Shut `peer_id`'s provider down cleanly
    pub fn close_peer(&self, peer_id: &str) -> Result<()> {
        self.require(peer_id)?.destroy();
        Ok(())
    }

    /// Report a provider failure to `peer_id`
    pub fn fail_peer(&self, peer_id: &str, error: ProviderError) -> Result<()> {
        let member = self.require(peer_id)?;
        warn!("Injecting failure into {}: {}", peer_id, error);
        member.events().error(error);
        Ok(())
    }

    fn require(&self, peer_id: &str) -> Result<Arc<LoopbackProvider>> {
        self.hub
            .member(peer_id)
            .ok_or_else(|| Error::UnknownPeer(peer_id.to_string()))
    }
}

/// Requested id, or a fresh random one
fn assign_id(requested: Option<&str>) -> Result<String> {
    match requested {
        Some(id) if id.is_empty() || id.chars().any(char::is_whitespace) => {
            Err(Error::InvalidId(id.to_string()))
        }
        Some(id) => Ok(id.to_string()),
        None => Ok(format!("peer-{}", uuid::Uuid::new_v4().simple())),
    }
}

impl Connector for LoopbackNetwork {
    #[instrument(skip(self, options, events))]
    fn open(
        &self,
        peer_id: Option<&str>,
        options: &ProviderOptions,
        events: EventEmitter,
    ) -> Arc<dyn Provider> {
        if options.debug > 0 {
            debug!(
                "Loopback ignores signalling options (host {:?}, port {:?}, {} ICE servers)",
                options.host,
                options.port,
                options.ice_servers.len()
            );
        }

        let hub = Arc::downgrade(&self.hub);

        let joined = assign_id(peer_id).and_then(|id| {
            let mut members = self.hub.members.lock();
            if members.contains_key(&id) {
                return Err(Error::IdTaken(id));
            }
            let provider = Arc::new(LoopbackProvider::new(
                id.clone(),
                hub.clone(),
                events.clone(),
                true,
            ));
            members.insert(id, Arc::clone(&provider));
            Ok(provider)
        });

        match joined {
            Ok(provider) => {
                info!("Peer {} joined loopback hub", provider.id());
                provider.events().open(provider.id());
                provider
            }
            Err(e) => {
                warn!("Loopback registration failed: {}", e);
                let id = peer_id.unwrap_or_default().to_string();
                let provider = Arc::new(LoopbackProvider::new(id, hub, events, false));
                provider.events().error(e.into());
                provider
            }
        }
    }
}
