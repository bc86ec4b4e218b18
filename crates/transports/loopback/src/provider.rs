//! One peer's registration with the loopback hub

use crate::channel::{CallLink, DataLink, OPENER, RECEIVER};
use crate::error::Error;
use crate::network::Hub;
use parking_lot::Mutex;
use peerstream_core::{
    Answer, CallOffer, CallOptions, ConnectOptions, DataConnection, EventEmitter, Provider,
    ProviderError,
};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

#[derive(Default)]
struct MemberState {
    /// Connected to the hub's signalling
    online: bool,
    destroyed: bool,
    data_links: Vec<Arc<DataLink>>,
    call_links: Vec<Arc<CallLink>>,
}

/// Provider handed out by `LoopbackNetwork`
pub struct LoopbackProvider {
    id: String,
    hub: Weak<Hub>,
    events: EventEmitter,
    state: Mutex<MemberState>,
}

impl LoopbackProvider {
    pub(crate) fn new(id: String, hub: Weak<Hub>, events: EventEmitter, online: bool) -> Self {
        Self {
            id,
            hub,
            events,
            state: Mutex::new(MemberState {
                online,
                destroyed: !online,
                ..Default::default()
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_online(&self) -> bool {
        let state = self.state.lock();
        state.online && !state.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub(crate) fn events(&self) -> &EventEmitter {
        &self.events
    }

    fn ensure_online(&self) -> crate::Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(Error::NotRegistered(self.id.clone()))
        }
    }

    fn remote(&self, peer_id: &str) -> crate::Result<Arc<LoopbackProvider>> {
        self.hub
            .upgrade()
            .and_then(|hub| hub.member(peer_id))
            .filter(|member| member.is_online())
            .ok_or_else(|| Error::UnknownPeer(peer_id.to_string()))
    }

    fn track_data(&self, link: &Arc<DataLink>) {
        self.state.lock().data_links.push(Arc::clone(link));
    }

    fn track_call(&self, link: &Arc<CallLink>) {
        self.state.lock().call_links.push(Arc::clone(link));
    }
}

impl Provider for LoopbackProvider {
    fn connect(
        &self,
        peer_id: &str,
        options: &ConnectOptions,
    ) -> std::result::Result<DataConnection, ProviderError> {
        self.ensure_online()?;
        let remote = self.remote(peer_id)?;

        let (local, remote_end, link) = DataLink::pair(&self.id, peer_id, options);
        self.track_data(&link);
        remote.track_data(&link);

        if !remote.events().connection(remote_end) {
            debug!("Peer {} is not consuming events", peer_id);
        }
        Ok(local)
    }

    fn call(
        &self,
        peer_id: &str,
        options: &CallOptions,
    ) -> std::result::Result<CallOffer, ProviderError> {
        self.ensure_online()?;
        let remote = self.remote(peer_id)?;

        let link = CallLink::new(&self.id, peer_id, options.metadata.clone());
        self.track_call(&link);
        remote.track_call(&link);

        let incoming = {
            let link = Arc::clone(&link);
            Answer::new(move |stream| link.answer(RECEIVER, stream))
        };
        remote.events().call(CallOffer::new(self.id.as_str(), incoming));

        let outgoing = Answer::new(move |stream| link.answer(OPENER, stream));
        Ok(CallOffer::new(peer_id, outgoing))
    }

    fn reconnect(&self) {
        {
            let mut state = self.state.lock();
            if state.destroyed {
                warn!("Cannot reconnect destroyed peer {}", self.id);
                return;
            }
            if state.online {
                debug!("Peer {} already online", self.id);
                return;
            }
            state.online = true;
        }

        info!("Peer {} reconnected to loopback hub", self.id);
        self.events.open(self.id.as_str());
    }

    fn disconnect(&self) {
        {
            let mut state = self.state.lock();
            if state.destroyed || !state.online {
                return;
            }
            state.online = false;
        }

        info!("Peer {} disconnected from loopback hub", self.id);
        self.events.disconnected();
    }

    fn destroy(&self) {
        let (data_links, call_links) = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.online = false;
            (
                std::mem::take(&mut state.data_links),
                std::mem::take(&mut state.call_links),
            )
        };

        info!("Destroying loopback peer {}", self.id);

        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.id, self);
        }
        for link in data_links {
            link.close();
        }
        for link in call_links {
            link.close();
        }

        self.events.close();
    }
}
