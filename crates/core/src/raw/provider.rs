//! Raw channel adapter over a peer-connection provider

use super::command::{CallOptions, Command, CommandSink, ConnectOptions};
use super::event::{CallOffer, RawEvent, Reconnect};
use super::{RawChannel, RawChannelFactory, RawItem};
use crate::channels::DataConnection;
use crate::config::ProviderOptions;
use crate::error::ProviderError;
use futures::stream;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Event reported by a provider
#[derive(Debug)]
pub enum ProviderEvent {
    /// Registered with the signalling server under this id
    Open(String),
    /// A remote peer opened a data channel to us (or ours is ready)
    Connection(DataConnection),
    /// A call was offered
    Call(CallOffer),
    /// Lost the signalling server; `Provider::reconnect` restores it
    Disconnected,
    /// Fatal provider failure
    Error(ProviderError),
    /// The provider shut down
    Close,
}

/// Handle a provider uses to report its events
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<ProviderEvent>,
}

impl EventEmitter {
    /// Emitter plus the receiving end it reports to
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProviderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report an event; `false` once nobody consumes this registration
    pub fn emit(&self, event: ProviderEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn open(&self, peer_id: impl Into<String>) -> bool {
        self.emit(ProviderEvent::Open(peer_id.into()))
    }

    pub fn connection(&self, connection: DataConnection) -> bool {
        self.emit(ProviderEvent::Connection(connection))
    }

    pub fn call(&self, offer: CallOffer) -> bool {
        self.emit(ProviderEvent::Call(offer))
    }

    pub fn disconnected(&self) -> bool {
        self.emit(ProviderEvent::Disconnected)
    }

    pub fn error(&self, error: ProviderError) -> bool {
        self.emit(ProviderEvent::Error(error))
    }

    pub fn close(&self) -> bool {
        self.emit(ProviderEvent::Close)
    }

    /// Whether the consuming side is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A live provider registration
pub trait Provider: Send + Sync {
    /// Open a data channel to `peer_id`
    fn connect(
        &self,
        peer_id: &str,
        options: &ConnectOptions,
    ) -> std::result::Result<DataConnection, ProviderError>;

    /// Place a call to `peer_id`; answering the returned offer attaches the
    /// local stream
    fn call(
        &self,
        peer_id: &str,
        options: &CallOptions,
    ) -> std::result::Result<CallOffer, ProviderError>;

    /// Re-establish the signalling link after `Disconnected`
    fn reconnect(&self);

    /// Leave the signalling server, keeping existing peer connections
    fn disconnect(&self);

    /// Tear everything down
    fn destroy(&self);
}

/// Starts provider registrations
pub trait Connector: Send + Sync {
    /// Begin negotiating with the provider; outcomes arrive through `events`
    fn open(
        &self,
        peer_id: Option<&str>,
        options: &ProviderOptions,
        events: EventEmitter,
    ) -> Arc<dyn Provider>;
}

/// `RawChannelFactory` that registers through a `Connector`
pub struct ProviderChannelFactory<C> {
    connector: C,
}

impl<C: Connector> ProviderChannelFactory<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> RawChannelFactory for ProviderChannelFactory<C> {
    #[instrument(skip(self, options))]
    fn register(&self, peer_id: Option<&str>, options: &ProviderOptions) -> RawChannel {
        let (emitter, rx) = EventEmitter::channel();
        let provider = self.connector.open(peer_id, options, emitter.clone());

        info!("Registered raw channel with provider");

        let shared = Arc::new(Registration {
            provider,
            emitter,
            state: Mutex::new(RegistrationState::default()),
        });

        RawChannel::new(
            translate(rx, Arc::clone(&shared)),
            Arc::new(RegistrationCommands { shared }),
        )
    }
}

#[derive(Default)]
struct RegistrationState {
    /// Provider has reported `Open` and not `Disconnected` since
    open: bool,
    /// Commands waiting for `open`
    pending: Vec<Command>,
    /// `complete` has been called
    completed: bool,
}

struct Registration {
    provider: Arc<dyn Provider>,
    emitter: EventEmitter,
    state: Mutex<RegistrationState>,
}

impl Registration {
    fn mark_open(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.open = true;
            std::mem::take(&mut state.pending)
        };

        if !pending.is_empty() {
            debug!("Flushing {} queued command(s)", pending.len());
        }
        for command in pending {
            self.execute(command);
        }
    }

    fn mark_disconnected(&self) {
        self.state.lock().open = false;
    }

    fn execute(&self, command: Command) {
        match command {
            Command::Connect { peer_id, options } => {
                match self.provider.connect(&peer_id, &options) {
                    Ok(connection) => {
                        self.emitter.connection(connection);
                    }
                    Err(e) => warn!("Failed to connect to peer {}: {}", peer_id, e),
                }
            }
            Command::Call { peer_id, options } => match self.provider.call(&peer_id, &options) {
                Ok(offer) => {
                    self.emitter.call(offer);
                }
                Err(e) => warn!("Failed to call peer {}: {}", peer_id, e),
            },
        }
    }
}

struct RegistrationCommands {
    shared: Arc<Registration>,
}

impl CommandSink for RegistrationCommands {
    fn send(&self, command: Command) {
        {
            let mut state = self.shared.state.lock();
            if state.completed {
                warn!("Dropping {:?} sent after completion", command);
                return;
            }
            if !state.open {
                debug!("Provider not open yet, queueing command for {}", command.peer_id());
                state.pending.push(command);
                return;
            }
        }
        self.shared.execute(command);
    }

    fn complete(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            state.pending.clear();
        }

        info!("Completing raw channel: disconnecting and destroying provider");
        self.shared.provider.disconnect();
        self.shared.provider.destroy();
    }
}

/// Map provider events onto raw events
///
/// `Error` yields one `Err` item and ends the stream; `Close` ends it
/// cleanly. Both destroy the provider.
fn translate(
    rx: mpsc::UnboundedReceiver<ProviderEvent>,
    shared: Arc<Registration>,
) -> impl futures::Stream<Item = RawItem> + Send + 'static {
    stream::unfold(Some((rx, shared)), |state| async move {
        let (mut rx, shared) = state?;
        let event = rx.recv().await?;

        let item = match event {
            ProviderEvent::Open(peer_id) => {
                shared.mark_open();
                Ok(RawEvent::Open { peer_id })
            }
            ProviderEvent::Disconnected => {
                shared.mark_disconnected();
                let provider = Arc::clone(&shared.provider);
                Ok(RawEvent::Disconnected {
                    reconnect: Reconnect::new(move || provider.reconnect()),
                })
            }
            ProviderEvent::Connection(connection) => Ok(RawEvent::Connection {
                peer_id: connection.peer(),
                connection,
            }),
            ProviderEvent::Call(offer) => Ok(RawEvent::Call {
                peer_id: offer.peer_id,
                answer: offer.answer,
            }),
            ProviderEvent::Error(error) => {
                warn!("Provider error: {}", error);
                shared.provider.destroy();
                return Some((Err(error), None));
            }
            ProviderEvent::Close => {
                info!("Provider closed");
                shared.provider.destroy();
                return None;
            }
        };

        Some((item, Some((rx, shared))))
    })
}
