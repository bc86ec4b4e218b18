//! Session orchestration: event loop, command routing and teardown

use super::router::{ActiveChannel, CommandRouter};
use super::state::{ConnectionState, Control, Reopen};
use crate::config::{ReopenPolicy, SessionConfig};
use crate::peer::{PeerEntry, PeerRegistry};
use crate::raw::{
    CallOptions, Command, ConnectOptions, RawChannelFactory, RawEvent, RawItem,
};
use crate::reactive::{ReplayLatest, Subscription};
use crate::{Error, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// A peer-to-peer session exposed as two observable streams
///
/// `state()` yields the connection lifecycle, `peers()` the registry of
/// remote peers. Both replay their latest value to new subscribers.
///
/// Dropping the session destroys it.
pub struct PeerSession {
    state: ReplayLatest<ConnectionState>,
    registry: PeerRegistry,
    router: CommandRouter,
    destroyed: Arc<AtomicBool>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PeerSession {
    /// Validate `config`, register the first raw channel and start the
    /// event loop
    ///
    /// Must be called within a tokio runtime.
    #[instrument(skip_all, fields(peer_id = ?config.peer_id))]
    pub fn new(config: SessionConfig, factory: Arc<dyn RawChannelFactory>) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::Other(anyhow::anyhow!("PeerSession requires a tokio runtime: {}", e))
        })?;

        let raw = factory.register(config.peer_id.as_deref(), &config.provider);

        let state = ReplayLatest::new(ConnectionState::Connecting);
        let registry = PeerRegistry::new();
        let router = CommandRouter::new(ActiveChannel::new(0, raw.commands));
        let destroyed = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let event_loop = EventLoop {
            config,
            factory,
            state: state.clone(),
            registry: registry.clone(),
            router: router.clone(),
            destroyed: Arc::clone(&destroyed),
            control_tx,
            generation: 0,
        };
        runtime.spawn(event_loop.run(raw.events, control_rx, shutdown_rx));

        info!("Peer session started");

        Ok(Self {
            state,
            registry,
            router,
            destroyed,
            shutdown_tx,
        })
    }

    /// Subscribe to connection states; the current state comes first
    pub fn state(&self) -> Subscription<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to peer snapshots; the current snapshot comes first
    pub fn peers(&self) -> Subscription<Vec<PeerEntry>> {
        self.registry.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn peer_snapshot(&self) -> Vec<PeerEntry> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Send a command to the raw channel that is live right now
    ///
    /// Commands submitted while reconnecting are subject to the raw
    /// channel's own queueing; nothing is replayed across a rebuild.
    pub fn submit(&self, command: Command) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(format!(
                "cannot send {} command for {}",
                match &command {
                    Command::Connect { .. } => "connect",
                    Command::Call { .. } => "call",
                },
                command.peer_id()
            )));
        }

        debug!("Submitting command for {}", command.peer_id());
        self.router.route(command);
        Ok(())
    }

    /// Open a data channel to `peer_id`
    pub fn connect(&self, peer_id: impl Into<String>, options: ConnectOptions) -> Result<()> {
        self.submit(crate::raw::connect(peer_id, options))
    }

    /// Place a call to `peer_id`
    pub fn call(&self, peer_id: impl Into<String>, options: CallOptions) -> Result<()> {
        self.submit(crate::raw::call(peer_id, options))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Tear the session down
    ///
    /// Stops all state and registry emissions, releases the raw channel's
    /// event stream and sends the completion signal downstream. Both streams
    /// keep replaying their last value. Later calls do nothing.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Destroying peer session");

        self.state.close();
        self.registry.close();
        let _ = self.shutdown_tx.try_send(());
        self.router.complete_current();
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// State owned by the spawned event loop
struct EventLoop {
    config: SessionConfig,
    factory: Arc<dyn RawChannelFactory>,
    state: ReplayLatest<ConnectionState>,
    registry: PeerRegistry,
    router: CommandRouter,
    destroyed: Arc<AtomicBool>,
    control_tx: mpsc::UnboundedSender<Control>,
    generation: u64,
}

impl EventLoop {
    async fn run(
        mut self,
        events: BoxStream<'static, RawItem>,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        debug!("Session event loop started");

        // None once the current raw channel has closed or failed
        let mut events = Some(events);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    debug!("Shutdown signal received");
                    break;
                }

                Some(control) = control_rx.recv() => {
                    if let Some(fresh) = self.handle_control(control, events.is_none()) {
                        events = Some(fresh);
                    }
                }

                item = next_item(&mut events) => {
                    if self.destroyed.load(Ordering::SeqCst) {
                        break;
                    }
                    if !self.handle_item(item) {
                        events = None;
                    }
                }
            }
        }

        debug!("Session event loop stopped");
    }

    /// Apply one raw channel item; `false` once the channel is finished
    fn handle_item(&mut self, item: Option<RawItem>) -> bool {
        match item {
            Some(Ok(event)) => {
                self.handle_event(event);
                true
            }
            Some(Err(error)) => {
                warn!("Raw channel failed: {}", error);
                self.state.publish(ConnectionState::Errored {
                    error,
                    reopen: self.reopen(),
                });
                false
            }
            None => {
                info!("Raw channel closed");
                let published = self.state.publish(ConnectionState::Closed {
                    reopen: self.reopen(),
                });
                if published {
                    self.router.complete_current();
                }
                false
            }
        }
    }

    fn handle_event(&mut self, event: RawEvent) {
        debug!("Raw event: {}", event.kind());

        match event {
            RawEvent::Open { peer_id } => {
                info!("Session open as {}", peer_id);
                self.state.publish(ConnectionState::Open { peer_id });
            }
            RawEvent::Disconnected { reconnect } => {
                info!("Disconnected from provider, reconnecting");
                if self.state.publish(ConnectionState::Connecting) {
                    reconnect.invoke();
                } else {
                    debug!("Session torn down, not reconnecting");
                }
            }
            RawEvent::Connection {
                peer_id,
                connection,
            } => {
                self.registry.upsert_data_channel(&peer_id, connection);
            }
            RawEvent::Call { peer_id, answer } => {
                self.registry.upsert_call(&peer_id, answer);
            }
            RawEvent::Unrecognized { kind, detail } => {
                self.state.publish(ConnectionState::Debug {
                    message: format!("unrecognized event {}: {}", kind, detail),
                });
            }
        }
    }

    /// Handle a control message; returns the new event stream on rebuild
    fn handle_control(
        &mut self,
        control: Control,
        finished: bool,
    ) -> Option<BoxStream<'static, RawItem>> {
        match control {
            Control::Rebuild { generation } => {
                if generation != self.generation || !finished {
                    debug!("Ignoring stale reopen for generation {}", generation);
                    return None;
                }
                if self.destroyed.load(Ordering::SeqCst) {
                    return None;
                }

                self.generation += 1;
                info!("Reopening session (generation {})", self.generation);

                let raw = self
                    .factory
                    .register(self.config.peer_id.as_deref(), &self.config.provider);
                let replaced = self
                    .router
                    .replace(ActiveChannel::new(self.generation, raw.commands));
                if let Some(previous) = replaced {
                    previous.complete_once();
                }

                // destroy() may have completed the previous channel while we
                // were registering
                if self.destroyed.load(Ordering::SeqCst) {
                    self.router.complete_current();
                    return None;
                }

                self.state.publish(ConnectionState::Connecting);
                Some(raw.events)
            }
        }
    }

    fn reopen(&self) -> Reopen {
        match self.config.reopen {
            ReopenPolicy::Inert => Reopen::inert(),
            ReopenPolicy::Rebuild => Reopen::rebuild(self.generation, self.control_tx.clone()),
        }
    }
}

async fn next_item(events: &mut Option<BoxStream<'static, RawItem>>) -> Option<RawItem> {
    match events {
        Some(stream) => stream.next().await,
        None => futures::future::pending().await,
    }
}
