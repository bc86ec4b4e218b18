//! Routes commands to the raw channel that is currently live

use crate::raw::{Command, CommandSink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Command half of one registered raw channel
pub(crate) struct ActiveChannel {
    generation: u64,
    commands: Arc<dyn CommandSink>,
    completed: AtomicBool,
}

impl ActiveChannel {
    pub(crate) fn new(generation: u64, commands: Arc<dyn CommandSink>) -> Self {
        Self {
            generation,
            commands,
            completed: AtomicBool::new(false),
        }
    }

    /// Send the completion signal; only the first call reaches the sink
    pub(crate) fn complete_once(&self) -> bool {
        if self.completed.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!("Completing raw channel generation {}", self.generation);
        self.commands.complete();
        true
    }
}

/// Holds the current raw channel's command sink
///
/// Swapped by the event loop on rebuild. Commands go to whichever channel is
/// current at submission time; nothing is carried across a swap.
#[derive(Clone, Default)]
pub(crate) struct CommandRouter {
    active: Arc<Mutex<Option<Arc<ActiveChannel>>>>,
}

impl CommandRouter {
    pub(crate) fn new(channel: ActiveChannel) -> Self {
        Self {
            active: Arc::new(Mutex::new(Some(Arc::new(channel)))),
        }
    }

    /// Install a new channel, returning the one it replaces
    pub(crate) fn replace(&self, channel: ActiveChannel) -> Option<Arc<ActiveChannel>> {
        self.active.lock().replace(Arc::new(channel))
    }

    pub(crate) fn current(&self) -> Option<Arc<ActiveChannel>> {
        self.active.lock().clone()
    }

    pub(crate) fn route(&self, command: Command) {
        match self.current() {
            Some(channel) => channel.commands.send(command),
            None => warn!("No raw channel, dropping {:?}", command),
        }
    }

    /// Complete the current channel, if not already completed
    pub(crate) fn complete_current(&self) -> bool {
        self.current()
            .map(|channel| channel.complete_once())
            .unwrap_or(false)
    }
}
