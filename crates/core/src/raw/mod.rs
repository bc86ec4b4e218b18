//! Raw channel: the duplex event/command surface of a provider
//!
//! A [`RawChannel`] is what the session consumes. Its event stream carries
//! [`RawEvent`]s; an `Err` item is the provider's terminal error and the end
//! of the stream is a clean close. Its [`CommandSink`] accepts [`Command`]s
//! plus a single completion signal on shutdown.
//!
//! [`ProviderChannelFactory`] builds raw channels over any [`Provider`]
//! reached through a [`Connector`].

mod command;
mod event;
mod provider;

pub use command::{call, connect, CallOptions, Command, CommandSink, ConnectOptions};
pub use event::{Answer, CallOffer, RawEvent, Reconnect};
pub use provider::{Connector, EventEmitter, Provider, ProviderChannelFactory, ProviderEvent};

use crate::config::ProviderOptions;
use crate::error::ProviderError;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;

/// Item of a raw channel's event stream
pub type RawItem = std::result::Result<RawEvent, ProviderError>;

/// One registration with the provider
pub struct RawChannel {
    /// Provider events; `Err` terminates, end of stream means closed
    pub events: BoxStream<'static, RawItem>,

    /// Where commands for this registration go
    pub commands: Arc<dyn CommandSink>,
}

impl RawChannel {
    /// Assemble a raw channel from its two halves
    pub fn new<S>(events: S, commands: Arc<dyn CommandSink>) -> Self
    where
        S: Stream<Item = RawItem> + Send + 'static,
    {
        Self {
            events: events.boxed(),
            commands,
        }
    }
}

impl fmt::Debug for RawChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawChannel").finish_non_exhaustive()
    }
}

/// Creates raw channels
///
/// `register` is synchronous and begins provider negotiation as a side
/// effect; results arrive later on the returned channel's event stream.
pub trait RawChannelFactory: Send + Sync {
    fn register(&self, peer_id: Option<&str>, options: &ProviderOptions) -> RawChannel;
}
