//! Push-delivery configuration for subscriptions and reply streams
//!
//! Every declaration that receives pushes (subscribers, queryables,
//! gets) takes a [`Handler`] describing how items reach the
//! application: buffered through a delivery channel, or handed to a
//! callback immediately with no queue in between.

use crate::channel::{channel, ChannelPolicy, ChannelReceiver, ChannelSender};

/// How pushed items are delivered to the application
///
/// Channel capacities of `0` select the session's configured default
/// capacity.
pub enum Handler<T> {
    /// Bounded channel that keeps the oldest items when full
    Fifo(usize),
    /// Bounded channel that keeps the newest items when full
    Ring(usize),
    /// Invoke the function for every item; no queue, no receiver
    Callback(Box<dyn Fn(T) + Send + Sync + 'static>),
}

impl<T> Handler<T> {
    /// Convenience constructor for [`Handler::Callback`]
    pub fn callback(f: impl Fn(T) + Send + Sync + 'static) -> Self {
        Handler::Callback(Box::new(f))
    }

    /// Splits the configuration into the session-side push handler and
    /// the application-side receiver (absent in callback mode)
    pub(crate) fn into_parts(
        self,
        default_capacity: usize,
    ) -> (PushHandler<T>, Option<ChannelReceiver<T>>) {
        let resolve = |capacity: usize| {
            if capacity == 0 {
                default_capacity
            } else {
                capacity
            }
        };
        match self {
            Handler::Fifo(capacity) => {
                let (tx, rx) = channel(ChannelPolicy::Fifo, resolve(capacity));
                (PushHandler::Channel(tx), Some(rx))
            }
            Handler::Ring(capacity) => {
                let (tx, rx) = channel(ChannelPolicy::Ring, resolve(capacity));
                (PushHandler::Channel(tx), Some(rx))
            }
            Handler::Callback(f) => (PushHandler::Callback(f), None),
        }
    }
}

impl<T> Default for Handler<T> {
    /// A Fifo channel with the session's default capacity
    fn default() -> Self {
        Handler::Fifo(0)
    }
}

impl<T> std::fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Fifo(capacity) => f.debug_tuple("Fifo").field(capacity).finish(),
            Handler::Ring(capacity) => f.debug_tuple("Ring").field(capacity).finish(),
            Handler::Callback(_) => f.debug_tuple("Callback").finish(),
        }
    }
}

/// Session-side delivery endpoint for one registration
///
/// Registered in the session's handler maps; `close` runs the
/// registration's teardown (closing the application-visible queue) and
/// is idempotent, so removal-then-close runs the teardown exactly once
/// per registration.
pub(crate) enum PushHandler<T> {
    Channel(ChannelSender<T>),
    Callback(Box<dyn Fn(T) + Send + Sync>),
}

impl<T> PushHandler<T> {
    /// Delivers one item; returns `false` if it was dropped
    pub(crate) fn push(&self, item: T) -> bool {
        match self {
            PushHandler::Channel(tx) => tx.send(item),
            PushHandler::Callback(f) => {
                f(item);
                true
            }
        }
    }

    /// Runs the registration's teardown
    pub(crate) fn close(&self) {
        if let PushHandler::Channel(tx) = self {
            tx.close();
        }
    }
}
