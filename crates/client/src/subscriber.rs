//! Subscriber facade

use std::sync::Arc;

use veles_protocol::{KeyExpr, Sample};

use crate::channel::{ChannelReceiver, ChannelState, TryRecv};
use crate::error::Result;
use crate::session::SessionInner;

/// A declared subscriber receiving samples for one key expression
///
/// Samples are delivered in transport order. Channel-mode subscribers
/// consume them through [`recv`](Subscriber::recv); callback-mode
/// subscribers have no receivable side and report end-of-stream.
#[derive(Debug)]
pub struct Subscriber {
    session: Arc<SessionInner>,
    id: u32,
    key_expr: KeyExpr,
    liveliness: bool,
    receiver: Option<ChannelReceiver<Sample>>,
    undeclared: bool,
}

impl Subscriber {
    pub(crate) fn new(
        session: Arc<SessionInner>,
        id: u32,
        key_expr: KeyExpr,
        liveliness: bool,
        receiver: Option<ChannelReceiver<Sample>>,
    ) -> Self {
        Subscriber {
            session,
            id,
            key_expr,
            liveliness,
            receiver,
            undeclared: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key_expr(&self) -> &KeyExpr {
        &self.key_expr
    }

    /// Receives the next sample, suspending until one arrives
    ///
    /// Returns `None` once the subscriber is undeclared or the session
    /// closes and the buffered samples are drained.
    pub async fn recv(&mut self) -> Option<Sample> {
        match &mut self.receiver {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    /// Receives the next sample without suspending
    pub fn try_recv(&mut self) -> TryRecv<Sample> {
        match &mut self.receiver {
            Some(receiver) => receiver.try_recv(),
            None => TryRecv::Closed,
        }
    }

    pub fn state(&self) -> ChannelState {
        match &self.receiver {
            Some(receiver) => receiver.state(),
            None => ChannelState::Close,
        }
    }

    /// Withdraws the declaration from the broker
    ///
    /// Local delivery stops before the network round-trip completes:
    /// no sample arriving after this call starts is handed to the
    /// subscriber. Repeated calls are no-ops.
    pub async fn undeclare(&mut self) -> Result<()> {
        if self.undeclared {
            return Ok(());
        }
        self.undeclared = true;
        self.session
            .undeclare_subscriber(self.id, self.liveliness)
            .await
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if !self.undeclared {
            tracing::debug!(id = self.id, "subscriber dropped without undeclare");
        }
    }
}
