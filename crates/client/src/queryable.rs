//! Queryable facade

use std::sync::Arc;

use veles_protocol::KeyExpr;

use crate::channel::{ChannelReceiver, ChannelState, TryRecv};
use crate::error::Result;
use crate::query::Query;
use crate::session::SessionInner;

/// A declared queryable answering gets on one key expression
#[derive(Debug)]
pub struct Queryable {
    session: Arc<SessionInner>,
    id: u32,
    key_expr: KeyExpr,
    receiver: Option<ChannelReceiver<Query>>,
    undeclared: bool,
}

impl Queryable {
    pub(crate) fn new(
        session: Arc<SessionInner>,
        id: u32,
        key_expr: KeyExpr,
        receiver: Option<ChannelReceiver<Query>>,
    ) -> Self {
        Queryable {
            session,
            id,
            key_expr,
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

    /// Receives the next query, suspending until one arrives
    ///
    /// Returns `None` once the queryable is undeclared or the session
    /// closes and the buffered queries are drained.
    pub async fn recv(&mut self) -> Option<Query> {
        match &mut self.receiver {
            Some(receiver) => receiver.recv().await,
            None => None,
        }
    }

    /// Receives the next query without suspending
    pub fn try_recv(&mut self) -> TryRecv<Query> {
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
    /// Local delivery stops before the network round-trip completes.
    /// Repeated calls are no-ops.
    pub async fn undeclare(&mut self) -> Result<()> {
        if self.undeclared {
            return Ok(());
        }
        self.undeclared = true;
        self.session.undeclare_queryable(self.id).await
    }
}

impl Drop for Queryable {
    fn drop(&mut self) {
        if !self.undeclared {
            tracing::debug!(id = self.id, "queryable dropped without undeclare");
        }
    }
}
