//! Querier facade

use std::sync::Arc;

use bytes::Bytes;
use veles_protocol::{ClientMessage, KeyExpr, Reply};

use crate::error::Result;
use crate::handler::Handler;
use crate::session::{Replies, SessionInner};

/// Options for [`Querier::get`]
#[derive(Debug, Default)]
pub struct QuerierGetOptions {
    pub payload: Option<Bytes>,
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
}

/// A declared querier, pre-bound to a key expression and settings
///
/// The target, consolidation and timeout were fixed at declare time
/// broker-side; each [`get`](Querier::get) correlates its replies via
/// a fresh get id.
#[derive(Debug)]
pub struct Querier {
    session: Arc<SessionInner>,
    id: u32,
    key_expr: KeyExpr,
    undeclared: bool,
}

impl Querier {
    pub(crate) fn new(session: Arc<SessionInner>, id: u32, key_expr: KeyExpr) -> Self {
        Querier {
            session,
            id,
            key_expr,
            undeclared: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key_expr(&self) -> &KeyExpr {
        &self.key_expr
    }

    /// Issues a query with this querier's pre-declared settings
    pub async fn get(
        &self,
        parameters: &str,
        handler: Handler<Reply>,
        options: QuerierGetOptions,
    ) -> Result<Replies> {
        let (push, receiver) = handler.into_parts(self.session.config.channel_capacity);
        let querier_id = self.id;
        let parameters = parameters.to_string();
        self.session
            .start_get(push, move |get_id| ClientMessage::QuerierGet {
                get_id,
                querier_id,
                parameters,
                payload: options.payload,
                encoding: options.encoding,
                attachment: options.attachment,
            })
            .await?;
        Ok(Replies::new(receiver))
    }

    /// Withdraws the declaration from the broker; repeated calls are
    /// no-ops
    pub async fn undeclare(&mut self) -> Result<()> {
        if self.undeclared {
            return Ok(());
        }
        self.undeclared = true;
        self.session.undeclare_querier(self.id).await
    }
}

impl Drop for Querier {
    fn drop(&mut self) {
        if !self.undeclared {
            tracing::debug!(id = self.id, "querier dropped without undeclare");
        }
    }
}
