//! Liveliness tokens, subscribers and queries
//!
//! A liveliness token is a broker-tracked marker: declaring it is
//! observed as a PUT sample by liveliness subscribers on a matching
//! key expression, and undeclaring it (or losing the session) as a
//! DELETE. Liveliness subscribers share the session's ordinary
//! subscriber registry; only the declare/undeclare messages differ.

use std::sync::Arc;
use std::time::Duration;

use veles_protocol::{ClientMessage, KeyExpr, Reply, Sample};

use crate::error::Result;
use crate::handler::Handler;
use crate::session::{Replies, SessionInner};
use crate::subscriber::Subscriber;

/// Entry point to liveliness operations, obtained from
/// [`Session::liveliness`](crate::Session::liveliness)
#[derive(Debug)]
pub struct Liveliness<'a> {
    session: &'a Arc<SessionInner>,
}

impl<'a> Liveliness<'a> {
    pub(crate) fn new(session: &'a Arc<SessionInner>) -> Self {
        Liveliness { session }
    }

    /// Declares a liveliness token on `key_expr`
    pub async fn declare_token(&self, key_expr: &KeyExpr) -> Result<LivelinessToken> {
        let id = self.session.declare_liveliness_token(key_expr).await?;
        Ok(LivelinessToken {
            session: self.session.clone(),
            id,
            key_expr: key_expr.clone(),
            undeclared: false,
        })
    }

    /// Subscribes to token presence changes matching `key_expr`
    ///
    /// With `history` set, the broker replays the tokens that were
    /// already alive at subscription time as initial PUT samples.
    pub async fn declare_subscriber(
        &self,
        key_expr: &KeyExpr,
        history: bool,
        handler: Handler<Sample>,
    ) -> Result<Subscriber> {
        let (push, receiver) = handler.into_parts(self.session.config.channel_capacity);
        let id = self
            .session
            .declare_liveliness_subscriber(key_expr, history, push)
            .await?;
        Ok(Subscriber::new(
            self.session.clone(),
            id,
            key_expr.clone(),
            true,
            receiver,
        ))
    }

    /// Queries the tokens currently alive under `key_expr`
    pub async fn get(
        &self,
        key_expr: &KeyExpr,
        handler: Handler<Reply>,
        timeout: Option<Duration>,
    ) -> Result<Replies> {
        let (push, receiver) = handler.into_parts(self.session.config.channel_capacity);
        let key_expr = key_expr.as_str().to_string();
        let timeout = timeout.unwrap_or_else(|| self.session.config.request_timeout());
        self.session
            .start_get(push, move |get_id| ClientMessage::LivelinessGet {
                get_id,
                key_expr,
                timeout_ms: timeout.as_millis() as u64,
            })
            .await?;
        Ok(Replies::new(receiver))
    }
}

/// A declared liveliness token
///
/// The token stays alive until undeclared or until the session dies,
/// at which point interested subscribers observe a DELETE sample.
#[derive(Debug)]
pub struct LivelinessToken {
    session: Arc<SessionInner>,
    id: u32,
    key_expr: KeyExpr,
    undeclared: bool,
}

impl LivelinessToken {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key_expr(&self) -> &KeyExpr {
        &self.key_expr
    }

    /// Withdraws the token; subscribers observe a DELETE sample.
    /// Repeated calls are no-ops.
    pub async fn undeclare(&mut self) -> Result<()> {
        if self.undeclared {
            return Ok(());
        }
        self.undeclared = true;
        self.session.undeclare_liveliness_token(self.id).await
    }
}

impl Drop for LivelinessToken {
    fn drop(&mut self) {
        if !self.undeclared {
            tracing::debug!(id = self.id, "liveliness token dropped without undeclare");
        }
    }
}
