//! Inbound queries delivered to queryables

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use veles_protocol::{ClientMessage, KeyExpr};

use crate::error::{Result, SessionError};
use crate::session::SessionInner;

/// Options for [`Query::reply`]
#[derive(Debug, Default)]
pub struct ReplyOptions {
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
}

/// Options for [`Query::reply_del`]
#[derive(Debug, Default)]
pub struct ReplyDelOptions {
    pub attachment: Option<Bytes>,
}

/// One query received by a queryable
///
/// A query is finalized by exactly one terminating reply action
/// ([`reply`](Query::reply), [`reply_del`](Query::reply_del) or
/// [`reply_err`](Query::reply_err)); the terminating action also sends
/// the final marker that ends the querier's reply stream. Replying a
/// second time fails with `QueryFinalized`. Dropping a query without
/// replying sends a bare final marker so the querier does not hang.
#[derive(Debug)]
pub struct Query {
    session: Arc<SessionInner>,
    query_id: u32,
    key_expr: String,
    parameters: String,
    payload: Option<Bytes>,
    encoding: Option<String>,
    attachment: Option<Bytes>,
    finalized: AtomicBool,
}

impl Query {
    pub(crate) fn new(
        session: Arc<SessionInner>,
        query_id: u32,
        key_expr: String,
        parameters: String,
        payload: Option<Bytes>,
        encoding: Option<String>,
        attachment: Option<Bytes>,
    ) -> Self {
        Query {
            session,
            query_id,
            key_expr,
            parameters,
            payload,
            encoding,
            attachment,
            finalized: AtomicBool::new(false),
        }
    }

    /// The key expression the querier asked for (may contain wildcards)
    pub fn key_expr(&self) -> &str {
        &self.key_expr
    }

    /// The query's parameter string, e.g. `arg=1;other=two`
    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn attachment(&self) -> Option<&Bytes> {
        self.attachment.as_ref()
    }

    /// Answers the query with a value and finalizes it
    pub async fn reply(
        &self,
        key_expr: &KeyExpr,
        payload: impl Into<Bytes>,
        options: ReplyOptions,
    ) -> Result<()> {
        self.finalize()?;
        self.session
            .send(&ClientMessage::ReplyOk {
                query_id: self.query_id,
                key_expr: key_expr.as_str().to_string(),
                payload: payload.into(),
                encoding: options.encoding,
                attachment: options.attachment,
            })
            .await?;
        self.send_final().await
    }

    /// Answers the query with a deletion and finalizes it
    pub async fn reply_del(&self, key_expr: &KeyExpr, options: ReplyDelOptions) -> Result<()> {
        self.finalize()?;
        self.session
            .send(&ClientMessage::ReplyDel {
                query_id: self.query_id,
                key_expr: key_expr.as_str().to_string(),
                attachment: options.attachment,
            })
            .await?;
        self.send_final().await
    }

    /// Answers the query with an error value and finalizes it
    pub async fn reply_err(
        &self,
        payload: impl Into<Bytes>,
        encoding: Option<String>,
    ) -> Result<()> {
        self.finalize()?;
        self.session
            .send(&ClientMessage::ReplyErr {
                query_id: self.query_id,
                payload: payload.into(),
                encoding,
            })
            .await?;
        self.send_final().await
    }

    fn finalize(&self) -> Result<()> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(SessionError::QueryFinalized);
        }
        Ok(())
    }

    async fn send_final(&self) -> Result<()> {
        self.session
            .send(&ClientMessage::ResponseFinal { id: self.query_id })
            .await
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        if !self.finalized.load(Ordering::SeqCst) {
            self.session
                .send_nowait(&ClientMessage::ResponseFinal { id: self.query_id });
        }
    }
}
