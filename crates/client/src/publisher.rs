//! Publisher facade

use std::sync::Arc;

use bytes::Bytes;
use veles_protocol::{ClientMessage, KeyExpr, Qos};

use crate::error::Result;
use crate::session::SessionInner;

/// Options for [`Publisher::put`]
#[derive(Debug, Default)]
pub struct PublisherPutOptions {
    /// Overrides the publisher's default encoding for this put
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
}

/// Options for [`Publisher::delete`]
#[derive(Debug, Default)]
pub struct PublisherDeleteOptions {
    pub attachment: Option<Bytes>,
}

/// A declared publisher, bound to one key expression
///
/// Holds only its id and a reference to the session; the key
/// expression, encoding and QoS were fixed at declare time.
#[derive(Debug)]
pub struct Publisher {
    session: Arc<SessionInner>,
    id: u32,
    key_expr: KeyExpr,
    encoding: Option<String>,
    qos: Qos,
    undeclared: bool,
}

impl Publisher {
    pub(crate) fn new(
        session: Arc<SessionInner>,
        id: u32,
        key_expr: KeyExpr,
        encoding: Option<String>,
        qos: Qos,
    ) -> Self {
        Publisher {
            session,
            id,
            key_expr,
            encoding,
            qos,
            undeclared: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn key_expr(&self) -> &KeyExpr {
        &self.key_expr
    }

    pub fn qos(&self) -> Qos {
        self.qos
    }

    /// Publishes one value on this publisher's key expression
    pub async fn put(
        &self,
        payload: impl Into<Bytes>,
        options: PublisherPutOptions,
    ) -> Result<()> {
        let encoding = options.encoding.or_else(|| self.encoding.clone());
        self.session
            .send(&ClientMessage::PublisherPut {
                id: self.id,
                payload: payload.into(),
                encoding,
                attachment: options.attachment,
            })
            .await
    }

    /// Retracts the value at this publisher's key expression
    pub async fn delete(&self, options: PublisherDeleteOptions) -> Result<()> {
        self.session
            .send(&ClientMessage::PublisherDelete {
                id: self.id,
                attachment: options.attachment,
            })
            .await
    }

    /// Withdraws the declaration from the broker; repeated calls are
    /// no-ops
    pub async fn undeclare(&mut self) -> Result<()> {
        if self.undeclared {
            return Ok(());
        }
        self.undeclared = true;
        self.session.undeclare_publisher(self.id).await
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if !self.undeclared {
            tracing::debug!(id = self.id, "publisher dropped without undeclare");
        }
    }
}
