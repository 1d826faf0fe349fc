use std::time::Duration;

use thiserror::Error;
use veles_protocol::ProtocolError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("failed to connect: {0}")]
    Connection(String),

    #[error("transport send failed: {0}")]
    Send(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("query was already finalized")]
    QueryFinalized,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
