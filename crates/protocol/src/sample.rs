//! Data points and reply values flowing through the overlay
//!
//! A [`Sample`] is one immutable data point produced by the broker and
//! delivered to subscriber and query handlers. A [`Reply`] is what the
//! querying side receives for each responder: either a sample or an
//! application-level error value.

use bytes::Bytes;
use uuid::Uuid;

use crate::qos::Qos;

/// Whether a sample asserts or retracts the value at its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SampleKind {
    #[default]
    Put = 0,
    Delete = 1,
}

/// A broker-generated timestamp: logical clock id plus wall-clock
/// milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Id of the logical clock that produced this timestamp
    pub id: Uuid,
    /// Milliseconds since the Unix epoch
    pub ms: u64,
}

/// One data point: key, payload, and metadata
///
/// Samples are immutable once constructed; the payload and attachment
/// are opaque byte buffers from the session's point of view.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub key_expr: String,
    pub payload: Bytes,
    pub kind: SampleKind,
    pub encoding: Option<String>,
    pub attachment: Option<Bytes>,
    pub timestamp: Option<Timestamp>,
    pub qos: Qos,
}

/// Application-level error value carried by a negative reply
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyError {
    pub payload: Bytes,
    pub encoding: Option<String>,
}

/// One reply to a `get`, from one responder
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Sample(Sample),
    Error(ReplyError),
}

impl Reply {
    /// The reply as a `Result`, by reference
    pub fn result(&self) -> Result<&Sample, &ReplyError> {
        match self {
            Reply::Sample(sample) => Ok(sample),
            Reply::Error(err) => Err(err),
        }
    }

    /// The reply as a `Result`, by value
    pub fn into_result(self) -> Result<Sample, ReplyError> {
        match self {
            Reply::Sample(sample) => Ok(sample),
            Reply::Error(err) => Err(err),
        }
    }
}

/// Broker-reported identity of the session and its neighbourhood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Id of the broker-side peer this session is attached to
    pub zid: Uuid,
    /// Ids of the routers currently reachable from that peer
    pub routers: Vec<Uuid>,
    /// Ids of the peers currently reachable from that peer
    pub peers: Vec<Uuid>,
}
