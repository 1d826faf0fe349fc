//! Typed wire messages exchanged between a session and its broker
//!
//! Every message starts with a one-byte tag. Messages that participate
//! in request/response correlation are sent with the high bit of the
//! tag set, followed by a 4-byte little-endian sequence id; pushes and
//! notifications carry the bare tag. [`ClientMessage`] covers the
//! session-to-broker direction, [`BrokerMessage`] the reverse.

use bytes::Bytes;
use uuid::Uuid;

use crate::qos::{Qos, QuerySettings};
use crate::sample::{Reply, Sample, SessionInfo, Timestamp};

/// Message tag values (low 7 bits of the tag byte)
pub mod tag {
    /// Set on the tag byte when a 4-byte sequence id follows it
    pub const CORRELATED: u8 = 0x80;

    pub const DECLARE_PUBLISHER: u8 = 1;
    pub const UNDECLARE_PUBLISHER: u8 = 2;
    pub const DECLARE_SUBSCRIBER: u8 = 3;
    pub const UNDECLARE_SUBSCRIBER: u8 = 4;
    pub const DECLARE_QUERYABLE: u8 = 5;
    pub const UNDECLARE_QUERYABLE: u8 = 6;
    pub const DECLARE_QUERIER: u8 = 7;
    pub const UNDECLARE_QUERIER: u8 = 8;
    pub const DECLARE_LIVELINESS_TOKEN: u8 = 9;
    pub const UNDECLARE_LIVELINESS_TOKEN: u8 = 10;
    pub const DECLARE_LIVELINESS_SUBSCRIBER: u8 = 11;
    pub const UNDECLARE_LIVELINESS_SUBSCRIBER: u8 = 12;
    pub const GET_SESSION_INFO: u8 = 13;
    pub const GET_TIMESTAMP: u8 = 14;
    pub const PUT: u8 = 15;
    pub const DELETE: u8 = 16;
    pub const PUBLISHER_PUT: u8 = 17;
    pub const PUBLISHER_DELETE: u8 = 18;
    pub const GET: u8 = 19;
    pub const QUERIER_GET: u8 = 20;
    pub const LIVELINESS_GET: u8 = 21;
    pub const REPLY_OK: u8 = 22;
    pub const REPLY_DEL: u8 = 23;
    pub const REPLY_ERR: u8 = 24;
    /// Sent by the session to finish answering a query, and by the
    /// broker to end the reply stream of a get
    pub const RESPONSE_FINAL: u8 = 25;
    pub const PING: u8 = 26;

    pub const RESPONSE_OK: u8 = 32;
    pub const RESPONSE_ERROR: u8 = 33;
    pub const RESPONSE_PING: u8 = 34;
    pub const RESPONSE_TIMESTAMP: u8 = 35;
    pub const RESPONSE_SESSION_INFO: u8 = 36;

    pub const IN_SAMPLE: u8 = 40;
    pub const IN_QUERY: u8 = 41;
    pub const IN_REPLY: u8 = 42;
}

/// A message sent by the session to the broker
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    DeclarePublisher {
        id: u32,
        key_expr: String,
        encoding: Option<String>,
        qos: Qos,
    },
    UndeclarePublisher {
        id: u32,
    },
    DeclareSubscriber {
        id: u32,
        key_expr: String,
    },
    UndeclareSubscriber {
        id: u32,
    },
    DeclareQueryable {
        id: u32,
        key_expr: String,
        complete: bool,
    },
    UndeclareQueryable {
        id: u32,
    },
    DeclareQuerier {
        id: u32,
        key_expr: String,
        settings: QuerySettings,
        timeout_ms: u64,
    },
    UndeclareQuerier {
        id: u32,
    },
    DeclareLivelinessToken {
        id: u32,
        key_expr: String,
    },
    UndeclareLivelinessToken {
        id: u32,
    },
    DeclareLivelinessSubscriber {
        id: u32,
        key_expr: String,
        history: bool,
    },
    UndeclareLivelinessSubscriber {
        id: u32,
    },
    GetSessionInfo,
    GetTimestamp,
    Put {
        key_expr: String,
        payload: Bytes,
        encoding: Option<String>,
        attachment: Option<Bytes>,
        qos: Qos,
    },
    Delete {
        key_expr: String,
        attachment: Option<Bytes>,
        qos: Qos,
    },
    PublisherPut {
        id: u32,
        payload: Bytes,
        encoding: Option<String>,
        attachment: Option<Bytes>,
    },
    PublisherDelete {
        id: u32,
        attachment: Option<Bytes>,
    },
    Get {
        get_id: u32,
        key_expr: String,
        parameters: String,
        payload: Option<Bytes>,
        encoding: Option<String>,
        attachment: Option<Bytes>,
        settings: QuerySettings,
        timeout_ms: u64,
    },
    QuerierGet {
        get_id: u32,
        querier_id: u32,
        parameters: String,
        payload: Option<Bytes>,
        encoding: Option<String>,
        attachment: Option<Bytes>,
    },
    LivelinessGet {
        get_id: u32,
        key_expr: String,
        timeout_ms: u64,
    },
    ReplyOk {
        query_id: u32,
        key_expr: String,
        payload: Bytes,
        encoding: Option<String>,
        attachment: Option<Bytes>,
    },
    ReplyDel {
        query_id: u32,
        key_expr: String,
        attachment: Option<Bytes>,
    },
    ReplyErr {
        query_id: u32,
        payload: Bytes,
        encoding: Option<String>,
    },
    /// Finishes the reply stream for the named query id
    ResponseFinal {
        id: u32,
    },
    Ping,
}

impl ClientMessage {
    /// The wire tag for this message (without the correlation bit)
    pub fn tag(&self) -> u8 {
        match self {
            ClientMessage::DeclarePublisher { .. } => tag::DECLARE_PUBLISHER,
            ClientMessage::UndeclarePublisher { .. } => tag::UNDECLARE_PUBLISHER,
            ClientMessage::DeclareSubscriber { .. } => tag::DECLARE_SUBSCRIBER,
            ClientMessage::UndeclareSubscriber { .. } => tag::UNDECLARE_SUBSCRIBER,
            ClientMessage::DeclareQueryable { .. } => tag::DECLARE_QUERYABLE,
            ClientMessage::UndeclareQueryable { .. } => tag::UNDECLARE_QUERYABLE,
            ClientMessage::DeclareQuerier { .. } => tag::DECLARE_QUERIER,
            ClientMessage::UndeclareQuerier { .. } => tag::UNDECLARE_QUERIER,
            ClientMessage::DeclareLivelinessToken { .. } => tag::DECLARE_LIVELINESS_TOKEN,
            ClientMessage::UndeclareLivelinessToken { .. } => tag::UNDECLARE_LIVELINESS_TOKEN,
            ClientMessage::DeclareLivelinessSubscriber { .. } => {
                tag::DECLARE_LIVELINESS_SUBSCRIBER
            }
            ClientMessage::UndeclareLivelinessSubscriber { .. } => {
                tag::UNDECLARE_LIVELINESS_SUBSCRIBER
            }
            ClientMessage::GetSessionInfo => tag::GET_SESSION_INFO,
            ClientMessage::GetTimestamp => tag::GET_TIMESTAMP,
            ClientMessage::Put { .. } => tag::PUT,
            ClientMessage::Delete { .. } => tag::DELETE,
            ClientMessage::PublisherPut { .. } => tag::PUBLISHER_PUT,
            ClientMessage::PublisherDelete { .. } => tag::PUBLISHER_DELETE,
            ClientMessage::Get { .. } => tag::GET,
            ClientMessage::QuerierGet { .. } => tag::QUERIER_GET,
            ClientMessage::LivelinessGet { .. } => tag::LIVELINESS_GET,
            ClientMessage::ReplyOk { .. } => tag::REPLY_OK,
            ClientMessage::ReplyDel { .. } => tag::REPLY_DEL,
            ClientMessage::ReplyErr { .. } => tag::REPLY_ERR,
            ClientMessage::ResponseFinal { .. } => tag::RESPONSE_FINAL,
            ClientMessage::Ping => tag::PING,
        }
    }

    /// True if this message is sent with a sequence id and expects a
    /// correlated response frame
    pub fn is_correlated(&self) -> bool {
        matches!(
            self,
            ClientMessage::DeclarePublisher { .. }
                | ClientMessage::UndeclarePublisher { .. }
                | ClientMessage::DeclareSubscriber { .. }
                | ClientMessage::UndeclareSubscriber { .. }
                | ClientMessage::DeclareQueryable { .. }
                | ClientMessage::UndeclareQueryable { .. }
                | ClientMessage::DeclareQuerier { .. }
                | ClientMessage::UndeclareQuerier { .. }
                | ClientMessage::DeclareLivelinessToken { .. }
                | ClientMessage::UndeclareLivelinessToken { .. }
                | ClientMessage::DeclareLivelinessSubscriber { .. }
                | ClientMessage::UndeclareLivelinessSubscriber { .. }
                | ClientMessage::GetSessionInfo
                | ClientMessage::GetTimestamp
                | ClientMessage::Ping
        )
    }
}

/// A message sent by the broker to the session
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerMessage {
    /// Positive acknowledgement of a correlated request
    ResponseOk,
    /// Negative acknowledgement; the text is surfaced to the caller
    ResponseError {
        message: String,
    },
    ResponsePing {
        session_id: Uuid,
    },
    ResponseTimestamp {
        timestamp: Timestamp,
    },
    ResponseSessionInfo {
        info: SessionInfo,
    },
    InSample {
        subscriber_id: u32,
        sample: Sample,
    },
    InQuery {
        queryable_id: u32,
        query_id: u32,
        key_expr: String,
        parameters: String,
        payload: Option<Bytes>,
        encoding: Option<String>,
        attachment: Option<Bytes>,
    },
    InReply {
        get_id: u32,
        reply: Reply,
    },
    /// Ends the reply stream of the named get id
    ResponseFinal {
        id: u32,
    },
}

impl BrokerMessage {
    /// The wire tag for this message (without the correlation bit)
    pub fn tag(&self) -> u8 {
        match self {
            BrokerMessage::ResponseOk => tag::RESPONSE_OK,
            BrokerMessage::ResponseError { .. } => tag::RESPONSE_ERROR,
            BrokerMessage::ResponsePing { .. } => tag::RESPONSE_PING,
            BrokerMessage::ResponseTimestamp { .. } => tag::RESPONSE_TIMESTAMP,
            BrokerMessage::ResponseSessionInfo { .. } => tag::RESPONSE_SESSION_INFO,
            BrokerMessage::InSample { .. } => tag::IN_SAMPLE,
            BrokerMessage::InQuery { .. } => tag::IN_QUERY,
            BrokerMessage::InReply { .. } => tag::IN_REPLY,
            BrokerMessage::ResponseFinal { .. } => tag::RESPONSE_FINAL,
        }
    }

    /// True if this message only ever arrives with a sequence id
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            BrokerMessage::ResponseOk
                | BrokerMessage::ResponseError { .. }
                | BrokerMessage::ResponsePing { .. }
                | BrokerMessage::ResponseTimestamp { .. }
                | BrokerMessage::ResponseSessionInfo { .. }
        )
    }
}
