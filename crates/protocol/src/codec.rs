//! Binary codec for the session/broker wire protocol
//!
//! Framing rules, applied uniformly in both directions:
//!
//! - every frame starts with a one-byte tag; if the [`CORRELATED`] bit
//!   is set, a 4-byte little-endian sequence id follows the tag
//! - fixed-width integers are little-endian; booleans are one byte
//! - strings and byte arrays are length-prefixed with unsigned LEB128
//! - optional fields are prefixed with a one-byte presence flag
//! - uuids are 16 raw bytes; lists are LEB128 count-prefixed
//!
//! Encoding is deterministic and never fails for well-formed messages.
//! Decoding validates every declared length against the remaining
//! buffer before copying.
//!
//! [`CORRELATED`]: crate::messages::tag::CORRELATED

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{ProtocolError, Result};
use crate::messages::{tag, BrokerMessage, ClientMessage};
use crate::qos::{Qos, QuerySettings};
use crate::sample::{Reply, ReplyError, Sample, SampleKind, SessionInfo, Timestamp};

/// Decoded frame header: the message tag and, for correlated frames,
/// the sequence id that ties it to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tag: u8,
    pub sequence_id: Option<u32>,
}

/// Reads the tag byte and, if the correlation bit is set, the sequence
/// id that follows it
pub fn decode_header(buf: &mut Bytes) -> Result<Header> {
    need(buf, 1)?;
    let tag_byte = buf.get_u8();
    let sequence_id = if tag_byte & tag::CORRELATED != 0 {
        need(buf, 4)?;
        Some(buf.get_u32_le())
    } else {
        None
    };
    Ok(Header {
        tag: tag_byte & !tag::CORRELATED,
        sequence_id,
    })
}

/// Serializes a session-to-broker message into one wire frame
///
/// The correlation bit is set exactly when `sequence_id` is provided.
pub fn encode_client(msg: &ClientMessage, sequence_id: Option<u32>) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    put_header(&mut buf, msg.tag(), sequence_id);

    match msg {
        ClientMessage::DeclarePublisher {
            id,
            key_expr,
            encoding,
            qos,
        } => {
            buf.put_u32_le(*id);
            put_str(&mut buf, key_expr);
            put_opt_str(&mut buf, encoding.as_deref());
            buf.put_u8(qos.to_byte());
        }
        ClientMessage::UndeclarePublisher { id }
        | ClientMessage::UndeclareSubscriber { id }
        | ClientMessage::UndeclareQueryable { id }
        | ClientMessage::UndeclareQuerier { id }
        | ClientMessage::UndeclareLivelinessToken { id }
        | ClientMessage::UndeclareLivelinessSubscriber { id }
        | ClientMessage::ResponseFinal { id } => {
            buf.put_u32_le(*id);
        }
        ClientMessage::DeclareSubscriber { id, key_expr }
        | ClientMessage::DeclareLivelinessToken { id, key_expr } => {
            buf.put_u32_le(*id);
            put_str(&mut buf, key_expr);
        }
        ClientMessage::DeclareQueryable {
            id,
            key_expr,
            complete,
        } => {
            buf.put_u32_le(*id);
            put_str(&mut buf, key_expr);
            put_bool(&mut buf, *complete);
        }
        ClientMessage::DeclareQuerier {
            id,
            key_expr,
            settings,
            timeout_ms,
        } => {
            buf.put_u32_le(*id);
            put_str(&mut buf, key_expr);
            buf.put_u8(settings.to_byte());
            buf.put_u64_le(*timeout_ms);
        }
        ClientMessage::DeclareLivelinessSubscriber {
            id,
            key_expr,
            history,
        } => {
            buf.put_u32_le(*id);
            put_str(&mut buf, key_expr);
            put_bool(&mut buf, *history);
        }
        ClientMessage::GetSessionInfo | ClientMessage::GetTimestamp | ClientMessage::Ping => {}
        ClientMessage::Put {
            key_expr,
            payload,
            encoding,
            attachment,
            qos,
        } => {
            put_str(&mut buf, key_expr);
            put_buf(&mut buf, payload);
            put_opt_str(&mut buf, encoding.as_deref());
            put_opt_buf(&mut buf, attachment.as_ref());
            buf.put_u8(qos.to_byte());
        }
        ClientMessage::Delete {
            key_expr,
            attachment,
            qos,
        } => {
            put_str(&mut buf, key_expr);
            put_opt_buf(&mut buf, attachment.as_ref());
            buf.put_u8(qos.to_byte());
        }
        ClientMessage::PublisherPut {
            id,
            payload,
            encoding,
            attachment,
        } => {
            buf.put_u32_le(*id);
            put_buf(&mut buf, payload);
            put_opt_str(&mut buf, encoding.as_deref());
            put_opt_buf(&mut buf, attachment.as_ref());
        }
        ClientMessage::PublisherDelete { id, attachment } => {
            buf.put_u32_le(*id);
            put_opt_buf(&mut buf, attachment.as_ref());
        }
        ClientMessage::Get {
            get_id,
            key_expr,
            parameters,
            payload,
            encoding,
            attachment,
            settings,
            timeout_ms,
        } => {
            buf.put_u32_le(*get_id);
            put_str(&mut buf, key_expr);
            put_str(&mut buf, parameters);
            put_opt_buf(&mut buf, payload.as_ref());
            put_opt_str(&mut buf, encoding.as_deref());
            put_opt_buf(&mut buf, attachment.as_ref());
            buf.put_u8(settings.to_byte());
            buf.put_u64_le(*timeout_ms);
        }
        ClientMessage::QuerierGet {
            get_id,
            querier_id,
            parameters,
            payload,
            encoding,
            attachment,
        } => {
            buf.put_u32_le(*get_id);
            buf.put_u32_le(*querier_id);
            put_str(&mut buf, parameters);
            put_opt_buf(&mut buf, payload.as_ref());
            put_opt_str(&mut buf, encoding.as_deref());
            put_opt_buf(&mut buf, attachment.as_ref());
        }
        ClientMessage::LivelinessGet {
            get_id,
            key_expr,
            timeout_ms,
        } => {
            buf.put_u32_le(*get_id);
            put_str(&mut buf, key_expr);
            buf.put_u64_le(*timeout_ms);
        }
        ClientMessage::ReplyOk {
            query_id,
            key_expr,
            payload,
            encoding,
            attachment,
        } => {
            buf.put_u32_le(*query_id);
            put_str(&mut buf, key_expr);
            put_buf(&mut buf, payload);
            put_opt_str(&mut buf, encoding.as_deref());
            put_opt_buf(&mut buf, attachment.as_ref());
        }
        ClientMessage::ReplyDel {
            query_id,
            key_expr,
            attachment,
        } => {
            buf.put_u32_le(*query_id);
            put_str(&mut buf, key_expr);
            put_opt_buf(&mut buf, attachment.as_ref());
        }
        ClientMessage::ReplyErr {
            query_id,
            payload,
            encoding,
        } => {
            buf.put_u32_le(*query_id);
            put_buf(&mut buf, payload);
            put_opt_str(&mut buf, encoding.as_deref());
        }
    }

    buf.freeze()
}

/// Parses the body of a session-to-broker message for the given tag
pub fn decode_client(msg_tag: u8, buf: &mut Bytes) -> Result<ClientMessage> {
    let msg = match msg_tag {
        tag::DECLARE_PUBLISHER => ClientMessage::DeclarePublisher {
            id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            encoding: get_opt_str(buf)?,
            qos: Qos::from_byte(get_u8(buf)?),
        },
        tag::UNDECLARE_PUBLISHER => ClientMessage::UndeclarePublisher { id: get_u32(buf)? },
        tag::DECLARE_SUBSCRIBER => ClientMessage::DeclareSubscriber {
            id: get_u32(buf)?,
            key_expr: get_str(buf)?,
        },
        tag::UNDECLARE_SUBSCRIBER => ClientMessage::UndeclareSubscriber { id: get_u32(buf)? },
        tag::DECLARE_QUERYABLE => ClientMessage::DeclareQueryable {
            id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            complete: get_bool(buf)?,
        },
        tag::UNDECLARE_QUERYABLE => ClientMessage::UndeclareQueryable { id: get_u32(buf)? },
        tag::DECLARE_QUERIER => ClientMessage::DeclareQuerier {
            id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            settings: QuerySettings::from_byte(get_u8(buf)?)?,
            timeout_ms: get_u64(buf)?,
        },
        tag::UNDECLARE_QUERIER => ClientMessage::UndeclareQuerier { id: get_u32(buf)? },
        tag::DECLARE_LIVELINESS_TOKEN => ClientMessage::DeclareLivelinessToken {
            id: get_u32(buf)?,
            key_expr: get_str(buf)?,
        },
        tag::UNDECLARE_LIVELINESS_TOKEN => {
            ClientMessage::UndeclareLivelinessToken { id: get_u32(buf)? }
        }
        tag::DECLARE_LIVELINESS_SUBSCRIBER => ClientMessage::DeclareLivelinessSubscriber {
            id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            history: get_bool(buf)?,
        },
        tag::UNDECLARE_LIVELINESS_SUBSCRIBER => {
            ClientMessage::UndeclareLivelinessSubscriber { id: get_u32(buf)? }
        }
        tag::GET_SESSION_INFO => ClientMessage::GetSessionInfo,
        tag::GET_TIMESTAMP => ClientMessage::GetTimestamp,
        tag::PUT => ClientMessage::Put {
            key_expr: get_str(buf)?,
            payload: get_buf(buf)?,
            encoding: get_opt_str(buf)?,
            attachment: get_opt_buf(buf)?,
            qos: Qos::from_byte(get_u8(buf)?),
        },
        tag::DELETE => ClientMessage::Delete {
            key_expr: get_str(buf)?,
            attachment: get_opt_buf(buf)?,
            qos: Qos::from_byte(get_u8(buf)?),
        },
        tag::PUBLISHER_PUT => ClientMessage::PublisherPut {
            id: get_u32(buf)?,
            payload: get_buf(buf)?,
            encoding: get_opt_str(buf)?,
            attachment: get_opt_buf(buf)?,
        },
        tag::PUBLISHER_DELETE => ClientMessage::PublisherDelete {
            id: get_u32(buf)?,
            attachment: get_opt_buf(buf)?,
        },
        tag::GET => ClientMessage::Get {
            get_id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            parameters: get_str(buf)?,
            payload: get_opt_buf(buf)?,
            encoding: get_opt_str(buf)?,
            attachment: get_opt_buf(buf)?,
            settings: QuerySettings::from_byte(get_u8(buf)?)?,
            timeout_ms: get_u64(buf)?,
        },
        tag::QUERIER_GET => ClientMessage::QuerierGet {
            get_id: get_u32(buf)?,
            querier_id: get_u32(buf)?,
            parameters: get_str(buf)?,
            payload: get_opt_buf(buf)?,
            encoding: get_opt_str(buf)?,
            attachment: get_opt_buf(buf)?,
        },
        tag::LIVELINESS_GET => ClientMessage::LivelinessGet {
            get_id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            timeout_ms: get_u64(buf)?,
        },
        tag::REPLY_OK => ClientMessage::ReplyOk {
            query_id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            payload: get_buf(buf)?,
            encoding: get_opt_str(buf)?,
            attachment: get_opt_buf(buf)?,
        },
        tag::REPLY_DEL => ClientMessage::ReplyDel {
            query_id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            attachment: get_opt_buf(buf)?,
        },
        tag::REPLY_ERR => ClientMessage::ReplyErr {
            query_id: get_u32(buf)?,
            payload: get_buf(buf)?,
            encoding: get_opt_str(buf)?,
        },
        tag::RESPONSE_FINAL => ClientMessage::ResponseFinal { id: get_u32(buf)? },
        tag::PING => ClientMessage::Ping,
        other => return Err(ProtocolError::UnknownTag(other)),
    };
    Ok(msg)
}

/// Serializes a broker-to-session message into one wire frame
pub fn encode_broker(msg: &BrokerMessage, sequence_id: Option<u32>) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    put_header(&mut buf, msg.tag(), sequence_id);

    match msg {
        BrokerMessage::ResponseOk => {}
        BrokerMessage::ResponseError { message } => {
            put_str(&mut buf, message);
        }
        BrokerMessage::ResponsePing { session_id } => {
            buf.put_slice(session_id.as_bytes());
        }
        BrokerMessage::ResponseTimestamp { timestamp } => {
            put_timestamp(&mut buf, timestamp);
        }
        BrokerMessage::ResponseSessionInfo { info } => {
            buf.put_slice(info.zid.as_bytes());
            put_uuid_list(&mut buf, &info.routers);
            put_uuid_list(&mut buf, &info.peers);
        }
        BrokerMessage::InSample {
            subscriber_id,
            sample,
        } => {
            buf.put_u32_le(*subscriber_id);
            put_sample(&mut buf, sample);
        }
        BrokerMessage::InQuery {
            queryable_id,
            query_id,
            key_expr,
            parameters,
            payload,
            encoding,
            attachment,
        } => {
            buf.put_u32_le(*queryable_id);
            buf.put_u32_le(*query_id);
            put_str(&mut buf, key_expr);
            put_str(&mut buf, parameters);
            put_opt_buf(&mut buf, payload.as_ref());
            put_opt_str(&mut buf, encoding.as_deref());
            put_opt_buf(&mut buf, attachment.as_ref());
        }
        BrokerMessage::InReply { get_id, reply } => {
            buf.put_u32_le(*get_id);
            match reply {
                Reply::Sample(sample) => {
                    put_bool(&mut buf, true);
                    put_sample(&mut buf, sample);
                }
                Reply::Error(err) => {
                    put_bool(&mut buf, false);
                    put_buf(&mut buf, &err.payload);
                    put_opt_str(&mut buf, err.encoding.as_deref());
                }
            }
        }
        BrokerMessage::ResponseFinal { id } => {
            buf.put_u32_le(*id);
        }
    }

    buf.freeze()
}

/// Parses the body of a broker-to-session message for the given tag
pub fn decode_broker(msg_tag: u8, buf: &mut Bytes) -> Result<BrokerMessage> {
    let msg = match msg_tag {
        tag::RESPONSE_OK => BrokerMessage::ResponseOk,
        tag::RESPONSE_ERROR => BrokerMessage::ResponseError {
            message: get_str(buf)?,
        },
        tag::RESPONSE_PING => BrokerMessage::ResponsePing {
            session_id: get_uuid(buf)?,
        },
        tag::RESPONSE_TIMESTAMP => BrokerMessage::ResponseTimestamp {
            timestamp: get_timestamp(buf)?,
        },
        tag::RESPONSE_SESSION_INFO => BrokerMessage::ResponseSessionInfo {
            info: SessionInfo {
                zid: get_uuid(buf)?,
                routers: get_uuid_list(buf)?,
                peers: get_uuid_list(buf)?,
            },
        },
        tag::IN_SAMPLE => BrokerMessage::InSample {
            subscriber_id: get_u32(buf)?,
            sample: get_sample(buf)?,
        },
        tag::IN_QUERY => BrokerMessage::InQuery {
            queryable_id: get_u32(buf)?,
            query_id: get_u32(buf)?,
            key_expr: get_str(buf)?,
            parameters: get_str(buf)?,
            payload: get_opt_buf(buf)?,
            encoding: get_opt_str(buf)?,
            attachment: get_opt_buf(buf)?,
        },
        tag::IN_REPLY => {
            let get_id = get_u32(buf)?;
            let reply = if get_bool(buf)? {
                Reply::Sample(get_sample(buf)?)
            } else {
                Reply::Error(ReplyError {
                    payload: get_buf(buf)?,
                    encoding: get_opt_str(buf)?,
                })
            };
            BrokerMessage::InReply { get_id, reply }
        }
        tag::RESPONSE_FINAL => BrokerMessage::ResponseFinal { id: get_u32(buf)? },
        other => return Err(ProtocolError::UnknownTag(other)),
    };
    Ok(msg)
}

fn put_header(buf: &mut BytesMut, msg_tag: u8, sequence_id: Option<u32>) {
    match sequence_id {
        Some(seq) => {
            buf.put_u8(msg_tag | tag::CORRELATED);
            buf.put_u32_le(seq);
        }
        None => buf.put_u8(msg_tag),
    }
}

fn need(buf: &Bytes, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(ProtocolError::BufferTooShort {
            need: n,
            have: buf.remaining(),
        });
    }
    Ok(())
}

fn put_leb128(buf: &mut BytesMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

fn get_leb128(buf: &mut Bytes) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        need(buf, 1)?;
        let byte = buf.get_u8();
        if shift == 63 && byte > 1 {
            return Err(ProtocolError::Malformed("leb128 overflows u64".into()));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(ProtocolError::Malformed("leb128 longer than 10 bytes".into()));
        }
    }
}

fn get_u8(buf: &mut Bytes) -> Result<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut Bytes) -> Result<u32> {
    need(buf, 4)?;
    Ok(buf.get_u32_le())
}

fn get_u64(buf: &mut Bytes) -> Result<u64> {
    need(buf, 8)?;
    Ok(buf.get_u64_le())
}

fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(value as u8);
}

fn get_bool(buf: &mut Bytes) -> Result<bool> {
    match get_u8(buf)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProtocolError::Malformed(format!(
            "invalid boolean byte {other:#04x}"
        ))),
    }
}

fn put_buf(buf: &mut BytesMut, bytes: &Bytes) {
    put_leb128(buf, bytes.len() as u64);
    buf.put_slice(bytes);
}

fn get_buf(buf: &mut Bytes) -> Result<Bytes> {
    let len = get_leb128(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| ProtocolError::Malformed(format!("length {len} exceeds address space")))?;
    need(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

fn put_str(buf: &mut BytesMut, s: &str) {
    put_leb128(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

fn get_str(buf: &mut Bytes) -> Result<String> {
    let bytes = get_buf(buf)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ProtocolError::Malformed("invalid utf-8 in string".into()))
}

fn put_opt_str(buf: &mut BytesMut, value: Option<&str>) {
    match value {
        Some(s) => {
            put_bool(buf, true);
            put_str(buf, s);
        }
        None => put_bool(buf, false),
    }
}

fn get_opt_str(buf: &mut Bytes) -> Result<Option<String>> {
    if get_bool(buf)? {
        Ok(Some(get_str(buf)?))
    } else {
        Ok(None)
    }
}

fn put_opt_buf(buf: &mut BytesMut, value: Option<&Bytes>) {
    match value {
        Some(bytes) => {
            put_bool(buf, true);
            put_buf(buf, bytes);
        }
        None => put_bool(buf, false),
    }
}

fn get_opt_buf(buf: &mut Bytes) -> Result<Option<Bytes>> {
    if get_bool(buf)? {
        Ok(Some(get_buf(buf)?))
    } else {
        Ok(None)
    }
}

fn get_uuid(buf: &mut Bytes) -> Result<Uuid> {
    need(buf, 16)?;
    let mut bytes = [0u8; 16];
    buf.copy_to_slice(&mut bytes);
    Ok(Uuid::from_bytes(bytes))
}

fn put_uuid_list(buf: &mut BytesMut, ids: &[Uuid]) {
    put_leb128(buf, ids.len() as u64);
    for id in ids {
        buf.put_slice(id.as_bytes());
    }
}

fn get_uuid_list(buf: &mut Bytes) -> Result<Vec<Uuid>> {
    let count = get_leb128(buf)?;
    let count = usize::try_from(count)
        .map_err(|_| ProtocolError::Malformed(format!("count {count} exceeds address space")))?;
    need(buf, count.saturating_mul(16))?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(get_uuid(buf)?);
    }
    Ok(ids)
}

fn put_timestamp(buf: &mut BytesMut, ts: &Timestamp) {
    buf.put_slice(ts.id.as_bytes());
    buf.put_u64_le(ts.ms);
}

fn get_timestamp(buf: &mut Bytes) -> Result<Timestamp> {
    Ok(Timestamp {
        id: get_uuid(buf)?,
        ms: get_u64(buf)?,
    })
}

fn put_sample(buf: &mut BytesMut, sample: &Sample) {
    put_str(buf, &sample.key_expr);
    buf.put_u8(sample.kind as u8);
    put_buf(buf, &sample.payload);
    put_opt_str(buf, sample.encoding.as_deref());
    put_opt_buf(buf, sample.attachment.as_ref());
    match &sample.timestamp {
        Some(ts) => {
            put_bool(buf, true);
            put_timestamp(buf, ts);
        }
        None => put_bool(buf, false),
    }
    buf.put_u8(sample.qos.to_byte());
}

fn get_sample(buf: &mut Bytes) -> Result<Sample> {
    let key_expr = get_str(buf)?;
    let kind = match get_u8(buf)? {
        0 => SampleKind::Put,
        1 => SampleKind::Delete,
        other => {
            return Err(ProtocolError::Malformed(format!(
                "invalid sample kind {other:#04x}"
            )))
        }
    };
    let payload = get_buf(buf)?;
    let encoding = get_opt_str(buf)?;
    let attachment = get_opt_buf(buf)?;
    let timestamp = if get_bool(buf)? {
        Some(get_timestamp(buf)?)
    } else {
        None
    };
    let qos = Qos::from_byte(get_u8(buf)?);
    Ok(Sample {
        key_expr,
        payload,
        kind,
        encoding,
        attachment,
        timestamp,
        qos,
    })
}
