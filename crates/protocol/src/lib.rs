//! # Veles Protocol
//!
//! Wire protocol definitions for the Veles client library.
//!
//! This crate provides:
//! - [`ClientMessage`] / [`BrokerMessage`]: every frame exchanged
//!   between a session and its broker, as typed values
//! - [`codec`]: the binary framing (tag byte, optional little-endian
//!   sequence id, LEB128 length prefixes, optional-flag fields)
//! - [`Qos`] and [`QuerySettings`]: single-byte packed metadata
//! - [`Sample`], [`Reply`], [`Timestamp`]: the data model delivered to
//!   subscribers and queriers
//! - [`KeyExpr`]: validated, wildcard-capable resource names
//! - [`Transport`]: the frame-pipe abstraction sessions run on
//!
//! ## Example
//!
//! ```
//! use veles_protocol::{codec, ClientMessage};
//!
//! let msg = ClientMessage::DeclareSubscriber {
//!     id: 1,
//!     key_expr: "demo/**".to_string(),
//! };
//!
//! // correlated request: tag byte carries the high bit, then the
//! // little-endian sequence id, then the body
//! let mut frame = codec::encode_client(&msg, Some(7));
//! let header = codec::decode_header(&mut frame).unwrap();
//! assert_eq!(header.sequence_id, Some(7));
//! assert_eq!(codec::decode_client(header.tag, &mut frame).unwrap(), msg);
//! ```

pub mod codec;
pub mod error;
pub mod keyexpr;
pub mod messages;
pub mod qos;
pub mod sample;
pub mod transport;

pub use error::{ProtocolError, Result};
pub use keyexpr::KeyExpr;
pub use messages::{tag, BrokerMessage, ClientMessage};
pub use qos::{
    CongestionControl, ConsolidationMode, Locality, Priority, Qos, QuerySettings, QueryTarget,
    Reliability, ReplyKeyExprPolicy,
};
pub use sample::{Reply, ReplyError, Sample, SampleKind, SessionInfo, Timestamp};
pub use transport::Transport;
