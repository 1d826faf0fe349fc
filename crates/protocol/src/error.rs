use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unknown message tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("reserved bits set in query settings byte: {0:#010b}")]
    InvalidQuerySettings(u8),

    #[error("invalid key expression {expr:?}: {reason}")]
    InvalidKeyExpr { expr: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
