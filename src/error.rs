// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

use crate::types::Mode;

pub type NfcResult<T> = Result<T, NfcError>;

/// Failures while turning bytes back into records or messages.
///
/// These are local to the caller that asked for the decode. A router drops the
/// offending message and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated NDEF data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("empty NDEF message")]
    EmptyMessage,

    #[error("first record is not an application identity record")]
    MissingIdentity,

    #[error("corrupted map payload: {0}")]
    CorruptedMap(String),

    #[error("unsupported map encoding version {0}")]
    UnsupportedMapVersion(u8),

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("chunked NDEF records are not supported")]
    ChunkedRecord,

    #[error("TLV error: {0}")]
    Tlv(String),

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },
}

/// Records that cannot be represented on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} is {len} bytes, at most {max} fit")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("TNF {0:#04x} cannot be written")]
    InvalidTnf(u8),

    #[error("raw record '{id}' uses the reserved type '{record_type}'")]
    ReservedType { id: String, record_type: String },
}

#[derive(Debug, Error)]
pub enum NfcError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("an operation is already pending in {pending:?} mode")]
    Busy { pending: Mode },

    #[error("failed to persist handler table to '{path}': {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors reported by a tag technology while talking to the tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagIoError {
    #[error("tag I/O failed: {0}")]
    Io(String),

    #[error("tag rejected the NDEF format: {0}")]
    Format(String),
}
