//! Error kinds raised by the codecs, the result model and the dispatcher.
use std::io;

use thiserror::Error;

use crate::codec::{Compression, Format};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize {format} document: {reason}")]
    Serialize { format: Format, reason: String },

    #[error("failed to compress {format} document: {cause}")]
    Compression {
        format: Format,
        cause: CompressionError,
    },
}

/// Failure to turn an inbound buffer into a query.
///
/// Any of these is recoverable while the dispatcher still has codecs left to try, except
/// [`DecodeError::NoCodecMatched`] which reports that the whole matrix was exhausted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {format} document: {reason}")]
    Malformed { format: Format, reason: String },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("unrecognized query type code '{0}'")]
    UnknownQueryType(String),

    #[error("compressed payload rejected: {0}")]
    Compression(#[from] CompressionError),

    #[error("invalid result set: {0}")]
    Result(#[from] ResultError),

    #[error("no codec matched the inbound message ({attempts} attempted)")]
    NoCodecMatched { attempts: usize },
}

impl DecodeError {
    /// Whether another codec may still succeed on the same input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DecodeError::NoCodecMatched { .. })
    }
}

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("deflate failed: {0}")]
    Deflate(#[from] flate2::CompressError),

    #[error("inflate failed: {0}")]
    Inflate(#[from] flate2::DecompressError),

    #[error("{0} bytes left over after end of deflate stream")]
    TrailingData(usize),

    #[error("deflate stream stalled after {consumed} of {total} input bytes")]
    Stalled { consumed: usize, total: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown format '{0}'")]
    UnknownFormat(String),

    #[error("unknown compression level '{0}'")]
    UnknownCompression(String),

    #[error("unsupported combination {format} / {compression}")]
    Unsupported {
        format: Format,
        compression: Compression,
    },

    #[error("invalid session option '{option}': {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResultError {
    #[error("unknown result type code '{0}'")]
    UnknownResultType(String),

    #[error("missing result field '{0}'")]
    MissingField(&'static str),

    #[error("result field '{field}' should be {expected}, found {found}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("table row {row} has {found} values but {expected} columns are declared")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Outbound failure of a dispatcher.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("failed to hand message to transport: {0}")]
    Io(#[from] io::Error),
}
