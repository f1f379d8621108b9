//! Wire protocol error types.

use crate::version::{GatedField, WireVersion};
use thiserror::Error;

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for encode operations
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Errors raised while decoding a message from its wire bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remain than a fixed width or declared length requires
    #[error("truncated at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes required
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// A length, discriminant or required field is outside its valid domain
    #[error("malformed at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset of the offending field
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// Message kind tag not in the closed kind set for this version
    #[error("unknown message kind {tag:#06x} at wire version {version}")]
    UnknownKind {
        /// Tag read from the stream
        tag: u16,
        /// Version the decode ran at
        version: WireVersion,
    },

    /// Reply decode needs the originating command and none was supplied
    #[error("reply kind {kind} requires its originating command")]
    MissingCorrelatedCommand {
        /// Name of the reply kind
        kind: &'static str,
    },

    /// Version below the oldest supported revision
    #[error("wire version unsupported: {0}")]
    UnsupportedVersion(WireVersion),
}

impl DecodeError {
    /// Build a malformed error at the given offset
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        DecodeError::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    /// Byte offset carried by the error, if any
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::Truncated { offset, .. } | DecodeError::Malformed { offset, .. } => {
                Some(*offset)
            }
            DecodeError::UnknownKind { .. } => Some(0),
            DecodeError::MissingCorrelatedCommand { .. } | DecodeError::UnsupportedVersion(_) => {
                None
            }
        }
    }

    /// Turn truncation inside a version-gated field into a malformed error.
    ///
    /// A field the negotiated version requires must be on the wire; running
    /// out of bytes there is a sender bug, not a short read.
    pub fn into_missing_field(self, field: GatedField) -> Self {
        match self {
            DecodeError::Truncated { offset, .. } => DecodeError::Malformed {
                offset,
                reason: format!("required field {} missing", field.name()),
            },
            other => other,
        }
    }
}

/// Errors raised while encoding a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Message kind has no wire representation (node-local signaling)
    #[error("message kind {0} is not serializable")]
    NotSerializable(&'static str),

    /// Message kind does not exist at the target version
    #[error("message kind {kind} not supported at wire version {version}")]
    UnsupportedKind {
        /// Name of the message kind
        kind: &'static str,
        /// Target version
        version: WireVersion,
    },

    /// Version below the oldest supported revision
    #[error("wire version unsupported: {0}")]
    UnsupportedVersion(WireVersion),

    /// A field exceeds its size bound
    #[error("field {field} too large: {size} bytes (max {max})")]
    FieldTooLarge {
        /// Field name
        field: &'static str,
        /// Actual size
        size: usize,
        /// Allowed maximum
        max: usize,
    },

    /// A field value violates a message invariant
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong
        reason: &'static str,
    },
}
