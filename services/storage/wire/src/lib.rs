//! Primitive wire codec and version gates for the storage protocol.
//!
//! This crate holds the pieces every storage message encoder shares: the
//! big-endian primitive codec, the typed decode/encode errors, and the table
//! of fields that only exist from a given protocol revision on.
//!
//! ## Features
//!
//! - **Network byte order**: every integer on the wire is big-endian
//! - **Bounded decoding**: length prefixes above a sane limit are rejected
//!   before any allocation happens
//! - **Offset-aware errors**: truncation and malformed input report the byte
//!   offset where decoding failed
//! - **Size-only encoding**: [`SizeCounter`] runs the same layout code as a
//!   real encode to compute exact per-version message sizes
//! - **Declarative version gates**: [`FIELD_GATES`] lists every field added
//!   after the 5.0 baseline and the revision that introduced it

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod error;
pub mod version;

// Re-export main types
pub use buffer::{check_field_len, SizeCounter, WireReader, WireWrite, LENGTH_PREFIX_SIZE, MAX_FIELD_LEN};
pub use error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use version::{FieldGate, GatedField, ParseVersionError, Revision, WireVersion, FIELD_GATES};
