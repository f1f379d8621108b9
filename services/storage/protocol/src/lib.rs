//! Versioned encoding of storage commands and replies.
//!
//! [`StorageProtocol`] turns any [`StorageCommand`] or [`StorageReply`] into
//! bytes for a given protocol version and back. Layouts are shared by every
//! supported version, with fields added after 5.0 written or skipped according
//! to the version gates in `storage-wire`.
//!
//! ## Features
//!
//! - **Four wire revisions**: 5.0, 5.1, 5.2 and 6.0, selected per call
//! - **Downgrade by default**: fields a version cannot carry are dropped on
//!   encode and take their defaults on decode
//! - **Reply correlation**: [`PendingCommands`] keeps sent commands until the
//!   replies that depend on them arrive
//! - **Exact size accounting**: approximate sizes are computed by running the
//!   encoder against a counting sink
//!
//! [`StorageCommand`]: storage_api::StorageCommand
//! [`StorageReply`]: storage_api::StorageReply

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod correlator;
mod serialize;

#[cfg(test)]
mod tests;

// Re-export main types
pub use codec::{peek_msg_id, StorageProtocol, MSG_ID_OFFSET, NO_SOURCE_INDEX};
pub use correlator::{PendingCommand, PendingCommands};
pub use storage_wire::{DecodeError, DecodeResult, EncodeError, EncodeResult, WireVersion};
