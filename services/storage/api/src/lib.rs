//! Storage protocol message model.
//!
//! Value types (buckets, bucket info, timestamps, document ids), the closed
//! set of storage commands and replies, human-readable rendering, and node
//! addressing. Encoding lives in the `storage-protocol` crate; this crate
//! only describes what is sent.
//!
//! ## Features
//!
//! - **Closed message set**: [`StorageCommand`] and [`StorageReply`] have one
//!   variant per [`MessageKind`]
//! - **Reply construction from commands**: every reply is built from a
//!   reference to its command and inherits its message id and priority
//! - **Process-wide message ids**: [`MessageId::next`] never hands out the
//!   same id twice
//! - **Terse and verbose rendering** through the [`Render`] trait
//! - **Document boundary**: documents stay opaque behind [`DocumentTypeRepo`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod bucket;
pub mod bucketinfo;
pub mod document;
pub mod message;
pub mod types;

// Re-export main types
pub use address::{NodeType, StorageMessageAddress};
pub use bucket::{Bucket, BucketId, BucketSpace};
pub use bucketinfo::{BucketInfo, BucketInfoFlags};
pub use document::{BasicTypeRepo, Document, DocumentTypeRepo, DocumentUpdate};
pub use message::render::Render;
pub use message::{
    CommandHeader, MessageId, MessageKind, ReplyHeader, ResultCode, ReturnCode, StorageCommand,
    StorageReply, DEFAULT_APPROX_BYTE_SIZE,
};
pub use types::{
    DocumentError, DocumentId, GlobalId, LoadType, LoadTypeSet, TestAndSetCondition, Timestamp,
    DEFAULT_PRIORITY, MAX_CONDITION_LEN,
};
