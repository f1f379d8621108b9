//! Document level operations: put, update, get, remove, revert and
//! remove-by-selection.

use super::render::{render_block, Render};
use super::{CommandHeader, ReplyHeader};
use crate::bucket::Bucket;
use crate::bucketinfo::BucketInfo;
use crate::document::{Document, DocumentUpdate};
use crate::types::{DocumentId, TestAndSetCondition, Timestamp};
use std::fmt;

/// Field set selecting every field of a document
pub const ALL_FIELDS: &str = "[all]";

fn render_condition(out: &mut dyn fmt::Write, condition: &TestAndSetCondition) -> fmt::Result {
    if condition.is_present() {
        write!(out, ", condition {}", condition.selection())?;
    }
    Ok(())
}

/// Store a document at a given timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct PutCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Document to store
    pub document: Document,
    /// Operation timestamp
    pub timestamp: Timestamp,
    /// Timestamp of the document version this put replaces, if any
    pub update_timestamp: Timestamp,
    /// Optional test-and-set condition
    pub condition: TestAndSetCondition,
}

impl PutCommand {
    /// Put `document` into `bucket` at `timestamp`
    pub fn new(bucket: Bucket, document: Document, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            document,
            timestamp: timestamp.into(),
            update_timestamp: Timestamp::UNSET,
            condition: TestAndSetCondition::none(),
        }
    }

    /// Id of the stored document
    pub fn document_id(&self) -> &DocumentId {
        self.document.id()
    }
}

impl Render for PutCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(
            out,
            "Put({}, {}, timestamp {}, size {}",
            self.bucket,
            self.document.id(),
            self.timestamp,
            self.document.body().len()
        )?;
        if self.update_timestamp.is_set() {
            write!(out, ", update timestamp {}", self.update_timestamp)?;
        }
        render_condition(out, &self.condition)?;
        out.write_str(")")?;
        if verbose {
            render_block(out, &self.document, indent)?;
        }
        Ok(())
    }
}

/// Reply to [`PutCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct PutReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Bucket the document went to
    pub bucket: Bucket,
    /// Id of the stored document; restored from the command
    pub doc_id: DocumentId,
    /// Document the put stored; restored from the command
    pub document: Option<Document>,
    /// Operation timestamp
    pub timestamp: Timestamp,
    /// Update timestamp of the command
    pub update_timestamp: Timestamp,
    /// Whether an earlier version of the document existed
    pub was_found: bool,
    /// Bucket state after the put
    pub bucket_info: BucketInfo,
}

impl PutReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &PutCommand, was_found: bool) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            doc_id: cmd.document.id().clone(),
            document: Some(cmd.document.clone()),
            timestamp: cmd.timestamp,
            update_timestamp: cmd.update_timestamp,
            was_found,
            bucket_info: BucketInfo::default(),
        }
    }

    /// Id of the stored document
    pub fn document_id(&self) -> &DocumentId {
        &self.doc_id
    }

    /// Whether the reply still carries the stored document
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }
}

impl Render for PutReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(
            out,
            "PutReply({}, {}, timestamp {}",
            self.doc_id,
            self.bucket,
            self.timestamp
        )?;
        if self.update_timestamp.is_set() {
            write!(out, ", update timestamp {}", self.update_timestamp)?;
        }
        write!(out, ", {})", self.bucket_info)?;
        if !self.was_found {
            out.write_str(" not found")?;
        }
        Ok(())
    }
}

/// Apply a partial update to a document
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Update to apply
    pub update: DocumentUpdate,
    /// Operation timestamp
    pub timestamp: Timestamp,
    /// Only apply if the current document has this timestamp; 0 for any
    pub old_timestamp: Timestamp,
    /// Optional test-and-set condition
    pub condition: TestAndSetCondition,
}

impl UpdateCommand {
    /// Apply `update` in `bucket` at `timestamp`
    pub fn new(bucket: Bucket, update: DocumentUpdate, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            update,
            timestamp: timestamp.into(),
            old_timestamp: Timestamp::UNSET,
            condition: TestAndSetCondition::none(),
        }
    }

    /// Id of the updated document
    pub fn document_id(&self) -> &DocumentId {
        self.update.id()
    }
}

impl Render for UpdateCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(
            out,
            "Update({}, {}, timestamp {}",
            self.bucket,
            self.update.id(),
            self.timestamp
        )?;
        if self.old_timestamp.is_set() {
            write!(out, ", old timestamp {}", self.old_timestamp)?;
        }
        render_condition(out, &self.condition)?;
        out.write_str(")")?;
        if verbose {
            render_block(out, &self.update, indent)?;
        }
        Ok(())
    }
}

/// Reply to [`UpdateCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Id of the updated document; restored from the command
    pub doc_id: DocumentId,
    /// Operation timestamp
    pub timestamp: Timestamp,
    /// Timestamp of the document version the update was applied to
    pub old_timestamp: Timestamp,
    /// Bucket state after the update
    pub bucket_info: BucketInfo,
}

impl UpdateReply {
    /// Reply to `cmd`; `old_timestamp` 0 means no document was updated
    pub fn from_command(cmd: &UpdateCommand, old_timestamp: Timestamp) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            doc_id: cmd.update.id().clone(),
            timestamp: cmd.timestamp,
            old_timestamp,
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for UpdateReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(
            out,
            "UpdateReply({}, {}, timestamp {}, timestamp of updated doc: {}",
            self.doc_id, self.bucket, self.timestamp, self.old_timestamp
        )?;
        write!(out, ", {})", self.bucket_info)
    }
}

/// Fetch a document as of a timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct GetCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket to look in
    pub bucket: Bucket,
    /// Document to fetch
    pub doc_id: DocumentId,
    /// Comma separated fields to return
    pub field_set: String,
    /// Newest version to consider; `u64::MAX` for the latest
    pub before_timestamp: Timestamp,
}

impl GetCommand {
    /// Get `doc_id` restricted to `field_set`
    pub fn new(
        bucket: Bucket,
        doc_id: DocumentId,
        field_set: impl Into<String>,
        before_timestamp: impl Into<Timestamp>,
    ) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            doc_id,
            field_set: field_set.into(),
            before_timestamp: before_timestamp.into(),
        }
    }

    /// Get the newest version with every field
    pub fn latest(bucket: Bucket, doc_id: DocumentId) -> Self {
        Self::new(bucket, doc_id, ALL_FIELDS, u64::MAX)
    }
}

impl Render for GetCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "Get({}, {}", self.bucket, self.doc_id)?;
        if self.field_set != ALL_FIELDS {
            write!(out, ", field set {}", self.field_set)?;
        }
        if self.before_timestamp.value() != u64::MAX {
            write!(out, ", before timestamp {}", self.before_timestamp)?;
        }
        out.write_str(")")
    }
}

/// Reply to [`GetCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct GetReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Bucket looked in
    pub bucket: Bucket,
    /// Requested document id; restored from the command
    pub doc_id: DocumentId,
    /// Requested field set; restored from the command
    pub field_set: String,
    /// Requested timestamp bound; restored from the command
    pub before_timestamp: Timestamp,
    /// Timestamp of the returned version, 0 if not found
    pub last_modified: Timestamp,
    /// The document, if found
    pub document: Option<Document>,
}

impl GetReply {
    /// Reply to `cmd` carrying `document`
    pub fn from_command(cmd: &GetCommand, document: Option<Document>, last_modified: Timestamp) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            doc_id: cmd.doc_id.clone(),
            field_set: cmd.field_set.clone(),
            before_timestamp: cmd.before_timestamp,
            last_modified,
            document,
        }
    }

    /// Whether a document was found
    pub fn was_found(&self) -> bool {
        self.document.is_some()
    }
}

impl Render for GetReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(
            out,
            "GetReply({}, {}, timestamp {})",
            self.bucket, self.doc_id, self.last_modified
        )?;
        if verbose {
            if let Some(doc) = &self.document {
                render_block(out, doc, indent)?;
            }
        }
        Ok(())
    }
}

/// Remove a document by writing a remove entry at a timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Document to remove
    pub doc_id: DocumentId,
    /// Operation timestamp
    pub timestamp: Timestamp,
    /// Optional test-and-set condition
    pub condition: TestAndSetCondition,
}

impl RemoveCommand {
    /// Remove `doc_id` from `bucket` at `timestamp`
    pub fn new(bucket: Bucket, doc_id: DocumentId, timestamp: impl Into<Timestamp>) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            doc_id,
            timestamp: timestamp.into(),
            condition: TestAndSetCondition::none(),
        }
    }
}

impl Render for RemoveCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(
            out,
            "Remove({}, {}, timestamp {}",
            self.bucket, self.doc_id, self.timestamp
        )?;
        render_condition(out, &self.condition)?;
        out.write_str(")")
    }
}

/// Reply to [`RemoveCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Removed document; restored from the command
    pub doc_id: DocumentId,
    /// Operation timestamp
    pub timestamp: Timestamp,
    /// Timestamp of the removed version, 0 if nothing was removed
    pub old_timestamp: Timestamp,
    /// Bucket state after the remove
    pub bucket_info: BucketInfo,
}

impl RemoveReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &RemoveCommand, old_timestamp: Timestamp) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            doc_id: cmd.doc_id.clone(),
            timestamp: cmd.timestamp,
            old_timestamp,
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for RemoveReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(
            out,
            "RemoveReply({}, {}, timestamp {}",
            self.bucket, self.doc_id, self.timestamp
        )?;
        if self.old_timestamp.is_set() {
            write!(out, ", removed doc from {}", self.old_timestamp)?;
        } else {
            out.write_str(", not found")?;
        }
        write!(out, ", {})", self.bucket_info)
    }
}

/// Undo the operations written at the given timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct RevertCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Timestamps of the operations to revert
    pub tokens: Vec<Timestamp>,
}

impl RevertCommand {
    /// Revert `tokens` in `bucket`
    pub fn new(bucket: Bucket, tokens: Vec<Timestamp>) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            tokens,
        }
    }
}

impl Render for RevertCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "Revert({}", self.bucket)?;
        if verbose {
            out.write_str(",")?;
            for token in &self.tokens {
                write!(out, "\n{}  {}", indent, token)?;
            }
        }
        out.write_str(")")
    }
}

/// Reply to [`RevertCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct RevertReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Reverted timestamps; restored from the command
    pub tokens: Vec<Timestamp>,
    /// Bucket state after the revert
    pub bucket_info: BucketInfo,
}

impl RevertReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &RevertCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            tokens: cmd.tokens.clone(),
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for RevertReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "RevertReply({}, {})", self.bucket, self.bucket_info)
    }
}

/// Remove every document in a bucket matching a selection
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveLocationCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Document selection expression
    pub selection: String,
    /// Target bucket
    pub bucket: Bucket,
}

impl RemoveLocationCommand {
    /// Remove documents matching `selection` from `bucket`
    pub fn new(selection: impl Into<String>, bucket: Bucket) -> Self {
        Self {
            header: CommandHeader::new(),
            selection: selection.into(),
            bucket,
        }
    }
}

impl Render for RemoveLocationCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "Remove selection({}): {}", self.bucket, self.selection)
    }
}

/// Reply to [`RemoveLocationCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveLocationReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Bucket state after the removal
    pub bucket_info: BucketInfo,
}

impl RemoveLocationReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &RemoveLocationCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for RemoveLocationReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "RemoveLocationReply({}, {})", self.bucket, self.bucket_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketId;
    use bytes::Bytes;

    fn doc_id() -> DocumentId {
        DocumentId::parse("id:ns:testdoctype1::http://www.ntnu.no/").unwrap()
    }

    fn bucket() -> Bucket {
        Bucket::in_default_space(BucketId::new(16, 0x51))
    }

    #[test]
    fn test_put_reply_inherits_identity() {
        let doc = Document::new(doc_id(), Bytes::from_static(b"headerval=17"));
        let mut cmd = PutCommand::new(bucket(), doc.clone(), 14u64);
        cmd.update_timestamp = Timestamp(13);
        cmd.header.priority = 42;

        let reply = PutReply::from_command(&cmd, true);
        assert_eq!(reply.header.msg_id, cmd.header.msg_id);
        assert_eq!(reply.header.priority, 42);
        assert!(reply.has_document());
        assert_eq!(reply.document, Some(doc));
        assert_eq!(reply.document_id(), &doc_id());
        assert_eq!(reply.timestamp, Timestamp(14));
        assert_eq!(reply.update_timestamp, Timestamp(13));
        assert_eq!(reply.bucket, bucket());
    }

    #[test]
    fn test_update_defaults() {
        let update = DocumentUpdate::new(doc_id(), Bytes::from_static(b"assign headerval 17"));
        let cmd = UpdateCommand::new(bucket(), update, 14u64);
        assert_eq!(cmd.old_timestamp, Timestamp::UNSET);
        assert!(!cmd.condition.is_present());

        let reply = UpdateReply::from_command(&cmd, Timestamp(8));
        assert_eq!(reply.doc_id, doc_id());
        assert_eq!(reply.old_timestamp, Timestamp(8));
    }

    #[test]
    fn test_remove_render() {
        let mut cmd = RemoveCommand::new(bucket(), doc_id(), 159u64);
        assert_eq!(
            cmd.rendered(false, ""),
            "Remove(BucketId(0x4000000000000051), id:ns:testdoctype1::http://www.ntnu.no/, timestamp 159)"
        );
        cmd.condition = TestAndSetCondition::new("testdoctype1.headerval == 42");
        assert!(cmd.rendered(false, "").ends_with(", condition testdoctype1.headerval == 42)"));
    }

    #[test]
    fn test_get_latest() {
        let cmd = GetCommand::latest(bucket(), doc_id());
        assert_eq!(cmd.field_set, ALL_FIELDS);
        assert_eq!(cmd.before_timestamp, Timestamp(u64::MAX));
        assert!(!GetReply::from_command(&cmd, None, Timestamp::UNSET).was_found());
    }

    #[test]
    fn test_revert_verbose_lists_tokens() {
        let cmd = RevertCommand::new(bucket(), vec![Timestamp(59), Timestamp(60)]);
        assert_eq!(
            cmd.rendered(true, ""),
            "Revert(BucketId(0x4000000000000051),\n  59\n  60)"
        );
        assert_eq!(
            cmd.rendered(true, "  "),
            "Revert(BucketId(0x4000000000000051),\n    59\n    60)"
        );
    }

    #[test]
    fn test_nested_document_blocks_follow_indent() {
        let doc = Document::new(doc_id(), Bytes::from_static(b"headerval=17"));
        let put = PutCommand::new(bucket(), doc.clone(), 14u64);
        assert_eq!(
            put.rendered(true, "  "),
            "Put(BucketId(0x4000000000000051), id:ns:testdoctype1::http://www.ntnu.no/, \
             timestamp 14, size 12) {\n    \
             Document(id:ns:testdoctype1::http://www.ntnu.no/, 12 bytes)\n  }"
        );
        assert!(put.rendered(true, "").ends_with(" {\n  Document(id:ns:testdoctype1::http://www.ntnu.no/, 12 bytes)\n}"));

        let get = GetCommand::latest(bucket(), doc_id());
        let reply = GetReply::from_command(&get, Some(doc), Timestamp(14));
        assert!(reply.rendered(true, "\t").ends_with(" {\n\t  Document(id:ns:testdoctype1::http://www.ntnu.no/, 12 bytes)\n\t}"));
    }
}
