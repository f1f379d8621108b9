//! Layout of the fields shared between message kinds.

use super::Context;
use storage_api::message::{ApplyDiffEntry, BucketInfoEntry, DiffEntry, MergeNode, MergeNodes};
use storage_api::{
    Bucket, BucketId, BucketInfo, BucketInfoFlags, BucketSpace, Document, DocumentId,
    DocumentUpdate, GlobalId, TestAndSetCondition, Timestamp, MAX_CONDITION_LEN,
};
use storage_wire::{
    check_field_len, DecodeError, DecodeResult, EncodeError, EncodeResult, GatedField, Revision,
    WireReader, WireWrite, MAX_FIELD_LEN,
};

/// Encoded width of a bucket id
pub(crate) const BUCKET_ID_SIZE: usize = 8;
/// Smallest encoded bucket info (pre 5.1)
pub(crate) const BUCKET_INFO_MIN_SIZE: usize = 8 + 5 * 4;
/// Encoded width of a diff entry
pub(crate) const DIFF_ENTRY_SIZE: usize = 8 + GlobalId::LENGTH + 4 + 4 + 2 + 2;
/// Smallest encoded apply entry
pub(crate) const APPLY_ENTRY_MIN_SIZE: usize = DIFF_ENTRY_SIZE + 3 * 4;

pub(crate) fn write_string<W: WireWrite>(out: &mut W, field: &'static str, s: &str) -> EncodeResult<()> {
    check_field_len(field, s.len(), MAX_FIELD_LEN)?;
    out.write_string(s);
    Ok(())
}

pub(crate) fn write_blob<W: WireWrite>(out: &mut W, field: &'static str, data: &[u8]) -> EncodeResult<()> {
    check_field_len(field, data.len(), MAX_FIELD_LEN)?;
    out.write_bytes(data);
    Ok(())
}

pub(crate) fn write_count<W: WireWrite>(out: &mut W, field: &'static str, len: usize) -> EncodeResult<()> {
    let count = u32::try_from(len).map_err(|_| EncodeError::FieldTooLarge {
        field,
        size: len,
        max: u32::MAX as usize,
    })?;
    out.write_u32(count);
    Ok(())
}

pub(crate) fn write_short_count<W: WireWrite>(out: &mut W, field: &'static str, len: usize) -> EncodeResult<()> {
    let count = u16::try_from(len).map_err(|_| EncodeError::FieldTooLarge {
        field,
        size: len,
        max: u16::MAX as usize,
    })?;
    out.write_u16(count);
    Ok(())
}

pub(crate) fn write_space<W: WireWrite>(out: &mut W, space: BucketSpace, rev: Revision) {
    GatedField::BucketSpace.write(out, rev, |o| o.write_u64(space.id()));
}

pub(crate) fn read_space(r: &mut WireReader, rev: Revision) -> DecodeResult<BucketSpace> {
    GatedField::BucketSpace.read(r, rev, |r| r.read_u64().map(BucketSpace))
}

pub(crate) fn write_bucket<W: WireWrite>(out: &mut W, bucket: &Bucket, rev: Revision) {
    write_space(out, bucket.space, rev);
    out.write_u64(bucket.id.raw());
}

pub(crate) fn read_bucket(r: &mut WireReader, rev: Revision) -> DecodeResult<Bucket> {
    let space = read_space(r, rev)?;
    let id = read_bucket_id(r)?;
    Ok(Bucket::new(space, id))
}

pub(crate) fn read_bucket_id(r: &mut WireReader) -> DecodeResult<BucketId> {
    r.read_u64().map(BucketId::from_raw)
}

pub(crate) fn read_timestamp(r: &mut WireReader) -> DecodeResult<Timestamp> {
    r.read_u64().map(Timestamp)
}

pub(crate) fn write_bucket_ids<W: WireWrite>(out: &mut W, field: &'static str, ids: &[BucketId]) -> EncodeResult<()> {
    write_count(out, field, ids.len())?;
    for id in ids {
        out.write_u64(id.raw());
    }
    Ok(())
}

pub(crate) fn read_bucket_ids(r: &mut WireReader) -> DecodeResult<Vec<BucketId>> {
    let count = r.read_count(BUCKET_ID_SIZE)?;
    (0..count).map(|_| read_bucket_id(r)).collect()
}

pub(crate) fn write_bucket_info<W: WireWrite>(out: &mut W, info: &BucketInfo, rev: Revision) {
    out.write_u64(info.last_modified());
    out.write_u32(info.checksum());
    out.write_u32(info.doc_count());
    out.write_u32(info.total_doc_size());
    out.write_u32(info.meta_count());
    out.write_u32(info.used_file_size());
    GatedField::BucketInfoFlags.write(out, rev, |o| o.write_u8(info.flags().bits()));
}

pub(crate) fn read_bucket_info(r: &mut WireReader, rev: Revision) -> DecodeResult<BucketInfo> {
    let last_modified = r.read_u64()?;
    let checksum = r.read_u32()?;
    let doc_count = r.read_u32()?;
    let total_doc_size = r.read_u32()?;
    let meta_count = r.read_u32()?;
    let used_file_size = r.read_u32()?;
    let offset = r.offset();
    let flags = GatedField::BucketInfoFlags.read(r, rev, |r| r.read_u8())?;
    let flags = BucketInfoFlags::from_bits(flags).ok_or_else(|| {
        DecodeError::malformed(offset, format!("unknown bucket info flags {:#04x}", flags))
    })?;
    Ok(BucketInfo::full(
        checksum,
        doc_count,
        total_doc_size,
        meta_count,
        used_file_size,
        flags.contains(BucketInfoFlags::READY),
        flags.contains(BucketInfoFlags::ACTIVE),
        last_modified,
    ))
}

pub(crate) fn write_info_entries<W: WireWrite>(
    out: &mut W,
    field: &'static str,
    entries: &[BucketInfoEntry],
    rev: Revision,
) -> EncodeResult<()> {
    write_count(out, field, entries.len())?;
    for entry in entries {
        out.write_u64(entry.bucket_id.raw());
        write_bucket_info(out, &entry.info, rev);
    }
    Ok(())
}

pub(crate) fn read_info_entries(r: &mut WireReader, rev: Revision) -> DecodeResult<Vec<BucketInfoEntry>> {
    let count = r.read_count(BUCKET_ID_SIZE + BUCKET_INFO_MIN_SIZE)?;
    (0..count)
        .map(|_| {
            let bucket_id = read_bucket_id(r)?;
            let info = read_bucket_info(r, rev)?;
            Ok(BucketInfoEntry::new(bucket_id, info))
        })
        .collect()
}

pub(crate) fn write_condition<W: WireWrite>(
    out: &mut W,
    condition: &TestAndSetCondition,
    rev: Revision,
) -> EncodeResult<()> {
    if GatedField::Condition.present_at(rev) {
        check_field_len("condition", condition.selection().len(), MAX_CONDITION_LEN)?;
    }
    GatedField::Condition.write(out, rev, |o| o.write_string(condition.selection()));
    Ok(())
}

pub(crate) fn read_condition(r: &mut WireReader, rev: Revision) -> DecodeResult<TestAndSetCondition> {
    GatedField::Condition.read(r, rev, |r| {
        r.read_string_bounded(MAX_CONDITION_LEN)
            .map(TestAndSetCondition::new)
    })
}

pub(crate) fn read_document_id(r: &mut WireReader) -> DecodeResult<DocumentId> {
    let offset = r.offset();
    let raw = r.read_string()?;
    DocumentId::parse(raw).map_err(|e| DecodeError::malformed(offset, e.to_string()))
}

pub(crate) fn write_nodes<W: WireWrite>(out: &mut W, nodes: &[MergeNode], rev: Revision) -> EncodeResult<()> {
    write_short_count(out, "merge nodes", nodes.len())?;
    for node in nodes {
        out.write_u16(node.index);
        GatedField::MergeNodeSourceOnly.write(out, rev, |o| o.write_bool(node.source_only));
    }
    Ok(())
}

pub(crate) fn read_nodes(r: &mut WireReader, rev: Revision) -> DecodeResult<MergeNodes> {
    let count = r.read_short_count(2)?;
    (0..count)
        .map(|_| {
            let index = r.read_u16()?;
            let source_only = GatedField::MergeNodeSourceOnly.read(r, rev, |r| r.read_bool())?;
            Ok(MergeNode::new(index, source_only))
        })
        .collect()
}

pub(crate) fn write_diff_entry<W: WireWrite>(out: &mut W, entry: &DiffEntry) {
    out.write_u64(entry.timestamp.value());
    out.write_raw(entry.gid.as_bytes());
    out.write_u32(entry.header_size);
    out.write_u32(entry.body_size);
    out.write_u16(entry.flags);
    out.write_u16(entry.has_mask);
}

pub(crate) fn read_diff_entry(r: &mut WireReader) -> DecodeResult<DiffEntry> {
    Ok(DiffEntry {
        timestamp: read_timestamp(r)?,
        gid: GlobalId::from_raw(&r.read_raw(GlobalId::LENGTH)?),
        header_size: r.read_u32()?,
        body_size: r.read_u32()?,
        flags: r.read_u16()?,
        has_mask: r.read_u16()?,
    })
}

pub(crate) fn write_diff<W: WireWrite>(out: &mut W, diff: &[DiffEntry]) -> EncodeResult<()> {
    write_count(out, "diff entries", diff.len())?;
    for entry in diff {
        write_diff_entry(out, entry);
    }
    Ok(())
}

pub(crate) fn read_diff(r: &mut WireReader) -> DecodeResult<Vec<DiffEntry>> {
    let count = r.read_count(DIFF_ENTRY_SIZE)?;
    (0..count).map(|_| read_diff_entry(r)).collect()
}

pub(crate) fn write_apply_diff<W: WireWrite>(out: &mut W, diff: &[ApplyDiffEntry]) -> EncodeResult<()> {
    write_count(out, "apply entries", diff.len())?;
    for entry in diff {
        write_diff_entry(out, &entry.entry);
        write_string(out, "document type name", &entry.doc_name)?;
        write_blob(out, "header blob", &entry.header_blob)?;
        write_blob(out, "body blob", &entry.body_blob)?;
    }
    Ok(())
}

pub(crate) fn read_apply_diff(r: &mut WireReader) -> DecodeResult<Vec<ApplyDiffEntry>> {
    let count = r.read_count(APPLY_ENTRY_MIN_SIZE)?;
    (0..count)
        .map(|_| {
            Ok(ApplyDiffEntry {
                entry: read_diff_entry(r)?,
                doc_name: r.read_string()?,
                header_blob: r.read_bytes()?,
                body_blob: r.read_bytes()?,
            })
        })
        .collect()
}

impl Context<'_> {
    pub(crate) fn write_document<W: WireWrite>(&self, out: &mut W, doc: &Document) -> EncodeResult<()> {
        let size = self.repo.document_size(doc);
        check_field_len("document", size, MAX_FIELD_LEN)?;
        out.write_u32(size as u32);
        self.repo.write_document(doc, out);
        Ok(())
    }

    pub(crate) fn read_document(&self, r: &mut WireReader) -> DecodeResult<Document> {
        let offset = r.offset();
        let blob = r.read_bytes()?;
        self.repo
            .read_document(blob)
            .map_err(|e| DecodeError::malformed(offset, e.to_string()))
    }

    /// Document blob where a zero length means no document
    pub(crate) fn write_optional_document<W: WireWrite>(
        &self,
        out: &mut W,
        doc: Option<&Document>,
    ) -> EncodeResult<()> {
        match doc {
            Some(doc) => self.write_document(out, doc),
            None => {
                out.write_u32(0);
                Ok(())
            }
        }
    }

    pub(crate) fn read_optional_document(&self, r: &mut WireReader) -> DecodeResult<Option<Document>> {
        let offset = r.offset();
        let blob = r.read_bytes()?;
        if blob.is_empty() {
            return Ok(None);
        }
        self.repo
            .read_document(blob)
            .map(Some)
            .map_err(|e| DecodeError::malformed(offset, e.to_string()))
    }

    pub(crate) fn write_update<W: WireWrite>(&self, out: &mut W, update: &DocumentUpdate) -> EncodeResult<()> {
        let size = self.repo.update_size(update);
        check_field_len("document update", size, MAX_FIELD_LEN)?;
        out.write_u32(size as u32);
        self.repo.write_update(update, out);
        Ok(())
    }

    pub(crate) fn read_update(&self, r: &mut WireReader) -> DecodeResult<DocumentUpdate> {
        let offset = r.offset();
        let blob = r.read_bytes()?;
        self.repo
            .read_update(blob)
            .map_err(|e| DecodeError::malformed(offset, e.to_string()))
    }
}
