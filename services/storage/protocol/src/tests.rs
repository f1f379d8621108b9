use crate::serialize::fields::{read_condition, read_nodes, read_space};
use crate::{peek_msg_id, PendingCommands, StorageProtocol};
use bytes::{BufMut, Bytes, BytesMut};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use storage_api::message::*;
use storage_api::{
    BasicTypeRepo, Bucket, BucketId, BucketInfo, BucketSpace, Document, DocumentId,
    DocumentUpdate, GlobalId, LoadType, LoadTypeSet, MessageId, ResultCode, ReturnCode,
    StorageCommand, StorageReply, TestAndSetCondition, Timestamp, DEFAULT_PRIORITY,
};
use storage_wire::{DecodeError, EncodeError, GatedField, Revision, WireReader, WireVersion};

const V5_0: WireVersion = WireVersion::new(5, 0, 0);
const V5_1: WireVersion = WireVersion::new(5, 1, 0);
const V5_2: WireVersion = WireVersion::new(5, 93, 30);
const V6_0: WireVersion = WireVersion::new(6, 240, 0);
const ALL_VERSIONS: [WireVersion; 4] = [V5_0, V5_1, V5_2, V6_0];

fn protocol() -> StorageProtocol {
    let mut load_types = LoadTypeSet::new();
    load_types.add_load_type(34, "foo", DEFAULT_PRIORITY);
    StorageProtocol::new(
        Arc::new(load_types),
        Arc::new(BasicTypeRepo::new(["testdoctype1"])),
    )
}

fn doc_id() -> DocumentId {
    DocumentId::parse("id:ns:testdoctype1::http://www.ntnu.no/").unwrap()
}

fn document() -> Document {
    Document::new(doc_id(), Bytes::from_static(b"headerval=17"))
}

fn bucket(used_bits: u32, location: u64) -> Bucket {
    Bucket::in_default_space(BucketId::new(used_bits, location))
}

/// Encode, check the size pass agrees, decode, and restore the sender-side
/// approximate size so the result compares equal to the input
fn copy_command(proto: &StorageProtocol, cmd: &StorageCommand, version: WireVersion) -> StorageCommand {
    let bytes = proto.encode_command(cmd, version).unwrap();
    assert_eq!(proto.approx_command_size(cmd, version).unwrap(), bytes.len());
    let mut decoded = proto.decode_command(bytes.clone(), version).unwrap();
    assert_eq!(decoded.approx_size() as usize, bytes.len());
    decoded.header_mut().approx_size = cmd.approx_size();
    decoded
}

fn copy_reply(
    proto: &StorageProtocol,
    reply: &StorageReply,
    cmd: &StorageCommand,
    version: WireVersion,
) -> StorageReply {
    let bytes = proto.encode_reply(reply, version).unwrap();
    assert_eq!(proto.approx_reply_size(reply, version).unwrap(), bytes.len());
    let mut decoded = proto.decode_reply(bytes.clone(), version, Some(cmd)).unwrap();
    assert_eq!(decoded.approx_size() as usize, bytes.len());
    decoded.header_mut().approx_size = reply.approx_size();
    decoded
}

fn put_command() -> PutCommand {
    let mut cmd = PutCommand::new(bucket(16, 0x51), document(), 14u64);
    cmd.update_timestamp = Timestamp(13);
    cmd.header.load_type = LoadType::new(34, "foo", DEFAULT_PRIORITY);
    cmd
}

#[test]
fn test_fresh_command_has_default_approx_size() {
    assert_eq!(put_command().header.approx_size, 50);
}

#[test]
fn test_put_5_1() {
    let proto = protocol();
    let cmd = StorageCommand::Put(put_command());
    let decoded = copy_command(&proto, &cmd, V5_1);
    assert_eq!(decoded, cmd);

    let StorageCommand::Put(put) = &cmd else { unreachable!() };
    let mut reply = PutReply::from_command(put, true);
    reply.bucket_info = BucketInfo::new(0x1234, 1, 2);
    let reply = StorageReply::Put(reply);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);

    let StorageReply::Put(decoded) = decoded else { unreachable!() };
    assert!(decoded.has_document());
    assert_eq!(decoded.document, Some(document()));
    assert_eq!(decoded.timestamp, Timestamp(14));
    assert_eq!(decoded.update_timestamp, Timestamp(13));
    assert!(decoded.was_found);
}

#[test]
fn test_reply_carries_result_and_message_id() {
    let proto = protocol();
    let cmd = StorageCommand::Put(put_command());
    let mut reply = cmd.make_reply();
    reply.set_result(ReturnCode::new(ResultCode::BucketNotFound, "no such bucket"));

    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded.msg_id(), cmd.msg_id());
    assert_eq!(decoded.result().result, ResultCode::BucketNotFound);
    assert_eq!(decoded.result().message, "no such bucket");
}

#[test]
fn test_update_5_1() {
    let proto = protocol();
    let update = DocumentUpdate::new(doc_id(), Bytes::from_static(b"assign headerval 17"));
    let mut update_cmd = UpdateCommand::new(bucket(16, 0x51), update, 14u64);
    update_cmd.old_timestamp = Timestamp(10);
    let reply = StorageReply::Update(UpdateReply::from_command(&update_cmd, Timestamp(8)));
    let cmd = StorageCommand::Update(update_cmd);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let StorageReply::Update(decoded) = copy_reply(&proto, &reply, &cmd, V5_1) else {
        unreachable!()
    };
    assert_eq!(decoded.old_timestamp, Timestamp(8));
    assert_eq!(decoded.timestamp, Timestamp(14));
    assert_eq!(decoded.doc_id, doc_id());
}

#[test]
fn test_get_5_1() {
    let proto = protocol();
    let get = GetCommand::new(bucket(16, 0x51), doc_id(), "foo,bar,vekterli", 123u64);
    let reply = StorageReply::Get(GetReply::from_command(&get, Some(document()), Timestamp(100)));
    let cmd = StorageCommand::Get(get);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::Get(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.last_modified, Timestamp(100));
    assert_eq!(decoded.before_timestamp, Timestamp(123));
    assert_eq!(decoded.field_set, "foo,bar,vekterli");
}

#[test]
fn test_get_reply_without_document() {
    let proto = protocol();
    let get = GetCommand::latest(bucket(16, 0x51), doc_id());
    let reply = StorageReply::Get(GetReply::from_command(&get, None, Timestamp::UNSET));
    let cmd = StorageCommand::Get(get);

    let StorageReply::Get(decoded) = copy_reply(&proto, &reply, &cmd, V5_1) else {
        unreachable!()
    };
    assert!(!decoded.was_found());
    assert_eq!(decoded.document, None);
}

#[test]
fn test_remove_5_1() {
    let proto = protocol();
    let remove = RemoveCommand::new(bucket(16, 0x51), doc_id(), 159u64);
    let mut reply = RemoveReply::from_command(&remove, Timestamp(48));
    reply.bucket_info = BucketInfo::full(1, 2, 3, 4, 5, true, false, 48);
    let reply = StorageReply::Remove(reply);
    let cmd = StorageCommand::Remove(remove);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::Remove(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.old_timestamp, Timestamp(48));
    assert!(decoded.bucket_info.is_ready());
    assert!(!decoded.bucket_info.is_active());
}

#[test]
fn test_revert_5_1() {
    let proto = protocol();
    let revert = RevertCommand::new(bucket(16, 0x51), vec![Timestamp(59)]);
    let mut reply = RevertReply::from_command(&revert);
    reply.bucket_info = BucketInfo::new(0x12345432, 101, 520);
    let reply = StorageReply::Revert(reply);
    let cmd = StorageCommand::Revert(revert);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::Revert(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.tokens, vec![Timestamp(59)]);
}

#[test]
fn test_request_bucket_info_5_1() {
    let proto = protocol();
    let request = RequestBucketInfoCommand::for_system_state(
        BucketSpace::DEFAULT,
        3,
        "distributor:3 .1.s:d",
        "14",
    );
    let mut reply = RequestBucketInfoReply::from_command(&request);
    reply.entries.push(BucketInfoEntry::new(
        BucketId::from_raw(4),
        BucketInfo::full(43, 24, 123, 44, 124, false, true, 0x1337cafe98765432),
    ));
    let reply = StorageReply::RequestBucketInfo(reply);
    let cmd = StorageCommand::RequestBucketInfo(request);

    let StorageCommand::RequestBucketInfo(decoded) = copy_command(&proto, &cmd, V5_1) else {
        unreachable!()
    };
    assert!(decoded.has_system_state());
    assert!(decoded.buckets().is_empty());
    assert_eq!(
        decoded.request,
        BucketInfoRequest::SystemState {
            distributor: 3,
            cluster_state: "distributor:3 .1.s:d".to_string(),
            state_version: "14".to_string(),
        }
    );

    let StorageReply::RequestBucketInfo(decoded) = copy_reply(&proto, &reply, &cmd, V5_1) else {
        unreachable!()
    };
    assert_eq!(decoded.entries.len(), 1);
    let entry = &decoded.entries[0];
    assert_eq!(entry.bucket_id, BucketId::from_raw(4));
    assert_eq!(entry.info.last_modified(), 0x1337cafe98765432);
    assert!(entry.info.is_active());
    assert!(!entry.info.is_ready());
}

#[test]
fn test_request_bucket_info_for_buckets() {
    let proto = protocol();
    let buckets = vec![BucketId::new(16, 1), BucketId::new(16, 2)];
    let cmd = StorageCommand::RequestBucketInfo(RequestBucketInfoCommand::for_buckets(
        BucketSpace::DEFAULT,
        buckets.clone(),
    ));
    let StorageCommand::RequestBucketInfo(decoded) = copy_command(&proto, &cmd, V5_1) else {
        unreachable!()
    };
    assert!(!decoded.has_system_state());
    assert_eq!(decoded.buckets(), buckets.as_slice());
}

#[test]
fn test_empty_bucket_list_is_rejected() {
    let cmd = StorageCommand::RequestBucketInfo(RequestBucketInfoCommand::for_buckets(
        BucketSpace::DEFAULT,
        Vec::new(),
    ));
    let err = protocol().encode_command(&cmd, V5_1).unwrap_err();
    assert!(matches!(err, EncodeError::InvalidField { field: "buckets", .. }));
}

#[test]
fn test_bucket_info_flags_dropped_at_5_0() {
    let proto = protocol();
    let request = RequestBucketInfoCommand::for_buckets(BucketSpace::DEFAULT, vec![BucketId::new(16, 1)]);
    let mut reply = RequestBucketInfoReply::from_command(&request);
    let info = BucketInfo::full(43, 24, 123, 44, 124, true, true, 99);
    reply.entries.push(BucketInfoEntry::new(BucketId::new(16, 1), info));
    let reply = StorageReply::RequestBucketInfo(reply);
    let cmd = StorageCommand::RequestBucketInfo(request);

    let at_5_0 = proto.approx_reply_size(&reply, V5_0).unwrap();
    let at_5_1 = proto.approx_reply_size(&reply, V5_1).unwrap();
    assert_eq!(at_5_1 - at_5_0, 1);

    let StorageReply::RequestBucketInfo(decoded) = copy_reply(&proto, &reply, &cmd, V5_0) else {
        unreachable!()
    };
    let decoded = &decoded.entries[0].info;
    assert!(!decoded.is_ready());
    assert!(!decoded.is_active());
    assert_eq!(decoded.checksum(), 43);
    assert_eq!(decoded.last_modified(), 99);
}

#[test]
fn test_notify_bucket_change_5_1() {
    let proto = protocol();
    let notify = NotifyBucketChangeCommand::new(bucket(20, 1000), BucketInfo::new(2, 3, 4));
    let reply = StorageReply::NotifyBucketChange(NotifyBucketChangeReply::from_command(&notify));
    let cmd = StorageCommand::NotifyBucketChange(notify);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

#[test]
fn test_create_bucket_5_1() {
    let proto = protocol();
    let mut create = CreateBucketCommand::new(Bucket::in_default_space(BucketId::from_raw(623)));
    create.active = true;
    let mut reply = CreateBucketReply::from_command(&create);
    reply.bucket_info = BucketInfo::new(1, 0, 0);
    let reply = StorageReply::CreateBucket(reply);
    let cmd = StorageCommand::CreateBucket(create);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

#[test]
fn test_delete_bucket_5_1() {
    let proto = protocol();
    let mut delete = DeleteBucketCommand::new(Bucket::in_default_space(BucketId::from_raw(623)));
    delete.bucket_info = BucketInfo::new(0x100, 200, 300);
    let mut reply = DeleteBucketReply::from_command(&delete);
    reply.bucket_info = BucketInfo::new(0x100, 200, 300);
    let reply = StorageReply::DeleteBucket(reply);
    let cmd = StorageCommand::DeleteBucket(delete);

    let decoded = copy_command(&proto, &cmd, V5_1);
    assert_eq!(decoded, cmd);
    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

fn merge_command() -> MergeBucketCommand {
    MergeBucketCommand::new(
        bucket(16, 0),
        [
            MergeNode::new(4, false),
            MergeNode::new(13, true),
            MergeNode::new(26, true),
        ],
        1234u64,
        567,
        [7, 14],
    )
}

#[test]
fn test_merge_bucket_5_1() {
    let proto = protocol();
    let merge = merge_command();
    let reply = StorageReply::MergeBucket(MergeBucketReply::from_command(&merge));
    let cmd = StorageCommand::MergeBucket(merge);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let StorageReply::MergeBucket(decoded) = copy_reply(&proto, &reply, &cmd, V5_1) else {
        unreachable!()
    };
    assert_eq!(decoded.nodes.len(), 3);
    assert!(decoded.nodes[1].source_only);
    assert_eq!(decoded.max_timestamp, Timestamp(1234));
    assert_eq!(decoded.cluster_state_version, 567);
    assert_eq!(decoded.chain.as_slice(), &[7, 14]);
}

#[test]
fn test_merge_source_only_dropped_at_5_0() {
    let proto = protocol();
    let cmd = StorageCommand::MergeBucket(merge_command());
    let StorageCommand::MergeBucket(decoded) = copy_command(&proto, &cmd, V5_0) else {
        unreachable!()
    };
    let indexes: Vec<u16> = decoded.nodes.iter().map(|n| n.index).collect();
    assert_eq!(indexes, vec![4, 13, 26]);
    assert!(decoded.nodes.iter().all(|n| !n.source_only));
    assert_eq!(decoded.chain.as_slice(), &[7, 14]);
}

#[test]
fn test_get_bucket_diff_5_1() {
    let proto = protocol();
    let mut diff = GetBucketDiffCommand::new(
        bucket(16, 0),
        [MergeNode::new(4, false), MergeNode::new(13, false)],
        1056u64,
    );
    diff.diff.push(DiffEntry {
        timestamp: Timestamp(123456),
        gid: GlobalId::from_raw(b"1234567890abcdef"),
        header_size: 100,
        body_size: 65536,
        flags: 1,
        has_mask: 3,
    });
    let reply = StorageReply::GetBucketDiff(GetBucketDiffReply::from_command(&diff));
    let cmd = StorageCommand::GetBucketDiff(diff);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::GetBucketDiff(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.diff.len(), 1);
    assert_eq!(decoded.diff[0].body_size, 65536);
    assert_eq!(decoded.max_timestamp, Timestamp(1056));
}

#[test]
fn test_apply_bucket_diff_5_1() {
    let proto = protocol();
    let mut apply = ApplyBucketDiffCommand::new(
        bucket(16, 623),
        [MergeNode::new(4, false), MergeNode::new(13, false)],
        1234,
    );
    apply.diff.push(ApplyDiffEntry::default());
    let reply = StorageReply::ApplyBucketDiff(ApplyBucketDiffReply::from_command(&apply));
    let cmd = StorageCommand::ApplyBucketDiff(apply);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::ApplyBucketDiff(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.max_buffer_size, 1234);
    assert_eq!(decoded.diff.len(), 1);
}

fn visitor_command() -> CreateVisitorCommand {
    let mut cmd = CreateVisitorCommand::new(BucketSpace::DEFAULT, "library", "id", "doc selection");
    cmd.parameters.set("one ring", "to rule them all");
    cmd.parameters.set("one ring to", "find them and");
    cmd.parameters.set("into darkness", "bind them");
    cmd.control_destination = "controldest".to_string();
    cmd.data_destination = "datadest".to_string();
    cmd.visitor_cmd_id = 1;
    cmd.max_pending_reply_count = 2;
    cmd.from_time = Timestamp(123);
    cmd.to_time = Timestamp(456);
    cmd.buckets = vec![BucketId::new(16, 1), BucketId::new(16, 2)];
    cmd.field_set = "foo,bar,vekterli".to_string();
    cmd.visit_inconsistent_buckets = true;
    cmd.queue_timeout = Duration::from_millis(100);
    cmd.ordering = VisitorOrdering::Descending;
    cmd.header.priority = 149;
    cmd
}

#[test]
fn test_create_visitor_5_1() {
    let proto = protocol();
    let visitor = visitor_command();
    let mut reply = CreateVisitorReply::from_command(&visitor);
    reply.last_bucket = BucketId::new(16, 123);
    reply.statistics = VisitorStatistics {
        buckets_visited: 3,
        documents_visited: 1000,
        bytes_visited: 1024000,
        documents_returned: 123,
        bytes_returned: 512000,
    };
    let reply = StorageReply::CreateVisitor(reply);
    let cmd = StorageCommand::CreateVisitor(visitor);

    let decoded = copy_command(&proto, &cmd, V5_1);
    assert_eq!(decoded, cmd);
    let StorageCommand::CreateVisitor(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.parameters.get_str("one ring to"), Some("find them and"));
    assert_eq!(decoded.header.priority, 149);
    assert_eq!(decoded.queue_timeout, Duration::from_millis(100));

    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

#[test]
fn test_create_visitor_defaults_at_5_0() {
    let proto = protocol();
    let cmd = StorageCommand::CreateVisitor(visitor_command());
    let StorageCommand::CreateVisitor(decoded) = copy_command(&proto, &cmd, V5_0) else {
        unreachable!()
    };
    assert_eq!(decoded.field_set, ALL_FIELDS);
    assert_eq!(decoded.ordering, VisitorOrdering::Ascending);
    assert_eq!(decoded.buckets.len(), 2);
    assert_eq!(decoded.library_name, "library");
}

#[test]
fn test_queue_timeout_has_millisecond_resolution() {
    let proto = protocol();
    let mut visitor = visitor_command();
    visitor.queue_timeout = Duration::from_micros(100_900);
    let cmd = StorageCommand::CreateVisitor(visitor);
    let StorageCommand::CreateVisitor(decoded) = copy_command(&proto, &cmd, V5_1) else {
        unreachable!()
    };
    assert_eq!(decoded.queue_timeout, Duration::from_millis(100));

    let mut visitor = visitor_command();
    visitor.queue_timeout = Duration::from_millis(u32::MAX as u64 + 5);
    let cmd = StorageCommand::CreateVisitor(visitor);
    let StorageCommand::CreateVisitor(decoded) = copy_command(&proto, &cmd, V5_1) else {
        unreachable!()
    };
    assert_eq!(decoded.queue_timeout, Duration::from_millis(u32::MAX as u64));
}

#[test]
fn test_create_visitor_missing_ordering_is_malformed() {
    let proto = protocol();
    let cmd = StorageCommand::CreateVisitor(visitor_command());
    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    let truncated = bytes.slice(..bytes.len() - 1);
    let err = proto.decode_command(truncated, V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed { .. }), "{err}");
}

#[test]
fn test_destroy_visitor_5_1() {
    let proto = protocol();
    let destroy = DestroyVisitorCommand::new("instance");
    let reply = StorageReply::DestroyVisitor(DestroyVisitorReply::from_command(&destroy));
    let cmd = StorageCommand::DestroyVisitor(destroy);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

#[test]
fn test_split_bucket_5_1() {
    let proto = protocol();
    let mut split = SplitBucketCommand::new(bucket(16, 0));
    split.min_split_bits = 20;
    split.max_split_bits = 40;
    split.min_byte_size = 1000;
    split.min_doc_count = 5;
    let mut reply = SplitBucketReply::from_command(&split);
    reply.split_info.push(BucketInfoEntry::new(
        BucketId::new(17, 0),
        BucketInfo::with_flags(100, 1000, 10000, true, true),
    ));
    reply.split_info.push(BucketInfoEntry::new(
        BucketId::new(17, 1),
        BucketInfo::with_flags(101, 1001, 10001, true, true),
    ));
    let reply = StorageReply::SplitBucket(reply);
    let cmd = StorageCommand::SplitBucket(split);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::SplitBucket(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.split_info[1].bucket_id, BucketId::new(17, 1));
    assert_eq!(decoded.split_info[1].info.checksum(), 101);
}

#[test]
fn test_join_buckets_5_1() {
    let proto = protocol();
    let mut join = JoinBucketsCommand::new(bucket(16, 0));
    join.sources = vec![BucketId::new(17, 0), BucketId::new(17, 1)];
    join.min_join_bits = 3;
    let mut reply = JoinBucketsReply::from_command(&join);
    reply.bucket_info = BucketInfo::new(3, 4, 5);
    let reply = StorageReply::JoinBuckets(reply);
    let cmd = StorageCommand::JoinBuckets(join);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    let decoded = copy_reply(&proto, &reply, &cmd, V5_1);
    assert_eq!(decoded, reply);
    let StorageReply::JoinBuckets(decoded) = decoded else { unreachable!() };
    assert_eq!(decoded.sources.len(), 2);
}

#[test]
fn test_set_bucket_state_5_1() {
    let proto = protocol();
    let set_state = SetBucketStateCommand::new(bucket(16, 0), BucketState::Active);
    let reply = StorageReply::SetBucketState(SetBucketStateReply::from_command(&set_state));
    let cmd = StorageCommand::SetBucketState(set_state);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

#[test]
fn test_invalid_bucket_state_is_malformed() {
    let proto = protocol();
    let cmd = StorageCommand::SetBucketState(SetBucketStateCommand::new(bucket(16, 0), BucketState::Active));
    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    let mut patched = BytesMut::from(&bytes[..]);
    let last = patched.len() - 1;
    patched[last] = 7;
    let err = proto.decode_command(patched.freeze(), V5_1).unwrap_err();
    assert_eq!(err.offset(), Some(last));
}

#[test]
fn test_remove_location_5_1() {
    let proto = protocol();
    let remove = RemoveLocationCommand::new("id.group == \"mygroup\"", bucket(16, 1234));
    let mut reply = RemoveLocationReply::from_command(&remove);
    reply.bucket_info = BucketInfo::new(7, 8, 9);
    let reply = StorageReply::RemoveLocation(reply);
    let cmd = StorageCommand::RemoveLocation(remove);

    assert_eq!(copy_command(&proto, &cmd, V5_1), cmd);
    assert_eq!(copy_reply(&proto, &reply, &cmd, V5_1), reply);
}

#[test]
fn test_split_and_join_unsupported_at_5_0() {
    let proto = protocol();
    let cmd = StorageCommand::JoinBuckets(JoinBucketsCommand::new(bucket(16, 0)));
    let err = proto.encode_command(&cmd, V5_0).unwrap_err();
    assert!(matches!(err, EncodeError::UnsupportedKind { kind: "JoinBuckets", .. }));

    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    let err = proto.decode_command(bytes, V5_0).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownKind { tag: 60, .. }));

    let split = StorageCommand::SplitBucket(SplitBucketCommand::new(bucket(16, 0)));
    assert!(proto.encode_command(&split, V5_0).is_ok());
}

#[test]
fn test_condition_5_2() {
    let proto = protocol();
    let mut put = put_command();
    put.condition = TestAndSetCondition::new("testdoctype1.headerval == 42");
    let cmd = StorageCommand::Put(put);

    assert_eq!(copy_command(&proto, &cmd, V5_2), cmd);

    let StorageCommand::Put(dropped) = copy_command(&proto, &cmd, V5_1) else { unreachable!() };
    assert!(!dropped.condition.is_present());

    let at_5_1 = proto.approx_command_size(&cmd, V5_1).unwrap();
    let at_5_2 = proto.approx_command_size(&cmd, V5_2).unwrap();
    assert_eq!(at_5_2 - at_5_1, 4 + "testdoctype1.headerval == 42".len());
}

#[test]
fn test_condition_on_remove_and_update_5_2() {
    let proto = protocol();
    let mut remove = RemoveCommand::new(bucket(16, 0x51), doc_id(), 159u64);
    remove.condition = TestAndSetCondition::new("testdoctype1.headerval > 1");
    let cmd = StorageCommand::Remove(remove);
    assert_eq!(copy_command(&proto, &cmd, V5_2), cmd);

    let update = DocumentUpdate::new(doc_id(), Bytes::from_static(b"assign headerval 17"));
    let mut update = UpdateCommand::new(bucket(16, 0x51), update, 14u64);
    update.condition = TestAndSetCondition::new("testdoctype1.headerval > 1");
    let cmd = StorageCommand::Update(update);
    assert_eq!(copy_command(&proto, &cmd, V5_2), cmd);
}

#[test]
fn test_bucket_space_6_0() {
    let proto = protocol();
    let mut put = put_command();
    put.bucket = Bucket::new(BucketSpace(5), BucketId::new(16, 0x51));
    let cmd = StorageCommand::Put(put);

    let StorageCommand::Put(decoded) = copy_command(&proto, &cmd, V6_0) else { unreachable!() };
    assert_eq!(decoded.bucket.space, BucketSpace(5));

    let StorageCommand::Put(downgraded) = copy_command(&proto, &cmd, V5_2) else { unreachable!() };
    assert_eq!(downgraded.bucket.space, BucketSpace::DEFAULT);
    assert_eq!(downgraded.bucket.id, BucketId::new(16, 0x51));

    let at_5_2 = proto.approx_command_size(&cmd, V5_2).unwrap();
    let at_6_0 = proto.approx_command_size(&cmd, V6_0).unwrap();
    assert_eq!(at_6_0 - at_5_2, 8);
}

#[test]
fn test_visitor_bucket_space_6_0() {
    let proto = protocol();
    let mut visitor = visitor_command();
    visitor.space = BucketSpace(5);
    let cmd = StorageCommand::CreateVisitor(visitor);
    assert_eq!(copy_command(&proto, &cmd, V6_0), cmd);
}

fn in_space(used_bits: u32, location: u64) -> Bucket {
    Bucket::new(BucketSpace(5), BucketId::new(used_bits, location))
}

fn flagged_info(checksum: u32) -> BucketInfo {
    BucketInfo::full(checksum, 2, 3, 4, 5, true, true, 77)
}

/// One command of every wire kind with every gated field set away from its
/// default
fn every_kind() -> Vec<StorageCommand> {
    let condition = TestAndSetCondition::new("testdoctype1.headerval == 42");

    let mut put = put_command();
    put.bucket = in_space(16, 0x51);
    put.condition = condition.clone();

    let update = DocumentUpdate::new(doc_id(), Bytes::from_static(b"assign headerval 17"));
    let mut update = UpdateCommand::new(in_space(16, 0x51), update, 14u64);
    update.old_timestamp = Timestamp(10);
    update.condition = condition.clone();

    let mut remove = RemoveCommand::new(in_space(16, 0x51), doc_id(), 159u64);
    remove.condition = condition;

    let mut visitor = visitor_command();
    visitor.space = BucketSpace(5);

    let mut merge = merge_command();
    merge.bucket = in_space(16, 0);

    let mut get_diff = GetBucketDiffCommand::new(
        in_space(16, 0),
        [MergeNode::new(4, false), MergeNode::new(13, true)],
        1056u64,
    );
    get_diff.diff.push(DiffEntry {
        timestamp: Timestamp(123456),
        gid: GlobalId::from_raw(b"1234567890abcdef"),
        header_size: 100,
        body_size: 65536,
        flags: 1,
        has_mask: 3,
    });

    let mut apply_diff = ApplyBucketDiffCommand::new(
        in_space(16, 623),
        [MergeNode::new(4, true), MergeNode::new(13, false)],
        1234,
    );
    apply_diff.diff.push(ApplyDiffEntry {
        doc_name: "id:ns:testdoctype1::1".to_string(),
        header_blob: Bytes::from_static(b"header"),
        body_blob: Bytes::from_static(b"body"),
        ..ApplyDiffEntry::default()
    });

    let mut split = SplitBucketCommand::new(in_space(16, 0));
    split.min_split_bits = 20;
    split.max_split_bits = 40;

    let mut join = JoinBucketsCommand::new(in_space(16, 0));
    join.sources = vec![BucketId::new(17, 0), BucketId::new(17, 1)];
    join.min_join_bits = 3;

    let mut create = CreateBucketCommand::new(in_space(16, 1));
    create.active = true;

    let mut delete = DeleteBucketCommand::new(in_space(16, 1));
    delete.bucket_info = flagged_info(0x100);

    vec![
        StorageCommand::Get(GetCommand::new(in_space(16, 0x51), doc_id(), "foo,bar", 123u64)),
        StorageCommand::Put(put),
        StorageCommand::Remove(remove),
        StorageCommand::Revert(RevertCommand::new(in_space(16, 1), vec![Timestamp(59)])),
        StorageCommand::CreateVisitor(visitor),
        StorageCommand::DestroyVisitor(DestroyVisitorCommand::new("instance")),
        StorageCommand::RequestBucketInfo(RequestBucketInfoCommand::for_buckets(
            BucketSpace(5),
            vec![BucketId::new(16, 1), BucketId::new(16, 2)],
        )),
        StorageCommand::NotifyBucketChange(NotifyBucketChangeCommand::new(
            in_space(20, 1000),
            flagged_info(2),
        )),
        StorageCommand::CreateBucket(create),
        StorageCommand::MergeBucket(merge),
        StorageCommand::DeleteBucket(delete),
        StorageCommand::GetBucketDiff(get_diff),
        StorageCommand::ApplyBucketDiff(apply_diff),
        StorageCommand::SplitBucket(split),
        StorageCommand::JoinBuckets(join),
        StorageCommand::SetBucketState(SetBucketStateCommand::new(in_space(16, 0), BucketState::Active)),
        StorageCommand::RemoveLocation(RemoveLocationCommand::new("id.group == \"g\"", in_space(16, 1234))),
        StorageCommand::Update(update),
    ]
}

/// Default reply to `cmd` with every bucket info it carries flagged
fn flagged_reply(cmd: &StorageCommand) -> StorageReply {
    let mut reply = cmd.make_reply();
    match &mut reply {
        StorageReply::Put(r) => r.bucket_info = flagged_info(1),
        StorageReply::Update(r) => r.bucket_info = flagged_info(1),
        StorageReply::Remove(r) => r.bucket_info = flagged_info(1),
        StorageReply::Revert(r) => r.bucket_info = flagged_info(1),
        StorageReply::CreateBucket(r) => r.bucket_info = flagged_info(1),
        StorageReply::DeleteBucket(r) => r.bucket_info = flagged_info(1),
        StorageReply::JoinBuckets(r) => r.bucket_info = flagged_info(1),
        StorageReply::RemoveLocation(r) => r.bucket_info = flagged_info(1),
        StorageReply::RequestBucketInfo(r) => r
            .entries
            .push(BucketInfoEntry::new(BucketId::new(16, 1), flagged_info(4))),
        StorageReply::SplitBucket(r) => r
            .split_info
            .push(BucketInfoEntry::new(BucketId::new(17, 0), flagged_info(5))),
        StorageReply::CreateVisitor(r) => r.last_bucket = BucketId::new(16, 123),
        _ => {}
    }
    reply
}

fn restrict_bucket(bucket: &mut Bucket, rev: Revision) {
    if !GatedField::BucketSpace.present_at(rev) {
        bucket.space = BucketSpace::DEFAULT;
    }
}

fn restrict_info(info: &mut BucketInfo, rev: Revision) {
    if !GatedField::BucketInfoFlags.present_at(rev) {
        *info = BucketInfo::full(
            info.checksum(),
            info.doc_count(),
            info.total_doc_size(),
            info.meta_count(),
            info.used_file_size(),
            false,
            false,
            info.last_modified(),
        );
    }
}

fn restrict_condition(condition: &mut TestAndSetCondition, rev: Revision) {
    if !GatedField::Condition.present_at(rev) {
        *condition = TestAndSetCondition::none();
    }
}

fn restrict_nodes(nodes: &mut MergeNodes, rev: Revision) {
    if !GatedField::MergeNodeSourceOnly.present_at(rev) {
        for node in nodes.iter_mut() {
            node.source_only = false;
        }
    }
}

/// `cmd` as it reads after a trip through `rev`
fn restrict_command(cmd: &StorageCommand, rev: Revision) -> StorageCommand {
    let mut cmd = cmd.clone();
    match &mut cmd {
        StorageCommand::Get(c) => restrict_bucket(&mut c.bucket, rev),
        StorageCommand::Put(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_condition(&mut c.condition, rev);
        }
        StorageCommand::Update(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_condition(&mut c.condition, rev);
        }
        StorageCommand::Remove(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_condition(&mut c.condition, rev);
        }
        StorageCommand::Revert(c) => restrict_bucket(&mut c.bucket, rev),
        StorageCommand::CreateVisitor(c) => {
            if !GatedField::BucketSpace.present_at(rev) {
                c.space = BucketSpace::DEFAULT;
            }
            if !GatedField::VisitorFieldSet.present_at(rev) {
                c.field_set = ALL_FIELDS.to_string();
            }
            if !GatedField::VisitorOrdering.present_at(rev) {
                c.ordering = VisitorOrdering::Ascending;
            }
        }
        StorageCommand::DestroyVisitor(_) | StorageCommand::Internal(_) => {}
        StorageCommand::RequestBucketInfo(c) => {
            if !GatedField::BucketSpace.present_at(rev) {
                c.space = BucketSpace::DEFAULT;
            }
        }
        StorageCommand::NotifyBucketChange(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_info(&mut c.bucket_info, rev);
        }
        StorageCommand::CreateBucket(c) => restrict_bucket(&mut c.bucket, rev),
        StorageCommand::MergeBucket(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_nodes(&mut c.nodes, rev);
        }
        StorageCommand::DeleteBucket(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_info(&mut c.bucket_info, rev);
        }
        StorageCommand::GetBucketDiff(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_nodes(&mut c.nodes, rev);
        }
        StorageCommand::ApplyBucketDiff(c) => {
            restrict_bucket(&mut c.bucket, rev);
            restrict_nodes(&mut c.nodes, rev);
        }
        StorageCommand::SplitBucket(c) => restrict_bucket(&mut c.bucket, rev),
        StorageCommand::JoinBuckets(c) => restrict_bucket(&mut c.bucket, rev),
        StorageCommand::SetBucketState(c) => restrict_bucket(&mut c.bucket, rev),
        StorageCommand::RemoveLocation(c) => restrict_bucket(&mut c.bucket, rev),
    }
    cmd
}

/// `reply` as it reads after a trip through `rev`; fields restored from the
/// command keep the command's values
fn restrict_reply(reply: &StorageReply, rev: Revision) -> StorageReply {
    let mut reply = reply.clone();
    match &mut reply {
        StorageReply::Put(r) => restrict_info(&mut r.bucket_info, rev),
        StorageReply::Update(r) => restrict_info(&mut r.bucket_info, rev),
        StorageReply::Remove(r) => restrict_info(&mut r.bucket_info, rev),
        StorageReply::Revert(r) => restrict_info(&mut r.bucket_info, rev),
        StorageReply::JoinBuckets(r) => restrict_info(&mut r.bucket_info, rev),
        StorageReply::RequestBucketInfo(r) => {
            for entry in &mut r.entries {
                restrict_info(&mut entry.info, rev);
            }
        }
        StorageReply::NotifyBucketChange(r) => restrict_bucket(&mut r.bucket, rev),
        StorageReply::CreateBucket(r) => {
            restrict_bucket(&mut r.bucket, rev);
            restrict_info(&mut r.bucket_info, rev);
        }
        StorageReply::DeleteBucket(r) => {
            restrict_bucket(&mut r.bucket, rev);
            restrict_info(&mut r.bucket_info, rev);
        }
        StorageReply::RemoveLocation(r) => {
            restrict_bucket(&mut r.bucket, rev);
            restrict_info(&mut r.bucket_info, rev);
        }
        StorageReply::SplitBucket(r) => {
            restrict_bucket(&mut r.bucket, rev);
            for entry in &mut r.split_info {
                restrict_info(&mut entry.info, rev);
            }
        }
        StorageReply::SetBucketState(r) => restrict_bucket(&mut r.bucket, rev),
        _ => {}
    }
    reply
}

#[test]
fn test_every_serializable_kind_at_every_version() {
    let proto = protocol();
    let commands = every_kind();
    let kinds: HashSet<MessageKind> = commands.iter().map(|c| c.kind()).collect();
    assert_eq!(kinds.len(), 18);

    for version in ALL_VERSIONS {
        let rev = version.revision().unwrap();
        for cmd in &commands {
            if !cmd.kind().supported_at(rev) {
                assert!(matches!(
                    proto.encode_command(cmd, version),
                    Err(EncodeError::UnsupportedKind { .. })
                ));
                continue;
            }
            assert_eq!(
                copy_command(&proto, cmd, version),
                restrict_command(cmd, rev),
                "{} at {}",
                cmd.kind().name(),
                version
            );

            let reply = flagged_reply(cmd);
            assert_eq!(
                copy_reply(&proto, &reply, cmd, version),
                restrict_reply(&reply, rev),
                "{} at {}",
                cmd.kind().reply_name(),
                version
            );
        }
    }
}

#[test]
fn test_latest_version_keeps_every_field() {
    let proto = protocol();
    for cmd in every_kind() {
        assert_eq!(copy_command(&proto, &cmd, V6_0), cmd);
        let reply = flagged_reply(&cmd);
        assert_eq!(copy_reply(&proto, &reply, &cmd, V6_0), reply);
    }
}

#[test]
fn test_downgraded_fields_take_table_defaults() {
    let mut r = WireReader::new(Bytes::new());
    assert_eq!(read_space(&mut r, Revision::V5_2).unwrap(), BucketSpace::DEFAULT);
    assert_eq!(read_condition(&mut r, Revision::V5_1).unwrap(), TestAndSetCondition::none());
    assert_eq!(r.consumed(), 0);

    let mut r = WireReader::new(Bytes::from_static(&[0, 1, 0, 4]));
    let nodes = read_nodes(&mut r, Revision::V5_0).unwrap();
    assert_eq!(nodes.as_slice(), &[MergeNode::new(4, false)]);
}

#[test]
fn test_internal_is_not_serializable() {
    let proto = protocol();
    let cmd = StorageCommand::Internal(InternalCommand::new(101, "MyCommand"));
    assert!(matches!(
        proto.encode_command(&cmd, V5_1),
        Err(EncodeError::NotSerializable(_))
    ));
    assert!(matches!(
        proto.encode_reply(&cmd.make_reply(), V5_1),
        Err(EncodeError::NotSerializable(_))
    ));
    assert!(matches!(
        proto.approx_command_size(&cmd, V5_1),
        Err(EncodeError::NotSerializable(_))
    ));

    let mut bytes = BytesMut::new();
    bytes.put_u16(58);
    let err = proto.decode_command(bytes.freeze(), V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownKind { tag: 58, .. }));
}

#[test]
fn test_unsupported_version() {
    let proto = protocol();
    let old = WireVersion::new(4, 2, 0);
    let cmd = StorageCommand::Put(put_command());
    assert_eq!(
        proto.encode_command(&cmd, old).unwrap_err(),
        EncodeError::UnsupportedVersion(old)
    );

    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    assert_eq!(
        proto.decode_command(bytes, old).unwrap_err(),
        DecodeError::UnsupportedVersion(old)
    );
}

#[test]
fn test_unknown_kind_tag() {
    let proto = protocol();
    let mut bytes = BytesMut::new();
    bytes.put_u16(999);
    bytes.put_u64(1);
    let err = proto.decode_command(bytes.freeze(), V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownKind { tag: 999, .. }));
    assert_eq!(err.offset(), Some(0));
}

#[test]
fn test_reply_tag_is_not_a_command() {
    let proto = protocol();
    let cmd = StorageCommand::Put(put_command());
    let reply = proto.encode_reply(&cmd.make_reply(), V5_1).unwrap();
    let err = proto.decode_command(reply, V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownKind { tag: 11, .. }));

    let command = proto.encode_command(&cmd, V5_1).unwrap();
    let err = proto.decode_reply(command, V5_1, Some(&cmd)).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownKind { tag: 10, .. }));
}

#[test]
fn test_truncated_input() {
    let proto = protocol();
    assert!(matches!(
        proto.decode_command(Bytes::new(), V5_1),
        Err(DecodeError::Truncated { offset: 0, .. })
    ));

    let cmd = StorageCommand::Put(put_command());
    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    let err = proto.decode_command(bytes.slice(..20), V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::Truncated { .. }), "{err}");
}

#[test]
fn test_trailing_bytes_are_malformed() {
    let proto = protocol();
    let cmd = StorageCommand::DestroyVisitor(DestroyVisitorCommand::new("instance"));
    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    let mut padded = BytesMut::from(&bytes[..]);
    padded.put_u8(0);
    let err = proto.decode_command(padded.freeze(), V5_1).unwrap_err();
    assert_eq!(err.offset(), Some(bytes.len()));
}

#[test]
fn test_reply_needs_its_command() {
    let proto = protocol();
    let cmd = StorageCommand::Put(put_command());
    let bytes = proto.encode_reply(&cmd.make_reply(), V5_1).unwrap();
    let err = proto.decode_reply(bytes, V5_1, None).unwrap_err();
    assert!(matches!(err, DecodeError::MissingCorrelatedCommand { .. }));

    // Self-contained replies decode without it
    let destroy = StorageCommand::DestroyVisitor(DestroyVisitorCommand::new("instance"));
    let bytes = proto.encode_reply(&destroy.make_reply(), V5_1).unwrap();
    let reply = proto.decode_reply(bytes, V5_1, None).unwrap();
    assert_eq!(reply.msg_id(), destroy.msg_id());
}

#[test]
fn test_reply_for_wrong_command() {
    let proto = protocol();
    let put = StorageCommand::Put(put_command());
    let get = StorageCommand::Get(GetCommand::latest(bucket(16, 1), doc_id()));
    let bytes = proto.encode_reply(&put.make_reply(), V5_1).unwrap();

    let err = proto.decode_reply(bytes.clone(), V5_1, Some(&get)).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed { offset: 0, .. }));

    let other_put = StorageCommand::Put(put_command());
    assert_ne!(other_put.msg_id(), put.msg_id());
    let err = proto.decode_reply(bytes, V5_1, Some(&other_put)).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed { offset: 2, .. }));
}

#[test]
fn test_unknown_result_code_is_malformed() {
    let proto = protocol();
    let cmd = StorageCommand::Put(put_command());
    let bytes = proto.encode_reply(&cmd.make_reply(), V5_1).unwrap();
    let mut patched = BytesMut::from(&bytes[..]);
    patched[11..15].copy_from_slice(&12345u32.to_be_bytes());
    let err = proto.decode_reply(patched.freeze(), V5_1, Some(&cmd)).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed { offset: 11, .. }));
}

#[test]
fn test_unknown_load_type_falls_back_to_default() {
    let cmd = StorageCommand::Put(put_command());
    let bytes = protocol().encode_command(&cmd, V5_1).unwrap();

    let plain = StorageProtocol::new(
        Arc::new(LoadTypeSet::new()),
        Arc::new(BasicTypeRepo::new(["testdoctype1"])),
    );
    let decoded = plain.decode_command(bytes, V5_1).unwrap();
    assert_eq!(decoded.header().load_type, LoadType::default());
}

#[test]
fn test_source_index_roundtrip() {
    let proto = protocol();
    let mut put = put_command();
    put.header.source_index = Some(3);
    let cmd = StorageCommand::Put(put);
    assert_eq!(copy_command(&proto, &cmd, V5_1).header().source_index, Some(3));

    let mut put = put_command();
    put.header.source_index = Some(0xFFFF);
    let err = proto.encode_command(&StorageCommand::Put(put), V5_1).unwrap_err();
    assert!(matches!(err, EncodeError::InvalidField { field: "source index", .. }));
}

#[test]
fn test_unknown_document_type_is_malformed() {
    let cmd = StorageCommand::Put(put_command());
    let bytes = protocol().encode_command(&cmd, V5_1).unwrap();
    let music_only = StorageProtocol::new(
        Arc::new(LoadTypeSet::new()),
        Arc::new(BasicTypeRepo::new(["music"])),
    );
    let err = music_only.decode_command(bytes, V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::Malformed { .. }));
}

#[test]
fn test_peek_msg_id() {
    let proto = protocol();
    let cmd = StorageCommand::Put(put_command());
    let bytes = proto.encode_command(&cmd, V5_1).unwrap();
    assert_eq!(peek_msg_id(&bytes).unwrap(), cmd.msg_id());
    assert!(matches!(
        peek_msg_id(&bytes[..6]),
        Err(DecodeError::Truncated { offset: 2, needed: 8, available: 4 })
    ));
}

#[test]
fn test_pending_commands_correlate_replies() {
    let proto = protocol();
    let pending = PendingCommands::new();
    let cmd = StorageCommand::Put(put_command());
    let id = cmd.msg_id();
    assert!(pending.insert(cmd.clone()).is_none());
    assert!(pending.contains(id));

    let bytes = proto.encode_reply(&cmd.make_reply(), V5_1).unwrap();
    let reply = pending.decode_reply(&proto, bytes, V5_1).unwrap();
    assert_eq!(reply.msg_id(), id);
    assert!(pending.is_empty());
}

#[test]
fn test_pending_command_restored_on_failed_decode() {
    let proto = protocol();
    let pending = PendingCommands::new();
    let cmd = StorageCommand::Put(put_command());
    pending.insert(cmd.clone());

    let bytes = proto.encode_reply(&cmd.make_reply(), V5_1).unwrap();
    let truncated = bytes.slice(..bytes.len() - 1);
    assert!(pending.decode_reply(&proto, truncated, V5_1).is_err());
    assert_eq!(pending.len(), 1);

    assert!(pending.decode_reply(&proto, bytes, V5_1).is_ok());
    assert!(pending.is_empty());
}

#[test]
fn test_pending_reply_without_command() {
    let proto = protocol();
    let pending = PendingCommands::new();
    let cmd = StorageCommand::Put(put_command());
    let bytes = proto.encode_reply(&cmd.make_reply(), V5_1).unwrap();
    let err = pending.decode_reply(&proto, bytes, V5_1).unwrap_err();
    assert!(matches!(err, DecodeError::MissingCorrelatedCommand { .. }));
}

#[test]
fn test_pending_commands_expire() {
    let pending = PendingCommands::new();
    let first = StorageCommand::Put(put_command());
    let second = StorageCommand::DestroyVisitor(DestroyVisitorCommand::new("instance"));
    pending.insert(first.clone());
    pending.insert(second);

    assert!(pending.expire(Duration::from_secs(3600)).is_empty());
    assert_eq!(pending.len(), 2);

    let expired = pending.expire(Duration::ZERO);
    assert_eq!(expired.len(), 2);
    assert!(pending.is_empty());
    assert!(pending.take(first.msg_id()).is_none());
    assert!(pending.take(MessageId(u64::MAX)).is_none());
}

proptest! {
    #[test]
    fn test_arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let proto = protocol();
        let cmd = StorageCommand::Put(put_command());
        for version in ALL_VERSIONS {
            let _ = proto.decode_command(Bytes::from(data.clone()), version);
            let _ = proto.decode_reply(Bytes::from(data.clone()), version, None);
            let _ = proto.decode_reply(Bytes::from(data.clone()), version, Some(&cmd));
        }
    }

    #[test]
    fn test_any_tagged_body_never_panics(tag in 0u16..100, body in proptest::collection::vec(any::<u8>(), 0..128)) {
        let proto = protocol();
        let mut bytes = BytesMut::new();
        bytes.put_u16(tag);
        bytes.put_slice(&body);
        let bytes = bytes.freeze();
        for version in ALL_VERSIONS {
            let _ = proto.decode_command(bytes.clone(), version);
            let _ = proto.decode_reply(bytes.clone(), version, None);
        }
    }
}
