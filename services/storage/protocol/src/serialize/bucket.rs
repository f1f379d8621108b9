use super::fields::*;
use super::{correlated, Context, WireCommand, WireReply};
use storage_api::message::{
    ApplyBucketDiffCommand, ApplyBucketDiffReply, BucketInfoRequest, BucketState,
    CreateBucketCommand, CreateBucketReply, DeleteBucketCommand, DeleteBucketReply,
    GetBucketDiffCommand, GetBucketDiffReply, JoinBucketsCommand, JoinBucketsReply,
    MergeBucketCommand, MergeBucketReply, MergeChain, NotifyBucketChangeCommand,
    NotifyBucketChangeReply, RequestBucketInfoCommand, RequestBucketInfoReply,
    SetBucketStateCommand, SetBucketStateReply, SplitBucketCommand, SplitBucketReply,
};
use storage_api::{CommandHeader, MessageKind, ReplyHeader};
use storage_wire::{DecodeError, DecodeResult, EncodeError, EncodeResult, WireReader, WireWrite};

impl WireCommand for RequestBucketInfoCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_space(out, self.space, ctx.rev);
        match &self.request {
            BucketInfoRequest::Buckets(ids) => {
                // A zero count announces the system state form
                if ids.is_empty() {
                    return Err(EncodeError::InvalidField {
                        field: "buckets",
                        reason: "explicit bucket list must not be empty",
                    });
                }
                write_bucket_ids(out, "buckets", ids)
            }
            BucketInfoRequest::SystemState {
                distributor,
                cluster_state,
                state_version,
            } => {
                out.write_u32(0);
                out.write_u16(*distributor);
                write_string(out, "cluster state", cluster_state)?;
                write_string(out, "cluster state version", state_version)
            }
        }
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        let space = read_space(r, ctx.rev)?;
        let ids = read_bucket_ids(r)?;
        let request = if ids.is_empty() {
            BucketInfoRequest::SystemState {
                distributor: r.read_u16()?,
                cluster_state: r.read_string()?,
                state_version: r.read_string()?,
            }
        } else {
            BucketInfoRequest::Buckets(ids)
        };
        Ok(RequestBucketInfoCommand {
            header,
            space,
            request,
        })
    }
}

impl WireReply for RequestBucketInfoReply {
    type Command = RequestBucketInfoCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_info_entries(out, "bucket info entries", &self.entries, ctx.rev)
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&RequestBucketInfoCommand>,
    ) -> DecodeResult<Self> {
        Ok(RequestBucketInfoReply {
            header,
            entries: read_info_entries(r, ctx.rev)?,
        })
    }
}

impl WireCommand for NotifyBucketChangeCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(NotifyBucketChangeCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            bucket_info: read_bucket_info(r, ctx.rev)?,
        })
    }
}

impl WireReply for NotifyBucketChangeReply {
    type Command = NotifyBucketChangeCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&NotifyBucketChangeCommand>,
    ) -> DecodeResult<Self> {
        Ok(NotifyBucketChangeReply {
            header,
            bucket: read_bucket(r, ctx.rev)?,
        })
    }
}

impl WireCommand for CreateBucketCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        out.write_bool(self.active);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(CreateBucketCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            active: r.read_bool()?,
        })
    }
}

impl WireReply for CreateBucketReply {
    type Command = CreateBucketCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&CreateBucketCommand>,
    ) -> DecodeResult<Self> {
        Ok(CreateBucketReply {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            bucket_info: read_bucket_info(r, ctx.rev)?,
        })
    }
}

impl WireCommand for DeleteBucketCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(DeleteBucketCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            bucket_info: read_bucket_info(r, ctx.rev)?,
        })
    }
}

impl WireReply for DeleteBucketReply {
    type Command = DeleteBucketCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&DeleteBucketCommand>,
    ) -> DecodeResult<Self> {
        Ok(DeleteBucketReply {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            bucket_info: read_bucket_info(r, ctx.rev)?,
        })
    }
}

impl WireCommand for MergeBucketCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_nodes(out, &self.nodes, ctx.rev)?;
        out.write_u64(self.max_timestamp.value());
        out.write_u32(self.cluster_state_version);
        write_short_count(out, "merge chain", self.chain.len())?;
        for index in &self.chain {
            out.write_u16(*index);
        }
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        let bucket = read_bucket(r, ctx.rev)?;
        let nodes = read_nodes(r, ctx.rev)?;
        let max_timestamp = read_timestamp(r)?;
        let cluster_state_version = r.read_u32()?;
        let count = r.read_short_count(2)?;
        let chain = (0..count)
            .map(|_| r.read_u16())
            .collect::<DecodeResult<MergeChain>>()?;
        Ok(MergeBucketCommand {
            header,
            bucket,
            nodes,
            max_timestamp,
            cluster_state_version,
            chain,
        })
    }
}

impl WireReply for MergeBucketReply {
    type Command = MergeBucketCommand;

    fn write<W: WireWrite>(&self, _ctx: &Context<'_>, _out: &mut W) -> EncodeResult<()> {
        Ok(())
    }

    fn read(
        _ctx: &Context<'_>,
        _r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&MergeBucketCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::MergeBucket)?;
        let mut reply = MergeBucketReply::from_command(cmd);
        reply.header = header;
        Ok(reply)
    }
}

impl WireCommand for GetBucketDiffCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_nodes(out, &self.nodes, ctx.rev)?;
        out.write_u64(self.max_timestamp.value());
        write_diff(out, &self.diff)
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(GetBucketDiffCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            nodes: read_nodes(r, ctx.rev)?,
            max_timestamp: read_timestamp(r)?,
            diff: read_diff(r)?,
        })
    }
}

impl WireReply for GetBucketDiffReply {
    type Command = GetBucketDiffCommand;

    fn write<W: WireWrite>(&self, _ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_diff(out, &self.diff)
    }

    fn read(
        _ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&GetBucketDiffCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::GetBucketDiff)?;
        Ok(GetBucketDiffReply {
            header,
            bucket: cmd.bucket,
            nodes: cmd.nodes.clone(),
            max_timestamp: cmd.max_timestamp,
            diff: read_diff(r)?,
        })
    }
}

impl WireCommand for ApplyBucketDiffCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_nodes(out, &self.nodes, ctx.rev)?;
        out.write_u32(self.max_buffer_size);
        write_apply_diff(out, &self.diff)
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(ApplyBucketDiffCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            nodes: read_nodes(r, ctx.rev)?,
            max_buffer_size: r.read_u32()?,
            diff: read_apply_diff(r)?,
        })
    }
}

impl WireReply for ApplyBucketDiffReply {
    type Command = ApplyBucketDiffCommand;

    fn write<W: WireWrite>(&self, _ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_apply_diff(out, &self.diff)
    }

    fn read(
        _ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&ApplyBucketDiffCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::ApplyBucketDiff)?;
        Ok(ApplyBucketDiffReply {
            header,
            bucket: cmd.bucket,
            nodes: cmd.nodes.clone(),
            max_buffer_size: cmd.max_buffer_size,
            diff: read_apply_diff(r)?,
        })
    }
}

impl WireCommand for SplitBucketCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        out.write_u8(self.min_split_bits);
        out.write_u8(self.max_split_bits);
        out.write_u32(self.min_byte_size);
        out.write_u32(self.min_doc_count);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(SplitBucketCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            min_split_bits: r.read_u8()?,
            max_split_bits: r.read_u8()?,
            min_byte_size: r.read_u32()?,
            min_doc_count: r.read_u32()?,
        })
    }
}

impl WireReply for SplitBucketReply {
    type Command = SplitBucketCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_info_entries(out, "split targets", &self.split_info, ctx.rev)
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&SplitBucketCommand>,
    ) -> DecodeResult<Self> {
        Ok(SplitBucketReply {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            split_info: read_info_entries(r, ctx.rev)?,
        })
    }
}

impl WireCommand for JoinBucketsCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_bucket_ids(out, "join sources", &self.sources)?;
        out.write_u8(self.min_join_bits);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(JoinBucketsCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            sources: read_bucket_ids(r)?,
            min_join_bits: r.read_u8()?,
        })
    }
}

impl WireReply for JoinBucketsReply {
    type Command = JoinBucketsCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&JoinBucketsCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::JoinBuckets)?;
        let mut reply = JoinBucketsReply::from_command(cmd);
        reply.header = header;
        reply.bucket_info = read_bucket_info(r, ctx.rev)?;
        Ok(reply)
    }
}

impl WireCommand for SetBucketStateCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        out.write_u8(self.state as u8);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        let bucket = read_bucket(r, ctx.rev)?;
        let offset = r.offset();
        let state = BucketState::try_from(r.read_u8()?)
            .map_err(|v| DecodeError::malformed(offset, format!("invalid bucket state {}", v)))?;
        Ok(SetBucketStateCommand {
            header,
            bucket,
            state,
        })
    }
}

impl WireReply for SetBucketStateReply {
    type Command = SetBucketStateCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&SetBucketStateCommand>,
    ) -> DecodeResult<Self> {
        Ok(SetBucketStateReply {
            header,
            bucket: read_bucket(r, ctx.rev)?,
        })
    }
}
