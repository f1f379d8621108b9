use super::fields::*;
use super::{Context, WireCommand, WireReply};
use std::time::Duration;
use storage_api::message::{
    CreateVisitorCommand, CreateVisitorReply, DestroyVisitorCommand, DestroyVisitorReply,
    VisitorOrdering, VisitorParameters, VisitorStatistics,
};
use storage_api::{CommandHeader, ReplyHeader};
use storage_wire::{DecodeError, DecodeResult, EncodeResult, GatedField, WireReader, WireWrite};

// Key length prefix plus value length prefix
const PARAMETER_MIN_SIZE: usize = 8;

fn write_parameters<W: WireWrite>(out: &mut W, params: &VisitorParameters) -> EncodeResult<()> {
    write_count(out, "visitor parameters", params.len())?;
    for (key, value) in params.iter() {
        write_string(out, "visitor parameter key", key)?;
        write_blob(out, "visitor parameter value", value)?;
    }
    Ok(())
}

fn read_parameters(r: &mut WireReader) -> DecodeResult<VisitorParameters> {
    let count = r.read_count(PARAMETER_MIN_SIZE)?;
    let mut params = VisitorParameters::new();
    for _ in 0..count {
        let key = r.read_string()?;
        let value = r.read_bytes()?;
        params.insert_raw(key, value);
    }
    Ok(params)
}

fn read_ordering(r: &mut WireReader) -> DecodeResult<VisitorOrdering> {
    let offset = r.offset();
    let raw = r.read_u8()?;
    VisitorOrdering::try_from(raw)
        .map_err(|v| DecodeError::malformed(offset, format!("invalid visitor ordering {}", v)))
}

impl WireCommand for CreateVisitorCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_space(out, self.space, ctx.rev);
        write_string(out, "visitor library", &self.library_name)?;
        write_string(out, "visitor instance id", &self.instance_id)?;
        write_string(out, "document selection", &self.selection)?;
        out.write_u32(self.visitor_cmd_id);
        write_string(out, "control destination", &self.control_destination)?;
        write_string(out, "data destination", &self.data_destination)?;
        out.write_u32(self.max_pending_reply_count);
        out.write_u64(self.from_time.value());
        out.write_u64(self.to_time.value());
        write_bucket_ids(out, "visitor buckets", &self.buckets)?;
        write_parameters(out, &self.parameters)?;
        if GatedField::VisitorFieldSet.present_at(ctx.rev) {
            write_string(out, "field set", &self.field_set)?;
        }
        out.write_bool(self.visit_removes);
        out.write_bool(self.visit_inconsistent_buckets);
        // whole milliseconds, clamped
        let timeout_ms = u32::try_from(self.queue_timeout.as_millis()).unwrap_or(u32::MAX);
        out.write_u32(timeout_ms);
        GatedField::VisitorOrdering.write(out, ctx.rev, |o| o.write_u8(self.ordering as u8));
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(CreateVisitorCommand {
            header,
            space: read_space(r, ctx.rev)?,
            library_name: r.read_string()?,
            instance_id: r.read_string()?,
            selection: r.read_string()?,
            visitor_cmd_id: r.read_u32()?,
            control_destination: r.read_string()?,
            data_destination: r.read_string()?,
            max_pending_reply_count: r.read_u32()?,
            from_time: read_timestamp(r)?,
            to_time: read_timestamp(r)?,
            buckets: read_bucket_ids(r)?,
            parameters: read_parameters(r)?,
            field_set: GatedField::VisitorFieldSet.read(r, ctx.rev, |r| r.read_string())?,
            visit_removes: r.read_bool()?,
            visit_inconsistent_buckets: r.read_bool()?,
            queue_timeout: Duration::from_millis(r.read_u32()? as u64),
            ordering: GatedField::VisitorOrdering.read(r, ctx.rev, read_ordering)?,
        })
    }
}

impl WireReply for CreateVisitorReply {
    type Command = CreateVisitorCommand;

    fn write<W: WireWrite>(&self, _ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        out.write_u64(self.last_bucket.raw());
        let stats = &self.statistics;
        out.write_u32(stats.buckets_visited);
        out.write_u64(stats.documents_visited);
        out.write_u64(stats.bytes_visited);
        out.write_u64(stats.documents_returned);
        out.write_u64(stats.bytes_returned);
        Ok(())
    }

    fn read(
        _ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&CreateVisitorCommand>,
    ) -> DecodeResult<Self> {
        Ok(CreateVisitorReply {
            header,
            last_bucket: read_bucket_id(r)?,
            statistics: VisitorStatistics {
                buckets_visited: r.read_u32()?,
                documents_visited: r.read_u64()?,
                bytes_visited: r.read_u64()?,
                documents_returned: r.read_u64()?,
                bytes_returned: r.read_u64()?,
            },
        })
    }
}

impl WireCommand for DestroyVisitorCommand {
    fn write<W: WireWrite>(&self, _ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_string(out, "visitor instance id", &self.instance_id)
    }

    fn read(_ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(DestroyVisitorCommand {
            header,
            instance_id: r.read_string()?,
        })
    }
}

impl WireReply for DestroyVisitorReply {
    type Command = DestroyVisitorCommand;

    fn write<W: WireWrite>(&self, _ctx: &Context<'_>, _out: &mut W) -> EncodeResult<()> {
        Ok(())
    }

    fn read(
        _ctx: &Context<'_>,
        _r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&DestroyVisitorCommand>,
    ) -> DecodeResult<Self> {
        Ok(DestroyVisitorReply { header })
    }
}
