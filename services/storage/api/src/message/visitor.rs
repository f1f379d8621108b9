//! Visitor control messages.
//!
//! A visitor iterates the documents of a set of buckets, running a named
//! visitor library against every document matching a selection. The
//! storage protocol only starts and stops visitors; the data they produce
//! travels as separate messages to the data destination.

use super::render::Render;
use super::{CommandHeader, ReplyHeader};
use crate::bucket::{BucketId, BucketSpace};
use crate::message::persistence::ALL_FIELDS;
use crate::types::Timestamp;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default limit of replies a visitor may have outstanding
pub const DEFAULT_MAX_PENDING_REPLIES: u32 = 8;

/// Default time a visitor may wait in the queue before starting
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Library specific key/value parameters handed to a visitor.
///
/// Values are byte strings; numbers are stored in their decimal text form
/// and parsed back on lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisitorParameters {
    values: BTreeMap<String, Bytes>,
}

impl VisitorParameters {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to a raw value
    pub fn set(&mut self, key: impl Into<String>, value: impl AsRef<[u8]>) {
        self.values
            .insert(key.into(), Bytes::copy_from_slice(value.as_ref()));
    }

    /// Set `key` to the text form of `value`
    pub fn set_value<T: fmt::Display>(&mut self, key: impl Into<String>, value: T) {
        self.set(key, value.to_string());
    }

    /// Raw value of `key`
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(|v| v.as_ref())
    }

    /// Value of `key` as UTF-8 text
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Value of `key` parsed as `T`, or `default` if absent or unparsable
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get_str(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Whether `key` is set
    pub fn has_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Insert a decoded raw value
    pub fn insert_raw(&mut self, key: String, value: Bytes) {
        self.values.insert(key, value);
    }
}

impl Render for VisitorParameters {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "Parameters({} values", self.values.len())?;
        if verbose {
            for (key, value) in &self.values {
                write!(
                    out,
                    "\n{}  {} = {}",
                    indent,
                    key,
                    String::from_utf8_lossy(value)
                )?;
            }
        }
        out.write_str(")")
    }
}

/// Order in which ordered documents are visited
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VisitorOrdering {
    /// Oldest first
    #[default]
    Ascending = 0,
    /// Newest first
    Descending = 1,
}

impl TryFrom<u8> for VisitorOrdering {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VisitorOrdering::Ascending),
            1 => Ok(VisitorOrdering::Descending),
            other => Err(other),
        }
    }
}

impl fmt::Display for VisitorOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitorOrdering::Ascending => f.write_str("ascending"),
            VisitorOrdering::Descending => f.write_str("descending"),
        }
    }
}

/// Start a visitor
#[derive(Debug, Clone, PartialEq)]
pub struct CreateVisitorCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket space to visit
    pub space: BucketSpace,
    /// Visitor library to run
    pub library_name: String,
    /// Unique name of this visitor instance
    pub instance_id: String,
    /// Document selection expression
    pub selection: String,
    /// Sender side id of the visitor
    pub visitor_cmd_id: u32,
    /// Where progress and errors are reported
    pub control_destination: String,
    /// Where visited data is sent
    pub data_destination: String,
    /// Outstanding replies allowed towards the data destination
    pub max_pending_reply_count: u32,
    /// Oldest timestamp to visit
    pub from_time: Timestamp,
    /// Newest timestamp to visit
    pub to_time: Timestamp,
    /// Buckets to visit
    pub buckets: Vec<BucketId>,
    /// Library parameters
    pub parameters: VisitorParameters,
    /// Fields to return
    pub field_set: String,
    /// Also visit remove entries
    pub visit_removes: bool,
    /// Visit buckets whose replicas are out of sync
    pub visit_inconsistent_buckets: bool,
    /// How long the visitor may wait before being started.
    ///
    /// Carried as whole milliseconds up to `u32::MAX`; finer parts are
    /// truncated and longer timeouts clamped on the wire.
    pub queue_timeout: Duration,
    /// Visiting order
    pub ordering: VisitorOrdering,
}

impl CreateVisitorCommand {
    /// Visitor running `library_name` over documents matching `selection`
    pub fn new(
        space: BucketSpace,
        library_name: impl Into<String>,
        instance_id: impl Into<String>,
        selection: impl Into<String>,
    ) -> Self {
        Self {
            header: CommandHeader::new(),
            space,
            library_name: library_name.into(),
            instance_id: instance_id.into(),
            selection: selection.into(),
            visitor_cmd_id: 0,
            control_destination: String::new(),
            data_destination: String::new(),
            max_pending_reply_count: DEFAULT_MAX_PENDING_REPLIES,
            from_time: Timestamp::UNSET,
            to_time: Timestamp(u64::MAX),
            buckets: Vec::new(),
            parameters: VisitorParameters::new(),
            field_set: ALL_FIELDS.to_string(),
            visit_removes: false,
            visit_inconsistent_buckets: false,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            ordering: VisitorOrdering::Ascending,
        }
    }
}

impl Render for CreateVisitorCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(
            out,
            "CreateVisitorCommand({}, {}, {}",
            self.library_name, self.instance_id, self.selection
        )?;
        if !self.space.is_default() {
            write!(out, ", {}", self.space)?;
        }
        if self.visit_removes {
            out.write_str(", visiting removes")?;
        }
        if self.visit_inconsistent_buckets {
            out.write_str(", visiting inconsistent buckets")?;
        }
        if verbose {
            write!(
                out,
                ",\n{i}  control destination {}, data destination {},\
                 \n{i}  visitor cmd id {}, max pending replies {},\
                 \n{i}  from {} to {}, field set {}, queue timeout {} ms, {} order,\n{i}  ",
                self.control_destination,
                self.data_destination,
                self.visitor_cmd_id,
                self.max_pending_reply_count,
                self.from_time,
                self.to_time,
                self.field_set,
                self.queue_timeout.as_millis(),
                self.ordering,
                i = indent
            )?;
            let nested = format!("{}  ", indent);
            self.parameters.render(out, verbose, &nested)?;
            write!(out, ",\n{}  {} buckets", indent, self.buckets.len())?;
            for bucket in &self.buckets {
                write!(out, "\n{}    {}", indent, bucket)?;
            }
        }
        out.write_str(")")
    }
}

/// Progress counters of a finished visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VisitorStatistics {
    /// Buckets completed
    pub buckets_visited: u32,
    /// Documents the library was run against
    pub documents_visited: u64,
    /// Size of those documents
    pub bytes_visited: u64,
    /// Documents sent to the data destination
    pub documents_returned: u64,
    /// Size of the sent documents
    pub bytes_returned: u64,
}

impl fmt::Display for VisitorStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VisitorStatistics(buckets visited {}, docs visited {}, bytes visited {}, \
             docs returned {}, bytes returned {})",
            self.buckets_visited,
            self.documents_visited,
            self.bytes_visited,
            self.documents_returned,
            self.bytes_returned
        )
    }
}

/// Reply to [`CreateVisitorCommand`], sent when the visitor completes
#[derive(Debug, Clone, PartialEq)]
pub struct CreateVisitorReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Last bucket the visitor completed
    pub last_bucket: BucketId,
    /// Progress counters
    pub statistics: VisitorStatistics,
}

impl CreateVisitorReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &CreateVisitorCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            last_bucket: BucketId::default(),
            statistics: VisitorStatistics::default(),
        }
    }
}

impl Render for CreateVisitorReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(
            out,
            "CreateVisitorReply(last={}, {})",
            self.last_bucket, self.statistics
        )
    }
}

/// Abort a running visitor
#[derive(Debug, Clone, PartialEq)]
pub struct DestroyVisitorCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Instance to stop
    pub instance_id: String,
}

impl DestroyVisitorCommand {
    /// Stop visitor `instance_id`
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            header: CommandHeader::new(),
            instance_id: instance_id.into(),
        }
    }
}

impl Render for DestroyVisitorCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "DestroyVisitorCommand({})", self.instance_id)
    }
}

/// Reply to [`DestroyVisitorCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct DestroyVisitorReply {
    /// Shared reply fields
    pub header: ReplyHeader,
}

impl DestroyVisitorReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &DestroyVisitorCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
        }
    }
}

impl Render for DestroyVisitorReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        out.write_str("DestroyVisitorReply()")
    }
}
