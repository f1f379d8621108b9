//! Node-local messages that share the command/reply plumbing but never
//! leave the process.

use super::render::Render;
use super::{CommandHeader, ReplyHeader};
use std::fmt;

/// Command routed inside one node
#[derive(Debug, Clone, PartialEq)]
pub struct InternalCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Caller defined type number
    pub internal_type: u32,
    /// Caller supplied name used when rendering
    pub description: String,
}

impl InternalCommand {
    /// Internal command of `internal_type`
    pub fn new(internal_type: u32, description: impl Into<String>) -> Self {
        Self {
            header: CommandHeader::new(),
            internal_type,
            description: description.into(),
        }
    }
}

impl Render for InternalCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "{}()", self.description)?;
        if verbose {
            write!(out, " : InternalCommand({})", self.internal_type)?;
        }
        Ok(())
    }
}

/// Reply to an [`InternalCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct InternalReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Caller defined type number
    pub internal_type: u32,
    /// Caller supplied name used when rendering
    pub description: String,
}

impl InternalReply {
    /// Reply of type `internal_type + 1` with a `Reply` suffixed description
    pub fn from_command(cmd: &InternalCommand) -> Self {
        Self::with_type(cmd, cmd.internal_type + 1, format!("{}Reply", cmd.description))
    }

    /// Reply with an explicit type and description
    pub fn with_type(cmd: &InternalCommand, internal_type: u32, description: impl Into<String>) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            internal_type,
            description: description.into(),
        }
    }
}

impl Render for InternalReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "{}()", self.description)?;
        if verbose {
            write!(out, " : InternalReply({})", self.internal_type)?;
        }
        Ok(())
    }
}
