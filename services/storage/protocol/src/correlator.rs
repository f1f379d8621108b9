//! Pending command registry for reply correlation

use crate::codec::{peek_msg_id, StorageProtocol};
use bytes::Bytes;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use storage_api::{MessageId, StorageCommand, StorageReply};
use storage_wire::{DecodeResult, WireVersion};
use tracing::{debug, warn};

/// Command awaiting its reply
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// The sent command
    pub command: StorageCommand,
    /// When it was registered
    pub sent_at: Instant,
}

/// Commands sent and not yet answered, keyed by message id.
///
/// Several reply kinds only carry the fields that differ from their command,
/// so the command must be at hand when the reply is decoded.
#[derive(Debug, Default)]
pub struct PendingCommands {
    pending: DashMap<MessageId, PendingCommand>,
}

impl PendingCommands {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sent command, returning any previous command with the same id
    pub fn insert(&self, command: StorageCommand) -> Option<StorageCommand> {
        let id = command.msg_id();
        let previous = self.pending.insert(
            id,
            PendingCommand {
                command,
                sent_at: Instant::now(),
            },
        );
        if previous.is_some() {
            warn!("Replaced pending command with duplicate message id {}", id);
        }
        previous.map(|p| p.command)
    }

    /// Remove and return the command with `id`
    pub fn take(&self, id: MessageId) -> Option<StorageCommand> {
        self.pending.remove(&id).map(|(_, p)| p.command)
    }

    /// Whether a command with `id` is pending
    pub fn contains(&self, id: MessageId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending commands
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every command pending for at least `timeout`
    pub fn expire(&self, timeout: Duration) -> Vec<StorageCommand> {
        let now = Instant::now();
        let expired: Vec<MessageId> = self
            .pending
            .iter()
            .filter(|entry| now.duration_since(entry.sent_at) >= timeout)
            .map(|entry| *entry.key())
            .collect();

        let commands: Vec<StorageCommand> = expired
            .into_iter()
            .filter_map(|id| self.take(id))
            .collect();
        if !commands.is_empty() {
            debug!("Expired {} pending commands", commands.len());
        }
        commands
    }

    /// Decode a reply, consuming the pending command it answers.
    ///
    /// The command is put back when decoding fails so that it still expires.
    pub fn decode_reply(
        &self,
        protocol: &StorageProtocol,
        bytes: Bytes,
        version: WireVersion,
    ) -> DecodeResult<StorageReply> {
        let id = peek_msg_id(&bytes)?;
        let command = self.take(id);
        if command.is_none() {
            debug!("No pending command for reply to message {}", id);
        }

        match protocol.decode_reply(bytes, version, command.as_ref()) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if let Some(command) = command {
                    self.insert(command);
                }
                Err(e)
            }
        }
    }
}
