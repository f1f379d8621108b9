//! Small value types shared by the storage messages.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Operation time assigned by the originator; 0 means unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The unset sentinel
    pub const UNSET: Timestamp = Timestamp(0);

    /// Raw value
    pub fn value(self) -> u64 {
        self.0
    }

    /// Whether a time has been assigned
    pub fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for Timestamp {
    fn from(v: u64) -> Self {
        Timestamp(v)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compact content-derived document identifier used in merge payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GlobalId([u8; GlobalId::LENGTH]);

impl GlobalId {
    /// Width in bytes
    pub const LENGTH: usize = 12;

    /// Take the first 12 bytes of `raw`, zero padding shorter input
    pub fn from_raw(raw: &[u8]) -> Self {
        let mut gid = [0u8; Self::LENGTH];
        let n = raw.len().min(Self::LENGTH);
        gid[..n].copy_from_slice(&raw[..n]);
        Self(gid)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; GlobalId::LENGTH] {
        &self.0
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("gid(0x")?;
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        f.write_str(")")
    }
}

/// Errors from document value validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Document id does not follow `id:<namespace>:<type>:<key-values>:<specific>`
    #[error("invalid document id {0:?}")]
    InvalidId(String),

    /// Document type is not known to the type repository
    #[error("unknown document type {0:?}")]
    UnknownType(String),

    /// Serialized document could not be read
    #[error("corrupt document blob: {0}")]
    Corrupt(String),
}

/// Validated document identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Parse and validate an id string
    pub fn parse(id: impl Into<String>) -> Result<Self, DocumentError> {
        let id = id.into();
        let mut parts = id.splitn(5, ':');
        let scheme = parts.next();
        let namespace = parts.next();
        let doc_type = parts.next();
        let key_values = parts.next();
        let specific = parts.next();
        match (scheme, namespace, doc_type, key_values, specific) {
            (Some("id"), Some(ns), Some(t), Some(_), Some(s))
                if !ns.is_empty() && !t.is_empty() && !s.is_empty() =>
            {
                Ok(Self(id))
            }
            _ => Err(DocumentError::InvalidId(id)),
        }
    }

    /// The id string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace component
    pub fn namespace(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Document type component
    pub fn doc_type(&self) -> &str {
        self.0.split(':').nth(2).unwrap_or_default()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest selection accepted for a test-and-set condition (4 KiB)
pub const MAX_CONDITION_LEN: usize = 4 * 1024;

/// Selection predicate gating a conditional write; empty means none
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TestAndSetCondition {
    selection: String,
}

impl TestAndSetCondition {
    /// Condition with the given selection
    pub fn new(selection: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
        }
    }

    /// No condition
    pub fn none() -> Self {
        Self::default()
    }

    /// The selection string
    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// Whether a condition is set
    pub fn is_present(&self) -> bool {
        !self.selection.is_empty()
    }
}

/// Default storage priority of a message
pub const DEFAULT_PRIORITY: u8 = 127;

/// Named traffic class with a default priority
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadType {
    /// Wire id
    pub id: u32,
    /// Registry name
    pub name: String,
    /// Default priority of messages of this type
    pub priority: u8,
}

static DEFAULT_LOAD_TYPE: Lazy<LoadType> = Lazy::new(|| LoadType {
    id: 0,
    name: "default".to_string(),
    priority: DEFAULT_PRIORITY,
});

impl LoadType {
    /// Create a load type
    pub fn new(id: u32, name: impl Into<String>, priority: u8) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
        }
    }

    /// The always-present default load type (id 0)
    pub fn default_type() -> &'static LoadType {
        &DEFAULT_LOAD_TYPE
    }
}

impl Default for LoadType {
    fn default() -> Self {
        DEFAULT_LOAD_TYPE.clone()
    }
}

/// Registry of load types known to this node
#[derive(Debug, Clone)]
pub struct LoadTypeSet {
    by_id: HashMap<u32, LoadType>,
}

impl LoadTypeSet {
    /// Registry holding only the default load type
    pub fn new() -> Self {
        let mut by_id = HashMap::new();
        by_id.insert(0, LoadType::default());
        Self { by_id }
    }

    /// Register a load type, replacing any previous one with the same id
    pub fn add_load_type(&mut self, id: u32, name: impl Into<String>, priority: u8) {
        self.by_id.insert(id, LoadType::new(id, name, priority));
    }

    /// Look up by wire id
    pub fn get(&self, id: u32) -> Option<&LoadType> {
        self.by_id.get(&id)
    }

    /// Look up by name
    pub fn by_name(&self, name: &str) -> Option<&LoadType> {
        self.by_id.values().find(|lt| lt.name == name)
    }

    /// Number of registered load types
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether only the default type is registered
    pub fn is_empty(&self) -> bool {
        self.by_id.len() <= 1
    }
}

impl Default for LoadTypeSet {
    fn default() -> Self {
        Self::new()
    }
}
