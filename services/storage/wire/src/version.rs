//! Wire versions, protocol revisions and the version-gated field table.
//!
//! A peer announces a three component [`WireVersion`]. The codec maps it onto
//! one of the closed set of [`Revision`]s, and every field that did not exist
//! in the baseline revision is listed in [`FIELD_GATES`] together with the
//! revision that introduced it. Encode and decode both consult that table:
//!
//! * encoding below the revision drops the field,
//! * decoding below the revision yields the field's default, decoded from the
//!   wire form stored in the table by the same reader as the field itself,
//! * decoding at or above the revision requires the field on the wire.

use crate::buffer::{WireReader, WireWrite};
use crate::error::{DecodeError, DecodeResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version announced by a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireVersion {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Micro component
    pub micro: u32,
}

impl WireVersion {
    /// Create a version from its components
    pub const fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
        }
    }

    /// Serialization revision selected by this version, if supported
    pub fn revision(self) -> Option<Revision> {
        Revision::ALL
            .iter()
            .rev()
            .copied()
            .find(|rev| self >= rev.first_version())
    }
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

/// Error parsing a version string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid wire version {0:?}, expected major.minor[.micro]")]
pub struct ParseVersionError(String);

impl FromStr for WireVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, ParseVersionError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| err()),
                None if required => Err(err()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(true)?;
        let micro = next(false)?;
        if parts.next().is_some() {
            return Err(err());
        }
        Ok(Self::new(major, minor, micro))
    }
}

/// Serialization revisions, oldest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Revision {
    /// Baseline
    V5_0,
    /// Bucket info flags, merge source-only nodes, visitor field sets
    V5_1,
    /// Test-and-set conditions on put/update/remove
    V5_2,
    /// Explicit bucket spaces
    V6_0,
}

impl Revision {
    /// All revisions in ascending order
    pub const ALL: [Revision; 4] = [
        Revision::V5_0,
        Revision::V5_1,
        Revision::V5_2,
        Revision::V6_0,
    ];

    /// Lowest announced version that selects this revision
    pub const fn first_version(self) -> WireVersion {
        match self {
            Revision::V5_0 => WireVersion::new(5, 0, 0),
            Revision::V5_1 => WireVersion::new(5, 1, 0),
            Revision::V5_2 => WireVersion::new(5, 93, 30),
            Revision::V6_0 => WireVersion::new(6, 240, 0),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Revision::V5_0 => "5.0",
            Revision::V5_1 => "5.1",
            Revision::V5_2 => "5.2",
            Revision::V6_0 => "6.0",
        };
        f.write_str(s)
    }
}

/// Fields that are present on the wire only from some revision on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatedField {
    /// Bucket space preceding every bucket id
    BucketSpace,
    /// Test-and-set condition on put, update and remove
    Condition,
    /// Ready/active flags trailing a bucket info
    BucketInfoFlags,
    /// Source-only flag of a merge node
    MergeNodeSourceOnly,
    /// Field set of a create visitor command
    VisitorFieldSet,
    /// Document ordering of a create visitor command
    VisitorOrdering,
}

/// One row of the gate table
#[derive(Debug, Clone, Copy)]
pub struct FieldGate {
    /// The gated field
    pub field: GatedField,
    /// Revision that introduced it
    pub since: Revision,
    /// Wire form of the value a decoder substitutes below `since`
    pub default_on_absence: &'static [u8],
}

/// Version gate for every field introduced after the baseline revision
pub static FIELD_GATES: [FieldGate; 6] = [
    FieldGate {
        field: GatedField::BucketSpace,
        since: Revision::V6_0,
        // BucketSpace::DEFAULT
        default_on_absence: &[0, 0, 0, 0, 0, 0, 0, 1],
    },
    FieldGate {
        field: GatedField::Condition,
        since: Revision::V5_2,
        // empty selection
        default_on_absence: &[0, 0, 0, 0],
    },
    FieldGate {
        field: GatedField::BucketInfoFlags,
        since: Revision::V5_1,
        default_on_absence: &[0],
    },
    FieldGate {
        field: GatedField::MergeNodeSourceOnly,
        since: Revision::V5_1,
        default_on_absence: &[0],
    },
    FieldGate {
        field: GatedField::VisitorFieldSet,
        since: Revision::V5_1,
        default_on_absence: &[0, 0, 0, 5, b'[', b'a', b'l', b'l', b']'],
    },
    FieldGate {
        field: GatedField::VisitorOrdering,
        since: Revision::V5_1,
        default_on_absence: &[0],
    },
];

impl GatedField {
    /// Table row for this field
    pub fn gate(self) -> &'static FieldGate {
        let row = match self {
            GatedField::BucketSpace => 0,
            GatedField::Condition => 1,
            GatedField::BucketInfoFlags => 2,
            GatedField::MergeNodeSourceOnly => 3,
            GatedField::VisitorFieldSet => 4,
            GatedField::VisitorOrdering => 5,
        };
        &FIELD_GATES[row]
    }

    /// Revision that introduced the field
    pub fn since(self) -> Revision {
        self.gate().since
    }

    /// Whether the field is on the wire at `rev`
    pub fn present_at(self, rev: Revision) -> bool {
        rev >= self.since()
    }

    /// Human-readable field name
    pub fn name(self) -> &'static str {
        match self {
            GatedField::BucketSpace => "bucket space",
            GatedField::Condition => "condition",
            GatedField::BucketInfoFlags => "bucket info flags",
            GatedField::MergeNodeSourceOnly => "merge node source-only flag",
            GatedField::VisitorFieldSet => "visitor field set",
            GatedField::VisitorOrdering => "visitor ordering",
        }
    }

    /// Write the field if `rev` carries it, drop it otherwise
    pub fn write<W, F>(self, out: &mut W, rev: Revision, write: F)
    where
        W: WireWrite + ?Sized,
        F: FnOnce(&mut W),
    {
        if self.present_at(rev) {
            write(out);
        }
    }

    /// Read the field if `rev` carries it, otherwise decode its table default
    /// with the same `read`.
    ///
    /// Truncation while reading a field the revision requires is reported as
    /// malformed input.
    pub fn read<T, R>(self, reader: &mut WireReader, rev: Revision, read: R) -> DecodeResult<T>
    where
        R: FnOnce(&mut WireReader) -> DecodeResult<T>,
    {
        if !self.present_at(rev) {
            return self.read_default(read);
        }
        read(reader).map_err(|e: DecodeError| e.into_missing_field(self))
    }

    /// Decode the default a revision without this field implies
    pub fn read_default<T, R>(self, read: R) -> DecodeResult<T>
    where
        R: FnOnce(&mut WireReader) -> DecodeResult<T>,
    {
        let mut reader = WireReader::new(Bytes::from_static(self.gate().default_on_absence));
        let value = read(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}
