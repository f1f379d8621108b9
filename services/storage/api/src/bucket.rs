//! Bucket identifiers and bucket spaces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace partitioning the bucket id space
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketSpace(pub u64);

impl BucketSpace {
    /// Space used for documents unless configured otherwise
    pub const DEFAULT: BucketSpace = BucketSpace(1);
    /// Space used before the target space is known
    pub const PLACEHOLDER: BucketSpace = BucketSpace(0);

    /// Raw space id
    pub fn id(self) -> u64 {
        self.0
    }

    /// Whether this is the default space
    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl Default for BucketSpace {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BucketSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DEFAULT => f.write_str("default"),
            Self::PLACEHOLDER => f.write_str("placeholder"),
            BucketSpace(id) => write!(f, "BucketSpace({:#x})", id),
        }
    }
}

/// Partition of the document space at a given split depth.
///
/// The top six bits of the raw value hold the number of used location bits,
/// the low bits hold the location itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BucketId(u64);

impl BucketId {
    /// Bits reserved for the used-bit count
    pub const COUNT_BITS: u32 = 6;
    /// Deepest split level
    pub const MAX_USED_BITS: u32 = 58;

    /// Create a bucket id using `used_bits` bits of `location`
    pub fn new(used_bits: u32, location: u64) -> Self {
        let used_bits = used_bits.min(Self::MAX_USED_BITS);
        let mask = if used_bits == 0 { 0 } else { u64::MAX >> (64 - used_bits) };
        Self(((used_bits as u64) << Self::MAX_USED_BITS) | (location & mask))
    }

    /// Wrap a raw value verbatim
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw 64-bit value
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Number of location bits in use
    pub fn used_bits(self) -> u32 {
        (self.0 >> Self::MAX_USED_BITS) as u32
    }

    /// Location bits without the used-bit count
    pub fn location(self) -> u64 {
        self.0 & (u64::MAX >> Self::COUNT_BITS)
    }

    /// Whether any location bits are in use
    pub fn is_set(self) -> bool {
        self.used_bits() != 0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId({:#018x})", self.0)
    }
}

/// Addressable unit targeted by bucket level operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Bucket {
    /// Namespace of the id
    pub space: BucketSpace,
    /// Bucket within the space
    pub id: BucketId,
}

impl Bucket {
    /// Create a bucket in the given space
    pub fn new(space: BucketSpace, id: BucketId) -> Self {
        Self { space, id }
    }

    /// Bucket in the default space
    pub fn in_default_space(id: BucketId) -> Self {
        Self::new(BucketSpace::DEFAULT, id)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.space.is_default() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "Bucket({}, {})", self.space, self.id)
        }
    }
}
