//! Bucket identifiers and spaces.
//!
//! Provider-raw bucket ids may carry implementation-reserved bits below the
//! used-bits boundary. Every id is normalized before it enters an internal
//! structure; normalization is idempotent.

use std::fmt;

mod lock;

pub use lock::{BucketGuard, BucketLockMap, LockError, LockPolicy};

/// Number of bits in the raw code reserved for the used-bits count.
const USED_BITS_BITS: u32 = 6;
/// Shift of the used-bits count within the raw code.
const USED_BITS_SHIFT: u32 = 64 - USED_BITS_BITS;
/// Maximum number of significant id bits.
pub const MAX_USED_BITS: u32 = USED_BITS_SHIFT;
const ID_MASK: u64 = (1u64 << USED_BITS_SHIFT) - 1;

/// Opaque partition identifier.
///
/// The top six bits of the raw code hold the used-bits count; the remainder
/// holds the id. Bits of the id at or above the used-bits boundary are
/// reserved by the provider and stripped by [`BucketId::normalized`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketId(u64);

impl BucketId {
    /// Build an id from a used-bits count and raw id bits.
    pub fn new(used_bits: u32, id: u64) -> Self {
        let used_bits = u64::from(used_bits.min(MAX_USED_BITS));
        Self((used_bits << USED_BITS_SHIFT) | (id & ID_MASK))
    }

    /// Reconstruct an id from its raw 64-bit code.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit code, used-bits count included.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Number of significant id bits.
    pub fn used_bits(self) -> u32 {
        (self.0 >> USED_BITS_SHIFT) as u32
    }

    /// Strip reserved bits above the used-bits boundary. Idempotent.
    pub fn normalized(self) -> Self {
        let used = self.used_bits();
        let keep = if used == 0 {
            0
        } else {
            (self.0 & ID_MASK) & ((1u64 << used) - 1)
        };
        Self::new(used, keep)
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId(0x{:016x})", self.0)
    }
}

/// Bucket space a document type is partitioned into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BucketSpace(pub u8);

impl BucketSpace {
    /// The default space used when a deployment has a single space.
    pub const DEFAULT: BucketSpace = BucketSpace(0);
}
