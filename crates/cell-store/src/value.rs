use serde::{Deserialize, Serialize};

use crate::record::Record;

/// How 64-bit counters are encoded in a record.
///
/// `Native` stores them as a single wide value; `Split` stores them as two
/// 32-bit halves for host formats without native 64-bit integer support.
/// Reads accept both regardless of the configured write format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LongFormat {
    #[default]
    Native,
    Split,
}

/// A single persisted value in the host's key/value tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Unsigned 64-bit counter.
    Long(u64),
    /// Signed integer; also used for sentinel fields like `-1`.
    Int(i64),
    /// Raw 32-bit integer array (split u64 halves, small tables).
    IntArray(Vec<i32>),
    /// Unsigned 64-bit integer array (conversion-rate tables).
    LongArray(Vec<u64>),
    /// UTF-8 text.
    Text(String),
    /// Ordered list of sub-records.
    List(Vec<Record>),
    /// Nested record.
    Compound(Record),
}

/// Split a u64 into `[low, high]` 32-bit halves, bit-preserving.
pub fn split_u64(v: u64) -> [i32; 2] {
    [(v & 0xFFFF_FFFF) as u32 as i32, (v >> 32) as u32 as i32]
}

/// Reassemble a u64 from `[low, high]` 32-bit halves.
pub fn join_u64(halves: [i32; 2]) -> u64 {
    u64::from(halves[0] as u32) | (u64::from(halves[1] as u32) << 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_roundtrips_boundaries() {
        for v in [0, 1, u64::from(u32::MAX), u64::from(u32::MAX) + 1, u64::MAX] {
            assert_eq!(join_u64(split_u64(v)), v);
        }
    }

    proptest! {
        #[test]
        fn split_roundtrips_full_range(v in any::<u64>()) {
            prop_assert_eq!(join_u64(split_u64(v)), v);
        }
    }
}
