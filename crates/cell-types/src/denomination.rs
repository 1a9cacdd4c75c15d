use serde::{Deserialize, Serialize};

use crate::resource::ResourceKey;

/// One interchangeable form of a stored resource.
///
/// `rate` is the number of base units a single displayed unit of this form
/// represents. The least-concentrated form of a family has rate 1; a
/// nine-times-compressed form has rate 9, and so on. A rate of 0 is never
/// valid and is filtered out when a denomination table is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denomination {
    pub key: ResourceKey,
    pub rate: u64,
}

impl Denomination {
    pub fn new(key: ResourceKey, rate: u64) -> Self {
        Self { key, rate }
    }

    /// Displayed count of this form for a given base-unit total (floor).
    pub fn displayed(&self, base_units: u64) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        base_units / self.rate
    }
}
