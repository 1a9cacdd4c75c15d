use cell_math::{ceil_div, mul_div, sat_add, sat_mul, sat_sub};

/// Immutable capacity parameters of one cell type.
///
/// `display_bytes` is the small figure shown to the user ("1k"); the real
/// backing capacity is that figure times `byte_multiplier`. `bytes_per_type`
/// is the display-scale overhead reserved per stored resource identity,
/// independent of quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityProfile {
    pub display_bytes: u64,
    pub byte_multiplier: u64,
    pub units_per_byte: u64,
    pub bytes_per_type: u64,
}

impl CapacityProfile {
    /// Total real backing bytes.
    pub fn total_bytes(&self) -> u64 {
        sat_mul(self.display_bytes, self.byte_multiplier)
    }

    /// Maximum storable base units for a family whose main denomination has
    /// the given rate.
    ///
    /// The rounding reserve subtracted at the end guarantees the ceiling
    /// based used-bytes figure can never exceed `total_bytes()`; it is a
    /// required part of the capacity contract, not an approximation.
    pub fn max_base_units(&self, main_rate: u64, charge_type: bool) -> u64 {
        let type_bytes = if charge_type {
            sat_mul(self.bytes_per_type, self.byte_multiplier)
        } else {
            0
        };
        let available = sat_sub(self.total_bytes(), type_bytes);
        if available == 0 {
            return 0;
        }
        let main_tier_items = sat_mul(available, self.units_per_byte);
        let raw = sat_mul(main_tier_items, main_rate);
        sat_sub(raw, rounding_reserve(self.units_per_byte, main_rate))
    }

    /// Per-slot base-unit share under equal distribution across `slots`
    /// resource types. Overhead for all slots is reserved up front; the
    /// remainder is split evenly through the exact multiply-then-divide.
    pub fn per_slot_base_units(&self, slots: u32) -> u64 {
        if slots == 0 {
            return 0;
        }
        let available = sat_sub(
            self.display_bytes,
            sat_mul(u64::from(slots), self.bytes_per_type),
        );
        let raw = mul_div(
            available,
            self.units_per_byte,
            self.byte_multiplier,
            u64::from(slots),
        );
        sat_sub(raw, rounding_reserve(self.units_per_byte, 1))
    }

    /// Total equal-distribution capacity, always derived from the per-slot
    /// share so the two figures cannot disagree.
    pub fn distributed_total(&self, slots: u32) -> u64 {
        sat_mul(self.per_slot_base_units(slots), u64::from(slots))
    }

    /// Exact real bytes consumed by one pool: the per-type overhead plus the
    /// ceiling-rounded item bytes.
    pub fn pool_used_bytes(&self, base_units: u64, main_rate: u64) -> u64 {
        let item_bytes = ceil_div(base_units, sat_mul(self.units_per_byte, main_rate));
        sat_add(sat_mul(self.bytes_per_type, self.byte_multiplier), item_bytes)
    }
}

/// `(rate - 1) + (units_per_byte - 1) * rate`, i.e. one byte's worth of main
/// tier items minus a single base unit. Reserving it keeps the ceiling-based
/// used-bytes display within the total even at exact-fit boundaries.
fn rounding_reserve(units_per_byte: u64, rate: u64) -> u64 {
    sat_add(sat_sub(rate, 1), sat_mul(sat_sub(units_per_byte, 1), rate))
}
