// bitmask.rs - Fixed-width component masks
//
// Every entity and every system carries one of these. Bit k set means
// "owns / requires the component type with id k".

use serde::{Deserialize, Serialize};

/// Raw bit storage for a component mask.
pub type Bitset = u64;

/// Hard cap on distinct component types, fixed by the mask width.
pub const MAX_COMPONENT_TYPES: usize = Bitset::BITS as usize;

/// Fixed-width bit vector over component-type ids.
///
/// Out-of-range bit positions are a caller bug and panic rather than
/// silently wrapping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmask {
    bits: Bitset,
}

impl Bitmask {
    pub fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn from_bits(bits: Bitset) -> Self {
        Self { bits }
    }

    #[inline]
    pub fn bitset(&self) -> Bitset {
        self.bits
    }

    pub fn set_bitset(&mut self, bits: Bitset) {
        self.bits = bits;
    }

    pub fn get_bit(&self, pos: u32) -> bool {
        check_range(pos);
        self.bits & (1 << pos) != 0
    }

    pub fn turn_on_bit(&mut self, pos: u32) {
        check_range(pos);
        self.bits |= 1 << pos;
    }

    /// OR another raw bitset into this mask.
    pub fn turn_on_bits(&mut self, bits: Bitset) {
        self.bits |= bits;
    }

    pub fn toggle_bit(&mut self, pos: u32) {
        check_range(pos);
        self.bits ^= 1 << pos;
    }

    pub fn clear_bit(&mut self, pos: u32) {
        check_range(pos);
        self.bits &= !(1 << pos);
    }

    pub fn clear_all(&mut self) {
        self.bits = 0;
    }

    /// Compare two masks over the bits selected by `relevant`.
    ///
    /// With a non-zero `relevant` mask only those bits are compared, so an
    /// entity owning extra unrelated components still matches a system's
    /// requirement mask. With `relevant == 0` the comparison falls back to
    /// exact equality of both masks: a system with no declared requirements
    /// matches only entities with no components at all. That special case is
    /// deliberate, long-standing behavior; callers relying on
    /// "no requirements means match everything" must pass an explicit
    /// `relevant` selection instead.
    pub fn matches(&self, other: Bitmask, relevant: Bitset) -> bool {
        if relevant != 0 {
            (other.bits & relevant) == (self.bits & relevant)
        } else {
            self.bits == other.bits
        }
    }
}

/// Build a mask from a list of bit positions. The input is sorted first so
/// the result does not depend on argument order.
pub fn configure_mask(mut positions: Vec<u32>) -> Bitmask {
    positions.sort_unstable();
    let mut mask = Bitmask::new();
    for pos in positions {
        mask.turn_on_bit(pos);
    }
    mask
}

#[inline]
fn check_range(pos: u32) {
    assert!(
        (pos as usize) < MAX_COMPONENT_TYPES,
        "bit position {pos} exceeds mask width {MAX_COMPONENT_TYPES}"
    );
}
