//! Bit-field extraction on 16-bit words.
//!
//! Every LC-3 instruction is decoded by pulling fixed bit ranges out of
//! the instruction word. Ranges are inclusive on both ends and counted
//! from bit 0 (least significant).

use super::Value;

/// Width of a machine word in bits.
pub const WORD_BITS: u32 = 16;

/// Extract bits `lo..=hi` of `v`, zero-extended.
#[inline]
pub const fn extract(v: Value, lo: u32, hi: u32) -> Value {
    debug_assert!(lo <= hi && hi < WORD_BITS);
    let width = hi - lo + 1;
    let shifted = (v as u16) >> lo;
    let mask = if width == WORD_BITS { u16::MAX } else { (1u16 << width) - 1 };
    (shifted & mask) as Value
}

/// Extract bits `lo..=hi` of `v`, sign-extended from bit `hi`.
#[inline]
pub const fn sext_extract(v: Value, lo: u32, hi: u32) -> Value {
    let width = hi - lo + 1;
    let field = extract(v, lo, hi) as u16;
    let spare = WORD_BITS - width;
    // Move the field's top bit into bit 15, then arithmetic-shift back down.
    ((field << spare) as i16) >> spare
}

/// Test a single bit.
#[inline]
pub const fn bit(v: Value, n: u32) -> bool {
    extract(v, n, n) != 0
}

/// Pack `value` into the low `width` bits.
///
/// Accepts anything representable in `width` bits as either a signed or an
/// unsigned number, so `-1` and `0b11111` both pack into a 5-bit field.
/// Returns `None` when the value does not fit.
pub fn pack(value: i32, width: u32) -> Option<u16> {
    debug_assert!(width > 0 && width <= WORD_BITS);
    let min = -(1i32 << (width - 1));
    let max = (1i32 << width) - 1;
    if value < min || value > max {
        return None;
    }
    let mask = ((1u32 << width) - 1) as i32;
    Some((value & mask) as u16)
}
