//! The LC-3 condition code.

use std::fmt;
use serde::{Serialize, Deserialize};
use super::Value;

/// Sign of the last value written by a condition-setting instruction.
///
/// Exactly one of N, Z, P is set at any time. `BR` tests it against the
/// instruction's nzp mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Condition {
    /// Last result was negative.
    Negative,
    /// Last result was zero.
    #[default]
    Zero,
    /// Last result was positive.
    Positive,
}

impl Condition {
    /// All three conditions, N/Z/P order.
    pub const ALL: [Condition; 3] = [Condition::Negative, Condition::Zero, Condition::Positive];

    /// Classify a value by sign.
    #[inline]
    pub const fn from_value(v: Value) -> Self {
        if v < 0 {
            Condition::Negative
        } else if v == 0 {
            Condition::Zero
        } else {
            Condition::Positive
        }
    }

    /// The flag as a 3-bit mask in BR operand order (N=4, Z=2, P=1).
    #[inline]
    pub const fn nzp_bits(self) -> u8 {
        match self {
            Condition::Negative => 0b100,
            Condition::Zero => 0b010,
            Condition::Positive => 0b001,
        }
    }

    /// Whether a BR instruction with `mask` is taken under this flag.
    #[inline]
    pub const fn matches(self, mask: u8) -> bool {
        self.nzp_bits() & mask != 0
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Condition::Negative => 'N',
            Condition::Zero => 'Z',
            Condition::Positive => 'P',
        };
        write!(f, "{}", c)
    }
}
