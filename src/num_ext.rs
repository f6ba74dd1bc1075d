//! Small numeric conversion helpers.
//!
//! Grounded on the teacher crate's `i_to_usize.rs`.

/// Convert a signed integer to a `usize`, treating negative values as zero rather than wrapping.
///
/// Several fields in the layer-and-mask section (extra-data lengths, bounds deltas) are read as
/// signed integers but only make sense as a count or size when non-negative; this keeps those
/// call sites from silently wrapping a negative value into a huge `usize`.
pub(crate) trait SignedInteger {
    /// Convert `self` to a `usize`, clamping negative values to zero.
    fn to_usize_or_zero(self) -> usize;
}

impl SignedInteger for i16 {
    fn to_usize_or_zero(self) -> usize {
        if self < 0 {
            0
        } else {
            self as usize
        }
    }
}

impl SignedInteger for i32 {
    fn to_usize_or_zero(self) -> usize {
        if self < 0 {
            0
        } else {
            self as usize
        }
    }
}

impl SignedInteger for i64 {
    fn to_usize_or_zero(self) -> usize {
        if self < 0 {
            0
        } else {
            self as usize
        }
    }
}
