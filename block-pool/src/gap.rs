use crate::align_up;

/// Aligned sub-range of a free span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Gap {
    pub start: u64,
    pub end: u64,
}

/// Fits `size` bytes aligned to `alignment` into free span `[free_start, free_end)`.
///
/// `alignment` must be a power of two, zero is treated as one.
/// Already aligned `free_start` is used as-is.
/// Returns `None` if the aligned range does not fit or arithmetic overflows.
pub fn fit(free_start: u64, free_end: u64, size: u64, alignment: u64) -> Option<Gap> {
    let alignment = alignment.max(1);
    debug_assert!(
        alignment.is_power_of_two(),
        "`alignment` must be power of two"
    );

    let start = align_up(free_start, alignment - 1)?;
    let end = start.checked_add(size)?;

    if end > free_end {
        return None;
    }

    Some(Gap { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_start_is_kept() {
        assert_eq!(fit(0, 1024, 300, 64), Some(Gap { start: 0, end: 300 }));
        assert_eq!(fit(320, 1024, 300, 64), Some(Gap { start: 320, end: 620 }));
    }

    #[test]
    fn unaligned_start_is_rounded_up() {
        assert_eq!(fit(300, 1024, 300, 64), Some(Gap { start: 320, end: 620 }));
        assert_eq!(fit(1, 16, 8, 8), Some(Gap { start: 8, end: 16 }));
    }

    #[test]
    fn exact_fit_and_one_byte_short() {
        assert_eq!(fit(0, 320, 320, 64), Some(Gap { start: 0, end: 320 }));
        assert_eq!(fit(0, 319, 320, 64), None);
        assert_eq!(fit(620, 1024, 800, 64), None);
    }

    #[test]
    fn rounding_can_push_range_out_of_span() {
        // Aligned start lands past the end of the span.
        assert_eq!(fit(65, 100, 1, 64), None);
    }

    #[test]
    fn zero_alignment_means_byte_alignment() {
        assert_eq!(fit(3, 10, 7, 0), Some(Gap { start: 3, end: 10 }));
        assert_eq!(fit(3, 10, 7, 1), Some(Gap { start: 3, end: 10 }));
    }

    #[test]
    fn overflow_does_not_fit() {
        assert_eq!(fit(u64::MAX - 3, u64::MAX, 1, 8), None);
        assert_eq!(fit(u64::MAX - 3, u64::MAX, u64::MAX, 1), None);
    }
}
