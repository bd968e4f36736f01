//! Saturating conversions between `Duration` and the integer units used by
//! lyrics queries and the now-playing wire format.

use std::time::Duration;

/// Extension trait for lossless-or-saturating `Duration` conversions.
pub trait DurationExt {
    /// Whole milliseconds, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;

    /// Whole seconds, saturating at `u32::MAX` (about 136 years, far beyond any track).
    fn as_secs_u32(&self) -> u32;

    /// Duration from a millisecond count that may be negative; negatives become zero.
    fn from_signed_millis(millis: i64) -> Self;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn as_secs_u32(&self) -> u32 {
        u32::try_from(self.as_secs()).unwrap_or(u32::MAX)
    }

    fn from_signed_millis(millis: i64) -> Self {
        Self::from_millis(u64::try_from(millis).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_millis_u64() {
        assert_eq!(Duration::from_millis(6000).as_millis_u64(), 6000);
        assert_eq!(Duration::from_micros(1999).as_millis_u64(), 1);
        assert_eq!(Duration::MAX.as_millis_u64(), u64::MAX);
    }

    #[test]
    fn test_as_secs_u32() {
        assert_eq!(Duration::from_millis(200_999).as_secs_u32(), 200);
        assert_eq!(
            Duration::from_secs(u64::from(u32::MAX) + 1).as_secs_u32(),
            u32::MAX
        );
    }

    #[test]
    fn test_from_signed_millis() {
        assert_eq!(Duration::from_signed_millis(1500), Duration::from_millis(1500));
        assert_eq!(Duration::from_signed_millis(0), Duration::ZERO);
        assert_eq!(Duration::from_signed_millis(-20), Duration::ZERO);
    }
}
