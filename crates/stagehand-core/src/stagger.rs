#![forbid(unsafe_code)]

//! Stagger utilities: delay offsets for cascading reveals.
//!
//! [`stagger_offsets`] produces the time at which each item of a list should
//! appear, measured from the start of the cascade.
//!
//! # Invariants
//!
//! 1. `stagger_offsets(0, ..)` returns an empty vec.
//! 2. Offsets are monotonically non-decreasing.
//! 3. For [`StaggerOrigin::Immediate`], offset[i] = i * delay.
//! 4. For [`StaggerOrigin::AfterFirstDelay`], offset[i] = (i + 1) * delay.
//!
//! # Failure Modes
//!
//! - Zero delay: all offsets are `Duration::ZERO`.
//! - Overflow: offsets saturate at `Duration::MAX`.

use std::time::Duration;

/// Where the first item of a cascade lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaggerOrigin {
    /// The first item appears at time zero.
    Immediate,
    /// The first item appears after one full delay.
    #[default]
    AfterFirstDelay,
}

/// Compute stagger delay offsets for `count` items spaced `delay` apart.
#[must_use]
pub fn stagger_offsets(count: usize, delay: Duration, origin: StaggerOrigin) -> Vec<Duration> {
    let lead = match origin {
        StaggerOrigin::Immediate => 0,
        StaggerOrigin::AfterFirstDelay => 1,
    };
    (0..count)
        .map(|i| {
            let slots = u32::try_from(i + lead).unwrap_or(u32::MAX);
            delay.saturating_mul(slots)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_500: Duration = Duration::from_millis(500);
    const MS_1500: Duration = Duration::from_millis(1500);

    #[test]
    fn zero_count_returns_empty() {
        assert!(stagger_offsets(0, MS_500, StaggerOrigin::Immediate).is_empty());
        assert!(stagger_offsets(0, MS_500, StaggerOrigin::AfterFirstDelay).is_empty());
    }

    #[test]
    fn immediate_starts_at_zero() {
        let offsets = stagger_offsets(3, MS_500, StaggerOrigin::Immediate);
        assert_eq!(
            offsets,
            vec![Duration::ZERO, MS_500, Duration::from_millis(1000)]
        );
    }

    #[test]
    fn after_first_delay_shifts_by_one_slot() {
        let offsets = stagger_offsets(2, MS_1500, StaggerOrigin::AfterFirstDelay);
        assert_eq!(offsets, vec![MS_1500, Duration::from_millis(3000)]);
    }

    #[test]
    fn default_origin_is_after_first_delay() {
        assert_eq!(StaggerOrigin::default(), StaggerOrigin::AfterFirstDelay);
    }

    #[test]
    fn zero_delay_all_zero() {
        let offsets = stagger_offsets(5, Duration::ZERO, StaggerOrigin::AfterFirstDelay);
        assert!(offsets.iter().all(|d| *d == Duration::ZERO));
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let offsets = stagger_offsets(3, Duration::MAX, StaggerOrigin::AfterFirstDelay);
        assert_eq!(offsets[2], Duration::MAX);
    }

    #[test]
    fn monotonic() {
        let offsets = stagger_offsets(10, Duration::from_millis(50), StaggerOrigin::Immediate);
        for w in offsets.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }
}
