//! Property tests for the timer queue and stagger offsets.

use proptest::prelude::*;
use stagehand_core::stagger::{StaggerOrigin, stagger_offsets};
use stagehand_core::timer::{GenerationCounter, TimerQueue};
use std::time::Duration;

proptest! {
    #[test]
    fn timers_fire_in_non_decreasing_deadline_order(
        delays in prop::collection::vec(0u64..10_000, 0..64),
    ) {
        let g = GenerationCounter::new().current();
        let mut q = TimerQueue::new();
        for (i, ms) in delays.iter().enumerate() {
            q.schedule(Duration::from_millis(*ms), g, i);
        }

        let mut last = Duration::ZERO;
        let mut fired = 0usize;
        while let Some(f) = q.pop_due(Duration::MAX) {
            prop_assert!(f.at >= last);
            prop_assert_eq!(f.at, Duration::from_millis(delays[f.msg]));
            last = f.at;
            fired += 1;
        }
        prop_assert_eq!(fired, delays.len());
    }

    #[test]
    fn cancelled_generation_never_fires(
        stale in prop::collection::vec(0u64..5_000, 0..32),
        live in prop::collection::vec(0u64..5_000, 0..32),
    ) {
        let mut tokens = GenerationCounter::new();
        let old = tokens.current();
        let mut q = TimerQueue::new();
        for ms in &stale {
            q.schedule(Duration::from_millis(*ms), old, false);
        }
        let new = tokens.invalidate();
        for ms in &live {
            q.schedule(Duration::from_millis(*ms), new, true);
        }

        prop_assert_eq!(q.cancel_where(|g, _| !tokens.is_current(g)), stale.len());
        while let Some(f) = q.pop_due(Duration::MAX) {
            prop_assert!(f.msg);
            prop_assert!(tokens.is_current(f.generation));
        }
    }

    #[test]
    fn pop_due_respects_horizon(
        delays in prop::collection::vec(0u64..2_000, 1..32),
        horizon in 0u64..2_000,
    ) {
        let g = GenerationCounter::new().current();
        let mut q = TimerQueue::new();
        for ms in &delays {
            q.schedule(Duration::from_millis(*ms), g, *ms);
        }
        let until = Duration::from_millis(horizon);
        while let Some(f) = q.pop_due(until) {
            prop_assert!(f.msg <= horizon);
        }
        let remaining = delays.iter().filter(|ms| **ms > horizon).count();
        prop_assert_eq!(q.len(), remaining);
    }

    #[test]
    fn stagger_offsets_are_evenly_spaced(count in 0usize..64, delay_ms in 0u64..5_000) {
        let delay = Duration::from_millis(delay_ms);
        let offsets = stagger_offsets(count, delay, StaggerOrigin::AfterFirstDelay);
        prop_assert_eq!(offsets.len(), count);
        for (i, offset) in offsets.iter().enumerate() {
            prop_assert_eq!(*offset, delay * (i as u32 + 1));
        }
    }
}
