#![forbid(unsafe_code)]

//! Step sequencing for the pointer walkthrough.
//!
//! A [`Sequence`] is an immutable, ordered list of [`Step`]s. A
//! [`Sequencer`] walks it as a state machine over
//! `Idle → Step(0) → … → Step(n-1) → Done`, dwelling on each step for its
//! configured duration and publishing the pointer position for the step's
//! anchor.
//!
//! # Invariants
//!
//! 1. Entering `Step(i)` always queries the anchor once, immediately.
//! 2. Scroll-driven re-queries happen only while a step is active.
//! 3. A dwell wake-up whose generation is no longer current is dropped
//!    without touching any state.
//! 4. An unavailable anchor hides the pointer but never stops the dwell.
//!    The last known position is kept so a hidden pointer does not jump.

use std::borrow::Cow;
use std::time::Duration;

use stagehand_core::anchor::{AnchorId, AnchorLocator, AnchorResolver};
use stagehand_core::geometry::Point;
use stagehand_core::timer::{Generation, GenerationCounter, Wake};

use crate::advance::Advance;

/// One stop of the walkthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub index: usize,
    pub anchor: AnchorId,
    pub dwell: Duration,
    pub label: Cow<'static, str>,
}

/// Ordered, immutable list of steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    steps: Vec<Step>,
}

impl Sequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Indices are assigned in insertion order.
    #[must_use]
    pub fn step(
        mut self,
        anchor: impl Into<AnchorId>,
        dwell: Duration,
        label: impl Into<Cow<'static, str>>,
    ) -> Self {
        let index = self.steps.len();
        self.steps.push(Step {
            index,
            anchor: anchor.into(),
            dwell,
            label: label.into(),
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of every dwell.
    pub fn total_dwell(&self) -> Duration {
        self.steps
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.dwell))
    }

    /// The state a sequencer activated at time zero is in at `elapsed`.
    ///
    /// Step `i` is active on `[sum(d0..di), sum(d0..=di))`; the sequence is
    /// done from the total dwell onwards.
    pub fn state_at(&self, elapsed: Duration) -> SequencerState {
        let mut end = Duration::ZERO;
        for step in &self.steps {
            end = end.saturating_add(step.dwell);
            if elapsed < end {
                return SequencerState::Step(step.index);
            }
        }
        SequencerState::Done
    }
}

/// Where the sequencer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Idle,
    Step(usize),
    Done,
}

impl SequencerState {
    pub fn step_index(self) -> Option<usize> {
        match self {
            Self::Step(i) => Some(i),
            _ => None,
        }
    }
}

/// Pointer overlay state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    pub visible: bool,
    /// Last resolved position. Kept while hidden.
    pub position: Point,
}

/// What a sequencer transition published.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerUpdate {
    /// Entered a step. `position` is `None` when the anchor was unavailable.
    Entered {
        index: usize,
        position: Option<Point>,
    },
    /// Walked past the last step.
    Done,
}

/// Walks a [`Sequence`], one dwell at a time.
#[derive(Debug, Clone)]
pub struct Sequencer {
    sequence: Sequence,
    container: AnchorId,
    locator: AnchorLocator,
    state: SequencerState,
    pointer: Pointer,
    tokens: GenerationCounter,
}

impl Sequencer {
    #[must_use]
    pub fn new(sequence: Sequence, container: impl Into<AnchorId>, locator: AnchorLocator) -> Self {
        Self {
            sequence,
            container: container.into(),
            locator,
            state: SequencerState::Idle,
            pointer: Pointer::default(),
            tokens: GenerationCounter::new(),
        }
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn pointer(&self) -> Pointer {
        self.pointer
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.state.step_index().and_then(|i| self.sequence.get(i))
    }

    /// Start from `Step(0)`, invalidating any previous run.
    ///
    /// An empty sequence goes straight to `Done`.
    pub fn activate<R: AnchorResolver + ?Sized>(
        &mut self,
        resolver: &R,
    ) -> Advance<SequencerUpdate> {
        self.tokens.invalidate();
        if self.sequence.is_empty() {
            self.state = SequencerState::Done;
            self.pointer.visible = false;
            return Advance::one(SequencerUpdate::Done, None);
        }
        self.enter(0, resolver)
    }

    /// Deliver a dwell wake-up.
    ///
    /// Returns `None` when the wake-up is stale or no step is active.
    pub fn on_dwell_elapsed<R: AnchorResolver + ?Sized>(
        &mut self,
        generation: Generation,
        resolver: &R,
    ) -> Option<Advance<SequencerUpdate>> {
        if !self.tokens.is_current(generation) {
            return None;
        }
        let index = self.state.step_index()?;
        let next = index + 1;
        if next < self.sequence.len() {
            return Some(self.enter(next, resolver));
        }
        self.state = SequencerState::Done;
        self.pointer.visible = false;
        tracing::debug!(generation = generation.get(), "sequence done");
        Some(Advance::one(SequencerUpdate::Done, None))
    }

    /// Re-derive the pointer after a scroll.
    ///
    /// Returns `None` without querying the resolver when no step is active,
    /// otherwise the freshly resolved position (`Some(None)` if unavailable).
    pub fn on_scroll<R: AnchorResolver + ?Sized>(&mut self, resolver: &R) -> Option<Option<Point>> {
        let index = self.state.step_index()?;
        Some(self.locate(index, resolver))
    }

    /// Jump to step `index` (clamped), re-arming its dwell.
    ///
    /// Only meaningful while a step is active; returns `None` otherwise.
    pub fn jump_to<R: AnchorResolver + ?Sized>(
        &mut self,
        index: usize,
        resolver: &R,
    ) -> Option<Advance<SequencerUpdate>> {
        self.state.step_index()?;
        let index = index.min(self.sequence.len().saturating_sub(1));
        self.tokens.invalidate();
        Some(self.enter(index, resolver))
    }

    /// Stop immediately. Pending dwell wake-ups become stale.
    pub fn cancel(&mut self) {
        self.tokens.invalidate();
        self.state = SequencerState::Idle;
        self.pointer.visible = false;
    }

    fn enter<R: AnchorResolver + ?Sized>(
        &mut self,
        index: usize,
        resolver: &R,
    ) -> Advance<SequencerUpdate> {
        self.state = SequencerState::Step(index);
        let position = self.locate(index, resolver);
        let generation = self.tokens.current();
        let dwell = self.sequence.steps[index].dwell;
        tracing::trace!(
            step = index,
            generation = generation.get(),
            located = position.is_some(),
            "step entered"
        );
        Advance::one(
            SequencerUpdate::Entered { index, position },
            Some(Wake::plain(generation, dwell)),
        )
    }

    fn locate<R: AnchorResolver + ?Sized>(&mut self, index: usize, resolver: &R) -> Option<Point> {
        let step = &self.sequence.steps[index];
        match self.locator.locate(resolver, &step.anchor, &self.container) {
            Some(p) => {
                self.pointer = Pointer {
                    visible: true,
                    position: p,
                };
                Some(p)
            }
            None => {
                self.pointer.visible = false;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::anchor::AnchorRegistry;
    use stagehand_core::geometry::Rect;
    use std::cell::Cell;

    const MAIN: AnchorId = AnchorId::from_static("main");
    const A: AnchorId = AnchorId::from_static("a");
    const B: AnchorId = AnchorId::from_static("b");

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn sequence() -> Sequence {
        Sequence::new()
            .step(A, ms(2000), "Abuse status")
            .step(B, ms(1500), "Flagged account")
    }

    fn registry() -> AnchorRegistry {
        let mut reg = AnchorRegistry::new(MAIN, Point::new(0.0, 0.0));
        reg.mount(A, Rect::new(100.0, 100.0, 24.0, 24.0));
        reg.mount(B, Rect::new(100.0, 300.0, 24.0, 24.0));
        reg
    }

    struct CountingResolver<'a> {
        inner: &'a AnchorRegistry,
        calls: Cell<usize>,
    }

    impl AnchorResolver for CountingResolver<'_> {
        fn resolve(&self, anchor: &AnchorId) -> Option<Rect> {
            self.calls.set(self.calls.get() + 1);
            self.inner.resolve(anchor)
        }
    }

    #[test]
    fn steps_get_sequential_indices() {
        let seq = sequence();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.steps()[1].index, 1);
        assert_eq!(seq.total_dwell(), ms(3500));
    }

    #[test]
    fn state_at_boundaries() {
        let seq = sequence();
        assert_eq!(seq.state_at(ms(0)), SequencerState::Step(0));
        assert_eq!(seq.state_at(ms(1999)), SequencerState::Step(0));
        assert_eq!(seq.state_at(ms(2000)), SequencerState::Step(1));
        assert_eq!(seq.state_at(ms(3500)), SequencerState::Done);
        assert_eq!(Sequence::new().state_at(ms(0)), SequencerState::Done);
    }

    #[test]
    fn activate_enters_first_step_and_shows_pointer() {
        let reg = registry();
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        let adv = seq.activate(&reg);
        assert_eq!(seq.state(), SequencerState::Step(0));
        assert!(seq.pointer().visible);
        assert_eq!(seq.pointer().position, Point::new(100.0, 100.0));
        assert_eq!(adv.wakes.len(), 1);
        assert_eq!(adv.wakes[0].after, ms(2000));
        assert_eq!(
            seq.current_step().map(|s| s.label.as_ref()),
            Some("Abuse status")
        );
    }

    #[test]
    fn dwell_advances_then_done() {
        let reg = registry();
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        let g = seq.activate(&reg).wakes[0].generation;

        let adv = seq.on_dwell_elapsed(g, &reg).expect("current");
        assert_eq!(seq.state(), SequencerState::Step(1));
        assert_eq!(adv.wakes[0].after, ms(1500));

        let adv = seq.on_dwell_elapsed(g, &reg).expect("current");
        assert_eq!(adv.updates, vec![SequencerUpdate::Done]);
        assert_eq!(seq.state(), SequencerState::Done);
        assert!(!seq.pointer().visible);

        // Nothing left to advance.
        assert!(seq.on_dwell_elapsed(g, &reg).is_none());
    }

    #[test]
    fn cancelled_dwell_is_dropped() {
        let reg = registry();
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        let g = seq.activate(&reg).wakes[0].generation;
        seq.cancel();
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(seq.on_dwell_elapsed(g, &reg).is_none());
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn reactivation_invalidates_old_run() {
        let reg = registry();
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        let old = seq.activate(&reg).wakes[0].generation;
        let new = seq.activate(&reg).wakes[0].generation;
        assert_ne!(old, new);
        assert!(seq.on_dwell_elapsed(old, &reg).is_none());
        assert!(seq.on_dwell_elapsed(new, &reg).is_some());
    }

    #[test]
    fn unavailable_anchor_hides_pointer_but_keeps_dwell() {
        let mut reg = registry();
        reg.unmount(&B);
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        let g = seq.activate(&reg).wakes[0].generation;
        let before = seq.pointer().position;

        let adv = seq.on_dwell_elapsed(g, &reg).expect("current");
        assert_eq!(
            adv.updates,
            vec![SequencerUpdate::Entered {
                index: 1,
                position: None
            }]
        );
        assert!(!seq.pointer().visible);
        assert_eq!(seq.pointer().position, before);
        assert_eq!(adv.wakes[0].after, ms(1500));
    }

    #[test]
    fn scroll_requeries_only_while_active() {
        let mut reg = registry();
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        {
            let counting = CountingResolver {
                inner: &reg,
                calls: Cell::new(0),
            };
            assert_eq!(seq.on_scroll(&counting), None);
            assert_eq!(counting.calls.get(), 0);
        }

        seq.activate(&reg);
        reg.scroll_container_by(40.0);
        assert_eq!(seq.on_scroll(&reg), Some(Some(Point::new(100.0, 60.0))));
        assert_eq!(seq.pointer().position, Point::new(100.0, 60.0));

        seq.cancel();
        let counting = CountingResolver {
            inner: &reg,
            calls: Cell::new(0),
        };
        assert_eq!(seq.on_scroll(&counting), None);
        assert_eq!(counting.calls.get(), 0);
    }

    #[test]
    fn scroll_recovers_unavailable_anchor() {
        let mut reg = registry();
        reg.unmount(&A);
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        seq.activate(&reg);
        assert!(!seq.pointer().visible);

        reg.mount(A, Rect::new(10.0, 10.0, 24.0, 24.0));
        assert_eq!(seq.on_scroll(&reg), Some(Some(Point::new(10.0, 10.0))));
        assert!(seq.pointer().visible);
    }

    #[test]
    fn jump_to_rearms_and_invalidates() {
        let reg = registry();
        let mut seq = Sequencer::new(sequence(), MAIN, AnchorLocator::default());
        let old = seq.activate(&reg).wakes[0].generation;
        let adv = seq.jump_to(9, &reg).expect("active");
        assert_eq!(seq.state(), SequencerState::Step(1));
        assert_eq!(adv.wakes[0].after, ms(1500));
        assert!(seq.on_dwell_elapsed(old, &reg).is_none());

        seq.cancel();
        assert!(seq.jump_to(0, &reg).is_none());
    }

    #[test]
    fn empty_sequence_is_done_immediately() {
        let reg = registry();
        let mut seq = Sequencer::new(Sequence::new(), MAIN, AnchorLocator::default());
        let adv = seq.activate(&reg);
        assert_eq!(adv.updates, vec![SequencerUpdate::Done]);
        assert!(adv.wakes.is_empty());
        assert_eq!(seq.state(), SequencerState::Done);
    }
}
