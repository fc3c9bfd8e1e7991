#![forbid(unsafe_code)]

//! Bounded replay of a [`Sequencer`].
//!
//! A [`CycleController`] restarts its sequencer after every `Done`, waiting
//! an inter-cycle pause in between, until `max_cycles` traversals have
//! completed. It then freezes (`active == false`, pointer hidden) until
//! [`reset`](CycleController::reset).

use std::time::Duration;

use stagehand_core::anchor::AnchorResolver;
use stagehand_core::geometry::Point;
use stagehand_core::timer::{Generation, GenerationCounter, Wake};

use crate::advance::Advance;
use crate::sequencer::{Pointer, Sequencer, SequencerState, SequencerUpdate};

/// Observable cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleState {
    /// 1-based index of the active step, 0 when no step is active.
    pub current_step_index: usize,
    pub completed_cycles: u32,
    pub max_cycles: u32,
    pub active: bool,
}

/// Which controller timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleWake {
    Dwell,
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleUpdate {
    StepEntered {
        index: usize,
        position: Option<Point>,
    },
    /// A traversal finished and another one is scheduled.
    CycleCompleted { completed: u32 },
    /// The next traversal began.
    Restarted { cycle: u32 },
    /// The last allowed traversal finished.
    BudgetExhausted { completed: u32 },
}

#[derive(Debug, Clone)]
pub struct CycleController {
    sequencer: Sequencer,
    completed_cycles: u32,
    max_cycles: u32,
    active: bool,
    inter_cycle_pause: Duration,
    tokens: GenerationCounter,
}

impl CycleController {
    /// Wrap `sequencer`. A zero budget is treated as one cycle.
    #[must_use]
    pub fn new(sequencer: Sequencer, max_cycles: u32, inter_cycle_pause: Duration) -> Self {
        Self {
            sequencer,
            completed_cycles: 0,
            max_cycles: max_cycles.max(1),
            active: true,
            inter_cycle_pause,
            tokens: GenerationCounter::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        CycleState {
            current_step_index: self.sequencer.state().step_index().map_or(0, |i| i + 1),
            completed_cycles: self.completed_cycles,
            max_cycles: self.max_cycles,
            active: self.active,
        }
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn pointer(&self) -> Pointer {
        self.sequencer.pointer()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start a traversal. Does nothing once the budget is spent.
    pub fn start<R: AnchorResolver + ?Sized>(
        &mut self,
        resolver: &R,
    ) -> Advance<CycleUpdate, CycleWake> {
        if !self.active {
            return Advance::none();
        }
        let adv = self.sequencer.activate(resolver);
        self.absorb(adv)
    }

    /// Deliver a fired controller timer. `None` means it was stale.
    pub fn fire<R: AnchorResolver + ?Sized>(
        &mut self,
        kind: CycleWake,
        generation: Generation,
        resolver: &R,
    ) -> Option<Advance<CycleUpdate, CycleWake>> {
        match kind {
            CycleWake::Dwell => {
                let adv = self.sequencer.on_dwell_elapsed(generation, resolver)?;
                Some(self.absorb(adv))
            }
            CycleWake::Restart => {
                if !self.active || !self.tokens.is_current(generation) {
                    return None;
                }
                let cycle = self.completed_cycles + 1;
                tracing::debug!(cycle, generation = generation.get(), "cycle restarted");
                let mut adv = Advance::one(CycleUpdate::Restarted { cycle }, None);
                adv.extend(self.start(resolver));
                Some(adv)
            }
        }
    }

    /// Jump the active traversal to step `index`. See [`Sequencer::jump_to`].
    pub fn jump_to<R: AnchorResolver + ?Sized>(
        &mut self,
        index: usize,
        resolver: &R,
    ) -> Option<Advance<CycleUpdate, CycleWake>> {
        let adv = self.sequencer.jump_to(index, resolver)?;
        Some(self.absorb(adv))
    }

    /// Forward a scroll to the sequencer. See [`Sequencer::on_scroll`].
    pub fn on_scroll<R: AnchorResolver + ?Sized>(&mut self, resolver: &R) -> Option<Option<Point>> {
        self.sequencer.on_scroll(resolver)
    }

    /// Stop the current traversal and any pending restart.
    pub fn cancel(&mut self) {
        self.tokens.invalidate();
        self.sequencer.cancel();
    }

    /// Cancel, then clear the cycle count and re-arm.
    pub fn reset(&mut self) {
        self.cancel();
        self.completed_cycles = 0;
        self.active = true;
    }

    fn absorb(&mut self, adv: Advance<SequencerUpdate>) -> Advance<CycleUpdate, CycleWake> {
        let mut out = Advance::none();
        for wake in adv.wakes {
            out.schedule(wake.map(|()| CycleWake::Dwell));
        }
        for update in adv.updates {
            match update {
                SequencerUpdate::Entered { index, position } => {
                    out.push(CycleUpdate::StepEntered { index, position });
                }
                SequencerUpdate::Done => out.extend(self.on_sequence_done()),
            }
        }
        out
    }

    fn on_sequence_done(&mut self) -> Advance<CycleUpdate, CycleWake> {
        self.completed_cycles = (self.completed_cycles + 1).min(self.max_cycles);
        let completed = self.completed_cycles;
        if completed < self.max_cycles {
            let restart = Wake::new(
                self.tokens.current(),
                self.inter_cycle_pause,
                CycleWake::Restart,
            );
            tracing::debug!(completed, "cycle completed");
            return Advance::one(CycleUpdate::CycleCompleted { completed }, Some(restart));
        }
        self.active = false;
        debug_assert_eq!(self.sequencer.state(), SequencerState::Done);
        tracing::info!(completed, "cycle budget exhausted");
        Advance::one(CycleUpdate::BudgetExhausted { completed }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Sequence;
    use stagehand_core::anchor::{AnchorId, AnchorLocator, AnchorRegistry};
    use stagehand_core::geometry::Rect;

    const MAIN: AnchorId = AnchorId::from_static("main");
    const A: AnchorId = AnchorId::from_static("a");

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn registry() -> AnchorRegistry {
        let mut reg = AnchorRegistry::new(MAIN, Point::new(0.0, 0.0));
        reg.mount(A, Rect::new(0.0, 0.0, 24.0, 24.0));
        reg
    }

    fn controller(max: u32) -> CycleController {
        let seq = Sequence::new().step(A, ms(100), "a").step(A, ms(200), "again");
        CycleController::new(
            Sequencer::new(seq, MAIN, AnchorLocator::default()),
            max,
            ms(2000),
        )
    }

    /// Drive pending wakes in delivery order until none remain.
    fn run_to_rest(
        ctl: &mut CycleController,
        reg: &AnchorRegistry,
        mut pending: Vec<Wake<CycleWake>>,
    ) -> Vec<CycleUpdate> {
        let mut seen = Vec::new();
        while let Some(wake) = pending.pop() {
            if let Some(adv) = ctl.fire(wake.kind, wake.generation, reg) {
                seen.extend(adv.updates);
                pending.extend(adv.wakes);
            }
        }
        seen
    }

    #[test]
    fn state_reports_one_based_step() {
        let reg = registry();
        let mut ctl = controller(3);
        assert_eq!(ctl.state().current_step_index, 0);
        ctl.start(&reg);
        assert_eq!(ctl.state().current_step_index, 1);
    }

    #[test]
    fn exhausts_after_max_cycles() {
        let reg = registry();
        let mut ctl = controller(3);
        let start = ctl.start(&reg);
        let updates = run_to_rest(&mut ctl, &reg, start.wakes);

        let completed: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                CycleUpdate::CycleCompleted { completed } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec![1, 2]);
        assert_eq!(
            updates.last(),
            Some(&CycleUpdate::BudgetExhausted { completed: 3 })
        );

        let state = ctl.state();
        assert!(!state.active);
        assert_eq!(state.completed_cycles, 3);
        assert_eq!(state.current_step_index, 0);
        assert!(!ctl.pointer().visible);

        // Frozen until reset.
        assert!(ctl.start(&reg).is_empty());
    }

    #[test]
    fn reset_rearms() {
        let reg = registry();
        let mut ctl = controller(1);
        let start = ctl.start(&reg);
        run_to_rest(&mut ctl, &reg, start.wakes);
        assert!(!ctl.is_active());

        ctl.reset();
        let state = ctl.state();
        assert!(state.active);
        assert_eq!(state.completed_cycles, 0);
        assert!(!ctl.start(&reg).is_empty());
    }

    #[test]
    fn restart_is_scheduled_after_pause() {
        let reg = registry();
        let mut ctl = controller(2);
        let g = ctl.start(&reg).wakes[0].generation;
        ctl.fire(CycleWake::Dwell, g, &reg).expect("step 1");
        let adv = ctl.fire(CycleWake::Dwell, g, &reg).expect("done");
        assert_eq!(
            adv.updates,
            vec![CycleUpdate::CycleCompleted { completed: 1 }]
        );
        assert_eq!(adv.wakes.len(), 1);
        assert_eq!(adv.wakes[0].kind, CycleWake::Restart);
        assert_eq!(adv.wakes[0].after, ms(2000));
    }

    #[test]
    fn cancel_drops_pending_restart() {
        let reg = registry();
        let mut ctl = controller(2);
        let g = ctl.start(&reg).wakes[0].generation;
        ctl.fire(CycleWake::Dwell, g, &reg);
        let restart = ctl.fire(CycleWake::Dwell, g, &reg).expect("done").wakes[0];
        ctl.cancel();
        assert!(ctl.fire(restart.kind, restart.generation, &reg).is_none());
        assert_eq!(ctl.state().current_step_index, 0);
    }

    #[test]
    fn jump_to_enters_requested_step() {
        let reg = registry();
        let mut ctl = controller(3);
        assert!(ctl.jump_to(1, &reg).is_none());
        ctl.start(&reg);
        let adv = ctl.jump_to(1, &reg).expect("active");
        assert!(matches!(adv.updates[0], CycleUpdate::StepEntered { index: 1, .. }));
        assert_eq!(ctl.state().current_step_index, 2);
    }

    #[test]
    fn zero_budget_means_one_cycle() {
        assert_eq!(controller(0).state().max_cycles, 1);
    }
}
