#![forbid(unsafe_code)]

//! Composition root of a walkthrough session.
//!
//! The [`Orchestrator`] owns every state machine, the timer queue, and the
//! single active-run slot. The host feeds it three kinds of input:
//!
//! - a selected [`Variant`] (tab switch),
//! - time, via [`advance_to`](Orchestrator::advance_to),
//! - scroll notifications, via [`on_scroll`](Orchestrator::on_scroll),
//!
//! and renders from [`snapshot`](Orchestrator::snapshot).
//!
//! # Cancellation
//!
//! Runs are guarded twice. Every run message carries the run generation
//! captured when the run was selected, and the queue entry carries the
//! generation of the machine that requested it. Switching variants
//! invalidates the run generation, cancels the machine, and purges the
//! run's timers from the queue, so nothing of the old run can be observed
//! afterwards.
//!
//! # Invariants
//!
//! 1. At most one run (pointer walkthrough or login demo) exists at a time.
//! 2. After [`teardown`](Orchestrator::teardown) no timer fires and every
//!    input is ignored.
//! 3. The feature reveal belongs to the session, not the run: switching
//!    variants does not cancel it.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use stagehand_core::anchor::{AnchorId, AnchorLocator, AnchorResolver};
use stagehand_core::timer::{Fired, Generation, GenerationCounter, TimerQueue};

use crate::advance::Advance;
use crate::config::{ConfigError, EngineConfig, RevealTrigger};
use crate::cycle::{CycleController, CycleState, CycleUpdate, CycleWake};
use crate::event::{EngineEvent, TimedEvent};
use crate::reveal::{Celebration, CelebrationUpdate, CelebrationWake, EventRecord, Feature};
use crate::sequencer::{Pointer, Sequence, Sequencer};
use crate::typing::{DemoUpdate, DemoWake, LoginAttempt, LoginDemo, TypingState};

// ─────────────────────────────────────────────────────────────────────────────
// Variant
// ─────────────────────────────────────────────────────────────────────────────

/// Which walkthrough is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Pointer walkthrough over flagged accounts.
    Detection,
    /// Looping login demo.
    Prevention,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Detection, Variant::Prevention];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::Prevention => "prevention",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detection" | "detect" => Ok(Self::Detection),
            "prevention" | "prevent" => Ok(Self::Prevention),
            _ => Err(ConfigError::InvalidValue {
                key: "variant".into(),
                value: s.to_string(),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session inputs and view model
// ─────────────────────────────────────────────────────────────────────────────

/// Static inputs of one walkthrough session.
#[derive(Debug, Clone)]
pub struct Walkthrough {
    /// Scroll container the anchors live in.
    pub container: AnchorId,
    /// Pointer walkthrough steps.
    pub sequence: Sequence,
    /// Addresses typed by the login demo, in order.
    pub attempts: Vec<LoginAttempt>,
    pub features: Vec<Feature>,
    pub events: Vec<EventRecord>,
    /// Reveal everything instantly.
    pub session_completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub index: usize,
    pub label: Cow<'static, str>,
    pub anchor: AnchorId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealView {
    pub title: &'static str,
    pub visible_events: usize,
    pub features_visible: bool,
    pub verification_visible: bool,
    pub visible_features: usize,
    /// Per-feature unlocked flag, in feature order.
    pub unlocked: Vec<bool>,
    pub all_unlocked: bool,
}

/// Everything the presentation layer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub at: Duration,
    pub variant: Option<Variant>,
    pub pointer: Pointer,
    pub step: Option<StepView>,
    pub cycle: Option<CycleState>,
    pub typing: TypingState,
    pub reveal: Option<RevealView>,
    pub torn_down: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ActiveRun {
    Detection(CycleController),
    Prevention(LoginDemo),
}

impl ActiveRun {
    fn cancel(&mut self) {
        match self {
            Self::Detection(ctl) => ctl.cancel(),
            Self::Prevention(demo) => demo.cancel(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Start { run: Generation },
    Cycle { run: Generation, wake: CycleWake },
    Demo { run: Generation, wake: DemoWake },
    Celebration(CelebrationWake),
}

impl Msg {
    fn is_run(&self) -> bool {
        !matches!(self, Msg::Celebration(_))
    }

    fn is_dwell(&self) -> bool {
        matches!(self, Msg::Cycle { wake: CycleWake::Dwell, .. })
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    config: EngineConfig,
    walkthrough: Walkthrough,
    locator: AnchorLocator,
    variant: Option<Variant>,
    run: Option<ActiveRun>,
    run_tokens: GenerationCounter,
    celebration: Option<Celebration>,
    queue: TimerQueue<Msg>,
    events: Vec<TimedEvent>,
    published_pointer: Pointer,
    torn_down: bool,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: EngineConfig, walkthrough: Walkthrough) -> Self {
        Self {
            locator: AnchorLocator::new(config.hotspot_offset),
            config,
            walkthrough,
            variant: None,
            run: None,
            run_tokens: GenerationCounter::new(),
            celebration: None,
            queue: TimerQueue::new(),
            events: Vec::new(),
            published_pointer: Pointer::default(),
            torn_down: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn walkthrough(&self) -> &Walkthrough {
        &self.walkthrough
    }

    /// Current engine time.
    pub fn now(&self) -> Duration {
        self.queue.now()
    }

    pub fn variant(&self) -> Option<Variant> {
        self.variant
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Deadline of the next pending timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.len()
    }

    /// Take every event published since the last drain.
    pub fn drain_events(&mut self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Inputs ───────────────────────────────────────────────────────────

    /// Switch to `variant`.
    ///
    /// Cancels the current run, resets run state, and schedules the new run
    /// after the variant's start delay. Selecting the active variant again
    /// does nothing.
    pub fn select(&mut self, variant: Variant) {
        if self.torn_down || self.variant == Some(variant) {
            return;
        }
        self.cancel_run();
        self.variant = Some(variant);
        self.emit(EngineEvent::VariantSelected { variant });

        let timings = &self.config.timings;
        let (run, delay) = match variant {
            Variant::Detection => {
                let sequencer = Sequencer::new(
                    self.walkthrough.sequence.clone(),
                    self.walkthrough.container.clone(),
                    self.locator,
                );
                let ctl = CycleController::new(
                    sequencer,
                    self.config.max_cycles,
                    timings.inter_cycle_pause,
                );
                (ActiveRun::Detection(ctl), timings.detection_start_delay)
            }
            Variant::Prevention => {
                let script = LoginDemo::script(timings, &self.walkthrough.attempts);
                let demo = LoginDemo::new(script, timings.type_interval);
                (ActiveRun::Prevention(demo), timings.prevention_start_delay)
            }
        };
        self.run = Some(run);
        let generation = self.run_tokens.current();
        tracing::debug!(
            %variant,
            generation = generation.get(),
            delay_ms = delay.as_millis() as u64,
            "run scheduled"
        );
        self.queue.schedule(delay, generation, Msg::Start { run: generation });
        self.sync_pointer();
    }

    /// Start the feature-unlock reveal. Only the first call has an effect.
    pub fn continue_to_unlock(&mut self) {
        if self.torn_down || self.celebration.is_some() {
            return;
        }
        let mut celebration = Celebration::new(
            self.walkthrough.features.clone(),
            self.walkthrough.events.clone(),
            self.walkthrough.session_completed,
            &self.config.timings,
        );
        self.emit(EngineEvent::RevealStarted {
            instant: self.walkthrough.session_completed,
        });
        let adv = celebration.start();
        self.celebration = Some(celebration);
        self.absorb_celebration(adv);
    }

    /// Jump the pointer walkthrough to step `index`, re-arming its dwell.
    pub fn jump_to_step<R: AnchorResolver + ?Sized>(&mut self, index: usize, resolver: &R) {
        if self.torn_down {
            return;
        }
        let run = self.run_tokens.current();
        let Some(ActiveRun::Detection(ctl)) = self.run.as_mut() else {
            return;
        };
        let Some(adv) = ctl.jump_to(index, resolver) else {
            return;
        };
        let dropped = self.queue.cancel_where(|_, msg| msg.is_dwell());
        tracing::debug!(step = index, dropped, "jumped to step");
        self.absorb_cycle(run, adv);
    }

    /// Move time forward by `dt`.
    pub fn advance<R: AnchorResolver + ?Sized>(&mut self, dt: Duration, resolver: &R) {
        let now = self.queue.now().saturating_add(dt);
        self.advance_to(now, resolver);
    }

    /// Move time forward to `now`, firing every timer due on the way in
    /// deadline order.
    pub fn advance_to<R: AnchorResolver + ?Sized>(&mut self, now: Duration, resolver: &R) {
        if self.torn_down {
            return;
        }
        while let Some(fired) = self.queue.pop_due(now) {
            self.dispatch(fired, resolver);
        }
        self.queue.advance_to(now);
    }

    /// The container or the window scrolled.
    ///
    /// Re-derives the pointer position while a step is active; otherwise
    /// the resolver is not consulted.
    pub fn on_scroll<R: AnchorResolver + ?Sized>(&mut self, resolver: &R) {
        if self.torn_down {
            return;
        }
        if let Some(ActiveRun::Detection(ctl)) = self.run.as_mut()
            && ctl.on_scroll(resolver).is_some()
        {
            self.sync_pointer();
        }
    }

    /// Tear the session down. Cancels everything; no further effects.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.cancel_run();
        if let Some(celebration) = self.celebration.as_mut() {
            celebration.cancel();
        }
        let dropped = self.queue.clear();
        self.torn_down = true;
        tracing::info!(
            dropped,
            at_ms = self.now().as_millis() as u64,
            "session torn down"
        );
        self.emit(EngineEvent::TornDown);
    }

    // ── View model ───────────────────────────────────────────────────────

    /// Pointer overlay state. Hidden unless a walkthrough step shows it.
    pub fn pointer(&self) -> Pointer {
        match &self.run {
            Some(ActiveRun::Detection(ctl)) => ctl.pointer(),
            _ => Pointer {
                visible: false,
                position: self.published_pointer.position,
            },
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let (step, cycle, typing) = match &self.run {
            Some(ActiveRun::Detection(ctl)) => {
                let step = ctl.sequencer().current_step().map(|s| StepView {
                    index: s.index,
                    label: s.label.clone(),
                    anchor: s.anchor.clone(),
                });
                (step, Some(ctl.state()), TypingState::Idle)
            }
            Some(ActiveRun::Prevention(demo)) => (None, None, demo.state().clone()),
            None => (None, None, TypingState::Idle),
        };
        let reveal = self.celebration.as_ref().map(|c| RevealView {
            title: c.title(),
            visible_events: c.visible_events(),
            features_visible: c.features_visible(),
            verification_visible: c.verification_visible(),
            visible_features: c.visible_features(),
            unlocked: c.features().iter().map(|f| f.unlocked).collect(),
            all_unlocked: c.all_unlocked(),
        });
        Snapshot {
            at: self.now(),
            variant: self.variant,
            pointer: self.pointer(),
            step,
            cycle,
            typing,
            reveal,
            torn_down: self.torn_down,
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn emit(&mut self, event: EngineEvent) {
        self.events.push(TimedEvent {
            at: self.queue.now(),
            event,
        });
    }

    fn cancel_run(&mut self) {
        let Some(variant) = self.variant else {
            return;
        };
        self.run_tokens.invalidate();
        if let Some(run) = self.run.as_mut() {
            run.cancel();
        }
        self.run = None;
        let dropped = self.queue.cancel_where(|_, msg| msg.is_run());
        tracing::debug!(%variant, dropped, "run cancelled");
        self.emit(EngineEvent::RunCancelled { variant, dropped });
        self.sync_pointer();
    }

    fn stale(&self, generation: Generation) {
        tracing::trace!(generation = generation.get(), "stale timer dropped");
    }

    fn dispatch<R: AnchorResolver + ?Sized>(&mut self, fired: Fired<Msg>, resolver: &R) {
        let generation = fired.generation;
        match fired.msg {
            Msg::Start { run } | Msg::Cycle { run, .. } | Msg::Demo { run, .. }
                if !self.run_tokens.is_current(run) =>
            {
                self.stale(generation);
            }
            Msg::Start { run } => self.start_run(run, resolver),
            Msg::Cycle { run, wake } => {
                let result = match self.run.as_mut() {
                    Some(ActiveRun::Detection(ctl)) => ctl.fire(wake, generation, resolver),
                    _ => None,
                };
                match result {
                    Some(adv) => self.absorb_cycle(run, adv),
                    None => self.stale(generation),
                }
            }
            Msg::Demo { run, wake } => {
                let result = match self.run.as_mut() {
                    Some(ActiveRun::Prevention(demo)) => demo.fire(wake, generation),
                    _ => None,
                };
                match result {
                    Some(adv) => self.absorb_demo(run, adv),
                    None => self.stale(generation),
                }
            }
            Msg::Celebration(wake) => {
                let result = self
                    .celebration
                    .as_mut()
                    .and_then(|c| c.fire(wake, generation));
                match result {
                    Some(adv) => self.absorb_celebration(adv),
                    None => self.stale(generation),
                }
            }
        }
    }

    fn start_run<R: AnchorResolver + ?Sized>(&mut self, run: Generation, resolver: &R) {
        let Some(variant) = self.variant else {
            return;
        };
        tracing::debug!(%variant, at_ms = self.now().as_millis() as u64, "run started");
        self.emit(EngineEvent::RunStarted { variant });
        match self.run.as_mut() {
            Some(ActiveRun::Detection(ctl)) => {
                let adv = ctl.start(resolver);
                self.absorb_cycle(run, adv);
            }
            Some(ActiveRun::Prevention(demo)) => {
                if let Some(wake) = demo.start() {
                    self.queue.schedule(
                        wake.after,
                        wake.generation,
                        Msg::Demo {
                            run,
                            wake: wake.kind,
                        },
                    );
                }
            }
            None => {}
        }
    }

    fn absorb_cycle(&mut self, run: Generation, adv: Advance<CycleUpdate, CycleWake>) {
        for wake in adv.wakes {
            self.queue.schedule(
                wake.after,
                wake.generation,
                Msg::Cycle {
                    run,
                    wake: wake.kind,
                },
            );
        }
        let mut exhausted = false;
        for update in adv.updates {
            let event = match update {
                CycleUpdate::StepEntered { index, .. } => {
                    let label = self
                        .walkthrough
                        .sequence
                        .get(index)
                        .map(|s| s.label.clone())
                        .unwrap_or_default();
                    tracing::debug!(
                        step = index,
                        at_ms = self.now().as_millis() as u64,
                        "step entered"
                    );
                    EngineEvent::StepEntered { index, label }
                }
                CycleUpdate::CycleCompleted { completed } => {
                    EngineEvent::CycleCompleted { completed }
                }
                CycleUpdate::Restarted { cycle } => EngineEvent::CycleRestarted { cycle },
                CycleUpdate::BudgetExhausted { completed } => {
                    exhausted = true;
                    EngineEvent::CycleBudgetExhausted { completed }
                }
            };
            self.emit(event);
        }
        self.sync_pointer();
        if exhausted && self.config.reveal_trigger == RevealTrigger::OnCycleBudgetExhausted {
            self.continue_to_unlock();
        }
    }

    fn absorb_demo(&mut self, run: Generation, adv: Advance<DemoUpdate, DemoWake>) {
        for wake in adv.wakes {
            self.queue.schedule(
                wake.after,
                wake.generation,
                Msg::Demo {
                    run,
                    wake: wake.kind,
                },
            );
        }
        for update in adv.updates {
            let event = match update {
                DemoUpdate::TypingStarted { text } => EngineEvent::TypingStarted { text },
                DemoUpdate::PrefixTyped { prefix, .. } => EngineEvent::PrefixTyped { prefix },
                DemoUpdate::TypingFinished => EngineEvent::TypingFinished,
                DemoUpdate::OutcomeShown(outcome) => EngineEvent::OutcomeShown { outcome },
            };
            self.emit(event);
        }
    }

    fn absorb_celebration(&mut self, adv: Advance<CelebrationUpdate, CelebrationWake>) {
        for wake in adv.wakes {
            self.queue
                .schedule(wake.after, wake.generation, Msg::Celebration(wake.kind));
        }
        for update in adv.updates {
            let event = match update {
                CelebrationUpdate::EventRevealed { index } => EngineEvent::EventRevealed { index },
                CelebrationUpdate::FeaturesShown => EngineEvent::FeaturesShown,
                CelebrationUpdate::VerificationShown => EngineEvent::VerificationShown,
                CelebrationUpdate::FeatureUnlocked { index, id } => {
                    EngineEvent::FeatureUnlocked { index, id }
                }
                CelebrationUpdate::FeaturesReady => EngineEvent::FeaturesReady,
                CelebrationUpdate::AllFeaturesUnlocked => EngineEvent::AllFeaturesUnlocked,
            };
            self.emit(event);
        }
    }

    /// Publish pointer changes since the last publication.
    fn sync_pointer(&mut self) {
        let pointer = self.pointer();
        if pointer == self.published_pointer {
            return;
        }
        if pointer.visible {
            self.emit(EngineEvent::PointerMoved {
                position: pointer.position,
            });
        } else if self.published_pointer.visible {
            self.emit(EngineEvent::PointerHidden);
        }
        self.published_pointer = pointer;
    }
}
