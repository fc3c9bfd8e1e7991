#![forbid(unsafe_code)]

//! Deterministic walkthrough simulator for testing.
//!
//! `WalkthroughSimulator` runs an [`Orchestrator`] against an in-memory
//! [`AnchorRegistry`] on a virtual clock. Time only moves when the test
//! says so, scrolling is applied to the registry and forwarded to the
//! engine, and every published event is recorded in a trace.
//!
//! # Example
//!
//! ```ignore
//! use stagehand_runtime::simulator::WalkthroughSimulator;
//!
//! let mut sim = WalkthroughSimulator::new(orchestrator, layout);
//! sim.select(Variant::Prevention);
//! sim.run_until(Duration::from_millis(2400));
//! assert_eq!(sim.snapshot().typing.outcome(), Some(Outcome::Success));
//! ```

use std::time::Duration;

use stagehand_core::anchor::AnchorRegistry;
use stagehand_core::clock::{Clock, DeterministicClock};

use crate::event::{EngineEvent, TimedEvent};
use crate::orchestrator::{Orchestrator, Snapshot, Variant};

/// Deterministic simulator for [`Orchestrator`] testing.
#[derive(Debug)]
pub struct WalkthroughSimulator {
    orchestrator: Orchestrator,
    anchors: AnchorRegistry,
    clock: DeterministicClock,
    trace: Vec<TimedEvent>,
    snapshots: Vec<Snapshot>,
}

impl WalkthroughSimulator {
    /// Create a simulator at time zero.
    pub fn new(orchestrator: Orchestrator, anchors: AnchorRegistry) -> Self {
        Self {
            orchestrator,
            anchors,
            clock: DeterministicClock::new(),
            trace: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn select(&mut self, variant: Variant) {
        self.orchestrator.select(variant);
        self.collect();
    }

    pub fn continue_to_unlock(&mut self) {
        self.orchestrator.continue_to_unlock();
        self.collect();
    }

    pub fn jump_to_step(&mut self, index: usize) {
        self.orchestrator.jump_to_step(index, &self.anchors);
        self.collect();
    }

    pub fn teardown(&mut self) {
        self.orchestrator.teardown();
        self.collect();
    }

    /// Advance the virtual clock by `dt`, firing due timers.
    pub fn advance(&mut self, dt: Duration) {
        self.clock.advance(dt);
        self.sync_clock();
    }

    /// Advance the virtual clock to `t` (never backwards).
    pub fn run_until(&mut self, t: Duration) {
        self.clock.set(t);
        self.sync_clock();
    }

    /// Advance in fixed steps of `frame` until `t`, capturing a snapshot
    /// after each step.
    pub fn run_frames(&mut self, frame: Duration, t: Duration) {
        let frame = frame.max(Duration::from_millis(1));
        while self.clock.now_mono() < t {
            let next = self.clock.now_mono().saturating_add(frame).min(t);
            self.run_until(next);
            self.capture();
        }
    }

    /// Scroll the container by `dy` and notify the engine.
    pub fn scroll_container(&mut self, dy: f64) {
        self.anchors.scroll_container_by(dy);
        self.orchestrator.on_scroll(&self.anchors);
        self.collect();
    }

    /// Scroll the window by `dy` and notify the engine.
    pub fn scroll_window(&mut self, dy: f64) {
        self.anchors.scroll_window_by(dy);
        self.orchestrator.on_scroll(&self.anchors);
        self.collect();
    }

    /// Record the current view model.
    pub fn capture(&mut self) -> &Snapshot {
        self.snapshots.push(self.orchestrator.snapshot());
        let last = self.snapshots.len() - 1;
        &self.snapshots[last]
    }

    pub fn snapshot(&self) -> Snapshot {
        self.orchestrator.snapshot()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn now(&self) -> Duration {
        self.clock.now_mono()
    }

    /// Every event published so far, in order.
    pub fn trace(&self) -> &[TimedEvent] {
        &self.trace
    }

    /// Times at which events matching `pred` were published.
    pub fn times_of(&self, pred: impl Fn(&EngineEvent) -> bool) -> Vec<Duration> {
        self.trace
            .iter()
            .filter(|e| pred(&e.event))
            .map(|e| e.at)
            .collect()
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Mutable access to the layout, e.g. to mount or unmount anchors.
    pub fn anchors_mut(&mut self) -> &mut AnchorRegistry {
        &mut self.anchors
    }

    pub fn anchors(&self) -> &AnchorRegistry {
        &self.anchors
    }

    fn sync_clock(&mut self) {
        self.orchestrator
            .advance_to(self.clock.now_mono(), &self.anchors);
        self.collect();
    }

    fn collect(&mut self) {
        self.trace.extend(self.orchestrator.drain_events());
    }
}
