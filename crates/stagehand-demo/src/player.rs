#![forbid(unsafe_code)]

//! Drives an [`Orchestrator`] from a clock and prints what it publishes.
//!
//! In virtual mode the player jumps straight from one deadline to the next,
//! so a 25 s session finishes instantly with the exact same trace a wall
//! clock would produce. In realtime mode it sleeps until each deadline.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use stagehand_core::anchor::AnchorRegistry;
use stagehand_core::clock::{Clock, DeterministicClock, MonotonicClock};
use stagehand_runtime::{Orchestrator, Snapshot, Variant};

/// A host action scheduled at a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Select(Variant),
    ContinueToUnlock,
}

/// Time source for the player.
#[derive(Debug)]
pub enum PlayerClock {
    Virtual(DeterministicClock),
    Realtime(MonotonicClock),
}

impl PlayerClock {
    fn now(&self) -> Duration {
        match self {
            Self::Virtual(c) => c.now_mono(),
            Self::Realtime(c) => c.now_mono(),
        }
    }

    /// Block (or jump) until `t`.
    fn wait_until(&mut self, t: Duration) {
        match self {
            Self::Virtual(c) => c.set(t),
            Self::Realtime(c) => {
                let now = c.now_mono();
                if t > now {
                    thread::sleep(t - now);
                }
            }
        }
    }
}

pub struct Player {
    engine: Orchestrator,
    layout: AnchorRegistry,
    clock: PlayerClock,
    cues: Vec<(Duration, Cue)>,
}

impl Player {
    pub fn new(engine: Orchestrator, layout: AnchorRegistry, clock: PlayerClock) -> Self {
        Self {
            engine,
            layout,
            clock,
            cues: Vec::new(),
        }
    }

    /// Schedule `cue` at `at`. Cues at the same time run in insertion order.
    pub fn cue(&mut self, at: Duration, cue: Cue) {
        let pos = self.cues.partition_point(|(t, _)| *t <= at);
        self.cues.insert(pos, (at, cue));
    }

    pub fn engine(&self) -> &Orchestrator {
        &self.engine
    }

    /// Play until `end`, writing one line per engine event, then tear down.
    pub fn play(&mut self, end: Duration, out: &mut impl Write) -> io::Result<Snapshot> {
        let started = self.clock.now();
        tracing::info!(end_ms = end.as_millis() as u64, "playback started");
        loop {
            self.run_due_cues(out)?;
            let next = [
                self.engine.next_deadline(),
                self.cues.first().map(|(t, _)| *t),
                Some(end),
            ]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(end);
            self.clock.wait_until(started + next);
            self.engine.advance_to(next, &self.layout);
            self.flush_events(out)?;
            if next >= end {
                break;
            }
        }
        let snapshot = self.engine.snapshot();
        self.engine.teardown();
        self.flush_events(out)?;
        Ok(snapshot)
    }

    fn run_due_cues(&mut self, out: &mut impl Write) -> io::Result<()> {
        let now = self.engine.now();
        let due = self.cues.partition_point(|(t, _)| *t <= now);
        for (_, cue) in self.cues.drain(..due).collect::<Vec<_>>() {
            tracing::debug!(?cue, at_ms = now.as_millis() as u64, "cue");
            match cue {
                Cue::Select(variant) => self.engine.select(variant),
                Cue::ContinueToUnlock => self.engine.continue_to_unlock(),
            }
        }
        self.flush_events(out)
    }

    fn flush_events(&mut self, out: &mut impl Write) -> io::Result<()> {
        for event in self.engine.drain_events() {
            writeln!(out, "{event}")?;
        }
        Ok(())
    }
}
