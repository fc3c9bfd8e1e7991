#![forbid(unsafe_code)]

//! Timed-transition scripts.
//!
//! A [`Script`] is an ordered list of [`Cue`]s, each a delay followed by an
//! action. A [`ScriptRunner`] interprets it one cue at a time: it hands out
//! the wake-up for the next cue, and when that wake-up is delivered it
//! yields the cue's action. The owner decides when to continue with
//! [`ScriptRunner::resume`], so an action may suspend the script (for
//! example while text is being typed) without nesting callbacks.
//!
//! Looping scripts wrap around to the first cue after `loop_delay`.
//!
//! # Invariants
//!
//! 1. At most one cue wake-up is outstanding per runner.
//! 2. Cancelling invalidates that wake-up; delivering it later yields nothing.

use std::time::Duration;

use stagehand_core::timer::{Generation, GenerationCounter, Wake};

/// One delayed action.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue<A> {
    pub delay: Duration,
    pub action: A,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script<A> {
    cues: Vec<Cue<A>>,
    loop_delay: Option<Duration>,
}

impl<A> Default for Script<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Script<A> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cues: Vec::new(),
            loop_delay: None,
        }
    }

    /// Append `action`, to run `delay` after the previous cue.
    #[must_use]
    pub fn then(mut self, delay: Duration, action: A) -> Self {
        self.cues.push(Cue { delay, action });
        self
    }

    /// Wrap around to the first cue, `delay` after the last one.
    #[must_use]
    pub fn repeat_after(mut self, delay: Duration) -> Self {
        self.loop_delay = Some(delay);
        self
    }

    pub fn cues(&self) -> &[Cue<A>] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn is_looping(&self) -> bool {
        self.loop_delay.is_some()
    }

    /// Sum of all cue delays in one pass (excluding the loop delay).
    pub fn pass_delay(&self) -> Duration {
        self.cues
            .iter()
            .fold(Duration::ZERO, |acc, c| acc.saturating_add(c.delay))
    }
}

/// Interprets a [`Script`].
#[derive(Debug, Clone)]
pub struct ScriptRunner<A> {
    script: Script<A>,
    /// Index of the next cue to fire.
    cursor: usize,
    passes: u32,
    running: bool,
    tokens: GenerationCounter,
}

impl<A: Clone> ScriptRunner<A> {
    #[must_use]
    pub fn new(script: Script<A>) -> Self {
        Self {
            script,
            cursor: 0,
            passes: 0,
            running: false,
            tokens: GenerationCounter::new(),
        }
    }

    pub fn script(&self) -> &Script<A> {
        &self.script
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Completed passes over a looping script.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Start from the first cue. Returns `None` for an empty script.
    pub fn start(&mut self) -> Option<Wake> {
        self.tokens.invalidate();
        self.cursor = 0;
        self.passes = 0;
        self.running = !self.script.is_empty();
        let first = self.script.cues.first()?;
        Some(Wake::plain(self.tokens.current(), first.delay))
    }

    /// Deliver a cue wake-up and take its action.
    ///
    /// Returns `None` for stale wake-ups. The runner does not schedule the
    /// following cue by itself; call [`resume`](Self::resume).
    pub fn fire(&mut self, generation: Generation) -> Option<A> {
        if !self.running || !self.tokens.is_current(generation) {
            return None;
        }
        let cue = self.script.cues.get(self.cursor)?;
        let action = cue.action.clone();
        self.cursor += 1;
        // Each cue's wake-up is single-use.
        self.tokens.invalidate();
        Some(action)
    }

    /// Request the wake-up for the next cue.
    ///
    /// At the end of a one-shot script the runner stops and returns `None`.
    pub fn resume(&mut self) -> Option<Wake> {
        if !self.running {
            return None;
        }
        let generation = self.tokens.current();
        if let Some(cue) = self.script.cues.get(self.cursor) {
            return Some(Wake::plain(generation, cue.delay));
        }
        let Some(loop_delay) = self.script.loop_delay else {
            self.running = false;
            return None;
        };
        self.cursor = 0;
        self.passes += 1;
        let first = self.script.cues.first()?;
        Some(Wake::plain(generation, loop_delay.saturating_add(first.delay)))
    }

    /// Stop. The outstanding wake-up becomes stale.
    pub fn cancel(&mut self) {
        self.tokens.invalidate();
        self.running = false;
    }
}
