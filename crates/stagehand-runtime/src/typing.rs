#![forbid(unsafe_code)]

//! Simulated keystroke-by-keystroke text entry and the login demo loop.
//!
//! [`TypingSimulator`] reveals one string a character at a time. It is
//! single-use: once started it cannot be restarted in place, a new
//! simulator must be created to retype.
//!
//! [`LoginDemo`] strings typing runs together with a [`Script`]:
//! type an address, settle, show the outcome, hold, type the next one.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use stagehand_core::timer::{Generation, GenerationCounter, Wake};

use crate::advance::Advance;
use crate::config::Timings;
use crate::script::{Script, ScriptRunner};

// ─────────────────────────────────────────────────────────────────────────────
// TypingSimulator
// ─────────────────────────────────────────────────────────────────────────────

/// Lazy, append-only stream of prefixes of one string.
#[derive(Debug, Clone)]
pub struct TypingSimulator {
    text: String,
    interval: Duration,
    /// Byte offset of the end of the visible prefix.
    end: usize,
    started: bool,
    tokens: GenerationCounter,
}

/// A prefix published by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    /// Characters visible so far.
    pub chars: usize,
    /// Whether this prefix is the full string.
    pub complete: bool,
}

impl TypingSimulator {
    /// A simulator for `text`. A zero interval is bumped to one millisecond.
    #[must_use]
    pub fn new(text: impl Into<String>, interval: Duration) -> Self {
        Self {
            text: text.into(),
            interval: interval.max(Duration::from_millis(1)),
            end: 0,
            started: false,
            tokens: GenerationCounter::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The currently visible prefix.
    pub fn prefix(&self) -> &str {
        &self.text[..self.end]
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_complete(&self) -> bool {
        self.started && self.end == self.text.len()
    }

    /// Every prefix with its offset from start, including the empty one.
    pub fn prefixes(&self) -> Prefixes<'_> {
        Prefixes {
            text: &self.text,
            interval: self.interval,
            next: Some(0),
            step: 0,
        }
    }

    /// Publish the empty prefix and request the first keystroke.
    ///
    /// Returns `None` if already started. An empty string completes here.
    pub fn start(&mut self) -> Option<Advance<Keystroke>> {
        if self.started {
            return None;
        }
        self.started = true;
        let complete = self.text.is_empty();
        let next = (!complete).then(|| Wake::plain(self.tokens.current(), self.interval));
        Some(Advance::one(
            Keystroke {
                chars: 0,
                complete,
            },
            next,
        ))
    }

    /// Deliver a keystroke wake-up. `None` if stale or already complete.
    pub fn fire(&mut self, generation: Generation) -> Option<Advance<Keystroke>> {
        if !self.started || !self.tokens.is_current(generation) || self.is_complete() {
            return None;
        }
        let ch = self.text[self.end..].chars().next()?;
        self.end += ch.len_utf8();
        let chars = self.text[..self.end].chars().count();
        let complete = self.end == self.text.len();
        let next = (!complete).then(|| Wake::plain(generation, self.interval));
        Some(Advance::one(Keystroke { chars, complete }, next))
    }

    /// Stop typing. Pending keystrokes become stale.
    pub fn cancel(&mut self) {
        self.tokens.invalidate();
    }
}

/// Iterator over `(offset, prefix)` pairs of a [`TypingSimulator`].
#[derive(Debug, Clone)]
pub struct Prefixes<'a> {
    text: &'a str,
    interval: Duration,
    next: Option<usize>,
    step: u32,
}

impl<'a> Iterator for Prefixes<'a> {
    type Item = (Duration, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.next?;
        let item = (self.interval.saturating_mul(self.step), &self.text[..end]);
        self.next = self.text[end..].chars().next().map(|c| end + c.len_utf8());
        self.step = self.step.saturating_add(1);
        Some(item)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typing state
// ─────────────────────────────────────────────────────────────────────────────

/// How a login attempt ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub const fn title(self) -> &'static str {
        match self {
            Self::Success => "Login Successful",
            Self::Failure => "Access Blocked",
        }
    }

    pub const fn detail(self) -> &'static str {
        match self {
            Self::Success => "Access granted to dashboard",
            Self::Failure => "Log in with a work email",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failure => "failure",
        })
    }
}

/// What the login textbox and result panel show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypingState {
    #[default]
    Idle,
    Typing {
        text: String,
        cursor_visible: bool,
    },
    Result {
        text: String,
        outcome: Outcome,
    },
}

impl TypingState {
    /// Text in the textbox.
    pub fn text(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Typing { text, .. } | Self::Result { text, .. } => text,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Result { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LoginDemo
// ─────────────────────────────────────────────────────────────────────────────

/// One address typed by the demo and how it is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub email: Cow<'static, str>,
    pub outcome: Outcome,
}

impl LoginAttempt {
    pub fn new(email: impl Into<Cow<'static, str>>, outcome: Outcome) -> Self {
        Self {
            email: email.into(),
            outcome,
        }
    }
}

/// Actions the login script can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoAction {
    /// Clear the textbox and start typing.
    Type(Cow<'static, str>),
    /// Typing has settled.
    FinishTyping,
    /// Show the outcome panel.
    Show(Outcome),
}

/// Which demo timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoWake {
    Cue,
    Keystroke,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoUpdate {
    TypingStarted { text: Cow<'static, str> },
    PrefixTyped { prefix: String, complete: bool },
    TypingFinished,
    OutcomeShown(Outcome),
}

/// Looping login demo: type, settle, outcome, hold, next attempt.
#[derive(Debug, Clone)]
pub struct LoginDemo {
    runner: ScriptRunner<DemoAction>,
    typing: Option<TypingSimulator>,
    type_interval: Duration,
    state: TypingState,
}

impl LoginDemo {
    /// Build the looping script for `attempts`.
    ///
    /// Per attempt: type (starting right after the previous hold), settle
    /// for `typing_settle`, show the outcome after `outcome_delay`, then
    /// hold it for `outcome_hold` before the next attempt.
    pub fn script(timings: &Timings, attempts: &[LoginAttempt]) -> Script<DemoAction> {
        let mut script = Script::new();
        for (i, attempt) in attempts.iter().enumerate() {
            let lead = if i == 0 {
                Duration::ZERO
            } else {
                timings.outcome_hold
            };
            script = script
                .then(lead, DemoAction::Type(attempt.email.clone()))
                .then(timings.typing_settle, DemoAction::FinishTyping)
                .then(timings.outcome_delay, DemoAction::Show(attempt.outcome));
        }
        script.repeat_after(timings.outcome_hold)
    }

    #[must_use]
    pub fn new(script: Script<DemoAction>, type_interval: Duration) -> Self {
        Self {
            runner: ScriptRunner::new(script),
            typing: None,
            type_interval,
            state: TypingState::Idle,
        }
    }

    pub fn state(&self) -> &TypingState {
        &self.state
    }

    /// Begin the script from its first cue.
    pub fn start(&mut self) -> Option<Wake<DemoWake>> {
        self.reset_typing();
        self.runner.start().map(|w| w.map(|()| DemoWake::Cue))
    }

    /// Deliver a fired demo timer. `None` means it was stale.
    pub fn fire(
        &mut self,
        kind: DemoWake,
        generation: Generation,
    ) -> Option<Advance<DemoUpdate, DemoWake>> {
        match kind {
            DemoWake::Cue => {
                let action = self.runner.fire(generation)?;
                Some(self.apply(action))
            }
            DemoWake::Keystroke => {
                let adv = self.typing.as_mut()?.fire(generation)?;
                Some(self.absorb_keystrokes(adv))
            }
        }
    }

    /// Stop everything: script, typing, and return to idle.
    pub fn cancel(&mut self) {
        self.runner.cancel();
        self.reset_typing();
    }

    fn reset_typing(&mut self) {
        if let Some(sim) = self.typing.as_mut() {
            sim.cancel();
        }
        self.typing = None;
        self.state = TypingState::Idle;
    }

    fn apply(&mut self, action: DemoAction) -> Advance<DemoUpdate, DemoWake> {
        match action {
            DemoAction::Type(text) => {
                self.reset_typing();
                let mut sim = TypingSimulator::new(text.as_ref(), self.type_interval);
                let started = sim.start();
                self.typing = Some(sim);
                self.state = TypingState::Typing {
                    text: String::new(),
                    cursor_visible: true,
                };
                tracing::debug!(email = %text, "typing started");
                let mut adv = Advance::one(DemoUpdate::TypingStarted { text }, None);
                if let Some(keys) = started {
                    adv.extend(self.absorb_keystrokes(keys));
                }
                adv
            }
            DemoAction::FinishTyping => {
                if let TypingState::Typing { cursor_visible, .. } = &mut self.state {
                    *cursor_visible = false;
                }
                Advance::one(DemoUpdate::TypingFinished, self.next_cue())
            }
            DemoAction::Show(outcome) => {
                let text = self.state.text().to_string();
                self.state = TypingState::Result { text, outcome };
                tracing::debug!(%outcome, "outcome shown");
                Advance::one(DemoUpdate::OutcomeShown(outcome), self.next_cue())
            }
        }
    }

    fn absorb_keystrokes(&mut self, adv: Advance<Keystroke>) -> Advance<DemoUpdate, DemoWake> {
        let prefix = self
            .typing
            .as_ref()
            .map(|sim| sim.prefix().to_string())
            .unwrap_or_default();
        let complete = adv.updates.iter().any(|k| k.complete);
        if let TypingState::Typing { text, .. } = &mut self.state {
            text.clone_from(&prefix);
        }
        let mut out = Advance::none();
        // The empty prefix is implied by `TypingStarted`.
        if !prefix.is_empty() {
            out.push(DemoUpdate::PrefixTyped {
                prefix,
                complete,
            });
        }
        for wake in adv.wakes {
            out.schedule(wake.map(|()| DemoWake::Keystroke));
        }
        if complete && let Some(wake) = self.next_cue() {
            out.schedule(wake);
        }
        out
    }

    fn next_cue(&mut self) -> Option<Wake<DemoWake>> {
        self.runner.resume().map(|w| w.map(|()| DemoWake::Cue))
    }
}
