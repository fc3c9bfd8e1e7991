#![forbid(unsafe_code)]

//! Observable engine events.
//!
//! Every state change the orchestrator makes is appended to an event log
//! that the host drains with `Orchestrator::drain_events`. Hosts that only
//! render from the snapshot can ignore it; tests and the demo use it as a
//! timeline.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use stagehand_core::geometry::Point;

use crate::orchestrator::Variant;
use crate::typing::Outcome;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The host selected a walkthrough variant.
    VariantSelected { variant: Variant },
    /// The previous run was cancelled. `dropped` counts purged timers.
    RunCancelled { variant: Variant, dropped: usize },
    /// A run's start delay elapsed.
    RunStarted { variant: Variant },

    StepEntered {
        index: usize,
        label: Cow<'static, str>,
    },
    PointerMoved { position: Point },
    PointerHidden,
    CycleCompleted { completed: u32 },
    CycleRestarted { cycle: u32 },
    CycleBudgetExhausted { completed: u32 },

    TypingStarted { text: Cow<'static, str> },
    PrefixTyped { prefix: String },
    TypingFinished,
    OutcomeShown { outcome: Outcome },

    RevealStarted { instant: bool },
    EventRevealed { index: usize },
    FeaturesShown,
    VerificationShown,
    FeatureUnlocked { index: usize, id: Cow<'static, str> },
    FeaturesReady,
    /// Every feature is unlocked. Published once per session.
    AllFeaturesUnlocked,

    TornDown,
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VariantSelected { variant } => write!(f, "variant {variant} selected"),
            Self::RunCancelled { variant, dropped } => {
                write!(f, "{variant} run cancelled ({dropped} timers dropped)")
            }
            Self::RunStarted { variant } => write!(f, "{variant} run started"),
            Self::StepEntered { index, label } => write!(f, "step {index}: {label}"),
            Self::PointerMoved { position } => {
                write!(f, "pointer at ({:.0}, {:.0})", position.x, position.y)
            }
            Self::PointerHidden => f.write_str("pointer hidden"),
            Self::CycleCompleted { completed } => write!(f, "cycle {completed} completed"),
            Self::CycleRestarted { cycle } => write!(f, "cycle {cycle} started"),
            Self::CycleBudgetExhausted { completed } => {
                write!(f, "cycle budget exhausted after {completed}")
            }
            Self::TypingStarted { text } => write!(f, "typing {text:?}"),
            Self::PrefixTyped { prefix } => write!(f, "typed {prefix:?}"),
            Self::TypingFinished => f.write_str("typing finished"),
            Self::OutcomeShown { outcome } => {
                write!(f, "{}: {}", outcome.title(), outcome.detail())
            }
            Self::RevealStarted { instant } => {
                let mode = if *instant { "instant" } else { "progressive" };
                write!(f, "reveal started ({mode})")
            }
            Self::EventRevealed { index } => write!(f, "event {index} revealed"),
            Self::FeaturesShown => f.write_str("features shown"),
            Self::VerificationShown => f.write_str("verification shown"),
            Self::FeatureUnlocked { index, id } => write!(f, "feature {index} ({id}) unlocked"),
            Self::FeaturesReady => f.write_str("features ready"),
            Self::AllFeaturesUnlocked => f.write_str("all features unlocked"),
            Self::TornDown => f.write_str("torn down"),
        }
    }
}

/// An [`EngineEvent`] stamped with the engine time it happened at.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: EngineEvent,
}

impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>7}ms  {}", self.at.as_millis(), self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let ev = EngineEvent::OutcomeShown {
            outcome: Outcome::Success,
        };
        assert_eq!(
            ev.to_string(),
            "Login Successful: Access granted to dashboard"
        );
        let ev = EngineEvent::CycleBudgetExhausted { completed: 3 };
        assert_eq!(ev.to_string(), "cycle budget exhausted after 3");
    }

    #[test]
    fn timed_event_pads_time() {
        let ev = TimedEvent {
            at: Duration::from_millis(2400),
            event: EngineEvent::TypingFinished,
        };
        assert_eq!(ev.to_string(), "   2400ms  typing finished");
    }
}
