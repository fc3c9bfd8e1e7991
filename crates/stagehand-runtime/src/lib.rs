#![forbid(unsafe_code)]

//! Timed walkthrough engine.
//!
//! The engine narrates a product feature with three scripted animations:
//!
//! - a pointer that visits UI anchors in order ([`sequencer`], bounded by
//!   [`cycle`]),
//! - a keystroke-by-keystroke login demo ([`typing`], driven by [`script`]),
//! - a staged "features unlocked" reveal ([`reveal`]).
//!
//! [`orchestrator::Orchestrator`] composes them, owns the timer queue, and
//! guarantees that switching variants or tearing the view down cancels
//! every pending effect. Nothing here reads a clock or touches a visual
//! tree: the host advances time and answers anchor queries.
//!
//! # Feature Gates
//!
//! - `config-file`: load [`config::EngineConfig`] from JSON.
//! - `tracing`: enable tracing inside `stagehand-core` as well.

pub mod advance;
pub mod config;
pub mod cycle;
pub mod event;
pub mod orchestrator;
pub mod reveal;
pub mod script;
pub mod sequencer;
pub mod simulator;
pub mod typing;

pub use config::{ConfigError, ConfigResult, EngineConfig, RevealTrigger, Timings};
pub use event::{EngineEvent, TimedEvent};
pub use orchestrator::{Orchestrator, Snapshot, Variant, Walkthrough};
pub use simulator::WalkthroughSimulator;
