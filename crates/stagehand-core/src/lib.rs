#![forbid(unsafe_code)]

//! Core: viewport geometry, anchor resolution, clocks, and cancellable timers.
//!
//! Nothing in this crate knows what a walkthrough is. It supplies the
//! leaf capabilities the engine in `stagehand-runtime` is built from:
//!
//! - [`anchor`]: resolving opaque anchor handles to viewport rectangles.
//! - [`timer`]: generation tokens and a deterministic timer queue.
//! - [`clock`]: host-driven and wall clocks.
//! - [`stagger`]: delay offsets for cascading reveals.

pub mod anchor;
pub mod clock;
pub mod geometry;
pub mod logging;
pub mod stagger;
pub mod timer;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
