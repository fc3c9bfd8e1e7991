#![forbid(unsafe_code)]

//! Generation tokens and a deterministic timer queue.
//!
//! Every timed effect in a walkthrough is a timer carrying the
//! [`Generation`] that was current when it was scheduled. Cancelling a run
//! invalidates the generation; a timer that fires afterwards compares its
//! token against the [`GenerationCounter`] and becomes a no-op.
//!
//! [`TimerQueue`] is single-threaded and host-driven: nothing fires until the
//! host asks for due timers with [`TimerQueue::pop_due`]. Cancellation is
//! synchronous, so purging the queue and checking tokens on delivery give two
//! independent guarantees against stale effects.
//!
//! # Invariants
//!
//! 1. Timers fire in deadline order; equal deadlines fire in scheduling order.
//! 2. The queue clock never moves backwards.
//! 3. A generation, once invalidated, is never current again.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use stagehand_core::timer::{GenerationCounter, TimerQueue};
//!
//! let mut tokens = GenerationCounter::new();
//! let mut queue = TimerQueue::new();
//! queue.schedule(Duration::from_millis(100), tokens.current(), "advance");
//!
//! tokens.invalidate();
//! let fired = queue.pop_due(Duration::from_millis(100)).unwrap();
//! assert!(!tokens.is_current(fired.generation));
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Generation tokens
// ---------------------------------------------------------------------------

/// A cancellation token captured by timers at schedule time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value (for logging).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Source of [`Generation`] tokens for one owner.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    /// Create a counter at generation zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// The generation new timers should capture.
    #[must_use]
    pub fn current(&self) -> Generation {
        Generation(self.current)
    }

    /// Whether `generation` is still current.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }

    /// Invalidate every outstanding token and return the new current one.
    pub fn invalidate(&mut self) -> Generation {
        self.current = self.current.wrapping_add(1);
        Generation(self.current)
    }
}

// ---------------------------------------------------------------------------
// Wake requests
// ---------------------------------------------------------------------------

/// A request from a state machine to be woken after a delay.
///
/// State machines never touch the queue directly; they hand back a `Wake`
/// and the owner of the event loop schedules it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wake<K = ()> {
    /// Token the wake-up must present when delivered.
    pub generation: Generation,
    /// Delay from now.
    pub after: Duration,
    /// Which of the owner's timers this is.
    pub kind: K,
}

impl<K> Wake<K> {
    /// Create a wake request.
    #[must_use]
    pub const fn new(generation: Generation, after: Duration, kind: K) -> Self {
        Self {
            generation,
            after,
            kind,
        }
    }

    /// Replace the kind, keeping token and delay.
    #[must_use]
    pub fn map<J>(self, f: impl FnOnce(K) -> J) -> Wake<J> {
        Wake {
            generation: self.generation,
            after: self.after,
            kind: f(self.kind),
        }
    }
}

impl Wake<()> {
    /// A wake request with no kind.
    #[must_use]
    pub const fn plain(generation: Generation, after: Duration) -> Self {
        Self::new(generation, after, ())
    }
}

// ---------------------------------------------------------------------------
// Timer queue
// ---------------------------------------------------------------------------

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A timer delivered by [`TimerQueue::pop_due`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<M> {
    /// Which timer fired.
    pub id: TimerId,
    /// Its deadline (the queue clock at delivery).
    pub at: Duration,
    /// Token captured at schedule time.
    pub generation: Generation,
    /// Payload.
    pub msg: M,
}

struct Entry<M> {
    deadline: Duration,
    seq: u64,
    generation: Generation,
    msg: M,
}

impl<M> PartialEq for Entry<M> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<M> Eq for Entry<M> {}

impl<M> PartialOrd for Entry<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for Entry<M> {
    // Reversed so the max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deterministic, host-driven timer queue.
pub struct TimerQueue<M> {
    now: Duration,
    next_seq: u64,
    heap: BinaryHeap<Entry<M>>,
}

impl<M> fmt::Debug for TimerQueue<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("now", &self.now)
            .field("pending", &self.heap.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

impl<M> Default for TimerQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TimerQueue<M> {
    /// Create an empty queue at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            heap: BinaryHeap::new(),
        }
    }

    /// Current queue time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Schedule `msg` to fire `after` from now, tagged with `generation`.
    pub fn schedule(&mut self, after: Duration, generation: Generation, msg: M) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = self.now.saturating_add(after);
        crate::trace!(
            seq,
            deadline_ms = deadline.as_millis() as u64,
            generation = generation.get(),
            "timer scheduled"
        );
        self.heap.push(Entry {
            deadline,
            seq,
            generation,
            msg,
        });
        TimerId(seq)
    }

    /// Pop the earliest timer whose deadline is at or before `until`.
    ///
    /// The queue clock moves to the popped deadline. Returns `None` once no
    /// timer is due; call [`advance_to`](Self::advance_to) afterwards to move
    /// the clock the rest of the way.
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired<M>> {
        if self.heap.peek()?.deadline > until {
            return None;
        }
        let entry = self.heap.pop()?;
        self.now = self.now.max(entry.deadline);
        Some(Fired {
            id: TimerId(entry.seq),
            at: self.now,
            generation: entry.generation,
            msg: entry.msg,
        })
    }

    /// Move the queue clock forward to `now`. Never moves backwards.
    pub fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Remove every pending timer matching `pred`. Returns how many were removed.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(Generation, &M) -> bool) -> usize {
        let before = self.heap.len();
        self.heap.retain(|e| !pred(e.generation, &e.msg));
        let removed = before - self.heap.len();
        if removed > 0 {
            crate::trace!(removed, "timers cancelled");
        }
        removed
    }

    /// Remove every pending timer. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.heap.len();
        self.heap.clear();
        removed
    }
}
