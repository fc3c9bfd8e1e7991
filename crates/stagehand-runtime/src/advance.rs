#![forbid(unsafe_code)]

//! The result of delivering a timer to a state machine.
//!
//! Every machine in the engine follows the same shape: it is handed a fired
//! wake-up together with the [`Generation`](stagehand_core::timer::Generation)
//! the timer carried, and answers either `None` (the token was stale and
//! nothing happened) or an [`Advance`]: the updates it published and the
//! follow-up wake-ups it wants scheduled.

use stagehand_core::timer::Wake;

/// Updates published by one transition plus the timers it requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance<U, K = ()> {
    pub updates: Vec<U>,
    pub wakes: Vec<Wake<K>>,
}

impl<U, K> Default for Advance<U, K> {
    fn default() -> Self {
        Self::none()
    }
}

impl<U, K> Advance<U, K> {
    /// No updates, no follow-up.
    #[must_use]
    pub fn none() -> Self {
        Self {
            updates: Vec::new(),
            wakes: Vec::new(),
        }
    }

    /// A single update with an optional follow-up wake.
    #[must_use]
    pub fn one(update: U, next: Option<Wake<K>>) -> Self {
        Self {
            updates: vec![update],
            wakes: next.into_iter().collect(),
        }
    }

    pub fn push(&mut self, update: U) {
        self.updates.push(update);
    }

    pub fn schedule(&mut self, wake: Wake<K>) {
        self.wakes.push(wake);
    }

    /// Append everything from `other`.
    pub fn extend(&mut self, other: Self) {
        self.updates.extend(other.updates);
        self.wakes.extend(other.wakes);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.wakes.is_empty()
    }

    /// Convert updates and wake kinds into an enclosing machine's types.
    #[must_use]
    pub fn map<V, J>(
        self,
        mut update: impl FnMut(U) -> V,
        mut kind: impl FnMut(K) -> J,
    ) -> Advance<V, J> {
        Advance {
            updates: self.updates.into_iter().map(&mut update).collect(),
            wakes: self.wakes.into_iter().map(|w| w.map(&mut kind)).collect(),
        }
    }
}
