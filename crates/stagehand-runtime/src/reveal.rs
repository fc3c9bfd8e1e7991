#![forbid(unsafe_code)]

//! Staged disclosure: cascades and the feature-unlock celebration.
//!
//! A [`RevealCascade`] moves a visible-count cursor over `len` items. In
//! progressive mode item `k` appears at `(k + 1) * per_item` and the cascade
//! becomes ready a trailing pause after the last item. In instant mode
//! everything is visible and ready at once.
//!
//! [`Celebration`] composes two cascades into the "features unlocked"
//! panel: detected events scroll in, then the feature section and a
//! verification note appear, while features unlock one by one.
//!
//! # Invariants
//!
//! 1. The visible cursor never decreases within one run.
//! 2. A feature, once unlocked, stays unlocked for the session.
//! 3. `AllFeaturesUnlocked` is published at most once per celebration.

use std::borrow::Cow;
use std::time::Duration;

use stagehand_core::stagger::{StaggerOrigin, stagger_offsets};
use stagehand_core::timer::{Generation, GenerationCounter, Wake};

use crate::advance::Advance;
use crate::config::Timings;

/// Title of the panel while features are still unlocking.
pub const TITLE_UNLOCKING: &str = "Unlocking Features";
/// Title once the session is complete.
pub const TITLE_UNLOCKED: &str = "Features Unlocked!";

// ─────────────────────────────────────────────────────────────────────────────
// RevealCascade
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    Progressive,
    Instant,
}

impl RevealMode {
    /// Instant when the session is already complete.
    pub fn for_session(completed: bool) -> Self {
        if completed {
            Self::Instant
        } else {
            Self::Progressive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealWake {
    Item,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealUpdate {
    Revealed { index: usize },
    Ready,
}

/// Visible-count cursor over an ordered list.
#[derive(Debug, Clone)]
pub struct RevealCascade {
    offsets: Vec<Duration>,
    trailing_pause: Duration,
    visible: usize,
    ready: bool,
    tokens: GenerationCounter,
}

impl RevealCascade {
    #[must_use]
    pub fn new(len: usize, per_item: Duration, trailing_pause: Duration) -> Self {
        Self {
            offsets: stagger_offsets(len, per_item, StaggerOrigin::AfterFirstDelay),
            trailing_pause,
            visible: 0,
            ready: false,
            tokens: GenerationCounter::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn visible(&self) -> usize {
        self.visible
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// When the cascade becomes ready, measured from start.
    pub fn ready_at(&self) -> Duration {
        self.offsets
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
            .saturating_add(self.trailing_pause)
    }

    /// Begin a run.
    ///
    /// Instant mode reveals everything and is ready before returning;
    /// progressive mode schedules the first item (or, with no items, the
    /// ready signal).
    pub fn start(&mut self, mode: RevealMode) -> Advance<RevealUpdate, RevealWake> {
        self.tokens.invalidate();
        self.visible = 0;
        self.ready = false;
        match mode {
            RevealMode::Instant => {
                self.visible = self.len();
                self.ready = true;
                let mut adv = Advance::none();
                for index in 0..self.len() {
                    adv.push(RevealUpdate::Revealed { index });
                }
                adv.push(RevealUpdate::Ready);
                adv
            }
            RevealMode::Progressive => {
                let mut adv = Advance::none();
                adv.schedule(self.next_wake());
                adv
            }
        }
    }

    /// Deliver a cascade wake-up. `None` if stale.
    pub fn fire(
        &mut self,
        kind: RevealWake,
        generation: Generation,
    ) -> Option<Advance<RevealUpdate, RevealWake>> {
        if !self.tokens.is_current(generation) || self.ready {
            return None;
        }
        match kind {
            RevealWake::Item => {
                if self.visible >= self.len() {
                    return None;
                }
                let index = self.visible;
                self.visible += 1;
                Some(Advance::one(RevealUpdate::Revealed { index }, Some(self.next_wake())))
            }
            RevealWake::Ready => {
                if self.visible < self.len() {
                    return None;
                }
                self.ready = true;
                Some(Advance::one(RevealUpdate::Ready, None))
            }
        }
    }

    pub fn cancel(&mut self) {
        self.tokens.invalidate();
    }

    fn next_wake(&self) -> Wake<RevealWake> {
        let generation = self.tokens.current();
        if self.visible < self.len() {
            let prev = match self.visible {
                0 => Duration::ZERO,
                k => self.offsets[k - 1],
            };
            let gap = self.offsets[self.visible].saturating_sub(prev);
            Wake::new(generation, gap, RevealWake::Item)
        } else {
            Wake::new(generation, self.trailing_pause, RevealWake::Ready)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Data
// ─────────────────────────────────────────────────────────────────────────────

/// A product feature that the walkthrough unlocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub id: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub icon: Cow<'static, str>,
    pub unlocked: bool,
    pub url: Option<Cow<'static, str>>,
}

impl Feature {
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
        icon: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
            unlocked: false,
            url: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<Cow<'static, str>>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn unlocked(mut self, unlocked: bool) -> Self {
        self.unlocked = unlocked;
        self
    }
}

/// A detected event listed above the features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: Cow<'static, str>,
    pub name: Cow<'static, str>,
    pub kind: Cow<'static, str>,
    pub timestamp: Cow<'static, str>,
    pub source: Option<Cow<'static, str>>,
    pub path: Option<Cow<'static, str>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Celebration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelebrationWake {
    Event(RevealWake),
    Unlock(RevealWake),
    Verification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CelebrationUpdate {
    EventRevealed { index: usize },
    FeaturesShown,
    VerificationShown,
    FeatureUnlocked { index: usize, id: Cow<'static, str> },
    FeaturesReady,
    AllFeaturesUnlocked,
}

/// The "features unlocked" panel.
#[derive(Debug, Clone)]
pub struct Celebration {
    features: Vec<Feature>,
    events: Vec<EventRecord>,
    event_cascade: RevealCascade,
    unlock_cascade: RevealCascade,
    verification_delay: Duration,
    completed: bool,
    started: bool,
    features_visible: bool,
    verification_visible: bool,
    all_unlocked_notified: bool,
    tokens: GenerationCounter,
}

impl Celebration {
    #[must_use]
    pub fn new(
        features: Vec<Feature>,
        events: Vec<EventRecord>,
        completed: bool,
        timings: &Timings,
    ) -> Self {
        Self {
            event_cascade: RevealCascade::new(
                events.len(),
                timings.event_reveal_interval,
                timings.reveal_trailing_pause,
            ),
            unlock_cascade: RevealCascade::new(
                features.len(),
                timings.feature_unlock_interval,
                timings.reveal_trailing_pause,
            ),
            features,
            events,
            verification_delay: timings.verification_delay,
            completed,
            started: false,
            features_visible: false,
            verification_visible: false,
            all_unlocked_notified: false,
            tokens: GenerationCounter::new(),
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn visible_events(&self) -> usize {
        self.event_cascade.visible()
    }

    pub fn visible_features(&self) -> usize {
        self.unlock_cascade.visible()
    }

    pub fn features_visible(&self) -> bool {
        self.features_visible
    }

    pub fn verification_visible(&self) -> bool {
        self.verification_visible
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn all_unlocked(&self) -> bool {
        self.features.iter().all(|f| f.unlocked)
    }

    pub fn title(&self) -> &'static str {
        if self.completed {
            TITLE_UNLOCKED
        } else {
            TITLE_UNLOCKING
        }
    }

    /// Start the panel. A second call does nothing.
    pub fn start(&mut self) -> Advance<CelebrationUpdate, CelebrationWake> {
        if self.started {
            return Advance::none();
        }
        self.started = true;
        let mode = RevealMode::for_session(self.completed);
        tracing::debug!(
            events = self.events.len(),
            features = self.features.len(),
            instant = self.completed,
            "celebration started"
        );

        let mut out = Advance::none();
        if self.events.is_empty() {
            out.extend(self.show_features());
        } else {
            let events = self.event_cascade.start(mode);
            out.extend(self.absorb_events(events));
        }

        if self.completed {
            for feature in &mut self.features {
                feature.unlocked = true;
            }
        }
        let unlocks = self.unlock_cascade.start(mode);
        out.extend(self.absorb_unlocks(unlocks));
        out.extend(self.check_all_unlocked());
        out
    }

    /// Deliver a fired celebration timer. `None` if stale.
    pub fn fire(
        &mut self,
        kind: CelebrationWake,
        generation: Generation,
    ) -> Option<Advance<CelebrationUpdate, CelebrationWake>> {
        match kind {
            CelebrationWake::Event(k) => {
                let adv = self.event_cascade.fire(k, generation)?;
                Some(self.absorb_events(adv))
            }
            CelebrationWake::Unlock(k) => {
                let adv = self.unlock_cascade.fire(k, generation)?;
                let mut out = self.absorb_unlocks(adv);
                out.extend(self.check_all_unlocked());
                Some(out)
            }
            CelebrationWake::Verification => {
                if !self.tokens.is_current(generation) || self.verification_visible {
                    return None;
                }
                self.verification_visible = true;
                Some(Advance::one(CelebrationUpdate::VerificationShown, None))
            }
        }
    }

    /// Stop every pending reveal.
    pub fn cancel(&mut self) {
        self.tokens.invalidate();
        self.event_cascade.cancel();
        self.unlock_cascade.cancel();
    }

    fn absorb_events(
        &mut self,
        adv: Advance<RevealUpdate, RevealWake>,
    ) -> Advance<CelebrationUpdate, CelebrationWake> {
        let mut out = Advance::none();
        for wake in adv.wakes {
            out.schedule(wake.map(CelebrationWake::Event));
        }
        for update in adv.updates {
            match update {
                RevealUpdate::Revealed { index } => {
                    out.push(CelebrationUpdate::EventRevealed { index });
                }
                RevealUpdate::Ready => out.extend(self.show_features()),
            }
        }
        out
    }

    fn show_features(&mut self) -> Advance<CelebrationUpdate, CelebrationWake> {
        if self.features_visible {
            return Advance::none();
        }
        self.features_visible = true;
        let mut out = Advance::one(CelebrationUpdate::FeaturesShown, None);
        if self.completed {
            self.verification_visible = true;
            out.push(CelebrationUpdate::VerificationShown);
        } else {
            out.schedule(Wake::new(
                self.tokens.current(),
                self.verification_delay,
                CelebrationWake::Verification,
            ));
        }
        out
    }

    fn absorb_unlocks(
        &mut self,
        adv: Advance<RevealUpdate, RevealWake>,
    ) -> Advance<CelebrationUpdate, CelebrationWake> {
        let mut out = Advance::none();
        for wake in adv.wakes {
            out.schedule(wake.map(CelebrationWake::Unlock));
        }
        for update in adv.updates {
            match update {
                RevealUpdate::Revealed { index } => {
                    let Some(feature) = self.features.get_mut(index) else {
                        continue;
                    };
                    if !feature.unlocked {
                        feature.unlocked = true;
                        tracing::debug!(feature = %feature.id, "feature unlocked");
                        out.push(CelebrationUpdate::FeatureUnlocked {
                            index,
                            id: feature.id.clone(),
                        });
                    }
                }
                RevealUpdate::Ready => out.push(CelebrationUpdate::FeaturesReady),
            }
        }
        out
    }

    fn check_all_unlocked(&mut self) -> Advance<CelebrationUpdate, CelebrationWake> {
        if self.all_unlocked_notified || !self.all_unlocked() {
            return Advance::none();
        }
        self.all_unlocked_notified = true;
        tracing::info!(features = self.features.len(), "all features unlocked");
        Advance::one(CelebrationUpdate::AllFeaturesUnlocked, None)
    }
}
