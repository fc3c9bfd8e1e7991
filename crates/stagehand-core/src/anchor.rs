#![forbid(unsafe_code)]

//! Anchors: named references to UI elements owned by someone else.
//!
//! The engine never owns the visual tree. It only asks an
//! [`AnchorResolver`] where an element currently is, and an
//! [`AnchorLocator`] turns that answer into a pointer position.
//!
//! # Invariants
//!
//! 1. Resolution is a pure query: resolvers are never mutated by the engine.
//! 2. "Not mounted" is a normal answer, not an error. [`AnchorLocator::locate`]
//!    returns `None` when either the anchor or its container is absent.
//! 3. Positions are always viewport coordinates, independent of the
//!    container's own scroll offset.
//!
//! [`AnchorRegistry`] is an in-memory resolver modelling a scrollable
//! container inside a scrollable window. Hosts with a real visual tree
//! implement [`AnchorResolver`] themselves.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::geometry::{Point, Rect};

/// Default pointer hotspot adjustment in pixels.
///
/// The rendered pointer icon is 24px square; subtracting half of it puts the
/// icon's center on the anchor's center.
pub const DEFAULT_HOTSPOT_OFFSET: f64 = 12.0;

/// Opaque handle naming an anchorable element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorId(Cow<'static, str>);

impl AnchorId {
    /// Create an anchor id from a static name.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The anchor's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for AnchorId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for AnchorId {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability to resolve anchors against the live visual tree.
pub trait AnchorResolver {
    /// Current viewport rectangle of `anchor`, or `None` if it is not mounted.
    fn resolve(&self, anchor: &AnchorId) -> Option<Rect>;
}

impl<R: AnchorResolver + ?Sized> AnchorResolver for &R {
    fn resolve(&self, anchor: &AnchorId) -> Option<Rect> {
        (**self).resolve(anchor)
    }
}

/// Computes pointer positions for anchors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorLocator {
    hotspot_offset: f64,
}

impl Default for AnchorLocator {
    fn default() -> Self {
        Self::new(DEFAULT_HOTSPOT_OFFSET)
    }
}

impl AnchorLocator {
    /// Create a locator with the given hotspot adjustment.
    ///
    /// Non-finite offsets fall back to [`DEFAULT_HOTSPOT_OFFSET`].
    #[must_use]
    pub fn new(hotspot_offset: f64) -> Self {
        Self {
            hotspot_offset: if hotspot_offset.is_finite() {
                hotspot_offset
            } else {
                DEFAULT_HOTSPOT_OFFSET
            },
        }
    }

    /// The hotspot adjustment applied to both axes.
    #[must_use]
    pub fn hotspot_offset(&self) -> f64 {
        self.hotspot_offset
    }

    /// Locate `anchor` inside `container`.
    ///
    /// Returns the pointer position (anchor center minus the hotspot offset)
    /// or `None` when the anchor or the container is not mounted. A
    /// zero-area anchor is laid out but not rendered, so it counts as
    /// unmounted.
    pub fn locate<R: AnchorResolver + ?Sized>(
        &self,
        resolver: &R,
        anchor: &AnchorId,
        container: &AnchorId,
    ) -> Option<Point> {
        resolver.resolve(container)?;
        let rect = resolver.resolve(anchor)?;
        if rect.is_empty() {
            return None;
        }
        let pos = rect
            .center()
            .offset(-self.hotspot_offset, -self.hotspot_offset);
        pos.is_finite().then_some(pos)
    }
}

/// In-memory resolver for a scrollable container inside a scrollable window.
///
/// Anchors are registered in the container's content coordinates. The
/// viewport rectangle of an anchor is its content rectangle translated by the
/// container's viewport origin, minus the container scroll offset, minus the
/// window scroll offset.
#[derive(Debug, Clone)]
pub struct AnchorRegistry {
    container: AnchorId,
    container_origin: Point,
    container_mounted: bool,
    container_scroll: f64,
    window_scroll: f64,
    anchors: HashMap<AnchorId, Rect>,
}

impl AnchorRegistry {
    /// Create a registry whose container sits at `origin` in the window.
    #[must_use]
    pub fn new(container: impl Into<AnchorId>, origin: Point) -> Self {
        Self {
            container: container.into(),
            container_origin: origin,
            container_mounted: true,
            container_scroll: 0.0,
            window_scroll: 0.0,
            anchors: HashMap::new(),
        }
    }

    /// The container's anchor id.
    #[must_use]
    pub fn container(&self) -> &AnchorId {
        &self.container
    }

    /// Mount (or move) an anchor at `content_rect`.
    pub fn mount(&mut self, anchor: impl Into<AnchorId>, content_rect: Rect) {
        self.anchors.insert(anchor.into(), content_rect);
    }

    /// Unmount an anchor. Returns whether it was mounted.
    pub fn unmount(&mut self, anchor: &AnchorId) -> bool {
        self.anchors.remove(anchor).is_some()
    }

    /// Mount or unmount the container itself.
    pub fn set_container_mounted(&mut self, mounted: bool) {
        self.container_mounted = mounted;
    }

    /// Scroll the container by `dy` pixels (clamped at the top).
    pub fn scroll_container_by(&mut self, dy: f64) {
        self.container_scroll = (self.container_scroll + dy).max(0.0);
    }

    /// Scroll the window by `dy` pixels (clamped at the top).
    pub fn scroll_window_by(&mut self, dy: f64) {
        self.window_scroll = (self.window_scroll + dy).max(0.0);
    }

    /// Current container scroll offset.
    #[must_use]
    pub fn container_scroll(&self) -> f64 {
        self.container_scroll
    }

    /// Current window scroll offset.
    #[must_use]
    pub fn window_scroll(&self) -> f64 {
        self.window_scroll
    }
}

impl AnchorResolver for AnchorRegistry {
    fn resolve(&self, anchor: &AnchorId) -> Option<Rect> {
        if !self.container_mounted {
            return None;
        }
        if *anchor == self.container {
            return Some(Rect::new(
                self.container_origin.x,
                self.container_origin.y - self.window_scroll,
                0.0,
                0.0,
            ));
        }
        let content = self.anchors.get(anchor)?;
        Some(content.translate(
            self.container_origin.x,
            self.container_origin.y - self.container_scroll - self.window_scroll,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: AnchorId = AnchorId::from_static("main");
    const HEADER: AnchorId = AnchorId::from_static("abuse-status-header");

    fn registry() -> AnchorRegistry {
        let mut reg = AnchorRegistry::new(CONTAINER, Point::new(320.0, 80.0));
        reg.mount(HEADER, Rect::new(400.0, 600.0, 120.0, 40.0));
        reg
    }

    #[test]
    fn locate_subtracts_hotspot_from_center() {
        let reg = registry();
        let locator = AnchorLocator::default();
        let p = locator.locate(&reg, &HEADER, &CONTAINER).expect("mounted");
        // center = (320 + 400 + 60, 80 + 600 + 20) = (780, 700)
        assert_eq!(p, Point::new(768.0, 688.0));
    }

    #[test]
    fn container_scroll_moves_anchor_up() {
        let mut reg = registry();
        let locator = AnchorLocator::default();
        let before = locator.locate(&reg, &HEADER, &CONTAINER).expect("mounted");
        reg.scroll_container_by(250.0);
        let after = locator.locate(&reg, &HEADER, &CONTAINER).expect("mounted");
        assert_eq!(after.x, before.x);
        assert_eq!(after.y, before.y - 250.0);
    }

    #[test]
    fn window_scroll_moves_anchor_up() {
        let mut reg = registry();
        reg.scroll_window_by(100.0);
        let p = AnchorLocator::default()
            .locate(&reg, &HEADER, &CONTAINER)
            .expect("mounted");
        assert_eq!(p.y, 588.0);
    }

    #[test]
    fn scroll_clamps_at_top() {
        let mut reg = registry();
        reg.scroll_container_by(-50.0);
        assert_eq!(reg.container_scroll(), 0.0);
        reg.scroll_window_by(10.0);
        reg.scroll_window_by(-30.0);
        assert_eq!(reg.window_scroll(), 0.0);
    }

    #[test]
    fn unmounted_anchor_is_unavailable() {
        let mut reg = registry();
        assert!(reg.unmount(&HEADER));
        assert!(!reg.unmount(&HEADER));
        let locator = AnchorLocator::default();
        assert_eq!(locator.locate(&reg, &HEADER, &CONTAINER), None);
    }

    #[test]
    fn unmounted_container_is_unavailable() {
        let mut reg = registry();
        reg.set_container_mounted(false);
        let locator = AnchorLocator::default();
        assert_eq!(locator.locate(&reg, &HEADER, &CONTAINER), None);
    }

    #[test]
    fn zero_area_anchor_is_unavailable() {
        let mut reg = registry();
        reg.mount(HEADER, Rect::new(400.0, 600.0, 0.0, 0.0));
        assert_eq!(
            AnchorLocator::default().locate(&reg, &HEADER, &CONTAINER),
            None
        );
    }

    #[test]
    fn unknown_anchor_is_unavailable() {
        let reg = registry();
        let other = AnchorId::from("never-rendered".to_string());
        assert_eq!(
            AnchorLocator::default().locate(&reg, &other, &CONTAINER),
            None
        );
    }

    #[test]
    fn non_finite_hotspot_falls_back() {
        assert_eq!(
            AnchorLocator::new(f64::NAN).hotspot_offset(),
            DEFAULT_HOTSPOT_OFFSET
        );
        assert_eq!(AnchorLocator::new(0.0).hotspot_offset(), 0.0);
    }

    #[test]
    fn resolver_by_reference() {
        let reg = registry();
        let by_ref: &AnchorRegistry = &reg;
        assert!((&by_ref).resolve(&HEADER).is_some());
    }

    #[test]
    fn anchor_id_display() {
        assert_eq!(HEADER.to_string(), "abuse-status-header");
        assert_eq!(HEADER.as_str(), "abuse-status-header");
    }
}
