#![forbid(unsafe_code)]

//! Viewport geometry.
//!
//! All coordinates are CSS-style pixels in a single, viewport-fixed space
//! (origin at the top-left of the visible window, y grows downward).

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Offset this point by `(dx, dy)`.
    #[inline]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Whether both coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Left edge. Alias for `self.x`.
    #[inline]
    pub const fn left(&self) -> f64 {
        self.x
    }

    /// Top edge. Alias for `self.y`.
    #[inline]
    pub const fn top(&self) -> f64 {
        self.y
    }

    /// Right edge (exclusive).
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Geometric center.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if the rectangle has zero (or negative) area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Translate the rectangle by `(dx, dy)`, keeping its size.
    #[inline]
    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_of_rect() {
        let r = Rect::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(r.center(), Point::new(60.0, 40.0));
    }

    #[test]
    fn edges() {
        let r = Rect::new(5.0, 6.0, 10.0, 4.0);
        assert_eq!(r.left(), 5.0);
        assert_eq!(r.top(), 6.0);
        assert_eq!(r.right(), 15.0);
        assert_eq!(r.bottom(), 10.0);
    }

    #[test]
    fn translate_keeps_size() {
        let r = Rect::new(0.0, 100.0, 50.0, 20.0).translate(3.0, -40.0);
        assert_eq!(r, Rect::new(3.0, 60.0, 50.0, 20.0));
    }

    #[test]
    fn empty_rects() {
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(Rect::new(0.0, 0.0, 10.0, -1.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn point_offset_and_finite() {
        let p = Point::new(1.0, 2.0).offset(-1.0, 3.0);
        assert_eq!(p, Point::new(0.0, 5.0));
        assert!(p.is_finite());
        assert!(!Point::new(f64::NAN, 0.0).is_finite());
    }
}
