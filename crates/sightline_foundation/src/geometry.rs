//! 2-D geometry primitives.
//!
//! Only what the engine needs: point-in-shape tests and segment collision.
//! All coordinates are canvas pixels.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const EPSILON: f64 = 1e-9;

// =============================================================================
// Point
// =============================================================================

/// A point on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns true if both coordinates are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation towards `other` by `t` in `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

// =============================================================================
// Segment
// =============================================================================

/// A straight line segment between two points.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    /// Start point.
    pub a: Point,
    /// End point.
    pub b: Point,
}

/// Sign of the cross product (b - a) x (c - a).
fn orientation(a: Point, b: Point, c: Point) -> i8 {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if cross > EPSILON {
        1
    } else if cross < -EPSILON {
        -1
    } else {
        0
    }
}

/// Given collinear `a`, `b`, `p`: is `p` within the bounding box of `ab`?
fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x <= a.x.max(b.x) + EPSILON
        && p.x >= a.x.min(b.x) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
}

impl Segment {
    /// Creates a segment.
    #[must_use]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Length of the segment.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }

    /// Returns true if the segments share at least one point.
    ///
    /// Touching endpoints and collinear overlaps count as intersections.
    #[must_use]
    pub fn intersects(&self, other: &Segment) -> bool {
        let (p1, q1, p2, q2) = (self.a, self.b, other.a, other.b);
        let o1 = orientation(p1, q1, p2);
        let o2 = orientation(p1, q1, q2);
        let o3 = orientation(p2, q2, p1);
        let o4 = orientation(p2, q2, q1);

        if o1 != o2 && o3 != o4 {
            return true;
        }

        (o1 == 0 && on_segment(p1, q1, p2))
            || (o2 == 0 && on_segment(p1, q1, q2))
            || (o3 == 0 && on_segment(p2, q2, p1))
            || (o4 == 0 && on_segment(p2, q2, q1))
    }

    /// Returns true if the segments cross at a point strictly inside both.
    ///
    /// Used where grazing a wall endpoint must not count as blocked.
    #[must_use]
    pub fn crosses(&self, other: &Segment) -> bool {
        let o1 = orientation(self.a, self.b, other.a);
        let o2 = orientation(self.a, self.b, other.b);
        let o3 = orientation(other.a, other.b, self.a);
        let o4 = orientation(other.a, other.b, self.b);
        o1 * o2 < 0 && o3 * o4 < 0
    }
}

// =============================================================================
// Rect
// =============================================================================

/// An axis-aligned rectangle, used for token footprints.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
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
    /// Creates a rectangle from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle centered on a point.
    #[must_use]
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            width,
            height,
        )
    }

    /// Center of the rectangle.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Corners in clockwise order starting at the top-left.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }

    /// Edges in clockwise order.
    #[must_use]
    pub fn edges(&self) -> [Segment; 4] {
        let [tl, tr, br, bl] = self.corners();
        [
            Segment::new(tl, tr),
            Segment::new(tr, br),
            Segment::new(br, bl),
            Segment::new(bl, tl),
        ]
    }

    /// Returns true if the point lies inside or on the boundary.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Returns a copy shrunk by `inset` pixels on every side.
    ///
    /// Insets larger than half the size collapse to the center point.
    #[must_use]
    pub fn inset(&self, inset: f64) -> Rect {
        let dx = inset.min(self.width / 2.0);
        let dy = inset.min(self.height / 2.0);
        Rect::new(
            self.x + dx,
            self.y + dy,
            self.width - 2.0 * dx,
            self.height - 2.0 * dy,
        )
    }

    /// Returns true if the segment passes through or touches the rectangle.
    #[must_use]
    pub fn intersects_segment(&self, segment: &Segment) -> bool {
        if self.contains(segment.a) || self.contains(segment.b) {
            return true;
        }
        self.edges().iter().any(|edge| edge.intersects(segment))
    }
}

// =============================================================================
// Polygon
// =============================================================================

/// A simple polygon, used for precise light areas and regions.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    /// Vertices in order; the closing edge is implicit.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from vertices.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from a rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.corners().to_vec())
    }

    /// Checks the polygon can be evaluated.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than three vertices or any vertex is
    /// not finite.
    pub fn validate(&self) -> Result<()> {
        if self.points.len() < 3 {
            return Err(Error::invalid_geometry(format!(
                "polygon needs at least 3 vertices, got {}",
                self.points.len()
            )));
        }
        if self.points.iter().any(|p| !p.is_finite()) {
            return Err(Error::invalid_geometry("polygon has a non-finite vertex"));
        }
        Ok(())
    }

    /// Even-odd point-in-polygon test.
    ///
    /// # Errors
    ///
    /// Returns an error if the polygon fails [`Polygon::validate`].
    pub fn contains(&self, p: Point) -> Result<bool> {
        self.validate()?;
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let pi = self.points[i];
            let pj = self.points[j];
            if (pi.y > p.y) != (pj.y > p.y) {
                let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        Ok(inside)
    }
}
