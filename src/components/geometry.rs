//! Plain 2D value types shared by the scene graph and the spatial backends.
//!
//! - [`Vec2`] – a point or offset in world units
//! - [`Rect`] – an axis-aligned rectangle stored as inclusive min/max corners
//!
//! Rectangles are closed on every edge: a point lying exactly on the border
//! is contained. [`Rect::EVERYTHING`] spans the whole plane and is what a
//! List backend effectively answers for any query.

/// A 2D point in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Linear interpolation towards `other` by factor `t`.
    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Axis-aligned rectangle with inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// The unbounded rectangle covering every finite point.
    pub const EVERYTHING: Rect = Rect {
        min: Vec2 {
            x: f32::NEG_INFINITY,
            y: f32::NEG_INFINITY,
        },
        max: Vec2 {
            x: f32::INFINITY,
            y: f32::INFINITY,
        },
    };

    /// Build a rectangle from its top-left corner and size.
    ///
    /// Negative sizes are folded so `min <= max` always holds.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect::from_corners(Vec2::new(x, y), Vec2::new(x + width, y + height))
    }

    /// Build a rectangle from any two opposite corners.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Rect {
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.min.x + self.width() * 0.5,
            self.min.y + self.height() * 0.5,
        )
    }

    /// `true` when `p` lies inside or on the border.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// `true` when the two closed rectangles share at least one point.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Rect {
        if margin <= 0.0 {
            return *self;
        }
        Rect {
            min: Vec2::new(self.min.x - margin, self.min.y - margin),
            max: Vec2::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        !(self.min.x.is_finite()
            && self.min.y.is_finite()
            && self.max.x.is_finite()
            && self.max.y.is_finite())
    }
}
