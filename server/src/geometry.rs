//! 2D vector algebra for the collision engine.
//!
//! Level geometry is axis-aligned, so rotation only ever happens in quarter
//! turns. A quarter turn is a change into the orthonormal frame of the rotated
//! x-axis, which is the same basis change the bounce response uses.

use minigolf_shared::map::Rotation;
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

/// Shorthand constructor
pub fn vec2(x: f64, y: f64) -> Vector {
    Vector::new(x, y)
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };
    /// Direction used when a unit vector is requested for a zero-length vector
    pub const FALLBACK_DIRECTION: Vector = Vector { x: 1.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scale(self, s: f64) -> Vector {
        Vector::new(self.x * s, self.y * s)
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Vector) -> f64 {
        (self - other).length()
    }

    /// Unit vector, or `None` when the length is (nearly) zero.
    pub fn try_unit(self) -> Option<Vector> {
        let len = self.length();
        if len < 1e-10 || !len.is_finite() {
            return None;
        }
        Some(self.scale(1.0 / len))
    }

    /// Unit vector, falling back to +x for degenerate input.
    pub fn unit(self) -> Vector {
        self.try_unit().unwrap_or(Self::FALLBACK_DIRECTION)
    }

    /// Same direction, given length.
    pub fn with_length(self, len: f64) -> Vector {
        self.unit().scale(len)
    }

    /// Perpendicular vector, a quarter turn from `self`.
    pub fn normal(self) -> Vector {
        Vector::new(-self.y, self.x)
    }

    /// Projection of `other` onto `self`. Zero when `self` is zero.
    pub fn project(self, other: Vector) -> Vector {
        let len_sq = self.dot(self);
        if len_sq < 1e-20 {
            return Vector::ZERO;
        }
        self.scale(self.dot(other) / len_sq)
    }

    /// Z component of the 3D cross product.
    pub fn cross_z(self, other: Vector) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// True when this direction lies in the angular span bounded by `b` and `c`,
    /// boundaries included.
    pub fn is_between(self, b: Vector, c: Vector) -> bool {
        b.cross_z(self) * b.cross_z(c) >= 0.0 && c.cross_z(self) * c.cross_z(b) >= 0.0
    }

    /// Coordinates of `self` in the frame whose first axis is `base` and second
    /// axis is `base.normal()`.
    pub fn change_base(self, base: Vector) -> Vector {
        let len_sq = base.dot(base);
        if len_sq < 1e-20 {
            return self;
        }
        let normal = base.normal();
        Vector::new(self.dot(base) / len_sq, self.dot(normal) / len_sq)
    }

    /// Inverse of [`Vector::change_base`] for a unit `base`: back to world coordinates.
    pub fn normal_base(self, base: Vector) -> Vector {
        let normal = base.normal();
        Vector::new(
            self.x * base.x + self.y * normal.x,
            self.x * base.y + self.y * normal.y,
        )
    }

    /// Quarter-turn rotation about `pivot`.
    pub fn rotate(self, pivot: Vector, rotation: Rotation) -> Vector {
        match rotation {
            Rotation::North => self,
            rot => (self - pivot).normal_base(rotation_axis(rot)) + pivot,
        }
    }
}

/// Image of the x-axis under a quarter turn.
fn rotation_axis(rotation: Rotation) -> Vector {
    match rotation {
        Rotation::North => vec2(1.0, 0.0),
        Rotation::East => vec2(0.0, 1.0),
        Rotation::South => vec2(-1.0, 0.0),
        Rotation::West => vec2(0.0, -1.0),
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    fn mul(self, rhs: f64) -> Vector {
        self.scale(rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}
