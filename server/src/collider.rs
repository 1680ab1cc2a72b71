use minigolf_shared::map::Rotation;

use crate::game_map::Tile;
use crate::geometry::{vec2, Vector};

/// A primitive shape the ball can hit.
///
/// Colliders are authored in tile-local coordinates (the square `[0, T]²`,
/// y pointing down) and placed into the world with [`Collider::to_tile_position`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Point {
        pos: Vector,
    },
    /// Segment from `pos` to `pos + dir`.
    Line {
        pos: Vector,
        dir: Vector,
    },
    Circle {
        center: Vector,
        radius: f64,
    },
    /// Part of a circle between the directions `start` and `end`, measured
    /// from the center.
    Arc {
        center: Vector,
        radius: f64,
        start: Vector,
        end: Vector,
    },
}

impl Collider {
    /// Point on this shape closest to the ball center, if the shape offers one.
    pub fn projection_point(&self, ball: Vector) -> Option<Vector> {
        match *self {
            Collider::Point { pos } => Some(pos),
            Collider::Line { pos, dir } => {
                let projected = dir.project(ball - pos);
                if projected.dot(dir) > 0.0 && projected.length() < dir.length() {
                    Some(pos + projected)
                } else {
                    None
                }
            }
            Collider::Circle { center, radius } => {
                Some(center + (ball - center).with_length(radius))
            }
            Collider::Arc {
                center,
                radius,
                start,
                end,
            } => {
                let closer = (ball - center).with_length(radius);
                if closer.is_between(start, end) {
                    return Some(center + closer);
                }
                let further = -closer;
                if further.is_between(end, start) {
                    return Some(center + further);
                }
                None
            }
        }
    }

    /// Rotate by the tile's structure rotation about the tile center, then move
    /// to the tile's world position.
    pub fn to_tile_position(&self, tile: &Tile, tile_size: f64) -> Collider {
        self.placed(tile.origin(tile_size), tile.structure.rotation, tile_size)
    }

    pub(crate) fn placed(&self, origin: Vector, rotation: Rotation, tile_size: f64) -> Collider {
        let pivot = vec2(tile_size / 2.0, tile_size / 2.0);
        let place = |p: Vector| p.rotate(pivot, rotation) + origin;
        let turn = |d: Vector| d.rotate(Vector::ZERO, rotation);
        match *self {
            Collider::Point { pos } => Collider::Point { pos: place(pos) },
            Collider::Line { pos, dir } => Collider::Line {
                pos: place(pos),
                dir: turn(dir),
            },
            Collider::Circle { center, radius } => Collider::Circle {
                center: place(center),
                radius,
            },
            Collider::Arc {
                center,
                radius,
                start,
                end,
            } => Collider::Arc {
                center: place(center),
                radius,
                start: turn(start),
                end: turn(end),
            },
        }
    }
}
