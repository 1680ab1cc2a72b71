//! Broad phase: every tile's colliders, pre-placed in world coordinates.

use std::collections::HashMap;

use minigolf_shared::map::{GridPos, StructureType, MAP_HEIGHT, MAP_WIDTH};

use crate::collider::Collider;
use crate::game_map::{GameMap, Tile};
use crate::geometry::{vec2, Vector};

/// Stable tile key derived from grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
}

impl From<GridPos> for TileId {
    fn from(pos: GridPos) -> Self {
        TileId { x: pos.x, y: pos.y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshCollider {
    pub collider: Collider,
    pub kind: StructureType,
}

/// Closest point of one collider to the ball, tagged with what was hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPoint {
    pub point: Vector,
    pub kind: StructureType,
}

#[derive(Debug, Default)]
pub struct ColliderMesh {
    tiles: HashMap<TileId, Vec<MeshCollider>>,
}

impl ColliderMesh {
    pub fn build(map: &GameMap, tile_size: f64, circle_radius: f64) -> Self {
        let mut tiles: HashMap<TileId, Vec<MeshCollider>> = HashMap::new();
        for tile in map.tiles() {
            let kind = tile.structure.kind;
            let mut placed: Vec<MeshCollider> = template(kind, tile_size, circle_radius)
                .iter()
                .map(|c| MeshCollider {
                    collider: c.to_tile_position(tile, tile_size),
                    kind,
                })
                .collect();
            placed.extend(rim_colliders(tile, tile_size));
            if !placed.is_empty() {
                tiles.insert(tile.pos.into(), placed);
            }
        }
        ColliderMesh { tiles }
    }

    pub fn colliders(&self, id: TileId) -> &[MeshCollider] {
        self.tiles.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Projection of the ball onto every collider of a tile that yields one.
    pub fn collision_points_for(
        &self,
        id: TileId,
        ball: Vector,
    ) -> impl Iterator<Item = CollisionPoint> + '_ {
        self.colliders(id).iter().filter_map(move |c| {
            c.collider.projection_point(ball).map(|point| CollisionPoint {
                point,
                kind: c.kind,
            })
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

/// Local-space colliders of a structure, before rotation and placement.
pub fn template(kind: StructureType, t: f64, circle_radius: f64) -> Vec<Collider> {
    let p = |x: f64, y: f64| Collider::Point { pos: vec2(x, y) };
    let l = |x: f64, y: f64, dx: f64, dy: f64| Collider::Line {
        pos: vec2(x, y),
        dir: vec2(dx, dy),
    };
    match kind {
        StructureType::None | StructureType::Start => Vec::new(),
        StructureType::Wall => vec![
            p(0.0, 0.0),
            l(0.0, 0.0, t, 0.0),
            p(t, 0.0),
            l(t, 0.0, 0.0, t),
            p(t, t),
            l(t, t, -t, 0.0),
            p(0.0, t),
            l(0.0, t, 0.0, -t),
        ],
        StructureType::Wedge => vec![
            p(0.0, 0.0),
            l(0.0, 0.0, t, 0.0),
            p(t, 0.0),
            l(t, 0.0, -t, t),
            p(0.0, t),
            l(0.0, t, 0.0, -t),
        ],
        StructureType::RoundedCorner => vec![
            p(0.0, 0.0),
            l(0.0, 0.0, 0.0, t),
            p(0.0, t),
            Collider::Arc {
                center: vec2(0.0, 0.0),
                radius: t,
                start: vec2(1.0, 0.0),
                end: vec2(0.0, 1.0),
            },
            p(t, 0.0),
            l(t, 0.0, -t, 0.0),
        ],
        StructureType::InvertedRoundedCorner => vec![
            p(0.0, 0.0),
            l(0.0, 0.0, 0.0, t),
            p(0.0, t),
            Collider::Arc {
                center: vec2(t, t),
                radius: t,
                start: vec2(-1.0, 0.0),
                end: vec2(0.0, -1.0),
            },
            p(t, 0.0),
            l(t, 0.0, -t, 0.0),
        ],
        StructureType::Circle | StructureType::Hole => vec![Collider::Circle {
            center: vec2(t / 2.0, t / 2.0),
            radius: circle_radius,
        }],
    }
}

/// Boundary walls along the outer edges of the map, already in world space.
fn rim_colliders(tile: &Tile, t: f64) -> Vec<MeshCollider> {
    let o = tile.origin(t);
    let mut edges = Vec::new();
    if tile.pos.x == 0 {
        edges.push((o, vec2(0.0, t)));
    }
    if tile.pos.y == 0 {
        edges.push((o, vec2(t, 0.0)));
    }
    if tile.pos.x == MAP_WIDTH - 1 {
        edges.push((o + vec2(t, 0.0), vec2(0.0, t)));
    }
    if tile.pos.y == MAP_HEIGHT - 1 {
        edges.push((o + vec2(0.0, t), vec2(t, 0.0)));
    }
    edges
        .into_iter()
        .flat_map(|(pos, dir)| {
            [
                MeshCollider {
                    collider: Collider::Point { pos },
                    kind: StructureType::Wall,
                },
                MeshCollider {
                    collider: Collider::Line { pos, dir },
                    kind: StructureType::Wall,
                },
            ]
        })
        .collect()
}
