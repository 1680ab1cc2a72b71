//! Per-tick ball integration against the collider mesh.

use minigolf_shared::config::PhysicsConfig;
use minigolf_shared::map::{GroundType, StructureType};

use crate::game_map::GameMap;
use crate::geometry::{vec2, Vector};
use crate::mesh::{ColliderMesh, CollisionPoint, TileId};

/// Smallest sub-step of the swept move, so the loop always makes progress.
const MIN_STEP: f64 = 1.0;
/// Remaining travel below this ends the swept move.
const TRAVEL_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ball {
    pub pos: Vector,
    pub vel: Vector,
}

impl Ball {
    pub fn new(pos: Vector, vel: Vector) -> Self {
        Self { pos, vel }
    }

    pub fn at_rest(pos: Vector) -> Self {
        Self {
            pos,
            vel: Vector::ZERO,
        }
    }

    pub fn speed(&self) -> f64 {
        self.vel.length()
    }

    pub fn is_at_rest(&self) -> bool {
        self.vel == Vector::ZERO
    }
}

/// What happened to a ball during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Collision,
    /// Terminal: the ball dropped into a hole.
    Hole,
    /// Terminal: the ball landed in water.
    Water,
}

/// Advance one ball by one tick.
///
/// Terminal effects return the ball exactly as it was passed in; the caller
/// decides where it goes next.
pub fn step(
    ball: Ball,
    map: &GameMap,
    mesh: &ColliderMesh,
    config: &PhysicsConfig,
) -> (Ball, Effect) {
    let Some(mut current) = apply_ground(ball, map, config) else {
        return (ball, Effect::Water);
    };

    let mut remaining = current.speed();
    if remaining < config.stop_speed {
        return (Ball::at_rest(current.pos), Effect::None);
    }

    let mut effect = Effect::None;
    while remaining >= TRAVEL_EPSILON {
        let Some((hit, dist)) = closest_collision(&current, remaining, map, mesh, config) else {
            current.pos = current.pos + current.vel.with_length(remaining);
            break;
        };

        if dist < config.ball_radius {
            if hit.kind == StructureType::Hole {
                return (ball, Effect::Hole);
            }
            current = bounce(hit.point, current, config);
            effect = Effect::Collision;
        }

        let to_move = (dist - config.ball_radius + config.contact_epsilon)
            .max(MIN_STEP)
            .min(remaining);
        current.pos = current.pos + current.vel.with_length(to_move);
        remaining -= to_move;
    }

    (current, effect)
}

/// Friction plus surface modifiers. `None` means the ball is in water.
pub fn apply_ground(ball: Ball, map: &GameMap, config: &PhysicsConfig) -> Option<Ball> {
    let tile = map.tile_at(ball.pos, config.tile_size);
    let mut vel = ball.vel * config.friction;
    let ground = tile.ground;
    match ground.kind {
        GroundType::Grass => {}
        GroundType::Water => return None,
        GroundType::Gravel => vel = vel * config.gravel_friction,
        GroundType::GravelHeavy => vel = vel * config.gravel_heavy_friction,
        GroundType::Slope => {
            vel = vel + vec2(0.0, -config.slope_gravity).rotate(Vector::ZERO, ground.rotation);
        }
        GroundType::SlopeDiagonal => {
            vel = vel
                + vec2(-1.0, -1.0)
                    .with_length(config.slope_gravity)
                    .rotate(Vector::ZERO, ground.rotation);
        }
    }
    Some(Ball::new(ball.pos, vel))
}

/// Mirror the velocity about the contact normal, lose energy, and push the ball
/// clear of the contact point.
pub fn bounce(contact: Vector, ball: Ball, config: &PhysicsConfig) -> Ball {
    let normal = (ball.pos - contact).unit();
    let mut local = ball.vel.change_base(normal);
    local.x = -local.x;
    Ball {
        pos: contact + normal * (config.ball_radius + config.contact_epsilon),
        vel: local.normal_base(normal) * config.restitution,
    }
}

/// Nearest collision point around the ball. The tile window grows with the
/// travel distance so nothing reachable this tick is left out.
fn closest_collision(
    ball: &Ball,
    travel: f64,
    map: &GameMap,
    mesh: &ColliderMesh,
    config: &PhysicsConfig,
) -> Option<(CollisionPoint, f64)> {
    let center = map.grid_coord(ball.pos, config.tile_size);
    let reach = ((travel + config.ball_radius) / config.tile_size).ceil() as u32 + 1;

    let x_range = center.x.saturating_sub(reach)..=(center.x + reach).min(map.width() - 1);
    let y_range = center.y.saturating_sub(reach)..=(center.y + reach).min(map.height() - 1);

    let mut best: Option<(CollisionPoint, f64)> = None;
    for x in x_range {
        for y in y_range.clone() {
            for hit in mesh.collision_points_for(TileId { x, y }, ball.pos) {
                let dist = hit.point.distance(ball.pos);
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((hit, dist));
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use minigolf_shared::map::Rotation;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn config() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn build(map: GameMap) -> (GameMap, ColliderMesh) {
        let cfg = config();
        let mesh = ColliderMesh::build(&map, cfg.tile_size, cfg.circle_radius);
        (map, mesh)
    }

    #[test]
    fn slow_ball_comes_to_rest() {
        let (map, mesh) = build(GameMap::generate("t"));
        let ball = Ball::new(vec2(1050.0, 1050.0), vec2(0.5, 0.3));
        let (next, effect) = step(ball, &map, &mesh, &config());
        assert_eq!(effect, Effect::None);
        assert_eq!(next.vel, Vector::ZERO);
        assert_eq!(next.pos, ball.pos);
    }

    #[test]
    fn free_ball_moves_by_its_velocity() {
        let (map, mesh) = build(GameMap::generate("t"));
        let ball = Ball::new(vec2(1050.0, 1050.0), vec2(10.0, 0.0));
        let (next, effect) = step(ball, &map, &mesh, &config());
        assert_eq!(effect, Effect::None);
        assert!((next.vel.x - 9.83).abs() < 1e-9);
        assert!((next.pos.x - 1059.83).abs() < 1e-9);
        assert!((next.pos.y - 1050.0).abs() < 1e-9);
    }

    #[test]
    fn bounce_reflects_normal_component_only() {
        let cfg = config();
        let contact = vec2(500.0, 480.0);
        let ball = Ball::new(vec2(480.0, 480.0), vec2(30.0, -12.0));
        let out = bounce(contact, ball, &cfg);
        assert!((out.vel.x - (-30.0 * cfg.restitution)).abs() < 1e-9);
        assert!((out.vel.y - (-12.0 * cfg.restitution)).abs() < 1e-9);
        assert!(out.vel.length() < ball.vel.length());
        assert!((out.pos.x - (500.0 - cfg.ball_radius - cfg.contact_epsilon)).abs() < 1e-9);
        assert!((out.pos.y - 480.0).abs() < 1e-9);
    }

    #[test]
    fn ball_bounces_off_wall() {
        let (map, mesh) = build(GameMap::generate("t").with_structure(
            5,
            4,
            StructureType::Wall,
            Rotation::North,
        ));
        let ball = Ball::new(vec2(480.0, 480.0), vec2(50.0, 0.0));
        let (next, effect) = step(ball, &map, &mesh, &config());
        assert_eq!(effect, Effect::Collision);
        let expected = -50.0 * 0.983 * 0.95;
        assert!((next.vel.x - expected).abs() < 1e-9, "vel {:?}", next.vel);
        assert!(next.vel.y.abs() < 1e-9);
        assert!(next.pos.x < 460.0, "pos {:?}", next.pos);
    }

    #[test]
    fn ball_near_hole_drops_in_unchanged() {
        let (map, mesh) = build(GameMap::generate("t").with_structure(
            5,
            5,
            StructureType::Hole,
            Rotation::North,
        ));
        let ball = Ball::new(vec2(500.0, 550.0), vec2(5.0, 0.0));
        let (next, effect) = step(ball, &map, &mesh, &config());
        assert_eq!(effect, Effect::Hole);
        assert_eq!(next, ball);
    }

    #[test]
    fn water_is_terminal() {
        let (map, mesh) = build(GameMap::generate("t").with_ground(
            10,
            10,
            GroundType::Water,
            Rotation::North,
        ));
        let ball = Ball::new(vec2(1050.0, 1050.0), vec2(20.0, 0.0));
        let (next, effect) = step(ball, &map, &mesh, &config());
        assert_eq!(effect, Effect::Water);
        assert_eq!(next, ball);
    }

    #[test]
    fn gravel_damps_harder() {
        let cfg = config();
        let rolling = Ball::new(vec2(1050.0, 1050.0), vec2(10.0, 0.0));
        let map = GameMap::generate("t").with_ground(10, 10, GroundType::Gravel, Rotation::North);
        let out = apply_ground(rolling, &map, &cfg).unwrap();
        assert!((out.vel.x - 10.0 * 0.983 * 0.8).abs() < 1e-9);

        let map =
            GameMap::generate("t").with_ground(10, 10, GroundType::GravelHeavy, Rotation::North);
        let out = apply_ground(rolling, &map, &cfg).unwrap();
        assert!((out.vel.x - 10.0 * 0.983 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn slope_pulls_along_its_rotation() {
        let cfg = config();
        let map = GameMap::generate("t")
            .with_ground(10, 10, GroundType::Slope, Rotation::North)
            .with_ground(11, 10, GroundType::Slope, Rotation::East);
        let north = apply_ground(Ball::at_rest(vec2(1050.0, 1050.0)), &map, &cfg).unwrap();
        assert!((north.vel.y + 0.75).abs() < 1e-9);
        assert!(north.vel.x.abs() < 1e-9);
        let east = apply_ground(Ball::at_rest(vec2(1150.0, 1050.0)), &map, &cfg).unwrap();
        assert!((east.vel.x - 0.75).abs() < 1e-9);
        assert!(east.vel.y.abs() < 1e-9);
    }

    #[test]
    fn ball_never_leaves_the_map() {
        let (map, mesh) = build(GameMap::generate("t"));
        let mut ball = Ball::new(vec2(300.0, 300.0), vec2(-120.0, -90.0));
        for _ in 0..600 {
            let (next, _) = step(ball, &map, &mesh, &config());
            ball = next;
            assert!(ball.pos.x > 0.0 && ball.pos.y > 0.0, "escaped at {:?}", ball.pos);
        }
    }

    /// Step until the first collision; panics if none happens.
    fn first_bounce(map: GameMap, ball: Ball) -> Ball {
        let (map, mesh) = build(map);
        let mut ball = ball;
        for _ in 0..20 {
            let (next, effect) = step(ball, &map, &mesh, &config());
            ball = next;
            if effect == Effect::Collision {
                return ball;
            }
        }
        panic!("no collision, ball ended at {:?}", ball);
    }

    fn shape_at_10_10(kind: StructureType) -> GameMap {
        GameMap::generate("t").with_structure(10, 10, kind, Rotation::North)
    }

    #[test]
    fn ball_bounces_off_circle() {
        let ball = first_bounce(
            shape_at_10_10(StructureType::Circle),
            Ball::new(vec2(976.0, 1050.0), vec2(30.0, 0.0)),
        );
        assert!(ball.vel.x < 0.0, "vel {:?}", ball.vel);
        assert!(ball.vel.y.abs() < 1e-9);
        // Post kept clear of the post by radius plus collider radius
        assert!(ball.pos.distance(vec2(1050.0, 1050.0)) >= 64.0 - 1e-6);
    }

    #[test]
    fn ball_bounces_off_wedge_slope() {
        // Hypotenuse runs from (1100, 1000) to (1000, 1100)
        let ball = first_bounce(
            shape_at_10_10(StructureType::Wedge),
            Ball::new(vec2(1100.0, 1100.0), vec2(-20.0, -20.0)),
        );
        assert!(ball.vel.x > 0.0 && ball.vel.y > 0.0, "vel {:?}", ball.vel);
        assert!((ball.vel.x - ball.vel.y).abs() < 1e-6);
        let to_line = (ball.pos.x + ball.pos.y - 2100.0) / 2f64.sqrt();
        assert!(to_line >= 40.0 - 1e-6, "{} from the slope", to_line);
    }

    #[test]
    fn ball_bounces_off_rounded_corner() {
        // Quarter disc of radius 100 around (1000, 1000)
        let ball = first_bounce(
            shape_at_10_10(StructureType::RoundedCorner),
            Ball::new(vec2(1130.0, 1130.0), vec2(-20.0, -20.0)),
        );
        assert!(ball.vel.x > 0.0 && ball.vel.y > 0.0, "vel {:?}", ball.vel);
        assert!((ball.vel.x - ball.vel.y).abs() < 1e-6);
        assert!(ball.pos.distance(vec2(1000.0, 1000.0)) >= 140.0 - 1e-6);
    }

    #[test]
    fn ball_bounces_inside_inverted_rounded_corner() {
        // Hollow of radius 100 around (1100, 1100)
        let ball = first_bounce(
            shape_at_10_10(StructureType::InvertedRoundedCorner),
            Ball::new(vec2(1090.0, 1090.0), vec2(-20.0, -20.0)),
        );
        assert!(ball.vel.x > 0.0 && ball.vel.y > 0.0, "vel {:?}", ball.vel);
        assert!((ball.vel.x - ball.vel.y).abs() < 1e-6);
        assert!(ball.pos.distance(vec2(1100.0, 1100.0)) <= 60.0 + 1e-6);
    }

    fn random_course(rng: &mut ChaCha8Rng) -> GameMap {
        let shapes = [
            StructureType::Wall,
            StructureType::Circle,
            StructureType::Wedge,
            StructureType::RoundedCorner,
            StructureType::InvertedRoundedCorner,
        ];
        let mut map = GameMap::generate("random");
        let (w, h) = (map.width(), map.height());
        map = map.with_structure(w - 3, h / 2, StructureType::None, Rotation::North);
        for x in 1..w - 1 {
            for y in 1..h - 1 {
                if rng.gen_bool(0.15) {
                    let kind = shapes[rng.gen_range(0..shapes.len())];
                    let rotation = Rotation::ALL[rng.gen_range(0..4)];
                    map = map.with_structure(x, y, kind, rotation);
                }
            }
        }
        map
    }

    #[test]
    fn random_courses_never_let_the_ball_through() {
        let cfg = config();
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        for _ in 0..20 {
            let (map, mesh) = build(random_course(&mut rng));
            let open: Vec<Vector> = map
                .tiles()
                .filter(|t| !t.is_rim() && t.structure.kind == StructureType::None)
                .map(|t| t.center(cfg.tile_size))
                .collect();
            let mut ball = Ball::at_rest(open[rng.gen_range(0..open.len())]);

            for _ in 0..10 {
                let angle = rng.gen_range(0.0..std::f64::consts::TAU);
                let speed = rng.gen_range(20.0..cfg.max_shot_speed);
                ball.vel = vec2(angle.cos(), angle.sin()) * speed;

                for _ in 0..400 {
                    let (next, effect) = step(ball, &map, &mesh, &cfg);
                    assert!(matches!(effect, Effect::None | Effect::Collision));
                    ball = next;

                    let tile = map.tile_at(ball.pos, cfg.tile_size);
                    let kind = tile.structure.kind;
                    assert_ne!(kind, StructureType::Wall, "inside a wall at {:?}", ball.pos);
                    if kind == StructureType::Circle {
                        let post = tile.center(cfg.tile_size);
                        assert!(ball.pos.distance(post) > cfg.circle_radius, "inside a post");
                    }

                    let here = map.grid_coord(ball.pos, cfg.tile_size);
                    for x in here.x.saturating_sub(1)..=(here.x + 1).min(map.width() - 1) {
                        for y in here.y.saturating_sub(1)..=(here.y + 1).min(map.height() - 1) {
                            for hit in mesh.collision_points_for(TileId { x, y }, ball.pos) {
                                let dist = hit.point.distance(ball.pos);
                                assert!(
                                    dist > cfg.ball_radius * 0.75,
                                    "ball at {:?} is {} from {:?}",
                                    ball.pos,
                                    dist,
                                    hit.point
                                );
                            }
                        }
                    }

                    if ball.is_at_rest() {
                        break;
                    }
                }
            }
        }
    }
}
