use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use minigolf_shared::config::PhysicsConfig;
use minigolf_shared::protocol::{PlayerStateWire, PlayerStatus};

use crate::engine::Ball;
use crate::geometry::{vec2, Vector};
use crate::protocol::round2;

/// Longest accepted player name, in characters
pub const MAX_NAME_LEN: usize = 20;

/// Hands out player ids. Clones share one counter, so every match created by
/// the same registry draws from the same sequence.
#[derive(Debug, Clone)]
pub struct PlayerIds(Arc<AtomicU32>);

impl PlayerIds {
    pub fn new() -> Self {
        PlayerIds(Arc::new(AtomicU32::new(1)))
    }

    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for PlayerIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A participant of one match. Survives disconnects so the player can come back.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub ball: Ball,
    /// Ball as it was before the last shot; water puts it back here
    pub prev_ball: Ball,
    /// Shot count of every finished map
    pub scores: Vec<u32>,
    pub shot_count: u32,
    pub status: PlayerStatus,
    pub connected: bool,
}

impl Player {
    pub fn new(id: u32, name: &str, start: Vector) -> Self {
        let ball = Ball::at_rest(start);
        Self {
            id,
            name: sanitize_name(name),
            ball,
            prev_ball: ball,
            scores: Vec::new(),
            shot_count: 0,
            status: PlayerStatus::Waiting,
            connected: true,
        }
    }

    pub fn has_turn(&self) -> bool {
        self.status == PlayerStatus::HasTurn
    }

    /// Put the ball at rest at `pos` and clear the shot counter.
    pub fn reset_to(&mut self, pos: Vector) {
        self.ball = Ball::at_rest(pos);
        self.prev_ball = self.ball;
        self.shot_count = 0;
    }

    /// Apply a shot. Returns false when the player may not shoot right now.
    pub fn shoot(&mut self, x: f64, y: f64, config: &PhysicsConfig) -> bool {
        if !self.has_turn() || !x.is_finite() || !y.is_finite() {
            return false;
        }
        let mut vel = vec2(x, y) * config.shot_scale;
        if vel.length() > config.max_shot_speed {
            vel = vel.with_length(config.max_shot_speed);
        }
        if vel.length() < config.stop_speed {
            return false;
        }
        self.prev_ball = self.ball;
        self.ball.vel = vel;
        self.shot_count += 1;
        self.status = PlayerStatus::IsMoving;
        true
    }

    pub fn to_wire(&self) -> PlayerStateWire {
        PlayerStateWire {
            id: self.id,
            name: self.name.clone(),
            x: round2(self.ball.pos.x),
            y: round2(self.ball.pos.y),
            dx: round2(self.ball.vel.x),
            dy: round2(self.ball.vel.y),
            shot_count: self.shot_count,
        }
    }
}

/// Trim and cap a display name; empty names become "Player".
pub fn sanitize_name(name: &str) -> String {
    let trimmed: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        "Player".to_string()
    } else {
        trimmed
    }
}
