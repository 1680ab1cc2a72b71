/// Ball physics tunables. Distances are world units, speeds are units per tick.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    pub tile_size: f64,
    pub ball_radius: f64,
    /// Velocity multiplier applied every tick on every surface
    pub friction: f64,
    pub gravel_friction: f64,
    pub gravel_heavy_friction: f64,
    /// Downhill acceleration added per tick on slopes
    pub slope_gravity: f64,
    /// Fraction of velocity kept after bouncing off a wall
    pub restitution: f64,
    /// Below this speed the ball is at rest
    pub stop_speed: f64,
    /// Gap kept between ball surface and wall after contact
    pub contact_epsilon: f64,
    /// Radius of circle obstacles and holes
    pub circle_radius: f64,
    /// Shot input to velocity conversion factor
    pub shot_scale: f64,
    pub max_shot_speed: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            tile_size: 100.0,
            ball_radius: 40.0,
            friction: 0.983,
            gravel_friction: 0.8,
            gravel_heavy_friction: 0.6,
            slope_gravity: 0.75,
            restitution: 0.95,
            stop_speed: 1.0,
            contact_epsilon: 0.1,
            circle_radius: 24.0,
            shot_scale: 0.1,
            max_shot_speed: 120.0,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            return Err("tile_size must be finite and > 0".to_string());
        }
        if !self.ball_radius.is_finite() || self.ball_radius <= 0.0 {
            return Err("ball_radius must be finite and > 0".to_string());
        }
        if self.ball_radius >= self.tile_size {
            return Err("ball_radius must be smaller than tile_size".to_string());
        }
        for (name, value) in [
            ("friction", self.friction),
            ("gravel_friction", self.gravel_friction),
            ("gravel_heavy_friction", self.gravel_heavy_friction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(format!("{} must be in (0, 1]", name));
            }
        }
        if !(self.restitution > 0.0 && self.restitution < 1.0) {
            return Err("restitution must be in (0, 1)".to_string());
        }
        if !self.stop_speed.is_finite() || self.stop_speed <= 0.0 {
            return Err("stop_speed must be finite and > 0".to_string());
        }
        if !self.contact_epsilon.is_finite() || self.contact_epsilon <= 0.0 {
            return Err("contact_epsilon must be finite and > 0".to_string());
        }
        if !self.slope_gravity.is_finite() || self.slope_gravity < 0.0 {
            return Err("slope_gravity must be finite and >= 0".to_string());
        }
        if !self.circle_radius.is_finite()
            || self.circle_radius <= 0.0
            || self.circle_radius > self.tile_size / 2.0
        {
            return Err("circle_radius must be in (0, tile_size / 2]".to_string());
        }
        if !self.max_shot_speed.is_finite() || self.max_shot_speed < self.stop_speed {
            return Err("max_shot_speed must be finite and >= stop_speed".to_string());
        }
        Ok(())
    }
}
