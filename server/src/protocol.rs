//! Server-side view of the wire protocol: addressing of outbound messages and
//! conversions from engine types.

use std::sync::Arc;

pub use minigolf_shared::protocol::*;

use crate::engine::Effect;

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Player(u32),
}

impl Target {
    pub fn includes(self, player_id: u32) -> bool {
        match self {
            Target::All => true,
            Target::Player(id) => id == player_id,
        }
    }
}

/// A message queued by the match state, not yet encoded.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Target,
    pub msg: ServerMsg,
}

/// An encoded message on the match broadcast channel. Every write pump sees
/// every frame and keeps the ones addressed to its player.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub target: Target,
    pub json: Arc<str>,
}

impl OutboundFrame {
    pub fn encode(out: &Outbound) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(&out.msg)?;
        Ok(Self {
            target: out.target,
            json: Arc::from(json),
        })
    }
}

/// Wire name of an engine effect; `Effect::None` is never sent.
pub fn effect_kind(effect: Effect) -> Option<EffectKind> {
    match effect {
        Effect::None => None,
        Effect::Collision => Some(EffectKind::Collision),
        Effect::Hole => Some(EffectKind::Hole),
        Effect::Water => Some(EffectKind::Water),
    }
}

/// Round to 2 decimal places; positions are in world units so this is plenty
/// and keeps UPDATE frames small.
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
