use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::map::GameMapDto;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMsg {
    Init(InitMsg),
    Join(JoinMsg),
    Reconnect(ReconnectMsg),
    StartMap(StartMapMsg),
    EndMap(EndMapMsg),
    StatusChange(StatusChangeMsg),
    Update(UpdateMsg),
    Effect(EffectMsg),
    SaveDemoMap(SaveDemoMapMsg),
    Error(ErrorMsg),
}

/// Sent to a newly joined player only. `token` lets the player reconnect later.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct InitMsg {
    pub player_id: u32,
    pub name: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct JoinMsg {
    pub player_id: u32,
    pub name: String,
}

/// Everything a returning player needs: identity, current map and turn flag.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ReconnectMsg {
    pub game_map: GameMapDto,
    pub is_demo: bool,
    pub player_id: u32,
    pub name: String,
    pub is_turn: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StartMapMsg {
    pub game_map: GameMapDto,
    pub is_demo: bool,
}

/// Scores are keyed by player id as a string, one entry per finished map.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct EndMapMsg {
    pub is_game_over: bool,
    pub scores: BTreeMap<String, Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Waiting,
    Ready,
    HasTurn,
    IsMoving,
    InHole,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeMsg {
    pub player_id: u32,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateWire {
    pub id: u32,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub shot_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct UpdateMsg {
    pub player_states: Vec<PlayerStateWire>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectKind {
    Hole,
    Collision,
    Water,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct EffectMsg {
    pub value: EffectKind,
    pub player_id: u32,
}

/// Authorizes the client to persist the demo map it just completed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SaveDemoMapMsg {
    pub token: String,
    pub map_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct ErrorMsg {
    pub value: String,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMsg {
    Shot { x: f64, y: f64 },
    IsReady { value: bool },
}
