//! Match state machine. Owned by exactly one game loop task; nothing in here
//! blocks or touches a channel. Outgoing messages pile up in an outbox that
//! the loop drains after every mutation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::auth::Credentials;
use crate::config::PhysicsConfig;
use crate::engine::{self, Ball, Effect};
use crate::game_map::GameMap;
use crate::mesh::ColliderMesh;
use crate::player::{Player, PlayerIds};
use crate::protocol::{
    effect_kind, ClientMsg, EffectMsg, EndMapMsg, ErrorMsg, InitMsg, JoinMsg, Outbound,
    PlayerStatus, ReconnectMsg, SaveDemoMapMsg, ServerMsg, StartMapMsg, StatusChangeMsg, Target,
    UpdateMsg,
};
use crate::store::MapStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Lobby,
    /// Map preview: no readiness, every hole-in offers to save the map
    Demo,
    Game,
    End,
    Stopped,
}

impl MatchStatus {
    pub fn is_running(self) -> bool {
        matches!(self, MatchStatus::Demo | MatchStatus::Game)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The match loop has exited
    Closed,
    NotJoinable,
    UnknownPlayer(u32),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::Closed => write!(f, "game is no longer running"),
            GameError::NotJoinable => write!(f, "game is not joinable"),
            GameError::UnknownPlayer(id) => write!(f, "no player {} in this game", id),
        }
    }
}

impl std::error::Error for GameError {}

/// A finished hole waiting to be added to the map's statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedPlay {
    pub map_id: String,
    pub shots: u32,
}

/// Services a match relies on but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub player_ids: PlayerIds,
    pub store: Arc<dyn MapStore>,
    pub credentials: Arc<dyn Credentials>,
}

pub struct MatchState {
    id: String,
    map: GameMap,
    mesh: ColliderMesh,
    physics: PhysicsConfig,
    is_demo: bool,
    status: MatchStatus,
    players: BTreeMap<u32, Player>,
    last_activity: Instant,
    collaborators: Collaborators,
    outbox: Vec<Outbound>,
    plays: Vec<FinishedPlay>,
}

impl MatchState {
    pub fn new(
        id: impl Into<String>,
        map: GameMap,
        is_demo: bool,
        physics: PhysicsConfig,
        collaborators: Collaborators,
    ) -> Self {
        let mesh = ColliderMesh::build(&map, physics.tile_size, physics.circle_radius);
        Self {
            id: id.into(),
            map,
            mesh,
            physics,
            is_demo,
            status: MatchStatus::Lobby,
            players: BTreeMap::new(),
            last_activity: Instant::now(),
            collaborators,
            outbox: Vec::new(),
            plays: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn is_demo(&self) -> bool {
        self.is_demo
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_joinable(&self) -> bool {
        matches!(self.status, MatchStatus::Lobby | MatchStatus::Demo)
    }

    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Plays finished since the last call, for the loop to hand to the store.
    pub fn drain_plays(&mut self) -> Vec<FinishedPlay> {
        std::mem::take(&mut self.plays)
    }

    pub fn store(&self) -> Arc<dyn MapStore> {
        self.collaborators.store.clone()
    }

    fn send(&mut self, target: Target, msg: ServerMsg) {
        self.outbox.push(Outbound { target, msg });
    }

    fn send_status(&mut self, player_id: u32, status: PlayerStatus) {
        self.send(
            Target::All,
            ServerMsg::StatusChange(StatusChangeMsg { player_id, status }),
        );
    }

    fn send_error(&mut self, player_id: u32, value: &str) {
        self.send(
            Target::Player(player_id),
            ServerMsg::Error(ErrorMsg {
                value: value.to_string(),
            }),
        );
    }

    pub fn add_player(&mut self, name: &str) -> Result<u32, GameError> {
        if !self.is_joinable() {
            return Err(GameError::NotJoinable);
        }
        self.touch();

        let id = self.collaborators.player_ids.next();
        let mut player = Player::new(id, name, self.map.start_location(self.physics.tile_size));
        if self.status == MatchStatus::Demo {
            player.status = PlayerStatus::HasTurn;
        }
        let name = player.name.clone();
        self.players.insert(id, player);

        let token = self.collaborators.credentials.issue_player_token(id, &self.id);
        self.send(
            Target::Player(id),
            ServerMsg::Init(InitMsg {
                player_id: id,
                name: name.clone(),
                token: token.as_deref().unwrap_or_default().to_string(),
            }),
        );
        if let Err(e) = token {
            tracing::warn!(
                game = %self.id,
                player_id = id,
                "Could not issue reconnect token: {}",
                e
            );
            self.send_error(id, "Reconnecting will not be possible");
        }
        self.send(Target::All, ServerMsg::Join(JoinMsg { player_id: id, name }));
        tracing::info!(game = %self.id, player_id = id, "Player joined");

        match self.status {
            MatchStatus::Lobby if self.is_demo => self.start_map(),
            MatchStatus::Demo => {
                self.send(
                    Target::Player(id),
                    ServerMsg::StartMap(StartMapMsg {
                        game_map: self.map.to_dto(),
                        is_demo: true,
                    }),
                );
                self.send_status(id, PlayerStatus::HasTurn);
                self.send_update();
            }
            _ => {}
        }
        Ok(id)
    }

    /// Mark a known player connected again and tell them where things stand.
    /// Ball, score and turn are left as they were.
    pub fn reconnect_player(&mut self, id: u32) -> Result<(), GameError> {
        let player = self.players.get_mut(&id).ok_or(GameError::UnknownPlayer(id))?;
        player.connected = true;
        let msg = ServerMsg::Reconnect(ReconnectMsg {
            game_map: self.map.to_dto(),
            is_demo: self.is_demo,
            player_id: id,
            name: player.name.clone(),
            is_turn: player.has_turn(),
        });
        self.touch();
        self.send(Target::Player(id), msg);
        if self.status.is_running() {
            self.send_update();
        }
        tracing::info!(game = %self.id, player_id = id, "Player reconnected");
        Ok(())
    }

    pub fn disconnect_player(&mut self, id: u32) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.connected = false;
        tracing::info!(game = %self.id, player_id = id, "Player disconnected");
        match self.status {
            MatchStatus::Lobby => self.start_if_all_ready(),
            MatchStatus::Game => self.end_if_all_in_hole(),
            _ => {}
        }
    }

    pub fn handle_message(&mut self, id: u32, msg: ClientMsg) {
        if !self.players.contains_key(&id) {
            return;
        }
        self.touch();
        match msg {
            ClientMsg::Shot { x, y } => self.shot(id, x, y),
            ClientMsg::IsReady { value } => self.set_ready(id, value),
        }
    }

    fn set_ready(&mut self, id: u32, ready: bool) {
        if self.status != MatchStatus::Lobby {
            tracing::debug!(
                game = %self.id,
                player_id = id,
                "Ignoring readiness outside the lobby"
            );
            return;
        }
        let status = if ready {
            PlayerStatus::Ready
        } else {
            PlayerStatus::Waiting
        };
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.status == status {
            return;
        }
        player.status = status;
        self.send_status(id, status);
        self.start_if_all_ready();
    }

    fn start_if_all_ready(&mut self) {
        if self.status != MatchStatus::Lobby || self.is_demo {
            return;
        }
        let mut connected = self.players.values().filter(|p| p.connected).peekable();
        if connected.peek().is_none() {
            return;
        }
        if connected.all(|p| p.status == PlayerStatus::Ready) {
            self.start_map();
        }
    }

    fn start_map(&mut self) {
        self.status = if self.is_demo {
            MatchStatus::Demo
        } else {
            MatchStatus::Game
        };
        let start = self.map.start_location(self.physics.tile_size);
        for player in self.players.values_mut() {
            player.reset_to(start);
            player.status = PlayerStatus::HasTurn;
        }
        tracing::info!(
            game = %self.id,
            status = ?self.status,
            players = self.players.len(),
            "Map started"
        );

        self.send(
            Target::All,
            ServerMsg::StartMap(StartMapMsg {
                game_map: self.map.to_dto(),
                is_demo: self.is_demo,
            }),
        );
        let ids: Vec<u32> = self.players.keys().copied().collect();
        for id in ids {
            self.send_status(id, PlayerStatus::HasTurn);
        }
        self.send_update();
    }

    fn shot(&mut self, id: u32, x: f64, y: f64) {
        if !self.status.is_running() {
            tracing::debug!(game = %self.id, player_id = id, "Shot while not running");
            return;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if player.shoot(x, y, &self.physics) {
            self.send_status(id, PlayerStatus::IsMoving);
        } else {
            tracing::debug!(game = %self.id, player_id = id, "Shot rejected");
        }
    }

    /// One physics step for every moving ball.
    pub fn tick(&mut self) {
        if !self.status.is_running() {
            return;
        }
        let moving: Vec<u32> = self
            .players
            .values()
            .filter(|p| p.status == PlayerStatus::IsMoving)
            .map(|p| p.id)
            .collect();
        if moving.is_empty() {
            return;
        }

        let mut holed = false;
        for id in moving {
            let Some(player) = self.players.get(&id) else {
                continue;
            };
            let (ball, effect) = engine::step(player.ball, &self.map, &self.mesh, &self.physics);
            match effect {
                Effect::Hole => {
                    self.hole_in(id);
                    holed = true;
                }
                Effect::Water => self.water(id),
                Effect::Collision | Effect::None => self.moved(id, ball),
            }
            if let Some(value) = effect_kind(effect) {
                self.send(
                    Target::All,
                    ServerMsg::Effect(EffectMsg {
                        value,
                        player_id: id,
                    }),
                );
            }
        }

        self.send_update();
        if holed {
            self.end_if_all_in_hole();
        }
    }

    fn moved(&mut self, id: u32, ball: Ball) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.ball = ball;
        if ball.is_at_rest() {
            player.status = PlayerStatus::HasTurn;
            self.send_status(id, PlayerStatus::HasTurn);
        }
    }

    fn water(&mut self, id: u32) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.ball = Ball::at_rest(player.prev_ball.pos);
        player.status = PlayerStatus::HasTurn;
        self.send_status(id, PlayerStatus::HasTurn);
    }

    fn hole_in(&mut self, id: u32) {
        let start = self.map.start_location(self.physics.tile_size);
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let shots = player.shot_count;
        player.reset_to(start);

        if self.status == MatchStatus::Demo {
            player.status = PlayerStatus::HasTurn;
            let map_hash = self.map.hash();
            match self.collaborators.credentials.issue_save_token(&map_hash) {
                Ok(token) => self.send(
                    Target::Player(id),
                    ServerMsg::SaveDemoMap(SaveDemoMapMsg { token, map_hash }),
                ),
                Err(e) => {
                    tracing::warn!(
                        game = %self.id,
                        player_id = id,
                        "Could not issue save token: {}",
                        e
                    );
                    self.send_error(id, "Could not prepare the map for saving");
                }
            }
            self.send_status(id, PlayerStatus::HasTurn);
            return;
        }

        player.scores.push(shots);
        player.status = PlayerStatus::InHole;
        tracing::info!(game = %self.id, player_id = id, shots, "Hole in");
        self.plays.push(FinishedPlay {
            map_id: self.map.id.clone(),
            shots,
        });
        self.send_status(id, PlayerStatus::InHole);
    }

    fn end_if_all_in_hole(&mut self) {
        if self.status != MatchStatus::Game {
            return;
        }
        let mut connected = self.players.values().filter(|p| p.connected).peekable();
        if connected.peek().is_none() {
            return;
        }
        if !connected.all(|p| p.status == PlayerStatus::InHole) {
            return;
        }
        self.status = MatchStatus::End;
        let scores = self
            .players
            .values()
            .map(|p| (p.id.to_string(), p.scores.clone()))
            .collect();
        self.send(
            Target::All,
            ServerMsg::EndMap(EndMapMsg {
                is_game_over: true,
                scores,
            }),
        );
        tracing::info!(game = %self.id, "Map finished");
    }

    fn send_update(&mut self) {
        let player_states = self.players.values().map(Player::to_wire).collect();
        self.send(Target::All, ServerMsg::Update(UpdateMsg { player_states }));
    }

    pub fn stop(&mut self) {
        if self.status != MatchStatus::Stopped {
            tracing::info!(game = %self.id, "Game stopped");
        }
        self.status = MatchStatus::Stopped;
    }

    pub fn pretty_string(&self) -> String {
        format!(
            "game {} status={:?} demo={} players={} connected={} idle_for={:.1}s",
            self.id,
            self.status,
            self.is_demo,
            self.players.len(),
            self.players.values().filter(|p| p.connected).count(),
            Instant::now()
                .saturating_duration_since(self.last_activity)
                .as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, TokenStore};
    use crate::protocol::EffectKind;
    use crate::store::MemoryMapStore;
    use minigolf_shared::map::{GroundType, Rotation, StructureType};

    fn collaborators() -> Collaborators {
        Collaborators {
            player_ids: PlayerIds::new(),
            store: Arc::new(MemoryMapStore::new()),
            credentials: Arc::new(TokenStore::new(Some(9))),
        }
    }

    fn lobby(map: GameMap) -> MatchState {
        MatchState::new("ABCDE", map, false, PhysicsConfig::default(), collaborators())
    }

    /// Default course with one structure dropped in front of the start.
    fn course_with(kind: StructureType) -> GameMap {
        GameMap::generate("m").with_structure(4, 12, kind, Rotation::North)
    }

    fn count(out: &[Outbound], pred: impl Fn(&ServerMsg) -> bool) -> usize {
        out.iter().filter(|o| pred(&o.msg)).count()
    }

    fn started(map: GameMap, players: usize) -> (MatchState, Vec<u32>) {
        let mut state = lobby(map);
        let ids: Vec<u32> = (0..players)
            .map(|i| state.add_player(&format!("p{}", i)).unwrap())
            .collect();
        for &id in &ids {
            state.handle_message(id, ClientMsg::IsReady { value: true });
        }
        assert_eq!(state.status(), MatchStatus::Game);
        state.drain_outbox();
        (state, ids)
    }

    #[test]
    fn join_sends_init_to_player_then_join_to_all() {
        let mut state = lobby(GameMap::generate("m"));
        let id = state.add_player("alice").unwrap();
        let out = state.drain_outbox();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].target, Target::Player(id));
        match &out[0].msg {
            ServerMsg::Init(init) => {
                assert_eq!(init.player_id, id);
                assert_eq!(init.name, "alice");
                assert!(!init.token.is_empty());
            }
            other => panic!("Expected Init, got {:?}", other),
        }
        assert_eq!(out[1].target, Target::All);
        assert!(matches!(out[1].msg, ServerMsg::Join(_)));
        assert_eq!(state.status(), MatchStatus::Lobby);
    }

    #[test]
    fn game_starts_once_everyone_is_ready() {
        let mut state = lobby(GameMap::generate("m"));
        let a = state.add_player("a").unwrap();
        let b = state.add_player("b").unwrap();
        state.drain_outbox();

        state.handle_message(a, ClientMsg::IsReady { value: true });
        assert_eq!(state.status(), MatchStatus::Lobby);
        let out = state.drain_outbox();
        assert_eq!(count(&out, |m| matches!(m, ServerMsg::StartMap(_))), 0);

        state.handle_message(b, ClientMsg::IsReady { value: true });
        assert_eq!(state.status(), MatchStatus::Game);
        let out = state.drain_outbox();
        assert_eq!(count(&out, |m| matches!(m, ServerMsg::StartMap(_))), 1);
        assert!(out
            .iter()
            .any(|o| matches!(o.msg, ServerMsg::StartMap(_)) && o.target == Target::All));
        assert!(state.player(a).unwrap().has_turn());
        assert!(state.player(b).unwrap().has_turn());

        // Late readiness does nothing
        state.handle_message(b, ClientMsg::IsReady { value: true });
        assert_eq!(count(&state.drain_outbox(), |m| matches!(m, ServerMsg::StartMap(_))), 0);
    }

    #[test]
    fn disconnected_player_does_not_block_start() {
        let mut state = lobby(GameMap::generate("m"));
        let a = state.add_player("a").unwrap();
        let b = state.add_player("b").unwrap();
        state.handle_message(a, ClientMsg::IsReady { value: true });
        assert_eq!(state.status(), MatchStatus::Lobby);
        state.disconnect_player(b);
        assert_eq!(state.status(), MatchStatus::Game);
        // The absent player is still part of the match
        assert!(state.player(b).is_some());
    }

    #[test]
    fn game_in_progress_is_not_joinable() {
        let (mut state, _) = started(GameMap::generate("m"), 1);
        assert!(!state.is_joinable());
        assert_eq!(state.add_player("late"), Err(GameError::NotJoinable));
    }

    #[test]
    fn demo_starts_on_first_join() {
        let map = GameMap::generate("m");
        let mut state = MatchState::new("D", map, true, PhysicsConfig::default(), collaborators());
        let a = state.add_player("a").unwrap();
        assert_eq!(state.status(), MatchStatus::Demo);
        assert!(state.player(a).unwrap().has_turn());
        let out = state.drain_outbox();
        assert_eq!(count(&out, |m| matches!(m, ServerMsg::StartMap(s) if s.is_demo)), 1);

        // A second player gets the map directly
        let b = state.add_player("b").unwrap();
        let out = state.drain_outbox();
        assert!(out
            .iter()
            .any(|o| o.target == Target::Player(b) && matches!(o.msg, ServerMsg::StartMap(_))));
        assert!(state.player(b).unwrap().has_turn());
    }

    #[test]
    fn shots_are_ignored_in_the_lobby() {
        let mut state = lobby(GameMap::generate("m"));
        let a = state.add_player("a").unwrap();
        state.handle_message(a, ClientMsg::Shot { x: 100.0, y: 0.0 });
        assert_eq!(state.player(a).unwrap().shot_count, 0);
    }

    #[test]
    fn ball_rolls_to_rest_and_turn_returns() {
        let (mut state, ids) = started(GameMap::generate("m"), 1);
        let a = ids[0];
        state.handle_message(a, ClientMsg::Shot { x: 0.0, y: -100.0 });
        assert_eq!(state.player(a).unwrap().status, PlayerStatus::IsMoving);
        assert!(!state.player(a).unwrap().has_turn());

        for _ in 0..600 {
            state.tick();
            if state.player(a).unwrap().has_turn() {
                break;
            }
        }
        let player = state.player(a).unwrap();
        assert!(player.has_turn());
        assert!(player.ball.is_at_rest());
        assert_eq!(player.shot_count, 1);
        let out = state.drain_outbox();
        assert!(count(&out, |m| matches!(m, ServerMsg::Update(_))) > 0);
    }

    #[test]
    fn water_puts_ball_back() {
        let map = GameMap::generate("m").with_ground(3, 12, GroundType::Water, Rotation::North);
        let (mut state, ids) = started(map, 1);
        let a = ids[0];
        let start = state.player(a).unwrap().ball.pos;
        state.handle_message(a, ClientMsg::Shot { x: 300.0, y: 0.0 });

        for _ in 0..60 {
            state.tick();
            if state.player(a).unwrap().has_turn() {
                break;
            }
        }
        let player = state.player(a).unwrap();
        assert_eq!(player.ball.pos, start);
        assert!(player.ball.is_at_rest());
        let out = state.drain_outbox();
        assert_eq!(
            count(&out, |m| matches!(m, ServerMsg::Effect(e) if e.value == EffectKind::Water)),
            1
        );
    }

    #[test]
    fn hole_in_ends_the_map() {
        let map = course_with(StructureType::Hole);
        let (mut state, ids) = started(map, 1);
        let a = ids[0];
        state.handle_message(a, ClientMsg::Shot { x: 300.0, y: 0.0 });

        for _ in 0..60 {
            state.tick();
            if state.status() == MatchStatus::End {
                break;
            }
        }
        assert_eq!(state.status(), MatchStatus::End);
        let player = state.player(a).unwrap();
        assert_eq!(player.scores, vec![1]);
        assert_eq!(player.status, PlayerStatus::InHole);
        let out = state.drain_outbox();
        let end = out.iter().find_map(|o| match &o.msg {
            ServerMsg::EndMap(end) => Some(end.clone()),
            _ => None,
        });
        let end = end.expect("END_MAP");
        assert!(end.is_game_over);
        assert_eq!(end.scores.get(&a.to_string()), Some(&vec![1]));
        assert_eq!(
            state.drain_plays(),
            vec![FinishedPlay {
                map_id: "m".to_string(),
                shots: 1
            }]
        );
        // Ticks after the end do nothing
        state.tick();
        assert!(state.drain_outbox().is_empty());
    }

    #[test]
    fn demo_hole_offers_map_save() {
        let map = course_with(StructureType::Hole);
        let mut state = MatchState::new("D", map, true, PhysicsConfig::default(), collaborators());
        let a = state.add_player("a").unwrap();
        state.drain_outbox();
        state.handle_message(a, ClientMsg::Shot { x: 300.0, y: 0.0 });

        let mut saved = None;
        for _ in 0..60 {
            state.tick();
            for o in state.drain_outbox() {
                if let ServerMsg::SaveDemoMap(msg) = o.msg {
                    assert_eq!(o.target, Target::Player(a));
                    saved = Some(msg);
                }
            }
            if saved.is_some() {
                break;
            }
        }
        let saved = saved.expect("SAVE_DEMO_MAP");
        assert_eq!(saved.map_hash, state.map().hash());
        assert_eq!(state.status(), MatchStatus::Demo);
        let player = state.player(a).unwrap();
        assert!(player.has_turn());
        assert_eq!(player.ball.pos, state.map().start_location(100.0));
    }

    #[test]
    fn reconnect_keeps_player_state() {
        let (mut state, ids) = started(GameMap::generate("m"), 1);
        let a = ids[0];
        state.handle_message(a, ClientMsg::Shot { x: 0.0, y: 200.0 });
        state.tick();
        let before = state.player(a).unwrap().clone();
        state.disconnect_player(a);
        state.drain_outbox();

        state.reconnect_player(a).unwrap();
        let after = state.player(a).unwrap();
        assert!(after.connected);
        assert_eq!(after.ball, before.ball);
        assert_eq!(after.shot_count, before.shot_count);
        assert_eq!(after.status, before.status);
        let out = state.drain_outbox();
        match &out[0].msg {
            ServerMsg::Reconnect(r) => {
                assert_eq!(r.player_id, a);
                assert!(!r.is_turn);
            }
            other => panic!("Expected Reconnect, got {:?}", other),
        }
        assert_eq!(state.reconnect_player(999), Err(GameError::UnknownPlayer(999)));
    }

    #[test]
    fn idleness_follows_activity() {
        let mut state = lobby(GameMap::generate("m"));
        let now = Instant::now();
        assert!(!state.is_idle(now, Duration::from_secs(60)));
        assert!(state.is_idle(now + Duration::from_secs(61), Duration::from_secs(60)));
        state.touch();
        state.stop();
        assert_eq!(state.status(), MatchStatus::Stopped);
        assert!(!state.is_joinable());
        assert!(state.pretty_string().contains("Stopped"));
    }

    struct Offline;

    impl Credentials for Offline {
        fn issue_player_token(&self, _: u32, _: &str) -> Result<String, AuthError> {
            Err(AuthError::Unavailable)
        }
        fn validate_player_token(&self, _: &str, _: &str) -> Result<u32, AuthError> {
            Err(AuthError::Unavailable)
        }
        fn issue_save_token(&self, _: &str) -> Result<String, AuthError> {
            Err(AuthError::Unavailable)
        }
        fn validate_save_token(&self, _: &str, _: &str) -> Result<(), AuthError> {
            Err(AuthError::Unavailable)
        }
    }

    #[test]
    fn credential_failures_reach_the_player_as_errors() {
        let map = course_with(StructureType::Hole);
        let collaborators = Collaborators {
            credentials: Arc::new(Offline),
            ..collaborators()
        };
        let mut state = MatchState::new("D", map, true, PhysicsConfig::default(), collaborators);
        let a = state.add_player("a").unwrap();
        let out = state.drain_outbox();
        match &out[0].msg {
            ServerMsg::Init(init) => assert!(init.token.is_empty()),
            other => panic!("Expected Init, got {:?}", other),
        }
        assert_eq!(count(&out, |m| matches!(m, ServerMsg::Error(_))), 1);

        // Hole-in still resets the ball even though the save offer fails
        state.handle_message(a, ClientMsg::Shot { x: 300.0, y: 0.0 });
        let mut errors = 0;
        for _ in 0..60 {
            state.tick();
            errors += count(&state.drain_outbox(), |m| matches!(m, ServerMsg::Error(_)));
            if errors > 0 {
                break;
            }
        }
        assert_eq!(errors, 1);
        assert!(state.player(a).unwrap().has_turn());
        assert_eq!(state.status(), MatchStatus::Demo);
    }

    #[test]
    fn bounce_reports_collision_effect() {
        let map = course_with(StructureType::Wall);
        let (mut state, ids) = started(map, 1);
        let a = ids[0];
        state.handle_message(a, ClientMsg::Shot { x: 500.0, y: 0.0 });
        let mut collisions = 0;
        for _ in 0..30 {
            state.tick();
            collisions += count(&state.drain_outbox(), |m| {
                matches!(m, ServerMsg::Effect(e) if e.value == EffectKind::Collision)
            });
        }
        assert!(collisions >= 1);
        // Never closer to the wall face at x = 400 than one radius
        let x = state.player(a).unwrap().ball.pos.x;
        assert!(x < 360.5 && x > 139.5, "ball at {}", x);
    }
}
