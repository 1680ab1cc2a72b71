use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::game_loop::{spawn_game, GameHandle, LoopConfig};
use crate::game_map::GameMap;
use crate::state::{Collaborators, MatchState};
use crate::store::StoreError;

const GAME_ID_LEN: usize = 5;

/// Id-keyed set of running matches. Clones share the same set.
#[derive(Clone)]
pub struct GameRegistry {
    games: Arc<RwLock<HashMap<String, GameHandle>>>,
    collaborators: Collaborators,
    config: Arc<ServerConfig>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl GameRegistry {
    pub fn new(config: ServerConfig, collaborators: Collaborators) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            games: Arc::new(RwLock::new(HashMap::new())),
            collaborators,
            config: Arc::new(config),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick: self.config.tick_duration(),
            idle_timeout: self.config.idle_timeout(),
            outbound_capacity: self.config.outbound_capacity,
        }
    }

    /// Five random uppercase letters.
    fn random_id(&self) -> String {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..GAME_ID_LEN)
            .map(|_| char::from(b'A' + rng.gen_range(0..26u8)))
            .collect()
    }

    fn spawn(&self, id: &str, map: GameMap, is_demo: bool) -> GameHandle {
        let state = MatchState::new(
            id,
            map,
            is_demo,
            self.config.physics,
            self.collaborators.clone(),
        );
        tracing::info!(game = %id, map = %state.map().id, is_demo, "Game created");
        spawn_game(state, self.loop_config())
    }

    /// New match under a fresh random id.
    pub async fn create(&self, map: GameMap, is_demo: bool) -> GameHandle {
        let mut games = self.games.write().await;
        let id = loop {
            let candidate = self.random_id();
            if !games.contains_key(&candidate) {
                break candidate;
            }
        };
        let handle = self.spawn(&id, map, is_demo);
        games.insert(id, handle.clone());
        handle
    }

    /// New match on a stored map.
    pub async fn create_from_stored(
        &self,
        map_id: &str,
        is_demo: bool,
    ) -> Result<GameHandle, StoreError> {
        let dto = self.collaborators.store.load(map_id)?;
        let mut map = GameMap::from_dto(&dto)?;
        map.id = map_id.to_string();
        Ok(self.create(map, is_demo).await)
    }

    pub async fn get(&self, id: &str) -> Option<GameHandle> {
        let games = self.games.read().await;
        games.get(id).filter(|g| !g.is_closed()).cloned()
    }

    /// The match with this id, or a fresh lobby on a generated course. `None`
    /// when the id is unknown and `max_games` matches are already live.
    pub async fn get_or_create(&self, id: &str) -> Option<GameHandle> {
        if let Some(handle) = self.get(id).await {
            return Some(handle);
        }
        let mut games = self.games.write().await;
        // Another task may have won the race
        if let Some(handle) = games.get(id).filter(|g| !g.is_closed()) {
            return Some(handle.clone());
        }
        games.retain(|_, g| !g.is_closed());
        if games.len() >= self.config.max_games {
            tracing::warn!(
                game = %id,
                live = games.len(),
                "Refusing to create game: limit reached"
            );
            return None;
        }
        let handle = self.spawn(id, GameMap::generate(format!("generated-{}", id)), false);
        games.insert(id.to_string(), handle.clone());
        Some(handle)
    }

    pub async fn remove(&self, id: &str) -> Option<GameHandle> {
        self.games.write().await.remove(id)
    }

    /// Remove `handle`'s entry unless its id has since been taken by another match.
    async fn remove_exact(&self, handle: &GameHandle) -> bool {
        let mut games = self.games.write().await;
        if games.get(handle.id()).is_some_and(|g| g.same_game(handle)) {
            games.remove(handle.id());
            true
        } else {
            false
        }
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }

    /// Stop and remove every idle match. Returns the removed ids.
    pub async fn sweep_idle(&self) -> Vec<String> {
        let snapshot: Vec<GameHandle> = self.games.read().await.values().cloned().collect();
        let mut removed = Vec::new();
        for handle in snapshot {
            if !handle.is_idle().await {
                continue;
            }
            if let Ok(summary) = handle.pretty_string().await {
                tracing::info!("Reaping idle {}", summary);
            }
            handle.stop().await;
            if self.remove_exact(&handle).await {
                removed.push(handle.id().to_string());
            }
        }
        removed
    }

    /// Sweep on `config.idle_sweep_secs` until the task is dropped.
    pub async fn run_idle_sweep(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.idle_sweep_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let removed = self.sweep_idle().await;
            if !removed.is_empty() {
                tracing::info!(
                    "Idle sweep removed {} game(s), {} left",
                    removed.len(),
                    self.len().await
                );
            }
        }
    }
}
