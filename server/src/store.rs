//! Map persistence and play statistics.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use minigolf_shared::map::GameMapDto;
use serde::{Deserialize, Serialize};

use crate::game_map::{GameMap, MapError};

#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    InvalidMap(MapError),
    Io(std::io::Error),
    Json(serde_json::Error),
    Poisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "map '{}' not found", id),
            StoreError::InvalidMap(e) => write!(f, "invalid map: {}", e),
            StoreError::Io(e) => write!(f, "io error: {}", e),
            StoreError::Json(e) => write!(f, "json error: {}", e),
            StoreError::Poisoned => write!(f, "map store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::InvalidMap(e) => Some(e),
            StoreError::Io(e) => Some(e),
            StoreError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Json(e)
    }
}

impl From<MapError> for StoreError {
    fn from(e: MapError) -> Self {
        StoreError::InvalidMap(e)
    }
}

/// Aggregate score statistics of one map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStats {
    pub play_count: u64,
    pub shot_sum: u64,
}

impl MapStats {
    pub fn average(&self) -> Option<f64> {
        (self.play_count > 0).then(|| self.shot_sum as f64 / self.play_count as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMap {
    map: GameMapDto,
    #[serde(default)]
    stats: MapStats,
}

pub trait MapStore: Send + Sync {
    fn load(&self, id: &str) -> Result<GameMapDto, StoreError>;
    /// Persist a map under its content hash and return that id.
    fn save(&self, map: &GameMapDto) -> Result<String, StoreError>;
    /// Add one finished play with `shots` strokes to the map's statistics.
    fn record_play(&self, map_id: &str, shots: u32) -> Result<(), StoreError>;
    fn stats(&self, map_id: &str) -> Result<MapStats, StoreError>;
}

/// Validates the map and rewrites its id to the content hash.
fn prepare(map: &GameMapDto) -> Result<StoredMap, StoreError> {
    let mut parsed = GameMap::from_dto(map)?;
    parsed.id = parsed.hash();
    Ok(StoredMap {
        map: parsed.to_dto(),
        stats: MapStats::default(),
    })
}

#[derive(Default)]
pub struct MemoryMapStore {
    maps: Mutex<HashMap<String, StoredMap>>,
}

impl MemoryMapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapStore for MemoryMapStore {
    fn load(&self, id: &str) -> Result<GameMapDto, StoreError> {
        let maps = self.maps.lock().map_err(|_| StoreError::Poisoned)?;
        maps.get(id)
            .map(|m| m.map.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn save(&self, map: &GameMapDto) -> Result<String, StoreError> {
        let stored = prepare(map)?;
        let id = stored.map.id.clone();
        let mut maps = self.maps.lock().map_err(|_| StoreError::Poisoned)?;
        maps.entry(id.clone()).or_insert(stored);
        Ok(id)
    }

    fn record_play(&self, map_id: &str, shots: u32) -> Result<(), StoreError> {
        let mut maps = self.maps.lock().map_err(|_| StoreError::Poisoned)?;
        let stored = maps
            .get_mut(map_id)
            .ok_or_else(|| StoreError::NotFound(map_id.to_string()))?;
        stored.stats.play_count += 1;
        stored.stats.shot_sum += shots as u64;
        Ok(())
    }

    fn stats(&self, map_id: &str) -> Result<MapStats, StoreError> {
        let maps = self.maps.lock().map_err(|_| StoreError::Poisoned)?;
        maps.get(map_id)
            .map(|m| m.stats)
            .ok_or_else(|| StoreError::NotFound(map_id.to_string()))
    }
}

/// One `<id>.json` file per map.
pub struct FileMapStore {
    dir: PathBuf,
    /// Serializes read-modify-write of stats
    write_lock: Mutex<()>,
}

impl FileMapStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn read(&self, id: &str) -> Result<StoredMap, StoreError> {
        let path = self.path_for(id)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, id: &str, stored: &StoredMap) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(stored)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl MapStore for FileMapStore {
    fn load(&self, id: &str) -> Result<GameMapDto, StoreError> {
        Ok(self.read(id)?.map)
    }

    fn save(&self, map: &GameMapDto) -> Result<String, StoreError> {
        let stored = prepare(map)?;
        let id = stored.map.id.clone();
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        match self.read(&id) {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => self.write(&id, &stored)?,
            Err(e) => return Err(e),
        }
        Ok(id)
    }

    fn record_play(&self, map_id: &str, shots: u32) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stored = self.read(map_id)?;
        stored.stats.play_count += 1;
        stored.stats.shot_sum += shots as u64;
        self.write(map_id, &stored)
    }

    fn stats(&self, map_id: &str) -> Result<MapStats, StoreError> {
        Ok(self.read(map_id)?.stats)
    }
}
