use std::fmt;
use std::io;

use minigolf_shared::map::{
    GameMapDto, GridPos, Ground, GroundType, Rotation, Structure, StructureType, TileDto,
    MAP_HEIGHT, MAP_WIDTH,
};

use crate::geometry::{vec2, Vector};

/// One grid cell of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub pos: GridPos,
    pub ground: Ground,
    pub structure: Structure,
}

impl Tile {
    /// World position of the tile's top-left corner.
    pub fn origin(&self, tile_size: f64) -> Vector {
        vec2(self.pos.x as f64 * tile_size, self.pos.y as f64 * tile_size)
    }

    /// World position of the tile's center.
    pub fn center(&self, tile_size: f64) -> Vector {
        self.origin(tile_size) + vec2(tile_size / 2.0, tile_size / 2.0)
    }

    /// Whether the tile touches the outer edge of the map.
    pub fn is_rim(&self) -> bool {
        is_border(self.pos.x, self.pos.y)
    }
}

fn is_border(x: u32, y: u32) -> bool {
    x == 0 || y == 0 || x == MAP_WIDTH - 1 || y == MAP_HEIGHT - 1
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    WrongWidth(usize),
    WrongHeight { column: usize, height: usize },
    MisplacedTile { expected: GridPos, found: GridPos },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::WrongWidth(w) => write!(f, "map has {} columns, expected {}", w, MAP_WIDTH),
            MapError::WrongHeight { column, height } => write!(
                f,
                "column {} has {} tiles, expected {}",
                column, height, MAP_HEIGHT
            ),
            MapError::MisplacedTile { expected, found } => write!(
                f,
                "tile at ({}, {}) claims position ({}, {})",
                expected.x, expected.y, found.x, found.y
            ),
        }
    }
}

impl std::error::Error for MapError {}

/// Fixed-size tile grid. Immutable once built; the `with_*` helpers consume the
/// map and are meant for construction only.
#[derive(Debug, Clone)]
pub struct GameMap {
    pub id: String,
    pub name: String,
    /// Column-major: `tiles[x][y]`
    tiles: Vec<Vec<Tile>>,
}

impl GameMap {
    /// Bordered course: wall rim, grass inside, start on the left, hole on the right.
    pub fn generate(id: impl Into<String>) -> Self {
        let tiles = (0..MAP_WIDTH)
            .map(|x| {
                (0..MAP_HEIGHT)
                    .map(|y| {
                        let pos = GridPos { x, y };
                        let kind = if is_border(x, y) {
                            StructureType::Wall
                        } else {
                            StructureType::None
                        };
                        Tile {
                            pos,
                            ground: Ground::default(),
                            structure: Structure {
                                kind,
                                rotation: Rotation::North,
                            },
                        }
                    })
                    .collect()
            })
            .collect();

        let mid = MAP_HEIGHT / 2;
        GameMap {
            id: id.into(),
            name: "Default course".to_string(),
            tiles,
        }
        .with_structure(2, mid, StructureType::Start, Rotation::North)
        .with_structure(MAP_WIDTH - 3, mid, StructureType::Hole, Rotation::North)
    }

    pub fn from_dto(dto: &GameMapDto) -> Result<Self, MapError> {
        if dto.tiles.len() != MAP_WIDTH as usize {
            return Err(MapError::WrongWidth(dto.tiles.len()));
        }
        let mut tiles = Vec::with_capacity(dto.tiles.len());
        for (x, column) in dto.tiles.iter().enumerate() {
            if column.len() != MAP_HEIGHT as usize {
                return Err(MapError::WrongHeight {
                    column: x,
                    height: column.len(),
                });
            }
            let mut col = Vec::with_capacity(column.len());
            for (y, tile) in column.iter().enumerate() {
                let expected = GridPos {
                    x: x as u32,
                    y: y as u32,
                };
                if tile.pos != expected {
                    return Err(MapError::MisplacedTile {
                        expected,
                        found: tile.pos,
                    });
                }
                col.push(Tile {
                    pos: tile.pos,
                    ground: tile.ground,
                    structure: tile.structure,
                });
            }
            tiles.push(col);
        }
        Ok(GameMap {
            id: dto.id.clone(),
            name: dto.name.clone(),
            tiles,
        })
    }

    pub fn to_dto(&self) -> GameMapDto {
        GameMapDto {
            id: self.id.clone(),
            name: self.name.clone(),
            tiles: self
                .tiles
                .iter()
                .map(|column| {
                    column
                        .iter()
                        .map(|t| TileDto {
                            pos: t.pos,
                            ground: t.ground,
                            structure: t.structure,
                        })
                        .collect()
                })
                .collect(),
        }
    }

    pub fn with_structure(
        mut self,
        x: u32,
        y: u32,
        kind: StructureType,
        rotation: Rotation,
    ) -> Self {
        if let Some(tile) = self.tile_mut(x, y) {
            tile.structure = Structure { kind, rotation };
        }
        self
    }

    pub fn with_ground(mut self, x: u32, y: u32, kind: GroundType, rotation: Rotation) -> Self {
        if let Some(tile) = self.tile_mut(x, y) {
            tile.ground = Ground { kind, rotation };
        }
        self
    }

    fn tile_mut(&mut self, x: u32, y: u32) -> Option<&mut Tile> {
        self.tiles.get_mut(x as usize)?.get_mut(y as usize)
    }

    pub fn width(&self) -> u32 {
        self.tiles.len() as u32
    }

    pub fn height(&self) -> u32 {
        self.tiles.first().map_or(0, |c| c.len() as u32)
    }

    pub fn tile(&self, x: u32, y: u32) -> Option<&Tile> {
        self.tiles.get(x as usize)?.get(y as usize)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter().flatten()
    }

    /// Grid coordinate of the tile containing `pos`, clamped to the map.
    pub fn grid_coord(&self, pos: Vector, tile_size: f64) -> GridPos {
        let clamp = |v: f64, max: u32| -> u32 {
            let cell = (v / tile_size).floor();
            if cell.is_nan() || cell < 0.0 {
                0
            } else {
                (cell as u32).min(max.saturating_sub(1))
            }
        };
        GridPos {
            x: clamp(pos.x, self.width()),
            y: clamp(pos.y, self.height()),
        }
    }

    /// Tile under a world position, clamped to the grid.
    pub fn tile_at(&self, pos: Vector, tile_size: f64) -> &Tile {
        let coord = self.grid_coord(pos, tile_size);
        &self.tiles[coord.x as usize][coord.y as usize]
    }

    /// Center of the last Start tile, or the map center when there is none.
    pub fn start_location(&self, tile_size: f64) -> Vector {
        self.tiles()
            .filter(|t| t.structure.kind == StructureType::Start)
            .last()
            .map(|t| t.center(tile_size))
            .unwrap_or_else(|| {
                vec2(
                    self.width() as f64 * tile_size / 2.0,
                    self.height() as f64 * tile_size / 2.0,
                )
            })
    }

    /// Content hash of the tiles, used as the id of a saved map. FNV-1a over
    /// the tiles' JSON form, so ids stay the same across builds and platforms.
    pub fn hash(&self) -> String {
        let mut hasher = Fnv1a::new();
        // Writing into the hasher never fails
        if let Err(e) = serde_json::to_writer(&mut hasher, &self.to_dto().tiles) {
            tracing::error!(map = %self.id, "Failed to serialize tiles for hashing: {}", e);
        }
        format!("{:016x}", hasher.finish())
    }
}

/// 64-bit FNV-1a over every byte written to it.
struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Fnv1a(Self::OFFSET_BASIS)
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

impl io::Write for Fnv1a {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
