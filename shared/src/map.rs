use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Map width in tiles
pub const MAP_WIDTH: u32 = 49;
/// Map height in tiles
pub const MAP_HEIGHT: u32 = 25;

/// Quarter-turn orientation of a tile's ground or structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub enum Rotation {
    #[default]
    North,
    East,
    South,
    West,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::North,
        Rotation::East,
        Rotation::South,
        Rotation::West,
    ];

    /// The quarter-turn that undoes this one.
    pub fn inverse(self) -> Rotation {
        match self {
            Rotation::North => Rotation::North,
            Rotation::East => Rotation::West,
            Rotation::South => Rotation::South,
            Rotation::West => Rotation::East,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub enum GroundType {
    #[default]
    Grass,
    Water,
    Gravel,
    GravelHeavy,
    Slope,
    SlopeDiagonal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub enum StructureType {
    #[default]
    None,
    Wall,
    Circle,
    Start,
    Hole,
    Wedge,
    RoundedCorner,
    InvertedRoundedCorner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct Ground {
    #[serde(rename = "type")]
    pub kind: GroundType,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct Structure {
    #[serde(rename = "type")]
    pub kind: StructureType,
    #[serde(default)]
    pub rotation: Rotation,
}

/// Grid coordinate of a tile, in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct TileDto {
    pub pos: GridPos,
    #[serde(default)]
    pub ground: Ground,
    #[serde(default)]
    pub structure: Structure,
}

/// Map as stored and sent over the wire. `tiles` is column-major: `tiles[x][y]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../bindings/")]
pub struct GameMapDto {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub tiles: Vec<Vec<TileDto>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_inverse_pairs() {
        for rot in Rotation::ALL {
            assert_eq!(rot.inverse().inverse(), rot);
        }
        assert_eq!(Rotation::East.inverse(), Rotation::West);
    }

    #[test]
    fn tile_uses_type_key_and_names() {
        let tile = TileDto {
            pos: GridPos { x: 3, y: 4 },
            ground: Ground {
                kind: GroundType::SlopeDiagonal,
                rotation: Rotation::South,
            },
            structure: Structure {
                kind: StructureType::InvertedRoundedCorner,
                rotation: Rotation::West,
            },
        };
        let json = serde_json::to_string(&tile).unwrap();
        assert!(json.contains("\"type\":\"SlopeDiagonal\""));
        assert!(json.contains("\"type\":\"InvertedRoundedCorner\""));
        assert!(json.contains("\"rotation\":\"West\""));
        let parsed: TileDto = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tile);
    }

    #[test]
    fn missing_ground_and_structure_default() {
        let tile: TileDto = serde_json::from_str(r#"{"pos":{"x":1,"y":2}}"#).unwrap();
        assert_eq!(tile.ground.kind, GroundType::Grass);
        assert_eq!(tile.structure.kind, StructureType::None);
        assert_eq!(tile.structure.rotation, Rotation::North);
    }
}
