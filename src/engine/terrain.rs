//! Board terrain: at most one tile per grid position.

use std::collections::HashMap;

use crate::engine::error::{SimError, SimResult};
use crate::engine::models::{Card, Position, TerrainTile, TerrainType, TileProperties};

#[derive(Debug, Clone, Default)]
pub struct Terrain {
    tiles: Vec<TerrainTile>,
    index: HashMap<Position, usize>,
}

impl Terrain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tile, rejecting a second tile at an occupied position.
    pub fn insert(&mut self, tile: TerrainTile) -> SimResult<()> {
        if self.index.contains_key(&tile.position) {
            return Err(SimError::TerrainCollision(tile.position));
        }
        self.index.insert(tile.position, self.tiles.len());
        self.tiles.push(tile);
        Ok(())
    }

    pub fn at(&self, pos: Position) -> Option<&TerrainTile> {
        self.index.get(&pos).map(|&i| &self.tiles[i])
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.index.contains_key(&pos)
    }

    /// Tiles in insertion order.
    pub fn tiles(&self) -> &[TerrainTile] {
        &self.tiles
    }

    pub fn of_kind(&self, kind: TerrainType) -> impl Iterator<Item = &TerrainTile> {
        self.tiles.iter().filter(move |t| t.kind == kind)
    }

    pub fn high_ground(&self) -> impl Iterator<Item = &TerrainTile> {
        self.tiles.iter().filter(|t| t.kind.is_high_ground())
    }

    pub fn cover(&self) -> impl Iterator<Item = &TerrainTile> {
        self.tiles.iter().filter(|t| t.kind.is_cover())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

pub fn cover_tile(idx: usize, position: Position) -> TerrainTile {
    TerrainTile {
        id: format!("cover_{idx}"),
        kind: TerrainType::Bridge,
        position,
        height: 0,
        properties: TileProperties {
            armor_bonus: 1,
            ..Default::default()
        },
    }
}

pub fn high_ground_tile(idx: usize, position: Position) -> TerrainTile {
    TerrainTile {
        id: format!("high_{idx}"),
        kind: TerrainType::Turret,
        position,
        height: 2,
        properties: TileProperties {
            armor_bonus: 1,
            damage_bonus: 2,
            ..Default::default()
        },
    }
}

pub fn hazard_tile(idx: usize, position: Position) -> TerrainTile {
    TerrainTile {
        id: format!("hazard_{idx}"),
        kind: TerrainType::Lava,
        position,
        height: 0,
        properties: TileProperties {
            hazard_damage: 1,
            ..Default::default()
        },
    }
}

/// Terrain type a structure card turns into when built.
pub fn structure_terrain_type(card_name: &str) -> TerrainType {
    match card_name.to_lowercase().as_str() {
        "watchtower" => TerrainType::Turret,
        "bridge" | "barricade" => TerrainType::Bridge,
        "trap" => TerrainType::Trap,
        _ => TerrainType::Floor,
    }
}

/// Tile placed by a structure card, tagged with its builder.
pub fn structure_tile(card: &Card, owner: &str, position: Position) -> TerrainTile {
    let kind = structure_terrain_type(&card.name);
    let (height, armor_bonus, damage_bonus) = match kind {
        TerrainType::Turret => (2, 1, 2),
        TerrainType::Bridge => (0, 1, 0),
        _ => (0, 0, 0),
    };
    TerrainTile {
        id: format!("{}_{}_{}", card.id, position.x, position.y),
        kind,
        position,
        height,
        properties: TileProperties {
            armor_bonus,
            damage_bonus,
            owner: Some(owner.to_string()),
            card: Some(card.id.clone()),
            ..Default::default()
        },
    }
}
