//! Built-in playtest scenarios.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::engine::error::{SimError, SimResult};
use crate::engine::models::PlayerClass::{self, Engineer, Mage, Trickster, Warrior};
use crate::engine::models::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapZone {
    Open,
    Cover,
    Highground,
    Hazard,
    Objective,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneModifier {
    pub armor_bonus: Option<u32>,
    pub damage_bonus: Option<u32>,
    pub movement_cost: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    #[serde(rename = "type")]
    pub kind: MapZone,
    pub positions: Vec<Position>,
    #[serde(default)]
    pub modifier: Option<ZoneModifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayout {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub zones: Vec<ZoneDefinition>,
    #[serde(default)]
    pub cover_tiles: Vec<Position>,
    #[serde(default)]
    pub high_ground_tiles: Vec<Position>,
    #[serde(default)]
    pub hazard_tiles: Vec<Position>,
}

impl MapLayout {
    pub fn contains(&self, pos: Position) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatOverrides {
    pub movement: Option<u32>,
    pub attack: Option<u32>,
    pub defense: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConfig {
    pub class: PlayerClass,
    pub hp: Option<u32>,
    pub max_hp: Option<u32>,
    pub energy: Option<u32>,
    pub max_energy: Option<u32>,
    #[serde(default)]
    pub stats: Option<StatOverrides>,
}

impl UnitConfig {
    pub const fn new(class: PlayerClass) -> Self {
        Self {
            class,
            hp: None,
            max_hp: None,
            energy: None,
            max_energy: None,
            stats: None,
        }
    }

    /// Sets both current and max hp.
    pub fn with_hp(mut self, hp: u32) -> Self {
        self.hp = Some(hp);
        self.max_hp = Some(hp);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckSource {
    Personal,
    Hybrid,
    Tech,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    pub id: String,
    pub name: String,
    pub units: Vec<UnitConfig>,
    pub deck_source: DeckSource,
    pub starting_positions: Vec<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinConditionKind {
    Elimination,
    Objective,
    Survival,
    Points,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinCondition {
    #[serde(rename = "type")]
    pub kind: WinConditionKind,
    pub target_value: Option<u32>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveBehavior {
    Aggressive,
    Defensive,
    Patrol,
    Boss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcWave {
    pub round: u32,
    pub units: Vec<UnitConfig>,
    pub spawn_positions: Vec<Position>,
    pub behavior: WaveBehavior,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub map_layout: MapLayout,
    pub teams: Vec<TeamConfig>,
    pub win_condition: WinCondition,
    pub max_rounds: u32,
    #[serde(default)]
    pub dice_mode: bool,
    #[serde(default)]
    pub npc_waves: Vec<NpcWave>,
}

/// Team id given to units spawned by NPC waves.
pub const NPC_TEAM: &str = "npc";

impl ScenarioConfig {
    /// Checks the shape the runner relies on: two or more teams, a start
    /// position per unit, everything on the map, no stacked terrain.
    pub fn validate(&self) -> SimResult<()> {
        let invalid = |reason: String| SimError::InvalidScenario {
            id: self.id.clone(),
            reason,
        };
        if self.teams.len() < 2 {
            return Err(invalid(format!("needs at least 2 teams, has {}", self.teams.len())));
        }
        if self.max_rounds == 0 {
            return Err(invalid("max_rounds must be positive".into()));
        }
        let layout = &self.map_layout;
        if layout.width <= 0 || layout.height <= 0 {
            return Err(invalid("map has no area".into()));
        }

        for team in &self.teams {
            if team.units.is_empty() {
                return Err(invalid(format!("team '{}' has no units", team.id)));
            }
            if team.starting_positions.len() < team.units.len() {
                return Err(invalid(format!(
                    "team '{}' has {} units but {} starting positions",
                    team.id,
                    team.units.len(),
                    team.starting_positions.len()
                )));
            }
            if let Some(pos) = team.starting_positions.iter().find(|p| !layout.contains(**p)) {
                return Err(invalid(format!("start ({}, {}) is off the map", pos.x, pos.y)));
            }
        }

        for wave in &self.npc_waves {
            if wave.spawn_positions.len() < wave.units.len() {
                return Err(invalid(format!("wave at round {} lacks spawn positions", wave.round)));
            }
        }

        let mut seen = BTreeSet::new();
        let terrain = layout
            .cover_tiles
            .iter()
            .chain(&layout.high_ground_tiles)
            .chain(&layout.hazard_tiles);
        for pos in terrain {
            if !layout.contains(*pos) {
                return Err(invalid(format!("terrain ({}, {}) is off the map", pos.x, pos.y)));
            }
            if !seen.insert(*pos) {
                return Err(SimError::TerrainCollision(*pos));
            }
        }
        Ok(())
    }

    pub fn unit_count(&self) -> usize {
        self.teams.iter().map(|t| t.units.len()).sum()
    }
}

// --- Layout helpers ---

/// Every position in a `width` x `height` block starting at the origin given.
pub fn grid_positions(start_x: i32, start_y: i32, width: i32, height: i32) -> Vec<Position> {
    (start_x..start_x + width)
        .flat_map(|x| (start_y..start_y + height).map(move |y| Position::new(x, y)))
        .collect()
}

/// `count` evenly spaced points on a circle, rounded to the grid.
pub fn circle_positions(center_x: i32, center_y: i32, radius: i32, count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| {
            let angle = i as f64 / count as f64 * std::f64::consts::TAU;
            Position::new(
                (center_x as f64 + radius as f64 * angle.cos()).round() as i32,
                (center_y as f64 + radius as f64 * angle.sin()).round() as i32,
            )
        })
        .collect()
}

fn pos(x: i32, y: i32) -> Position {
    Position::new(x, y)
}

fn zone(kind: MapZone, positions: Vec<Position>, modifier: Option<ZoneModifier>) -> ZoneDefinition {
    ZoneDefinition {
        kind,
        positions,
        modifier,
    }
}

fn cover_modifier() -> Option<ZoneModifier> {
    Some(ZoneModifier {
        armor_bonus: Some(1),
        ..Default::default()
    })
}

fn high_ground_modifier() -> Option<ZoneModifier> {
    Some(ZoneModifier {
        armor_bonus: Some(1),
        damage_bonus: Some(2),
        movement_cost: None,
    })
}

fn team(
    id: &str,
    name: &str,
    units: Vec<UnitConfig>,
    deck_source: DeckSource,
    starts: Vec<Position>,
) -> TeamConfig {
    TeamConfig {
        id: id.into(),
        name: name.into(),
        units,
        deck_source,
        starting_positions: starts,
    }
}

fn elimination(description: &str) -> WinCondition {
    WinCondition {
        kind: WinConditionKind::Elimination,
        target_value: None,
        description: description.into(),
    }
}


fn skirmish_2v2() -> ScenarioConfig {
    ScenarioConfig {
        id: "skirmish_2v2".into(),
        name: "2v2 Skirmish".into(),
        description: "Basic combat scenario with 2 players per team".into(),
        map_layout: MapLayout {
            width: 12,
            height: 12,
            zones: vec![
                zone(MapZone::Open, grid_positions(4, 4, 4, 4), None),
                zone(MapZone::Cover, vec![pos(5, 5), pos(7, 7)], cover_modifier()),
                zone(MapZone::Highground, vec![pos(2, 10), pos(10, 2)], high_ground_modifier()),
            ],
            cover_tiles: vec![pos(5, 5), pos(7, 7), pos(6, 3), pos(3, 9)],
            high_ground_tiles: vec![pos(2, 10), pos(10, 2)],
            hazard_tiles: vec![],
        },
        teams: vec![
            team(
                "team_a",
                "Team A",
                vec![UnitConfig::new(Warrior).with_hp(16), UnitConfig::new(Mage).with_hp(15)],
                DeckSource::Personal,
                vec![pos(1, 1), pos(2, 1)],
            ),
            team(
                "team_b",
                "Team B",
                vec![UnitConfig::new(Engineer).with_hp(15), UnitConfig::new(Trickster).with_hp(15)],
                DeckSource::Personal,
                vec![pos(10, 10), pos(11, 10)],
            ),
        ],
        win_condition: elimination("Eliminate all enemy units"),
        max_rounds: 20,
        dice_mode: false,
        npc_waves: vec![],
    }
}

fn skirmish_3v3() -> ScenarioConfig {
    let cover_ring = vec![pos(7, 7), pos(9, 9), pos(7, 9), pos(9, 7)];
    let mut cover_tiles = cover_ring.clone();
    cover_tiles.extend([pos(4, 12), pos(12, 4)]);
    ScenarioConfig {
        id: "skirmish_3v3".into(),
        name: "3v3 Skirmish".into(),
        description: "Larger combat scenario with 3 players per team".into(),
        map_layout: MapLayout {
            width: 16,
            height: 16,
            zones: vec![
                zone(MapZone::Open, grid_positions(6, 6, 5, 5), None),
                zone(MapZone::Cover, cover_ring, cover_modifier()),
                zone(
                    MapZone::Highground,
                    vec![pos(3, 13), pos(13, 3), pos(8, 8)],
                    high_ground_modifier(),
                ),
            ],
            cover_tiles,
            high_ground_tiles: vec![pos(3, 13), pos(13, 3), pos(8, 8)],
            hazard_tiles: vec![pos(8, 2), pos(2, 8)],
        },
        teams: vec![
            team(
                "team_a",
                "Team A",
                vec![
                    UnitConfig::new(Warrior).with_hp(16),
                    UnitConfig::new(Mage).with_hp(15),
                    UnitConfig::new(Engineer).with_hp(15),
                ],
                DeckSource::Personal,
                vec![pos(1, 1), pos(2, 1), pos(1, 2)],
            ),
            team(
                "team_b",
                "Team B",
                vec![
                    UnitConfig::new(Warrior).with_hp(16),
                    UnitConfig::new(Trickster).with_hp(15),
                    UnitConfig::new(Mage).with_hp(15),
                ],
                DeckSource::Personal,
                vec![pos(14, 14), pos(14, 15), pos(15, 14)],
            ),
        ],
        win_condition: elimination("Eliminate all enemy units"),
        max_rounds: 30,
        dice_mode: false,
        npc_waves: vec![],
    }
}

fn boss_gate_siege() -> ScenarioConfig {
    let boss = UnitConfig {
        stats: Some(StatOverrides {
            movement: Some(2),
            attack: Some(5),
            defense: Some(3),
        }),
        ..UnitConfig::new(Warrior).with_hp(50)
    };
    ScenarioConfig {
        id: "boss_gate_siege".into(),
        name: "Boss Gate Siege".into(),
        description: "Team vs Boss with NPC waves".into(),
        map_layout: MapLayout {
            width: 14,
            height: 18,
            zones: vec![
                zone(MapZone::Objective, vec![pos(7, 16)], None),
                zone(MapZone::Cover, vec![pos(4, 8), pos(10, 8), pos(7, 12)], cover_modifier()),
                zone(MapZone::Highground, vec![pos(2, 6), pos(12, 6)], high_ground_modifier()),
                zone(
                    MapZone::Hazard,
                    vec![pos(7, 4)],
                    Some(ZoneModifier {
                        movement_cost: Some(2),
                        ..Default::default()
                    }),
                ),
            ],
            cover_tiles: vec![pos(4, 8), pos(10, 8), pos(7, 12)],
            high_ground_tiles: vec![pos(2, 6), pos(12, 6)],
            hazard_tiles: vec![pos(7, 4), pos(6, 4), pos(8, 4)],
        },
        teams: vec![
            team(
                "heroes",
                "Heroes",
                vec![
                    UnitConfig::new(Warrior).with_hp(16),
                    UnitConfig::new(Mage).with_hp(15),
                    UnitConfig::new(Engineer).with_hp(15),
                    UnitConfig::new(Trickster).with_hp(15),
                ],
                DeckSource::Hybrid,
                vec![pos(5, 1), pos(7, 1), pos(9, 1), pos(7, 2)],
            ),
            team("boss", "Boss", vec![boss], DeckSource::Tech, vec![pos(7, 16)]),
        ],
        win_condition: elimination("Defeat the boss"),
        max_rounds: 25,
        dice_mode: false,
        npc_waves: vec![
            NpcWave {
                round: 5,
                units: vec![
                    UnitConfig::new(Warrior).with_hp(10),
                    UnitConfig::new(Warrior).with_hp(10),
                ],
                spawn_positions: vec![pos(3, 10), pos(11, 10)],
                behavior: WaveBehavior::Aggressive,
            },
            NpcWave {
                round: 10,
                units: vec![
                    UnitConfig::new(Mage).with_hp(12),
                    UnitConfig::new(Engineer).with_hp(12),
                ],
                spawn_positions: vec![pos(2, 12), pos(12, 12)],
                behavior: WaveBehavior::Defensive,
            },
            NpcWave {
                round: 15,
                units: vec![
                    UnitConfig::new(Warrior).with_hp(15),
                    UnitConfig::new(Trickster).with_hp(12),
                ],
                spawn_positions: vec![pos(5, 14), pos(9, 14)],
                behavior: WaveBehavior::Aggressive,
            },
        ],
    }
}

fn tech_heavy_environment() -> ScenarioConfig {
    ScenarioConfig {
        id: "tech_heavy_environment".into(),
        name: "Tech-Heavy Environment".into(),
        description: "Scenario focusing on structures and programs".into(),
        map_layout: MapLayout {
            width: 14,
            height: 14,
            zones: vec![
                zone(MapZone::Open, grid_positions(5, 5, 4, 4), None),
                zone(MapZone::Cover, circle_positions(7, 7, 3, 8), cover_modifier()),
            ],
            cover_tiles: circle_positions(7, 7, 3, 8),
            high_ground_tiles: vec![],
            hazard_tiles: vec![],
        },
        teams: vec![
            team(
                "team_a",
                "Team A",
                vec![
                    UnitConfig::new(Engineer).with_hp(15),
                    UnitConfig::new(Engineer).with_hp(15),
                    UnitConfig::new(Mage).with_hp(15),
                ],
                DeckSource::Tech,
                vec![pos(2, 2), pos(3, 2), pos(2, 3)],
            ),
            team(
                "team_b",
                "Team B",
                vec![
                    UnitConfig::new(Engineer).with_hp(15),
                    UnitConfig::new(Mage).with_hp(15),
                    UnitConfig::new(Trickster).with_hp(15),
                ],
                DeckSource::Tech,
                vec![pos(11, 11), pos(11, 12), pos(12, 11)],
            ),
        ],
        win_condition: elimination("Eliminate all enemy units"),
        max_rounds: 25,
        dice_mode: false,
        npc_waves: vec![],
    }
}

fn control_vs_burst() -> ScenarioConfig {
    ScenarioConfig {
        id: "control_vs_burst".into(),
        name: "Control vs Burst".into(),
        description: "Scenario testing control effects vs high damage".into(),
        map_layout: MapLayout {
            width: 10,
            height: 10,
            zones: vec![
                zone(MapZone::Open, grid_positions(3, 3, 3, 3), None),
                zone(MapZone::Highground, vec![pos(5, 5)], high_ground_modifier()),
            ],
            cover_tiles: vec![pos(3, 5), pos(7, 5)],
            high_ground_tiles: vec![pos(5, 5)],
            hazard_tiles: vec![],
        },
        teams: vec![
            team(
                "control_team",
                "Control Team",
                vec![UnitConfig::new(Mage).with_hp(15), UnitConfig::new(Trickster).with_hp(15)],
                DeckSource::Personal,
                vec![pos(1, 5), pos(2, 5)],
            ),
            team(
                "burst_team",
                "Burst Team",
                vec![UnitConfig::new(Warrior).with_hp(16), UnitConfig::new(Warrior).with_hp(16)],
                DeckSource::Personal,
                vec![pos(8, 5), pos(9, 5)],
            ),
        ],
        win_condition: elimination("Eliminate all enemy units"),
        max_rounds: 15,
        dice_mode: false,
        npc_waves: vec![],
    }
}

static SCENARIOS: Lazy<Vec<ScenarioConfig>> = Lazy::new(|| {
    vec![
        skirmish_2v2(),
        skirmish_3v3(),
        boss_gate_siege(),
        tech_heavy_environment(),
        control_vs_burst(),
    ]
});

pub fn all_scenarios() -> &'static [ScenarioConfig] {
    &SCENARIOS
}

pub fn get_scenario(id: &str) -> Option<&'static ScenarioConfig> {
    SCENARIOS.iter().find(|s| s.id == id)
}

pub fn require_scenario(id: &str) -> SimResult<&'static ScenarioConfig> {
    get_scenario(id).ok_or_else(|| SimError::UnknownScenario(id.to_string()))
}

pub fn all_scenario_ids() -> Vec<&'static str> {
    SCENARIOS.iter().map(|s| s.id.as_str()).collect()
}
