//! Core game data types: cards, units, terrain tiles and the per-game records
//! the simulator emits.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::rng::SeededRandom;

pub type PlayerId = String;
pub type TeamId = String;

pub const HAND_LIMIT: usize = 5;

// --- Position ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Straight-line distance, used for range and accuracy.
    pub fn distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// One unit step per axis toward `target`.
    pub fn step_toward(self, target: Position) -> Position {
        Position::new(
            self.x + (target.x - self.x).signum(),
            self.y + (target.y - self.y).signum(),
        )
    }

    /// Orthogonal neighbours in E, N, W, S order.
    pub fn neighbors(self) -> [Position; 4] {
        [
            Position::new(self.x + 1, self.y),
            Position::new(self.x, self.y + 1),
            Position::new(self.x - 1, self.y),
            Position::new(self.x, self.y - 1),
        ]
    }
}

// --- Cards ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Action,
    Structure,
    Program,
    Event,
    Loot,
    Reaction,
    Upgrade,
}

impl CardType {
    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Action => "action",
            CardType::Structure => "structure",
            CardType::Program => "program",
            CardType::Event => "event",
            CardType::Loot => "loot",
            CardType::Reaction => "reaction",
            CardType::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Damage,
    Heal,
    Move,
    Build,
    Program,
    Draw,
    Energy,
    Buff,
    Control,
    Special,
    /// Any effect type this build does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectTarget {
    #[serde(rename = "self")]
    Own,
    Enemy,
    All,
    Terrain,
    Ally,
    Attacker,
    Robot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Skips the whole turn.
    Stun,
    /// Skips movement only.
    Immobilize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEffect {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub value: i32,
    pub target: EffectTarget,
    #[serde(default)]
    pub description: String,
}

impl CardEffect {
    pub fn new(kind: EffectKind, value: i32, target: EffectTarget, description: &str) -> Self {
        Self {
            kind,
            value,
            target,
            description: description.to_string(),
        }
    }

    /// Hard control is identified by keyword so authored text drives it.
    pub fn control_kind(&self) -> Option<ControlKind> {
        let text = self.description.to_lowercase();
        if text.contains("stun") {
            Some(ControlKind::Stun)
        } else if text.contains("immobilize") {
            Some(ControlKind::Immobilize)
        } else {
            None
        }
    }
}

/// Immutable card template. Shared by `Arc` between catalog, decks and hands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub cost: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<CardEffect>,
    #[serde(default)]
    pub range: Option<u32>,
    #[serde(default)]
    pub damage: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
    pub rarity: Rarity,
}

impl Card {
    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn effect_total(&self, kind: EffectKind) -> i32 {
        self.effects
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value)
            .sum()
    }

    pub fn is_damage_card(&self) -> bool {
        self.damage.is_some_and(|d| d > 0)
    }

    pub fn has_control(&self) -> bool {
        self.effects.iter().any(|e| e.control_kind().is_some())
    }

    /// Cards that need an enemy unit to resolve against.
    pub fn targets_enemy(&self) -> bool {
        self.is_damage_card()
            || self
                .effects
                .iter()
                .any(|e| e.target == EffectTarget::Enemy && e.control_kind().is_some())
    }

    pub fn effective_range(&self) -> u32 {
        self.range.unwrap_or(1)
    }
}

// --- Units ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerClass {
    Engineer,
    Warrior,
    Mage,
    Trickster,
}

impl PlayerClass {
    pub const ALL: [PlayerClass; 4] = [
        PlayerClass::Engineer,
        PlayerClass::Warrior,
        PlayerClass::Mage,
        PlayerClass::Trickster,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerClass::Engineer => "engineer",
            PlayerClass::Warrior => "warrior",
            PlayerClass::Mage => "mage",
            PlayerClass::Trickster => "trickster",
        }
    }
}

impl fmt::Display for PlayerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RobotStats {
    pub movement: u32,
    pub attack: u32,
    pub defense: u32,
    pub energy: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Robot {
    pub stats: RobotStats,
    /// Ids of upgrade cards installed this game.
    pub upgrades: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusEffects {
    pub stunned: u32,
    pub immobilized: u32,
}

impl StatusEffects {
    pub fn is_controlled(&self) -> bool {
        self.stunned > 0 || self.immobilized > 0
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub class: PlayerClass,
    pub hp: u32,
    pub max_hp: u32,
    pub energy: u32,
    pub max_energy: u32,
    pub hand: Vec<Arc<Card>>,
    pub deck: Vec<Arc<Card>>,
    pub discard: Vec<Arc<Card>>,
    pub robot: Robot,
    pub position: Position,
    pub status: StatusEffects,
}

impl Player {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Deducts `cost` if affordable. Energy never goes negative.
    pub fn spend_energy(&mut self, cost: u32) -> bool {
        if self.energy < cost {
            return false;
        }
        self.energy -= cost;
        true
    }

    pub fn gain_energy(&mut self, amount: u32) {
        self.energy = (self.energy + amount).min(self.max_energy);
    }

    pub fn refill_energy(&mut self) {
        self.energy = self.max_energy;
    }

    /// Returns the hp actually lost.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.hp);
        self.hp -= lost;
        lost
    }

    /// Returns the hp actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.max_hp.saturating_sub(self.hp));
        self.hp += restored;
        restored
    }

    /// Sets hp and clamps into `[0, max_hp]`.
    pub fn set_hp(&mut self, hp: u32) {
        self.hp = hp.min(self.max_hp);
    }

    pub fn set_energy(&mut self, energy: u32) {
        self.energy = energy.min(self.max_energy);
    }

    /// Draws from the top (end) of the deck. Returns how many were drawn.
    pub fn draw_cards(&mut self, count: usize) -> usize {
        let mut drawn = 0;
        while drawn < count {
            match self.deck.pop() {
                Some(card) => {
                    self.hand.push(card);
                    drawn += 1;
                }
                None => break,
            }
        }
        drawn
    }

    pub fn draw_up_to(&mut self, limit: usize) -> usize {
        self.draw_cards(limit.saturating_sub(self.hand.len()))
    }

    /// Moves excess cards from the end of the hand to the discard pile.
    pub fn discard_down_to(&mut self, limit: usize) {
        while self.hand.len() > limit {
            if let Some(card) = self.hand.pop() {
                self.discard.push(card);
            }
        }
    }

    /// When the deck is empty, the discard pile becomes the shuffled deck.
    pub fn reshuffle_if_empty(&mut self, rng: &mut SeededRandom) -> bool {
        if !self.deck.is_empty() || self.discard.is_empty() {
            return false;
        }
        self.deck = std::mem::take(&mut self.discard);
        rng.shuffle(&mut self.deck);
        true
    }

    pub fn hand_index(&self, card_id: &str) -> Option<usize> {
        self.hand.iter().position(|c| c.id == card_id)
    }

    /// Moves a hand card to the discard pile and returns it.
    pub fn discard_from_hand(&mut self, index: usize) -> Option<Arc<Card>> {
        if index >= self.hand.len() {
            return None;
        }
        let card = self.hand.remove(index);
        self.discard.push(Arc::clone(&card));
        Some(card)
    }

    pub fn total_cards(&self) -> usize {
        self.hand.len() + self.deck.len() + self.discard.len()
    }

    /// Keeps the longer of an existing and a new control duration.
    pub fn apply_control(&mut self, kind: ControlKind, turns: u32) {
        match kind {
            ControlKind::Stun => self.status.stunned = self.status.stunned.max(turns),
            ControlKind::Immobilize => {
                self.status.immobilized = self.status.immobilized.max(turns)
            }
        }
    }
}

// --- Terrain ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerrainType {
    Floor,
    Bridge,
    Cliff,
    Lava,
    Water,
    Turret,
    Trap,
    Ruins,
    Vent,
    Crate,
}

impl TerrainType {
    pub fn is_high_ground(self) -> bool {
        matches!(self, TerrainType::Turret)
    }

    /// Terrain that blocks line of sight.
    pub fn is_high_cover(self) -> bool {
        matches!(self, TerrainType::Turret)
    }

    pub fn is_cover(self) -> bool {
        matches!(self, TerrainType::Bridge)
    }

    pub fn is_hazard(self) -> bool {
        matches!(self, TerrainType::Lava)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileProperties {
    #[serde(default)]
    pub armor_bonus: u32,
    #[serde(default)]
    pub damage_bonus: u32,
    #[serde(default)]
    pub hazard_damage: u32,
    #[serde(default)]
    pub owner: Option<PlayerId>,
    #[serde(default)]
    pub card: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainTile {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TerrainType,
    pub position: Position,
    pub height: i32,
    #[serde(default)]
    pub properties: TileProperties,
}

/// A program card ticking on the board.
#[derive(Debug, Clone)]
pub struct ActiveProgram {
    pub card: Arc<Card>,
    pub owner: PlayerId,
    pub remaining: u32,
}

/// Decrements every program and drops the expired ones.
pub fn decay_programs(programs: &mut Vec<ActiveProgram>) {
    programs.retain_mut(|p| {
        p.remaining = p.remaining.saturating_sub(1);
        p.remaining > 0
    });
}

// --- Simulation records ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameEventType {
    Damage,
    Heal,
    Control,
    Structure,
    Move,
    Death,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub round: u32,
    pub player_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: GameEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSimStats {
    pub player_id: PlayerId,
    pub player_class: PlayerClass,
    pub team_id: TeamId,
    pub damage_dealt: u64,
    pub damage_taken: u64,
    /// Damage this unit's armor and cover soaked up.
    #[serde(default)]
    pub damage_blocked: u64,
    pub energy_spent: u64,
    pub cards_played: u64,
    #[serde(default)]
    pub cards_by_type: BTreeMap<CardType, u64>,
    pub control_turns: u64,
    pub survived_rounds: u64,
    pub final_hp: u32,
}

impl PlayerSimStats {
    pub fn new(player_id: &str, player_class: PlayerClass, team_id: &str, hp: u32) -> Self {
        Self {
            player_id: player_id.to_string(),
            player_class,
            team_id: team_id.to_string(),
            damage_dealt: 0,
            damage_taken: 0,
            damage_blocked: 0,
            energy_spent: 0,
            cards_played: 0,
            cards_by_type: BTreeMap::new(),
            control_turns: 0,
            survived_rounds: 0,
            final_hp: hp,
        }
    }

    pub fn record_play(&mut self, card: &Card) {
        self.energy_spent += u64::from(card.cost);
        self.cards_played += 1;
        *self.cards_by_type.entry(card.card_type).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub scenario_id: String,
    pub game_id: u32,
    pub seed: u64,
    /// Winning team id, or `"draw"`.
    pub winner: String,
    pub total_rounds: u32,
    pub players_stats: Vec<PlayerSimStats>,
    pub events: Vec<GameEvent>,
}

pub const DRAW: &str = "draw";

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str) -> Arc<Card> {
        Arc::new(Card {
            id: id.into(),
            name: id.into(),
            card_type: CardType::Action,
            cost: 1,
            description: String::new(),
            effects: vec![],
            range: None,
            damage: None,
            duration: None,
            rarity: Rarity::Common,
        })
    }

    fn player_with_deck(n: usize) -> Player {
        Player {
            id: "p".into(),
            name: "p".into(),
            class: PlayerClass::Warrior,
            hp: 10,
            max_hp: 10,
            energy: 3,
            max_energy: 5,
            hand: vec![],
            deck: (0..n).map(|i| card(&format!("c{i}"))).collect(),
            discard: vec![],
            robot: Robot::default(),
            position: Position::new(0, 0),
            status: StatusEffects::default(),
        }
    }

    #[test]
    fn test_step_toward_moves_one_per_axis() {
        let from = Position::new(2, 2);
        assert_eq!(from.step_toward(Position::new(5, 0)), Position::new(3, 1));
        assert_eq!(from.step_toward(Position::new(2, 2)), Position::new(2, 2));
    }

    #[test]
    fn test_hp_clamps() {
        let mut p = player_with_deck(0);
        assert_eq!(p.take_damage(25), 10);
        assert_eq!(p.hp, 0);
        p.hp = 8;
        assert_eq!(p.heal(5), 2);
        assert_eq!(p.hp, 10);
    }

    #[test]
    fn test_spend_energy_never_negative() {
        let mut p = player_with_deck(0);
        assert!(!p.spend_energy(4));
        assert_eq!(p.energy, 3);
        assert!(p.spend_energy(3));
        assert_eq!(p.energy, 0);
        p.gain_energy(99);
        assert_eq!(p.energy, 5);
    }

    #[test]
    fn test_draw_discard_shuffle_conserve_cards() {
        let mut rng = SeededRandom::new(3);
        let mut p = player_with_deck(7);
        p.draw_up_to(HAND_LIMIT);
        assert_eq!(p.hand.len(), 5);
        p.draw_cards(2);
        p.discard_down_to(HAND_LIMIT);
        assert_eq!(p.hand.len(), 5);
        assert_eq!(p.discard.len(), 2);
        assert!(p.reshuffle_if_empty(&mut rng));
        assert_eq!(p.deck.len(), 2);
        assert_eq!(p.total_cards(), 7);
    }

    #[test]
    fn test_control_keywords() {
        let stun = CardEffect::new(EffectKind::Control, 1, EffectTarget::Enemy, "Stun target");
        let root = CardEffect::new(EffectKind::Control, 2, EffectTarget::Enemy, "IMMOBILIZE for 2");
        let plain = CardEffect::new(EffectKind::Damage, 2, EffectTarget::Enemy, "Deal 2");
        assert_eq!(stun.control_kind(), Some(ControlKind::Stun));
        assert_eq!(root.control_kind(), Some(ControlKind::Immobilize));
        assert_eq!(plain.control_kind(), None);
    }

    #[test]
    fn test_unknown_effect_kind_deserializes() {
        let effect: CardEffect = serde_json::from_value(serde_json::json!({
            "type": "teleport", "value": 1, "target": "self", "description": "?"
        }))
        .unwrap();
        assert_eq!(effect.kind, EffectKind::Unknown);
    }

    #[test]
    fn test_decay_programs_drops_expired() {
        let mut programs = vec![
            ActiveProgram {
                card: card("a"),
                owner: "p".into(),
                remaining: 1,
            },
            ActiveProgram {
                card: card("b"),
                owner: "p".into(),
                remaining: 3,
            },
        ];
        decay_programs(&mut programs);
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].remaining, 2);
    }
}
