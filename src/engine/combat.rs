//! Damage, accuracy and healing math.
//!
//! Every roll draws from the caller's `SeededRandom`, so the same game seed
//! reproduces the same crits and misses.

use crate::engine::models::{Card, EffectKind, Player, PlayerId, Position, TerrainType};
use crate::engine::rng::SeededRandom;
use crate::engine::terrain::Terrain;

const BASE_CRIT_CHANCE: f64 = 0.10;
const CRIT_CHANCE_PER_ATTACK: f64 = 0.02;

/// Damage multipliers as `(numerator, denominator)`, applied with a floor.
const CRIT_MULTIPLIER: (u32, u32) = (3, 2);
const HIGH_GROUND_MULTIPLIER: (u32, u32) = (6, 5);
const HAZARD_MULTIPLIER: (u32, u32) = (4, 5);
/// Upper bound on extra damage from standing on high ground. A tile's own
/// `damage_bonus` can lower it further.
const HIGH_GROUND_BONUS_CAP: u32 = 2;

const BASE_ACCURACY: f64 = 0.8;
const ACCURACY_FALLOFF: f64 = 0.1;
const ACCURACY_PER_ATTACK: f64 = 0.05;
const MIN_ACCURACY: f64 = 0.10;
const MAX_ACCURACY: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatResult {
    pub damage: u32,
    pub blocked: u32,
    pub critical: bool,
    pub effects: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CombatResolver {
    /// Roll hits on a d20 instead of a uniform float.
    pub dice_mode: bool,
}

impl CombatResolver {
    pub fn new(dice_mode: bool) -> Self {
        Self { dice_mode }
    }

    pub fn calculate_damage(
        &self,
        attacker: &Player,
        target: &Player,
        card: &Card,
        terrain: &Terrain,
        rng: &mut SeededRandom,
    ) -> CombatResult {
        let attack = attacker.robot.stats.attack;
        let raw = card.damage.unwrap_or(1) + attack;
        let mut blocked = target.robot.stats.defense.min(raw);
        let mut damage = raw - blocked;
        let mut effects = Vec::new();

        let crit_chance = BASE_CRIT_CHANCE + CRIT_CHANCE_PER_ATTACK * attack as f64;
        let critical = rng.chance(crit_chance);
        if critical {
            damage = scale(damage, CRIT_MULTIPLIER);
            effects.push("Critical hit!".to_string());
        }

        // A fully blocked hit stays at 0 whatever the attacker stands on.
        let tile = terrain.at(attacker.position).filter(|_| blocked < raw);
        if let Some(tile) = tile {
            match tile.kind {
                TerrainType::Turret => {
                    let cap = tile.properties.damage_bonus.min(HIGH_GROUND_BONUS_CAP);
                    let gain = scale(damage, HIGH_GROUND_MULTIPLIER) - damage;
                    damage += gain.min(cap);
                    effects.push("High ground advantage".to_string());
                }
                TerrainType::Lava => {
                    damage = scale(damage, HAZARD_MULTIPLIER);
                    effects.push("Unstable footing".to_string());
                }
                _ => {}
            }
        }

        if let Some(tile) = terrain.at(target.position) {
            let armor = tile.properties.armor_bonus;
            if armor > 0 {
                blocked += armor;
                damage = damage.saturating_sub(armor);
                effects.push("Terrain provides cover".to_string());
            }
        }

        let total = i64::from(damage) + i64::from(card.effect_total(EffectKind::Damage));
        let mut damage = total.max(0) as u32;
        if damage < 1 && blocked < raw {
            damage = 1;
        }

        CombatResult {
            damage,
            blocked,
            critical,
            effects,
        }
    }

    /// Chance in `[0.10, 0.95]` that `attacker` lands a hit on `target`.
    pub fn hit_chance(&self, attacker: &Player, target: &Player, terrain: &Terrain) -> f64 {
        let distance = attacker.position.distance(target.position);
        let mut accuracy = BASE_ACCURACY - ACCURACY_FALLOFF * (distance - 1.0).max(0.0)
            + ACCURACY_PER_ATTACK * attacker.robot.stats.attack as f64;

        if !check_line_of_sight(attacker.position, target.position, terrain) {
            accuracy *= 0.5;
        }
        if terrain
            .at(target.position)
            .is_some_and(|t| t.kind == TerrainType::Trap)
        {
            accuracy *= 1.1;
        }
        if terrain
            .at(attacker.position)
            .is_some_and(|t| t.kind.is_high_ground())
        {
            accuracy *= 1.1;
        }
        accuracy.clamp(MIN_ACCURACY, MAX_ACCURACY)
    }

    /// False without a roll when the target is out of range.
    pub fn check_hit(
        &self,
        attacker: &Player,
        target: &Player,
        range: u32,
        terrain: &Terrain,
        rng: &mut SeededRandom,
    ) -> bool {
        if !is_in_range(attacker.position, target.position, range) {
            return false;
        }
        let accuracy = self.hit_chance(attacker, target, terrain);
        if self.dice_mode {
            let roll = rng.next_int(20) + 1;
            roll as f64 <= (accuracy * 20.0).ceil()
        } else {
            rng.next() < accuracy
        }
    }

    /// Damage against every living unit other than the attacker within
    /// `radius` of `center`.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_area_attack(
        &self,
        attacker: &Player,
        center: Position,
        radius: u32,
        card: &Card,
        players: &[Player],
        terrain: &Terrain,
        rng: &mut SeededRandom,
    ) -> Vec<(PlayerId, CombatResult)> {
        players
            .iter()
            .filter(|p| p.is_alive() && p.id != attacker.id)
            .filter(|p| is_in_range(center, p.position, radius))
            .map(|p| {
                let result = self.calculate_damage(attacker, p, card, terrain, rng);
                (p.id.clone(), result)
            })
            .collect()
    }
}

fn scale(value: u32, (num, den): (u32, u32)) -> u32 {
    value * num / den
}

/// Walks the rounded straight line between two tiles. Endpoints never block.
pub fn check_line_of_sight(from: Position, to: Position, terrain: &Terrain) -> bool {
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    let steps = (to.x - from.x).abs().max((to.y - from.y).abs());
    (1..steps).all(|i| {
        let t = i as f64 / steps as f64;
        let pos = Position::new(
            (from.x as f64 + dx * t).round() as i32,
            (from.y as f64 + dy * t).round() as i32,
        );
        !terrain.at(pos).is_some_and(|tile| tile.kind.is_high_cover())
    })
}

pub fn is_in_range(from: Position, to: Position, range: u32) -> bool {
    from.distance(to) <= range as f64
}

pub fn get_valid_targets<'a>(
    attacker: &Player,
    players: &'a [Player],
    range: u32,
) -> Vec<&'a Player> {
    players
        .iter()
        .filter(|p| p.is_alive() && p.id != attacker.id)
        .filter(|p| is_in_range(attacker.position, p.position, range))
        .collect()
}

/// One point plus the card's heal effects.
pub fn calculate_healing(card: &Card) -> u32 {
    (1 + card.effect_total(EffectKind::Heal)).max(0) as u32
}

pub fn apply_healing(target: &mut Player, amount: u32) -> u32 {
    target.heal(amount)
}

pub fn apply_damage(target: &mut Player, amount: u32) -> u32 {
    target.take_damage(amount)
}
