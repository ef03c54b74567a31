//! Encounter deck resolved on entry to the encounter phase.
//!
//! Draws, target picks, enemy names and spawn spots all come from the
//! caller's `SeededRandom`, so an encounter sequence replays from the seed.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::engine::models::{Player, PlayerId, Position, HAND_LIMIT};
use crate::engine::rng::SeededRandom;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterKind {
    Event,
    Combat,
    Treasure,
    Hazard,
    Story,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyStats {
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub movement: u32,
    pub range: u32,
}

impl Difficulty {
    pub fn enemy_stats(self) -> EnemyStats {
        let (hp, attack, defense, movement, range) = match self {
            Difficulty::Easy => (8, 1, 0, 2, 1),
            Difficulty::Medium => (12, 2, 1, 3, 2),
            Difficulty::Hard => (18, 3, 2, 4, 3),
            Difficulty::Extreme => (25, 4, 3, 5, 4),
        };
        EnemyStats {
            hp,
            attack,
            defense,
            movement,
            range,
        }
    }

    /// Enemies a combat encounter spawns against `players` living units.
    pub fn enemy_count(self, players: usize) -> usize {
        match self {
            Difficulty::Easy => players.saturating_sub(1).max(1),
            Difficulty::Medium => players,
            Difficulty::Hard => players + 1,
            Difficulty::Extreme => players + 2,
        }
    }

    fn enemy_names(self) -> &'static [&'static str] {
        match self {
            Difficulty::Easy => &["Scout Bot", "Repair Drone", "Security Bot"],
            Difficulty::Medium => &["Combat Bot", "Guardian", "Hunter"],
            Difficulty::Hard => &["Elite Guard", "War Machine", "Destroyer"],
            Difficulty::Extreme => &["Boss Mech", "Titan", "Annihilator"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterEffectKind {
    Damage,
    Heal,
    Energy,
}

/// Which living units an effect lands on. Distances are measured from the
/// unit whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterTargeting {
    All,
    Random,
    Nearest,
    Farthest,
    LowestHp,
    HighestHp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterEffect {
    pub kind: EncounterEffectKind,
    /// Negative energy drains.
    pub value: i32,
    pub target: EncounterTargeting,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    /// Draw that many cards, discarding down to the hand limit.
    Card,
    Energy,
    Hp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterReward {
    pub kind: RewardKind,
    pub value: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub name: String,
    pub kind: EncounterKind,
    pub description: String,
    #[serde(default)]
    pub effects: Vec<EncounterEffect>,
    pub difficulty: Difficulty,
    /// Granted to every living unit.
    #[serde(default)]
    pub rewards: Vec<EncounterReward>,
}

/// Hostile unit spawned by a combat encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: String,
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub position: Position,
    pub difficulty: Difficulty,
    pub stats: EnemyStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEffect {
    pub description: String,
    pub targets: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterOutcome {
    pub encounter_id: String,
    pub message: String,
    pub effects: Vec<AppliedEffect>,
    pub rewards: Vec<AppliedEffect>,
    pub enemies: Vec<Enemy>,
}

pub fn base_encounters() -> Vec<Encounter> {
    vec![
        Encounter {
            id: "system_overload".into(),
            name: "System Overload".into(),
            kind: EncounterKind::Hazard,
            description: "The facility's power systems are unstable!".into(),
            effects: vec![EncounterEffect {
                kind: EncounterEffectKind::Energy,
                value: -2,
                target: EncounterTargeting::All,
                description: "All players lose 2 energy".into(),
            }],
            difficulty: Difficulty::Medium,
            rewards: vec![],
        },
        Encounter {
            id: "security_breach".into(),
            name: "Security Breach".into(),
            kind: EncounterKind::Combat,
            description: "Security bots have detected your presence!".into(),
            effects: vec![],
            difficulty: Difficulty::Medium,
            rewards: vec![EncounterReward {
                kind: RewardKind::Card,
                value: 1,
                description: "Gain a random card".into(),
            }],
        },
        Encounter {
            id: "treasure_cache".into(),
            name: "Treasure Cache".into(),
            kind: EncounterKind::Treasure,
            description: "You found a hidden cache of supplies!".into(),
            effects: vec![],
            difficulty: Difficulty::Easy,
            rewards: vec![
                EncounterReward {
                    kind: RewardKind::Energy,
                    value: 3,
                    description: "Gain 3 energy".into(),
                },
                EncounterReward {
                    kind: RewardKind::Hp,
                    value: 5,
                    description: "Heal 5 HP".into(),
                },
            ],
        },
    ]
}

/// Draw pile over a fixed set of encounter definitions. An empty pile is
/// refilled with every definition and reshuffled before the next draw.
#[derive(Debug, Clone)]
pub struct EncounterDeck {
    definitions: Vec<Encounter>,
    pile: Vec<usize>,
    spawned: u32,
}

impl EncounterDeck {
    pub fn new(definitions: Vec<Encounter>) -> Self {
        Self {
            definitions,
            pile: Vec::new(),
            spawned: 0,
        }
    }

    pub fn with_base_set() -> Self {
        Self::new(base_encounters())
    }

    /// Cards left before the next reshuffle.
    pub fn remaining(&self) -> usize {
        self.pile.len()
    }

    /// Draws and resolves one encounter for the unit at `actor`. `None` when
    /// the deck has no definitions.
    pub fn draw(
        &mut self,
        actor: usize,
        players: &mut [Player],
        rng: &mut SeededRandom,
    ) -> Option<EncounterOutcome> {
        if self.pile.is_empty() {
            self.pile = (0..self.definitions.len()).collect();
            rng.shuffle(&mut self.pile);
        }
        let index = self.pile.pop()?;
        let encounter = self.definitions.get(index)?.clone();
        tracing::trace!(encounter = %encounter.id, actor, "encounter drawn");

        let effects = encounter
            .effects
            .iter()
            .map(|effect| apply_effect(effect, actor, players, rng))
            .collect();
        let enemies = if encounter.kind == EncounterKind::Combat {
            self.spawn_enemies(encounter.difficulty, actor, players, rng)
        } else {
            Vec::new()
        };
        let rewards = encounter
            .rewards
            .iter()
            .map(|reward| apply_reward(reward, players))
            .collect();

        Some(EncounterOutcome {
            encounter_id: encounter.id,
            message: encounter.description,
            effects,
            rewards,
            enemies,
        })
    }

    fn spawn_enemies(
        &mut self,
        difficulty: Difficulty,
        actor: usize,
        players: &[Player],
        rng: &mut SeededRandom,
    ) -> Vec<Enemy> {
        let living = players.iter().filter(|p| p.is_alive()).count();
        let origin = players.get(actor).map_or(Position::new(0, 0), |p| p.position);
        let stats = difficulty.enemy_stats();
        let names = difficulty.enemy_names();
        (0..difficulty.enemy_count(living))
            .map(|_| {
                let name = names[rng.next_int(names.len())];
                let angle = rng.next() * TAU;
                let distance = rng.next() * 5.0 + 2.0;
                let position = Position::new(
                    origin.x + (angle.cos() * distance).round() as i32,
                    origin.y + (angle.sin() * distance).round() as i32,
                );
                let id = format!("enemy_{}", self.spawned);
                self.spawned += 1;
                Enemy {
                    id,
                    name: name.to_string(),
                    hp: stats.hp,
                    max_hp: stats.hp,
                    position,
                    difficulty,
                    stats,
                }
            })
            .collect()
    }
}

fn select_targets(
    targeting: EncounterTargeting,
    actor: usize,
    players: &[Player],
    rng: &mut SeededRandom,
) -> Vec<usize> {
    let living: Vec<usize> = (0..players.len()).filter(|&i| players[i].is_alive()).collect();
    if living.is_empty() {
        return living;
    }
    let origin = players.get(actor).map(|p| p.position);
    let distance = |i: &usize| origin.map_or(0, |o| o.manhattan(players[*i].position));
    // The active unit is only its own nearest or farthest when alone.
    let others: Vec<usize> = if living.len() == 1 {
        living.clone()
    } else {
        living.iter().copied().filter(|&i| i != actor).collect()
    };
    let hp = |i: &usize| players[*i].hp;

    // Ties go to the earliest unit in turn order.
    let pick = match targeting {
        EncounterTargeting::All => return living,
        EncounterTargeting::Random => Some(living[rng.next_int(living.len())]),
        EncounterTargeting::Nearest => others.iter().copied().min_by_key(distance),
        EncounterTargeting::Farthest => others.iter().copied().rev().max_by_key(distance),
        EncounterTargeting::LowestHp => living.iter().copied().min_by_key(hp),
        EncounterTargeting::HighestHp => living.iter().copied().rev().max_by_key(hp),
    };
    pick.into_iter().collect()
}

fn apply_effect(
    effect: &EncounterEffect,
    actor: usize,
    players: &mut [Player],
    rng: &mut SeededRandom,
) -> AppliedEffect {
    let targets = select_targets(effect.target, actor, players, rng);
    let amount = effect.value.unsigned_abs();
    for &i in &targets {
        let player = &mut players[i];
        match effect.kind {
            EncounterEffectKind::Damage => {
                player.take_damage(amount);
            }
            EncounterEffectKind::Heal => {
                player.heal(amount);
            }
            EncounterEffectKind::Energy if effect.value < 0 => {
                player.energy = player.energy.saturating_sub(amount);
            }
            EncounterEffectKind::Energy => player.gain_energy(amount),
        }
    }
    AppliedEffect {
        description: effect.description.clone(),
        targets: targets.iter().map(|&i| players[i].id.clone()).collect(),
    }
}

fn apply_reward(reward: &EncounterReward, players: &mut [Player]) -> AppliedEffect {
    let mut targets = Vec::new();
    for player in players.iter_mut().filter(|p| p.is_alive()) {
        match reward.kind {
            RewardKind::Card => {
                player.draw_cards(reward.value as usize);
                player.discard_down_to(HAND_LIMIT);
            }
            RewardKind::Energy => player.gain_energy(reward.value),
            RewardKind::Hp => {
                player.heal(reward.value);
            }
        }
        targets.push(player.id.clone());
    }
    AppliedEffect {
        description: reward.description.clone(),
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cards::base_catalog;
    use crate::engine::models::PlayerClass;

    fn squad() -> Vec<Player> {
        let catalog = base_catalog();
        [
            ("a", PlayerClass::Warrior, 0, 0),
            ("b", PlayerClass::Mage, 1, 0),
            ("c", PlayerClass::Engineer, 6, 0),
        ]
        .into_iter()
        .map(|(id, class, x, y)| {
            let mut p = catalog.create_player(id, id, class);
            p.position = Position::new(x, y);
            p
        })
        .collect()
    }

    fn only(id: &str) -> EncounterDeck {
        let encounter = base_encounters().into_iter().find(|e| e.id == id).unwrap();
        EncounterDeck::new(vec![encounter])
    }

    fn single_effect(
        kind: EncounterEffectKind,
        value: i32,
        target: EncounterTargeting,
    ) -> EncounterDeck {
        EncounterDeck::new(vec![Encounter {
            id: "static_burst".into(),
            name: "Event".into(),
            kind: EncounterKind::Event,
            description: String::new(),
            effects: vec![EncounterEffect {
                kind,
                value,
                target,
                description: String::new(),
            }],
            difficulty: Difficulty::Easy,
            rewards: vec![],
        }])
    }

    #[test]
    fn test_deck_cycles_every_encounter_before_reshuffle() {
        let mut deck = EncounterDeck::with_base_set();
        let mut players = squad();
        let mut rng = SeededRandom::new(9);
        let mut seen: Vec<String> = (0..3)
            .map(|_| deck.draw(0, &mut players, &mut rng).unwrap().encounter_id)
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["security_breach", "system_overload", "treasure_cache"]);
        assert_eq!(deck.remaining(), 0);
        deck.draw(0, &mut players, &mut rng).unwrap();
        assert_eq!(deck.remaining(), 2);
        assert!(EncounterDeck::new(vec![]).draw(0, &mut players, &mut rng).is_none());
    }

    #[test]
    fn test_system_overload_drains_living_units() {
        let mut players = squad();
        players[1].energy = 1;
        players[2].hp = 0;
        let mut rng = SeededRandom::new(0);
        let outcome = only("system_overload").draw(0, &mut players, &mut rng).unwrap();
        assert_eq!(outcome.effects[0].targets, vec!["a", "b"]);
        assert_eq!(players[0].energy, players[0].max_energy - 2);
        assert_eq!(players[1].energy, 0);
        assert_eq!(players[2].energy, players[2].max_energy);
        assert!(outcome.enemies.is_empty());
    }

    #[test]
    fn test_treasure_rewards_are_capped() {
        let mut players = squad();
        players[0].hp = 10;
        players[0].energy = 0;
        let mut rng = SeededRandom::new(0);
        let outcome = only("treasure_cache").draw(0, &mut players, &mut rng).unwrap();
        assert_eq!(outcome.rewards.len(), 2);
        assert_eq!(outcome.rewards[0].targets, vec!["a", "b", "c"]);
        assert_eq!(players[0].hp, 15);
        assert_eq!(players[0].energy, 3);
        assert_eq!(players[1].hp, players[1].max_hp);
        assert_eq!(players[1].energy, players[1].max_energy);
    }

    #[test]
    fn test_security_breach_spawns_one_enemy_per_living_unit() {
        let mut players = squad();
        for p in &mut players {
            p.draw_up_to(HAND_LIMIT);
        }
        players[2].hp = 0;
        let mut rng = SeededRandom::new(4);
        let mut deck = only("security_breach");
        let outcome = deck.draw(0, &mut players, &mut rng).unwrap();
        let ids: Vec<_> = outcome.enemies.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["enemy_0", "enemy_1"]);
        for enemy in &outcome.enemies {
            assert_eq!(enemy.stats, Difficulty::Medium.enemy_stats());
            assert_eq!(enemy.hp, 12);
            assert!(Difficulty::Medium.enemy_names().contains(&enemy.name.as_str()));
            assert!(enemy.position.manhattan(Position::new(0, 0)) <= 10);
        }
        // Card reward keeps hands at the limit.
        assert!(players.iter().all(|p| p.hand.len() == HAND_LIMIT));

        let next = deck.draw(0, &mut players, &mut rng).unwrap();
        assert_eq!(next.enemies[0].id, "enemy_2");
    }

    #[test]
    fn test_targeting_by_distance_and_hp() {
        let mut players = squad();
        players[0].hp = 12;
        players[1].hp = 4;
        let mut rng = SeededRandom::new(0);

        let mut hit = |kind, value, target| {
            let mut deck = single_effect(kind, value, target);
            let outcome = deck.draw(0, &mut players, &mut rng).unwrap();
            outcome.effects[0].targets.clone()
        };
        assert_eq!(hit(EncounterEffectKind::Damage, 3, EncounterTargeting::Nearest), vec!["b"]);
        assert_eq!(hit(EncounterEffectKind::Damage, 3, EncounterTargeting::Farthest), vec!["c"]);
        assert_eq!(hit(EncounterEffectKind::Heal, 10, EncounterTargeting::LowestHp), vec!["b"]);
        assert_eq!(hit(EncounterEffectKind::Damage, 50, EncounterTargeting::HighestHp), vec!["c"]);
        assert_eq!(hit(EncounterEffectKind::Heal, 1, EncounterTargeting::All), vec!["a", "b"]);

        assert_eq!(players[0].hp, 13);
        assert_eq!(players[1].hp, 12);
        assert!(!players[2].is_alive());
    }

    #[test]
    fn test_same_seed_same_encounters() {
        let run = || {
            let mut deck = EncounterDeck::with_base_set();
            let mut players = squad();
            let mut rng = SeededRandom::new(31);
            (0..7)
                .map(|_| deck.draw(1, &mut players, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
