//! Unit decision policies for automated play.

use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::engine::combat::is_in_range;
use crate::engine::models::{Card, CardType, EffectKind, Player, Position, Rarity, TeamId};
use crate::engine::rng::SeededRandom;
use crate::engine::terrain::Terrain;

/// Read-only board snapshot handed to a policy. `teams[i]` is the team of
/// `players[i]`.
pub struct GameView<'a> {
    pub players: &'a [Player],
    pub teams: &'a [TeamId],
    pub terrain: &'a Terrain,
    pub width: i32,
    pub height: i32,
}

impl<'a> GameView<'a> {
    pub fn in_bounds(&self, pos: Position) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    /// On the map and not held by a living unit other than `actor`.
    pub fn is_free(&self, pos: Position, actor: usize) -> bool {
        self.in_bounds(pos)
            && !self
                .players
                .iter()
                .enumerate()
                .any(|(i, p)| i != actor && p.is_alive() && p.position == pos)
    }

    /// Living units on any other team, with their indices.
    pub fn enemies(&self, actor: usize) -> Vec<(usize, &'a Player)> {
        let team = &self.teams[actor];
        self.players
            .iter()
            .enumerate()
            .filter(|(i, p)| p.is_alive() && &self.teams[*i] != team)
            .collect()
    }

    /// First enemy at the smallest Manhattan distance.
    pub fn nearest_enemy(&self, actor: usize) -> Option<(usize, &'a Player)> {
        let from = self.players[actor].position;
        self.enemies(actor)
            .into_iter()
            .min_by_key(|(_, e)| from.manhattan(e.position))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTarget {
    /// Index into `GameView::players`.
    Unit(usize),
    Tile(Position),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPlay {
    pub hand_index: usize,
    pub target: Option<PlayTarget>,
}

/// Decides what a unit does on its turn. All chance must come from `rng`.
pub trait UnitPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn select_card(
        &self,
        actor: usize,
        view: &GameView,
        rng: &mut SeededRandom,
    ) -> Option<PlannedPlay>;

    /// Destination for one move, with `reach` tiles of movement available.
    fn select_movement(
        &self,
        actor: usize,
        view: &GameView,
        reach: u32,
        rng: &mut SeededRandom,
    ) -> Option<Position>;
}

/// Tunable scoring constants for `HeuristicAi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiWeights {
    /// Expected damage per point of effective damage (the 1 energy = 2 damage rail).
    pub damage_value: f64,
    pub finishing_bonus: f64,
    pub heal_bonus: f64,
    pub heal_hp_threshold: f64,
    pub reposition_bonus: f64,
    pub engage_distance: i32,
    pub escape_bonus: f64,
    pub escape_distance: i32,
    pub escape_hp_threshold: f64,
    pub structure_bonus: f64,
    pub control_bonus: f64,
    pub underpriced_control_penalty: f64,
    pub high_ground_chance: f64,
    pub cover_chance: f64,
    pub cover_hp_threshold: f64,
}

impl Default for AiWeights {
    fn default() -> Self {
        Self {
            damage_value: 2.0,
            finishing_bonus: 5.0,
            heal_bonus: 3.0,
            heal_hp_threshold: 0.5,
            reposition_bonus: 2.0,
            engage_distance: 5,
            escape_bonus: 4.0,
            escape_distance: 2,
            escape_hp_threshold: 0.3,
            structure_bonus: 1.5,
            control_bonus: 3.0,
            underpriced_control_penalty: 1.0,
            high_ground_chance: 0.6,
            cover_chance: 0.7,
            cover_hp_threshold: 0.5,
        }
    }
}

pub static AGGRESSIVE_WEIGHTS: AiWeights = AiWeights {
    damage_value: 2.5,
    finishing_bonus: 7.0,
    heal_bonus: 1.5,
    heal_hp_threshold: 0.3,
    reposition_bonus: 3.0,
    engage_distance: 3,
    escape_bonus: 1.0,
    escape_distance: 1,
    escape_hp_threshold: 0.15,
    structure_bonus: 0.5,
    control_bonus: 2.0,
    underpriced_control_penalty: 1.0,
    high_ground_chance: 0.3,
    cover_chance: 0.3,
    cover_hp_threshold: 0.25,
};

pub static CAUTIOUS_WEIGHTS: AiWeights = AiWeights {
    damage_value: 1.5,
    finishing_bonus: 4.0,
    heal_bonus: 5.0,
    heal_hp_threshold: 0.7,
    reposition_bonus: 1.0,
    engage_distance: 7,
    escape_bonus: 6.0,
    escape_distance: 3,
    escape_hp_threshold: 0.5,
    structure_bonus: 2.5,
    control_bonus: 3.5,
    underpriced_control_penalty: 1.0,
    high_ground_chance: 0.8,
    cover_chance: 0.9,
    cover_hp_threshold: 0.7,
};

impl AiWeights {
    /// Named preset: "default", "aggressive" or "cautious".
    pub fn preset(name: &str) -> Option<AiWeights> {
        match name {
            "default" => Some(AiWeights::default()),
            "aggressive" => Some(AGGRESSIVE_WEIGHTS.clone()),
            "cautious" => Some(CAUTIOUS_WEIGHTS.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicAi {
    pub weights: AiWeights,
}

impl HeuristicAi {
    pub fn new(weights: AiWeights) -> Self {
        Self { weights }
    }

    fn effective_damage(card: &Card, enemies: &[(usize, &Player)]) -> f64 {
        let avg_defense = enemies
            .iter()
            .map(|(_, e)| e.robot.stats.defense as f64)
            .sum::<f64>()
            / enemies.len() as f64;
        (card.damage.unwrap_or(0) as f64 - avg_defense).max(1.0)
    }

    pub fn score_card(&self, card: &Card, actor: usize, view: &GameView) -> f64 {
        let w = &self.weights;
        let player = &view.players[actor];
        let enemies = view.enemies(actor);
        let hp_ratio = player.hp as f64 / player.max_hp.max(1) as f64;
        let mut score = 0.0;

        if card.is_damage_card() && !enemies.is_empty() {
            let effective = Self::effective_damage(card, &enemies);
            score += effective * w.damage_value - card.cost as f64;
            let range = card.effective_range();
            let finishable = enemies.iter().any(|(_, e)| {
                is_in_range(player.position, e.position, range) && (e.hp as f64) <= effective
            });
            if finishable {
                score += w.finishing_bonus;
            }
        }

        if card.has_effect(EffectKind::Heal) && hp_ratio < w.heal_hp_threshold {
            score += w.heal_bonus;
        }

        if card.has_effect(EffectKind::Move) {
            if let Some((_, nearest)) = view.nearest_enemy(actor) {
                let distance = player.position.manhattan(nearest.position);
                if distance > w.engage_distance {
                    score += w.reposition_bonus;
                }
                if distance <= w.escape_distance && hp_ratio < w.escape_hp_threshold {
                    score += w.escape_bonus;
                }
            }
        }

        if card.card_type == CardType::Structure {
            score += w.structure_bonus;
        }

        if card.has_control() {
            score += w.control_bonus;
            if card.rarity == Rarity::Common || card.cost < 2 {
                score -= w.underpriced_control_penalty;
            }
        }

        score
    }

    pub fn select_target(&self, card: &Card, actor: usize, view: &GameView) -> Option<PlayTarget> {
        let player = &view.players[actor];
        if card.targets_enemy() {
            let enemies = view.enemies(actor);
            let range = card.effective_range();
            let weakest = enemies
                .iter()
                .filter(|(_, e)| is_in_range(player.position, e.position, range))
                .min_by_key(|(_, e)| e.hp)
                .map(|(i, _)| *i);
            return weakest
                .or_else(|| view.nearest_enemy(actor).map(|(i, _)| i))
                .map(PlayTarget::Unit);
        }

        if card.card_type == CardType::Structure {
            let buildable =
                |pos: &Position| view.is_free(*pos, actor) && !view.terrain.is_occupied(*pos);
            let near_high_ground = view
                .terrain
                .high_ground()
                .flat_map(|t| t.position.neighbors())
                .find(buildable);
            return near_high_ground
                .or_else(|| player.position.neighbors().into_iter().find(buildable))
                .map(PlayTarget::Tile);
        }

        None
    }
}

impl UnitPolicy for HeuristicAi {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn select_card(
        &self,
        actor: usize,
        view: &GameView,
        _rng: &mut SeededRandom,
    ) -> Option<PlannedPlay> {
        let player = &view.players[actor];
        let mut scored: Vec<(usize, f64)> = player
            .hand
            .iter()
            .enumerate()
            .filter(|(_, c)| c.cost <= player.energy)
            .map(|(i, c)| (i, self.score_card(c, actor, view)))
            .collect();
        // Stable sort keeps hand order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for (hand_index, score) in scored {
            if score <= 0.0 {
                break;
            }
            let card = &player.hand[hand_index];
            let target = self.select_target(card, actor, view);
            let needs_target = card.targets_enemy() || card.card_type == CardType::Structure;
            if needs_target && target.is_none() {
                continue;
            }
            return Some(PlannedPlay { hand_index, target });
        }
        None
    }

    fn select_movement(
        &self,
        actor: usize,
        view: &GameView,
        reach: u32,
        rng: &mut SeededRandom,
    ) -> Option<Position> {
        let w = &self.weights;
        let player = &view.players[actor];
        let (_, nearest) = view.nearest_enemy(actor)?;
        let reach = reach as i32;
        let in_reach = |pos: Position| {
            pos != player.position
                && player.position.manhattan(pos) <= reach
                && view.is_free(pos, actor)
        };

        let high_ground: Vec<Position> = view
            .terrain
            .high_ground()
            .map(|t| t.position)
            .filter(|p| in_reach(*p))
            .collect();
        if !high_ground.is_empty() && rng.chance(w.high_ground_chance) {
            let weights = high_ground
                .iter()
                .map(|p| 1.0 / (1.0 + player.position.manhattan(*p) as f64));
            if let Ok(dist) = WeightedIndex::new(weights) {
                return Some(high_ground[dist.sample(rng)]);
            }
        }

        let hp_ratio = player.hp as f64 / player.max_hp.max(1) as f64;
        if hp_ratio < w.cover_hp_threshold {
            let cover = view
                .terrain
                .cover()
                .map(|t| t.position)
                .filter(|p| in_reach(*p))
                .min_by_key(|p| player.position.manhattan(*p));
            if let Some(cover) = cover {
                if rng.chance(w.cover_chance) {
                    return Some(cover);
                }
            }
        }

        let step = player.position.step_toward(nearest.position);
        (step != player.position).then_some(step)
    }
}

/// Never plays or moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassivePolicy;

impl UnitPolicy for PassivePolicy {
    fn name(&self) -> &str {
        "passive"
    }

    fn select_card(
        &self,
        _actor: usize,
        _view: &GameView,
        _rng: &mut SeededRandom,
    ) -> Option<PlannedPlay> {
        None
    }

    fn select_movement(
        &self,
        _actor: usize,
        _view: &GameView,
        _reach: u32,
        _rng: &mut SeededRandom,
    ) -> Option<Position> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cards::base_catalog;
    use crate::engine::models::PlayerClass;
    use crate::engine::terrain::{cover_tile, high_ground_tile};

    fn unit(id: &str, class: PlayerClass, x: i32, y: i32) -> Player {
        let mut p = base_catalog().create_player(id, id, class);
        p.position = Position::new(x, y);
        p
    }

    fn teams(n: usize) -> Vec<TeamId> {
        (0..n).map(|i| if i == 0 { "a".to_string() } else { "b".to_string() }).collect()
    }

    fn view<'a>(players: &'a [Player], teams: &'a [TeamId], terrain: &'a Terrain) -> GameView<'a> {
        GameView {
            players,
            teams,
            terrain,
            width: 12,
            height: 12,
        }
    }

    #[test]
    fn test_damage_score_follows_energy_rail() {
        let players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 9, 9),
        ];
        let team_ids = teams(2);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let ai = HeuristicAi::default();
        let pulse = base_catalog().get("pulse_strike").unwrap();
        // Mage defense 1: effective max(1, 2 - 1) = 1, so 1 * 2 - 3.
        assert_eq!(ai.score_card(&pulse, 0, &v), -1.0);
        let slam = base_catalog().get("heavy_slam").unwrap();
        assert_eq!(ai.score_card(&slam, 0, &v), 3.0);
    }

    #[test]
    fn test_finishing_bonus_for_reachable_weak_enemy() {
        let mut players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 1, 0),
        ];
        players[1].hp = 2;
        let team_ids = teams(2);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let slam = base_catalog().get("heavy_slam").unwrap();
        assert_eq!(HeuristicAi::default().score_card(&slam, 0, &v), 8.0);
    }

    #[test]
    fn test_finishing_reach_matches_attack_range() {
        // (2, 2) is 2.83 tiles away: inside range 3, though 4 steps by Manhattan.
        let mut players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 2, 2),
        ];
        players[1].hp = 1;
        let team_ids = teams(2);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let pulse = base_catalog().get("pulse_strike").unwrap();
        assert_eq!(pulse.effective_range(), 3);
        assert_eq!(HeuristicAi::default().score_card(&pulse, 0, &v), 4.0);

        players[1].position = Position::new(3, 1);
        let v = view(&players, &team_ids, &terrain);
        assert_eq!(HeuristicAi::default().score_card(&pulse, 0, &v), -1.0);
    }

    #[test]
    fn test_allies_are_not_enemies() {
        let players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("ally", PlayerClass::Mage, 1, 0),
            unit("b", PlayerClass::Mage, 5, 5),
        ];
        let team_ids = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let enemies: Vec<_> = v.enemies(0).into_iter().map(|(i, _)| i).collect();
        assert_eq!(enemies, vec![2]);
    }

    #[test]
    fn test_target_prefers_lowest_hp_in_range() {
        let mut players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 2, 0),
            unit("c", PlayerClass::Mage, 0, 2),
            unit("d", PlayerClass::Mage, 9, 9),
        ];
        players[2].hp = 5;
        players[3].hp = 1;
        let team_ids = teams(4);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let pulse = base_catalog().get("pulse_strike").unwrap();
        assert_eq!(HeuristicAi::default().select_target(&pulse, 0, &v), Some(PlayTarget::Unit(2)));
    }

    #[test]
    fn test_target_falls_back_to_nearest() {
        let players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 9, 9),
            unit("c", PlayerClass::Mage, 6, 0),
        ];
        let team_ids = teams(3);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let slam = base_catalog().get("heavy_slam").unwrap();
        assert_eq!(HeuristicAi::default().select_target(&slam, 0, &v), Some(PlayTarget::Unit(2)));
    }

    #[test]
    fn test_structure_placed_next_to_high_ground() {
        let players = vec![
            unit("a", PlayerClass::Engineer, 0, 0),
            unit("b", PlayerClass::Mage, 9, 9),
        ];
        let team_ids = teams(2);
        let mut terrain = Terrain::new();
        terrain.insert(high_ground_tile(0, Position::new(4, 4))).unwrap();
        let v = view(&players, &team_ids, &terrain);
        let tower = base_catalog().get("watchtower").unwrap();
        assert_eq!(
            HeuristicAi::default().select_target(&tower, 0, &v),
            Some(PlayTarget::Tile(Position::new(5, 4)))
        );
    }

    #[test]
    fn test_movement_steps_toward_nearest_enemy() {
        let players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 5, 3),
        ];
        let team_ids = teams(2);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let mut rng = SeededRandom::new(0);
        let dest = HeuristicAi::default().select_movement(0, &v, 3, &mut rng);
        assert_eq!(dest, Some(Position::new(1, 1)));
    }

    #[test]
    fn test_movement_high_ground_within_reach_only() {
        let players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 9, 9),
        ];
        let team_ids = teams(2);
        let mut terrain = Terrain::new();
        terrain.insert(high_ground_tile(0, Position::new(1, 1))).unwrap();
        terrain.insert(high_ground_tile(1, Position::new(8, 0))).unwrap();
        let v = view(&players, &team_ids, &terrain);
        let ai = HeuristicAi::new(AiWeights {
            high_ground_chance: 1.0,
            ..AiWeights::default()
        });
        let mut rng = SeededRandom::new(5);
        for _ in 0..20 {
            assert_eq!(ai.select_movement(0, &v, 3, &mut rng), Some(Position::new(1, 1)));
        }
    }

    #[test]
    fn test_low_hp_seeks_cover() {
        let mut players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 9, 9),
        ];
        players[0].hp = 5;
        let team_ids = teams(2);
        let mut terrain = Terrain::new();
        terrain.insert(cover_tile(0, Position::new(0, 2))).unwrap();
        let v = view(&players, &team_ids, &terrain);
        let ai = HeuristicAi::new(AiWeights {
            cover_chance: 1.0,
            ..AiWeights::default()
        });
        let mut rng = SeededRandom::new(5);
        assert_eq!(ai.select_movement(0, &v, 3, &mut rng), Some(Position::new(0, 2)));
    }

    #[test]
    fn test_select_card_skips_unaffordable_and_nonpositive() {
        let mut players = vec![
            unit("a", PlayerClass::Warrior, 0, 0),
            unit("b", PlayerClass::Mage, 1, 0),
        ];
        let catalog = base_catalog();
        players[0].hand = vec![
            catalog.get("pulse_strike").unwrap(),
            catalog.get("heavy_slam").unwrap(),
        ];
        players[0].energy = 2;
        let team_ids = teams(2);
        let terrain = Terrain::new();
        let v = view(&players, &team_ids, &terrain);
        let mut rng = SeededRandom::new(0);
        assert_eq!(HeuristicAi::default().select_card(0, &v, &mut rng), None);
        players[0].energy = 5;
        let v = view(&players, &team_ids, &terrain);
        let play = HeuristicAi::default().select_card(0, &v, &mut rng).unwrap();
        assert_eq!(play.hand_index, 1);
        assert_eq!(play.target, Some(PlayTarget::Unit(1)));
    }

    #[test]
    fn test_presets() {
        assert!(AiWeights::preset("aggressive").is_some());
        assert!(AiWeights::preset("unknown").is_none());
        let partial: AiWeights = toml::from_str("finishing_bonus = 9.0").unwrap();
        assert_eq!(partial.finishing_bonus, 9.0);
        assert_eq!(partial.control_bonus, 3.0);
    }
}
