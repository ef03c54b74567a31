//! Per-player phase cycle with entry actions and the win check.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::cards::{resolve_card, CardTarget, Resolution};
use crate::engine::encounter::{EncounterDeck, EncounterOutcome, Enemy};
use crate::engine::models::*;
use crate::engine::rng::SeededRandom;
use crate::engine::terrain::{structure_tile, Terrain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Draw,
    Action,
    Build,
    Program,
    Encounter,
    End,
}

impl Phase {
    pub const ORDER: [Phase; 6] = [
        Phase::Draw,
        Phase::Action,
        Phase::Build,
        Phase::Program,
        Phase::Encounter,
        Phase::End,
    ];

    /// Next phase within one player's turn, `None` after `End`.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Draw => Some(Phase::Action),
            Phase::Action => Some(Phase::Build),
            Phase::Build => Some(Phase::Program),
            Phase::Program => Some(Phase::Encounter),
            Phase::Encounter => Some(Phase::End),
            Phase::End => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Draw => "draw",
            Phase::Action => "action",
            Phase::Build => "build",
            Phase::Program => "program",
            Phase::Encounter => "encounter",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TurnPhaseMachine {
    players: Vec<Player>,
    teams: BTreeMap<PlayerId, TeamId>,
    terrain: Terrain,
    programs: Vec<ActiveProgram>,
    encounters: Option<EncounterDeck>,
    last_encounter: Option<EncounterOutcome>,
    enemies: Vec<Enemy>,
    rng: SeededRandom,
    current: usize,
    phase: Phase,
    turn: u32,
    game_over: bool,
    winner: Option<TeamId>,
}

impl TurnPhaseMachine {
    /// Every player on a team of their own.
    pub fn new(players: Vec<Player>, rng: SeededRandom) -> Self {
        let teams = players
            .iter()
            .map(|p| (p.id.clone(), p.id.clone()))
            .collect();
        Self::with_teams(players, teams, rng)
    }

    /// Starts in the first player's draw phase with its entry action applied.
    pub fn with_teams(
        players: Vec<Player>,
        teams: BTreeMap<PlayerId, TeamId>,
        rng: SeededRandom,
    ) -> Self {
        let mut machine = Self {
            players,
            teams,
            terrain: Terrain::new(),
            programs: Vec::new(),
            encounters: None,
            last_encounter: None,
            enemies: Vec::new(),
            rng,
            current: 0,
            phase: Phase::Draw,
            turn: 1,
            game_over: false,
            winner: None,
        };
        machine.enter_phase();
        machine
    }

    pub fn with_terrain(mut self, terrain: Terrain) -> Self {
        self.terrain = terrain;
        self
    }

    /// Draw from `deck` on every encounter phase. Without a deck the phase
    /// passes with no effect.
    pub fn with_encounters(mut self, deck: EncounterDeck) -> Self {
        self.encounters = Some(deck);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn programs(&self) -> &[ActiveProgram] {
        &self.programs
    }

    /// Outcome of the most recent encounter phase that drew a card.
    pub fn last_encounter(&self) -> Option<&EncounterOutcome> {
        self.last_encounter.as_ref()
    }

    /// Every enemy spawned by combat encounters so far.
    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Option<&TeamId> {
        self.winner.as_ref()
    }

    fn team_of<'a>(&'a self, player: &'a Player) -> &'a str {
        self.teams.get(&player.id).map_or(player.id.as_str(), |t| t.as_str())
    }

    /// Moves to the next phase, or to the next player's draw phase after
    /// `End`. Returns the phase entered.
    pub fn advance_phase(&mut self) -> Phase {
        match self.phase.next() {
            Some(phase) => self.phase = phase,
            None => {
                self.current += 1;
                if self.current >= self.players.len() {
                    self.current = 0;
                    self.turn += 1;
                }
                self.phase = Phase::Draw;
            }
        }
        self.enter_phase();
        self.phase
    }

    fn enter_phase(&mut self) {
        if self.phase == Phase::Encounter {
            self.draw_encounter();
            return;
        }
        let Some(player) = self.players.get_mut(self.current) else {
            return;
        };
        match self.phase {
            Phase::Draw => {
                player.draw_up_to(HAND_LIMIT);
                if player.hand.len() < HAND_LIMIT && player.reshuffle_if_empty(&mut self.rng) {
                    player.draw_up_to(HAND_LIMIT);
                }
                player.discard_down_to(HAND_LIMIT);
            }
            Phase::Program => {
                let heal: i32 = self
                    .programs
                    .iter()
                    .filter(|p| p.owner == player.id)
                    .map(|p| p.card.effect_total(EffectKind::Heal))
                    .sum();
                if heal > 0 && player.is_alive() {
                    player.heal(heal as u32);
                }
            }
            Phase::End => {
                player.refill_energy();
                let owner = player.id.clone();
                let (mut own, rest): (Vec<_>, Vec<_>) =
                    self.programs.drain(..).partition(|p| p.owner == owner);
                decay_programs(&mut own);
                self.programs = rest;
                self.programs.extend(own);
                self.check_win_condition();
            }
            Phase::Action | Phase::Build | Phase::Encounter => {}
        }
    }

    fn draw_encounter(&mut self) {
        let Some(deck) = self.encounters.as_mut() else {
            return;
        };
        if let Some(outcome) = deck.draw(self.current, &mut self.players, &mut self.rng) {
            tracing::debug!(
                encounter = %outcome.encounter_id,
                turn = self.turn,
                enemies = outcome.enemies.len(),
                "encounter resolved"
            );
            self.enemies.extend(outcome.enemies.iter().cloned());
            self.last_encounter = Some(outcome);
        }
    }

    /// Plays a hand card in the action phase. Returns `false` with no state
    /// change when out of phase, not in hand, or unaffordable.
    pub fn play_card(&mut self, card_id: &str, target_id: Option<&str>) -> bool {
        self.play_card_resolved(card_id, target_id).is_some()
    }

    pub fn play_card_resolved(
        &mut self,
        card_id: &str,
        target_id: Option<&str>,
    ) -> Option<Resolution> {
        if self.phase != Phase::Action {
            tracing::trace!(card = card_id, phase = %self.phase, "play rejected: wrong phase");
            return None;
        }
        let current = self.current;
        let player = self.players.get(current)?;
        let index = player.hand_index(card_id)?;
        if player.energy < player.hand[index].cost {
            tracing::trace!(card = card_id, "play rejected: not enough energy");
            return None;
        }

        let target_index = target_id
            .and_then(|id| self.players.iter().position(|p| p.id == id))
            .filter(|&i| i != current);

        let card = self.players[current].discard_from_hand(index)?;
        let resolution = match target_index {
            Some(t) => {
                let (player, target) = pair_mut(&mut self.players, current, t);
                resolve_card(&card, player, Some(CardTarget::Unit(target)))
            }
            None => resolve_card(&card, &mut self.players[current], None),
        };

        if card.card_type == CardType::Program {
            self.programs.push(ActiveProgram {
                owner: self.players[current].id.clone(),
                remaining: card.duration.unwrap_or(1),
                card,
            });
        }
        Some(resolution)
    }

    /// Builds a structure card onto a free tile in the action phase.
    pub fn build_structure(&mut self, card_id: &str, position: Position) -> bool {
        if self.phase != Phase::Action || self.terrain.is_occupied(position) {
            return false;
        }
        let Some(player) = self.players.get_mut(self.current) else {
            return false;
        };
        let Some(index) = player.hand_index(card_id) else {
            return false;
        };
        let card = std::sync::Arc::clone(&player.hand[index]);
        if card.card_type != CardType::Structure || player.energy < card.cost {
            return false;
        }
        if self
            .terrain
            .insert(structure_tile(&card, &player.id, position))
            .is_err()
        {
            debug_assert!(false, "free tile reported occupied at {position:?}");
            return false;
        }
        player.spend_energy(card.cost);
        player.discard_from_hand(index);
        true
    }

    /// Rejects a destination held by another living unit.
    pub fn move_player(&mut self, player_id: &str, position: Position) -> bool {
        let blocked = self
            .players
            .iter()
            .any(|p| p.id != player_id && p.is_alive() && p.position == position);
        if blocked {
            return false;
        }
        match self.players.iter_mut().find(|p| p.id == player_id) {
            Some(p) if p.is_alive() => {
                p.position = position;
                true
            }
            _ => false,
        }
    }

    /// Ends the game when at most one team has a living member.
    pub fn check_win_condition(&mut self) -> bool {
        let alive: BTreeSet<&str> = self
            .players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| self.team_of(p))
            .collect();
        let game_over = alive.len() <= 1;
        let winner = if game_over {
            alive.first().map(|t| t.to_string())
        } else {
            None
        };
        self.game_over = game_over;
        self.winner = winner;
        game_over
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }
}

/// Two distinct mutable elements of one slice.
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b);
    if a < b {
        let (left, right) = items.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = items.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cards::base_catalog;
    use crate::engine::encounter::base_encounters;

    fn duel() -> TurnPhaseMachine {
        let catalog = base_catalog();
        let mut a = catalog.create_player("a", "Alpha", PlayerClass::Warrior);
        let mut b = catalog.create_player("b", "Beta", PlayerClass::Mage);
        a.position = Position::new(0, 0);
        b.position = Position::new(2, 0);
        TurnPhaseMachine::new(vec![a, b], SeededRandom::new(11))
    }

    fn to_phase(machine: &mut TurnPhaseMachine, phase: Phase) {
        while machine.phase() != phase {
            machine.advance_phase();
        }
    }

    #[test]
    fn test_phase_order_and_wrap() {
        let mut machine = duel();
        assert_eq!(machine.phase(), Phase::Draw);
        for player in [0, 1] {
            for (i, phase) in Phase::ORDER.iter().enumerate() {
                assert_eq!(machine.current_index(), player);
                assert_eq!(machine.phase(), *phase);
                assert_eq!(machine.turn(), 1);
                if i + 1 < Phase::ORDER.len() || player == 0 {
                    machine.advance_phase();
                }
            }
        }
        machine.advance_phase();
        assert_eq!(machine.current_index(), 0);
        assert_eq!(machine.phase(), Phase::Draw);
        assert_eq!(machine.turn(), 2);
    }

    #[test]
    fn test_construction_draws_opening_hand() {
        let machine = duel();
        let first = &machine.players()[0];
        assert_eq!(first.hand.len(), HAND_LIMIT);
        assert_eq!(first.total_cards(), 7);
        assert!(machine.players()[1].hand.is_empty());
    }

    #[test]
    fn test_play_card_outside_action_phase_fails() {
        let mut machine = duel();
        let before = machine.players()[0].clone();
        assert!(!machine.play_card("pulse_strike", Some("b")));
        let after = &machine.players()[0];
        assert_eq!(after.energy, before.energy);
        assert_eq!(after.hand.len(), before.hand.len());
    }

    #[test]
    fn test_play_card_without_energy_fails_cleanly() {
        let mut machine = duel();
        to_phase(&mut machine, Phase::Action);
        machine.player_mut("a").unwrap().energy = 1;
        assert!(!machine.play_card("pulse_strike", Some("b")));
        assert_eq!(machine.player("a").unwrap().energy, 1);
        assert_eq!(machine.player("b").unwrap().hp, 20);
    }

    #[test]
    fn test_play_damage_card() {
        let mut machine = duel();
        to_phase(&mut machine, Phase::Action);
        assert!(machine.players()[0].hand_index("pulse_strike").is_some());
        assert!(machine.play_card("pulse_strike", Some("b")));
        let a = machine.player("a").unwrap();
        assert_eq!(a.energy, 2);
        assert_eq!(a.discard.len(), 1);
        assert_eq!(a.total_cards(), 7);
        assert_eq!(machine.player("b").unwrap().hp, 18);
    }

    #[test]
    fn test_energy_never_negative() {
        let mut machine = duel();
        to_phase(&mut machine, Phase::Action);
        let hand: Vec<String> = machine.players()[0]
            .hand
            .iter()
            .map(|c| c.id.clone())
            .collect();
        for id in hand {
            machine.play_card(&id, Some("b"));
            let a = machine.player("a").unwrap();
            assert!(a.energy <= a.max_energy);
        }
    }

    #[test]
    fn test_program_heals_on_program_phase() {
        let mut machine = duel();
        to_phase(&mut machine, Phase::Action);
        machine.player_mut("a").unwrap().hp = 10;
        assert!(machine.play_card("auto_repair", None));
        assert_eq!(machine.programs().len(), 1);
        to_phase(&mut machine, Phase::Program);
        assert_eq!(machine.player("a").unwrap().hp, 11);
        to_phase(&mut machine, Phase::End);
        assert_eq!(machine.programs()[0].remaining, 2);
        let a = machine.player("a").unwrap();
        assert_eq!(a.energy, a.max_energy);
    }

    #[test]
    fn test_build_structure_places_tile() {
        let mut machine = duel();
        to_phase(&mut machine, Phase::Action);
        assert!(machine.build_structure("watchtower", Position::new(0, 1)));
        let tile = machine.terrain().at(Position::new(0, 1)).unwrap();
        assert_eq!(tile.kind, TerrainType::Turret);
        assert_eq!(tile.properties.owner.as_deref(), Some("a"));
        assert!(!machine.build_structure("watchtower", Position::new(0, 1)));
    }

    #[test]
    fn test_move_into_occupied_tile_fails() {
        let mut machine = duel();
        assert!(!machine.move_player("a", Position::new(2, 0)));
        assert_eq!(machine.player("a").unwrap().position, Position::new(0, 0));
        assert!(machine.move_player("a", Position::new(1, 0)));
    }

    #[test]
    fn test_win_condition() {
        let catalog = base_catalog();
        let players = vec![
            catalog.create_player("a1", "a1", PlayerClass::Warrior),
            catalog.create_player("a2", "a2", PlayerClass::Mage),
            catalog.create_player("b1", "b1", PlayerClass::Engineer),
        ];
        let teams = BTreeMap::from([
            ("a1".to_string(), "red".to_string()),
            ("a2".to_string(), "red".to_string()),
            ("b1".to_string(), "blue".to_string()),
        ]);
        let mut machine = TurnPhaseMachine::with_teams(players, teams, SeededRandom::new(1));
        assert!(!machine.check_win_condition());
        machine.player_mut("a1").unwrap().hp = 0;
        assert!(!machine.check_win_condition());
        machine.player_mut("b1").unwrap().hp = 0;
        assert!(machine.check_win_condition());
        assert_eq!(machine.winner().map(String::as_str), Some("red"));
        machine.player_mut("a2").unwrap().hp = 0;
        assert!(machine.check_win_condition());
        assert_eq!(machine.winner(), None);
    }

    #[test]
    fn test_encounter_phase_draws_from_deck() {
        let mut machine = duel();
        to_phase(&mut machine, Phase::Encounter);
        assert!(machine.last_encounter().is_none());

        let catalog = base_catalog();
        let mut a = catalog.create_player("a", "Alpha", PlayerClass::Warrior);
        let b = catalog.create_player("b", "Beta", PlayerClass::Mage);
        a.hp = 10;
        let treasure: Vec<_> = base_encounters()
            .into_iter()
            .filter(|e| e.id == "treasure_cache")
            .collect();
        let mut machine = TurnPhaseMachine::new(vec![a, b], SeededRandom::new(11))
            .with_encounters(EncounterDeck::new(treasure));
        to_phase(&mut machine, Phase::Encounter);
        let outcome = machine.last_encounter().unwrap();
        assert_eq!(outcome.encounter_id, "treasure_cache");
        assert_eq!(machine.player("a").unwrap().hp, 15);
        assert!(machine.enemies().is_empty());
    }

    #[test]
    fn test_combat_encounters_accumulate_enemies() {
        let catalog = base_catalog();
        let players = vec![
            catalog.create_player("a", "Alpha", PlayerClass::Warrior),
            catalog.create_player("b", "Beta", PlayerClass::Mage),
        ];
        let breach: Vec<_> = base_encounters()
            .into_iter()
            .filter(|e| e.id == "security_breach")
            .collect();
        let mut machine = TurnPhaseMachine::new(players, SeededRandom::new(2))
            .with_encounters(EncounterDeck::new(breach));
        to_phase(&mut machine, Phase::Encounter);
        assert_eq!(machine.enemies().len(), 2);
        machine.advance_phase();
        to_phase(&mut machine, Phase::Encounter);
        assert_eq!(machine.current_index(), 1);
        assert_eq!(machine.enemies().len(), 4);
        assert_eq!(machine.enemies()[3].id, "enemy_3");
        for p in machine.players() {
            assert_eq!(p.total_cards(), 7);
        }
    }

    #[test]
    fn test_deck_conserved_over_full_cycle() {
        let mut machine = duel();
        for _ in 0..(Phase::ORDER.len() * 6) {
            machine.advance_phase();
        }
        for p in machine.players() {
            assert_eq!(p.total_cards(), 7);
        }
    }
}
