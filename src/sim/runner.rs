//! Scenario-driven batch runner.
//!
//! Each game owns its players, terrain and a single `SeededRandom`; every
//! chance roll in the game (deck shuffles, AI rolls, hit and crit rolls)
//! draws from that one stream, so a seed fully determines the result.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::engine::cards::{base_catalog, CardCatalog};
use crate::engine::combat::{is_in_range, CombatResolver};
use crate::engine::error::SimResult;
use crate::engine::models::*;
use crate::engine::rng::SeededRandom;
use crate::engine::terrain::{cover_tile, hazard_tile, high_ground_tile, structure_tile, Terrain};
use crate::sim::ai::{GameView, HeuristicAi, PlannedPlay, PlayTarget, UnitPolicy};
use crate::sim::config::SimulationConfig;
use crate::sim::scenarios::{all_scenarios, require_scenario, ScenarioConfig, UnitConfig, NPC_TEAM};

/// One game to play: scenario, game index and seed.
#[derive(Debug, Clone, Copy)]
pub struct GameJob {
    pub scenario: &'static ScenarioConfig,
    pub game_index: u32,
    pub seed: u64,
}

/// Resolves requested ids to registry scenarios that pass validation.
/// Unknown and invalid scenarios are skipped with a warning.
pub fn resolve_scenarios(config: &SimulationConfig) -> Vec<&'static ScenarioConfig> {
    let candidates: Vec<&'static ScenarioConfig> = if config.runs_all() {
        all_scenarios().iter().collect()
    } else {
        config
            .scenarios
            .iter()
            .filter_map(|id| match require_scenario(id) {
                Ok(scenario) => Some(scenario),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping scenario");
                    None
                }
            })
            .collect()
    };
    candidates
        .into_iter()
        .filter(|s| match s.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(scenario = %s.id, error = %e, "invalid scenario, skipping");
                false
            }
        })
        .collect()
}

/// Jobs in scenario, game index, seed index order.
pub fn plan_jobs(config: &SimulationConfig) -> Vec<GameJob> {
    let mut jobs = Vec::new();
    for scenario in resolve_scenarios(config) {
        for game_index in 0..config.games_per_scenario {
            for seed_index in 0..config.seeds {
                jobs.push(GameJob {
                    scenario,
                    game_index,
                    seed: SimulationConfig::seed_for(game_index, seed_index),
                });
            }
        }
    }
    jobs
}

/// Heuristic AI from `config.ai` over the `config.cards` catalog, or the
/// built-in set when no file is configured.
pub fn run_simulations(config: &SimulationConfig) -> SimResult<Vec<SimulationResult>> {
    let loaded;
    let catalog = match &config.cards {
        Some(path) => {
            loaded = CardCatalog::load_json(path)?;
            &loaded
        }
        None => base_catalog(),
    };
    let policy = HeuristicAi::new(config.ai.clone());
    Ok(run_simulations_with(config, catalog, &policy, None))
}

pub fn run_simulations_with(
    config: &SimulationConfig,
    catalog: &CardCatalog,
    policy: &dyn UnitPolicy,
    progress_callback: Option<&dyn Fn(usize, usize)>,
) -> Vec<SimulationResult> {
    let jobs = plan_jobs(config);
    let total = jobs.len();
    tracing::info!(
        games = config.games_per_scenario,
        seeds = config.seeds,
        total,
        policy = policy.name(),
        "running simulations"
    );

    let t0 = Instant::now();
    let mut results = Vec::with_capacity(total);
    let mut current: Option<&str> = None;
    for (i, job) in jobs.iter().enumerate() {
        if current != Some(job.scenario.id.as_str()) {
            tracing::info!(scenario = %job.scenario.id, name = %job.scenario.name, "scenario");
            current = Some(job.scenario.id.as_str());
        }
        if let Some(result) = run_job(job, config.dice_mode, catalog, policy) {
            results.push(result);
        }
        if let Some(cb) = progress_callback {
            cb(i + 1, total);
        }
    }
    tracing::info!(
        completed = results.len(),
        elapsed_s = t0.elapsed().as_secs_f64(),
        "simulations complete"
    );
    results
}

/// Fans games out over the rayon pool. Output order and content match
/// `run_simulations_with`.
pub fn run_simulations_parallel(
    config: &SimulationConfig,
    catalog: &CardCatalog,
    policy: &dyn UnitPolicy,
) -> Vec<SimulationResult> {
    let jobs = plan_jobs(config);
    tracing::info!(
        total = jobs.len(),
        policy = policy.name(),
        "running simulations in parallel"
    );
    let results: Vec<SimulationResult> = jobs
        .par_iter()
        .filter_map(|job| run_job(job, config.dice_mode, catalog, policy))
        .collect();
    tracing::info!(completed = results.len(), "parallel simulations complete");
    results
}

fn run_job(
    job: &GameJob,
    dice_mode: bool,
    catalog: &CardCatalog,
    policy: &dyn UnitPolicy,
) -> Option<SimulationResult> {
    let game = run_single_game(job.scenario, job.seed, job.game_index, dice_mode, catalog, policy);
    match game {
        Ok(result) => Some(result),
        Err(e) => {
            tracing::warn!(
                scenario = %job.scenario.id,
                seed = job.seed,
                error = %e,
                "game skipped"
            );
            None
        }
    }
}

/// Plays one game to elimination or the round cap.
pub fn run_single_game(
    scenario: &ScenarioConfig,
    seed: u64,
    game_id: u32,
    dice_mode: bool,
    catalog: &CardCatalog,
    policy: &dyn UnitPolicy,
) -> SimResult<SimulationResult> {
    scenario.validate()?;
    let mut game = Game::new(scenario, seed, dice_mode || scenario.dice_mode, catalog)?;
    game.play(policy);
    let result = game.finish(game_id, seed);
    tracing::debug!(
        scenario = %result.scenario_id,
        seed,
        winner = %result.winner,
        rounds = result.total_rounds,
        "game finished"
    );
    Ok(result)
}

/// Builds a unit from the class template and applies scenario overrides.
pub fn build_unit(catalog: &CardCatalog, id: &str, config: &UnitConfig) -> Player {
    let mut player = catalog.create_player(id, id, config.class);
    if let Some(max_hp) = config.max_hp {
        player.max_hp = max_hp;
    }
    if let Some(hp) = config.hp {
        player.hp = hp;
        player.max_hp = player.max_hp.max(hp);
    }
    player.hp = player.hp.min(player.max_hp);

    if let Some(max_energy) = config.max_energy {
        player.max_energy = max_energy;
    }
    if let Some(energy) = config.energy {
        player.energy = energy;
        player.max_energy = player.max_energy.max(energy);
    }
    player.energy = player.energy.min(player.max_energy);
    player.robot.stats.energy = player.max_energy;

    if let Some(stats) = &config.stats {
        let robot = &mut player.robot.stats;
        robot.movement = stats.movement.unwrap_or(robot.movement);
        robot.attack = stats.attack.unwrap_or(robot.attack);
        robot.defense = stats.defense.unwrap_or(robot.defense);
    }
    player
}

/// Terrain tiles from the scenario's cover, high-ground and hazard lists.
pub fn build_terrain(scenario: &ScenarioConfig) -> SimResult<Terrain> {
    let layout = &scenario.map_layout;
    let mut terrain = Terrain::new();
    for (i, pos) in layout.cover_tiles.iter().enumerate() {
        terrain.insert(cover_tile(i, *pos))?;
    }
    for (i, pos) in layout.high_ground_tiles.iter().enumerate() {
        terrain.insert(high_ground_tile(i, *pos))?;
    }
    for (i, pos) in layout.hazard_tiles.iter().enumerate() {
        terrain.insert(hazard_tile(i, *pos))?;
    }
    Ok(terrain)
}

struct Game<'a> {
    scenario: &'a ScenarioConfig,
    catalog: &'a CardCatalog,
    combat: CombatResolver,
    rng: SeededRandom,
    terrain: Terrain,
    players: Vec<Player>,
    teams: Vec<TeamId>,
    stats: Vec<PlayerSimStats>,
    programs: Vec<ActiveProgram>,
    events: Vec<GameEvent>,
    round: u32,
}

impl<'a> Game<'a> {
    fn new(
        scenario: &'a ScenarioConfig,
        seed: u64,
        dice_mode: bool,
        catalog: &'a CardCatalog,
    ) -> SimResult<Self> {
        let mut game = Self {
            scenario,
            catalog,
            combat: CombatResolver::new(dice_mode),
            rng: SeededRandom::new(seed),
            terrain: build_terrain(scenario)?,
            players: Vec::new(),
            teams: Vec::new(),
            stats: Vec::new(),
            programs: Vec::new(),
            events: Vec::new(),
            round: 0,
        };
        for team in &scenario.teams {
            for (idx, unit) in team.units.iter().enumerate() {
                let id = format!("{}_unit_{}", team.id, idx);
                game.spawn(&id, &team.id, unit, team.starting_positions[idx]);
            }
        }
        Ok(game)
    }

    /// Adds a unit with a shuffled deck and an opening hand.
    fn spawn(&mut self, id: &str, team: &str, config: &UnitConfig, position: Position) {
        let mut player = build_unit(self.catalog, id, config);
        player.position = position;
        self.rng.shuffle(&mut player.deck);
        player.draw_up_to(HAND_LIMIT);
        self.stats
            .push(PlayerSimStats::new(id, player.class, team, player.hp));
        self.teams.push(team.to_string());
        self.players.push(player);
    }

    fn spawn_wave(&mut self) {
        let round = self.round;
        let scenario = self.scenario;
        let Some(wave) = scenario.npc_waves.iter().find(|w| w.round == round) else {
            return;
        };
        for (idx, unit) in wave.units.iter().enumerate() {
            let id = format!("npc_wave_{round}_{idx}");
            self.spawn(&id, NPC_TEAM, unit, wave.spawn_positions[idx]);
        }
        tracing::trace!(round, units = wave.units.len(), "npc wave spawned");
    }

    fn alive_teams(&self) -> BTreeSet<&str> {
        self.players
            .iter()
            .zip(&self.teams)
            .filter(|(p, _)| p.is_alive())
            .map(|(_, t)| t.as_str())
            .collect()
    }

    fn play(&mut self, policy: &dyn UnitPolicy) {
        while self.round < self.scenario.max_rounds {
            self.round += 1;
            self.spawn_wave();
            for i in 0..self.players.len() {
                if self.players[i].is_alive() {
                    self.take_turn(i, policy);
                }
            }
            if self.alive_teams().len() <= 1 {
                break;
            }
        }
    }

    fn event(
        &mut self,
        player: usize,
        kind: GameEventType,
        value: Option<i64>,
        target: Option<String>,
        card: Option<&Card>,
    ) {
        self.events.push(GameEvent {
            round: self.round,
            player_id: self.players[player].id.clone(),
            kind,
            value,
            target,
            card_id: card.map(|c| c.id.clone()),
        });
    }

    fn take_turn(&mut self, i: usize, policy: &dyn UnitPolicy) {
        self.stats[i].survived_rounds += 1;
        self.tick_programs(i);

        let status = self.players[i].status;
        let stunned = status.stunned > 0;
        let immobilized = status.immobilized > 0;
        if stunned || immobilized {
            let status = &mut self.players[i].status;
            status.stunned = status.stunned.saturating_sub(1);
            status.immobilized = status.immobilized.saturating_sub(1);
            self.stats[i].control_turns += 1;
        }

        if !stunned {
            let plan = {
                let view = GameView {
                    players: &self.players,
                    teams: &self.teams,
                    terrain: &self.terrain,
                    width: self.scenario.map_layout.width,
                    height: self.scenario.map_layout.height,
                };
                policy.select_card(i, &view, &mut self.rng)
            };
            let played = plan.and_then(|plan| self.apply_play(i, plan));
            if !immobilized && self.players[i].is_alive() {
                let move_card = played.as_ref().filter(|(_, steps)| *steps > 0);
                let bonus_steps = move_card.map_or(0, |(_, steps)| *steps);
                self.movement(i, bonus_steps, move_card.map(|(card, _)| &**card), policy);
            }
        }

        let player = &mut self.players[i];
        player.refill_energy();
        player.draw_up_to(HAND_LIMIT);
        player.reshuffle_if_empty(&mut self.rng);
        self.decay_programs_of(i);
    }

    fn tick_programs(&mut self, i: usize) {
        let owner = &self.players[i].id;
        let heal: i32 = self
            .programs
            .iter()
            .filter(|p| &p.owner == owner)
            .map(|p| p.card.effect_total(EffectKind::Heal))
            .sum();
        if heal > 0 {
            let restored = self.players[i].heal(heal as u32);
            if restored > 0 {
                self.event(i, GameEventType::Heal, Some(i64::from(restored)), None, None);
            }
        }
    }

    fn decay_programs_of(&mut self, i: usize) {
        let owner = self.players[i].id.clone();
        let (mut own, rest): (Vec<_>, Vec<_>) =
            self.programs.drain(..).partition(|p| p.owner == owner);
        decay_programs(&mut own);
        self.programs = rest;
        self.programs.extend(own);
    }

    /// Pays for and resolves a planned play. Returns the card played and the
    /// free movement steps it grants.
    fn apply_play(&mut self, i: usize, plan: PlannedPlay) -> Option<(Arc<Card>, u32)> {
        debug_assert!(
            plan.hand_index < self.players[i].hand.len(),
            "planned card not in hand"
        );
        let card = self.players[i].hand.get(plan.hand_index).map(Arc::clone)?;
        if !self.players[i].spend_energy(card.cost) {
            tracing::trace!(card = %card.id, "play rejected: not enough energy");
            return None;
        }
        self.stats[i].record_play(&card);
        self.players[i].discard_from_hand(plan.hand_index);

        match plan.target {
            Some(PlayTarget::Unit(t))
                if t != i && t < self.players.len() && self.players[t].is_alive() =>
            {
                self.resolve_against(i, t, &card);
            }
            Some(PlayTarget::Tile(pos)) if card.card_type == CardType::Structure => {
                self.build(i, &card, pos);
            }
            _ => {}
        }

        let player = &mut self.players[i];
        let mut bonus_steps = 0;
        for effect in &card.effects {
            let amount = effect.value.max(0) as u32;
            match effect.kind {
                EffectKind::Heal
                    if effect.target == EffectTarget::Own
                        && card.card_type != CardType::Program =>
                {
                    let restored = player.heal(amount);
                    if restored > 0 {
                        self.events.push(GameEvent {
                            round: self.round,
                            player_id: player.id.clone(),
                            kind: GameEventType::Heal,
                            value: Some(i64::from(restored)),
                            target: None,
                            card_id: Some(card.id.clone()),
                        });
                    }
                }
                EffectKind::Energy => player.gain_energy(amount),
                EffectKind::Draw => {
                    player.draw_cards(amount as usize);
                    player.discard_down_to(HAND_LIMIT);
                }
                EffectKind::Buff => player.robot.stats.attack += amount,
                EffectKind::Move => bonus_steps += amount,
                _ => {}
            }
        }

        if card.card_type == CardType::Program {
            self.programs.push(ActiveProgram {
                owner: self.players[i].id.clone(),
                remaining: card.duration.unwrap_or(1),
                card: Arc::clone(&card),
            });
        }
        Some((card, bonus_steps))
    }

    fn resolve_against(&mut self, i: usize, t: usize, card: &Card) {
        let range = card.effective_range();
        let connects = if card.is_damage_card() {
            let (attacker, target) = (&self.players[i], &self.players[t]);
            let hit = self.combat.check_hit(attacker, target, range, &self.terrain, &mut self.rng);
            if hit {
                let result = self
                    .combat
                    .calculate_damage(attacker, target, card, &self.terrain, &mut self.rng);
                self.stats[t].damage_blocked += u64::from(result.blocked);
                if result.damage > 0 {
                    self.deal_damage(i, t, result.damage, card);
                }
            }
            hit
        } else {
            is_in_range(self.players[i].position, self.players[t].position, range)
        };

        if !connects || !self.players[t].is_alive() {
            return;
        }
        for effect in &card.effects {
            if effect.kind != EffectKind::Control || effect.target != EffectTarget::Enemy {
                continue;
            }
            if let Some(kind) = effect.control_kind() {
                let turns = effect.value.max(0) as u32;
                let target = &mut self.players[t];
                target.apply_control(kind, turns);
                let target_id = target.id.clone();
                let turns = Some(i64::from(turns));
                self.event(i, GameEventType::Control, turns, Some(target_id), Some(card));
            }
        }
    }

    fn deal_damage(&mut self, i: usize, t: usize, amount: u32, card: &Card) {
        let lost = self.players[t].take_damage(amount);
        self.stats[i].damage_dealt += u64::from(lost);
        self.stats[t].damage_taken += u64::from(lost);
        let target_id = self.players[t].id.clone();
        let lost = Some(i64::from(lost));
        self.event(i, GameEventType::Damage, lost, Some(target_id), Some(card));
        if !self.players[t].is_alive() {
            let killer = self.players[i].id.clone();
            self.event(t, GameEventType::Death, None, Some(killer), None);
        }
    }

    fn build(&mut self, i: usize, card: &Card, pos: Position) {
        let in_bounds = self.scenario.map_layout.contains(pos);
        if !in_bounds || self.terrain.is_occupied(pos) {
            tracing::trace!(card = %card.id, x = pos.x, y = pos.y, "structure rejected");
            return;
        }
        let tile = structure_tile(card, &self.players[i].id, pos);
        let inserted = self.terrain.insert(tile);
        debug_assert!(inserted.is_ok(), "free tile reported occupied");
        if inserted.is_err() {
            return;
        }
        self.event(
            i,
            GameEventType::Structure,
            None,
            Some(format!("{},{}", pos.x, pos.y)),
            Some(card),
        );
    }

    /// One paid move plus a hop per free step granted by a move card. All
    /// hops share a budget of `movement + bonus_steps` tiles. The first move
    /// event of the turn carries the move card.
    fn movement(
        &mut self,
        i: usize,
        bonus_steps: u32,
        mut move_card: Option<&Card>,
        policy: &dyn UnitPolicy,
    ) {
        if self.players[i].energy < 1 {
            return;
        }
        let mut budget = self.players[i].robot.stats.movement + bonus_steps;
        for step in 0..=bonus_steps {
            if budget == 0 {
                break;
            }
            let from = self.players[i].position;
            let dest = {
                let view = GameView {
                    players: &self.players,
                    teams: &self.teams,
                    terrain: &self.terrain,
                    width: self.scenario.map_layout.width,
                    height: self.scenario.map_layout.height,
                };
                policy
                    .select_movement(i, &view, budget, &mut self.rng)
                    .filter(|pos| view.is_free(*pos, i))
            };
            let Some(dest) = dest else {
                break;
            };
            let cost = from.manhattan(dest).unsigned_abs();
            if cost > budget {
                tracing::trace!(x = dest.x, y = dest.y, budget, "move past budget rejected");
                break;
            }
            budget -= cost;
            let player = &mut self.players[i];
            player.position = dest;
            if step == 0 {
                player.energy = player.energy.saturating_sub(1);
            }
            self.event(i, GameEventType::Move, None, None, move_card.take());
        }
    }

    fn finish(mut self, game_id: u32, seed: u64) -> SimulationResult {
        let alive = self.alive_teams();
        let winner = if alive.len() == 1 {
            alive.iter().next().map_or(DRAW.to_string(), |t| t.to_string())
        } else {
            DRAW.to_string()
        };
        for (stats, player) in self.stats.iter_mut().zip(&self.players) {
            stats.final_hp = player.hp;
        }
        SimulationResult {
            scenario_id: self.scenario.id.clone(),
            game_id,
            seed,
            winner,
            total_rounds: self.round,
            players_stats: self.stats,
            events: self.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ai::PassivePolicy;
    use crate::sim::metrics::aggregate_metrics;
    use crate::sim::scenarios::get_scenario;

    /// Plays its first move card and heads east `stride` tiles per hop, or as
    /// far as the reach it is offered allows.
    struct Sprinter {
        stride: u32,
    }

    impl UnitPolicy for Sprinter {
        fn name(&self) -> &str {
            "sprinter"
        }

        fn select_card(
            &self,
            actor: usize,
            view: &GameView,
            _rng: &mut SeededRandom,
        ) -> Option<PlannedPlay> {
            let hand = &view.players[actor].hand;
            let hand_index = hand.iter().position(|c| c.has_effect(EffectKind::Move))?;
            Some(PlannedPlay {
                hand_index,
                target: None,
            })
        }

        fn select_movement(
            &self,
            actor: usize,
            view: &GameView,
            reach: u32,
            _rng: &mut SeededRandom,
        ) -> Option<Position> {
            let from = view.players[actor].position;
            let dx = self.stride.min(reach) as i32;
            let dest = Position::new(from.x + dx, from.y);
            (dx > 0 && view.is_free(dest, actor)).then_some(dest)
        }
    }

    fn sprint_game(stride: u32) -> (Position, Vec<GameEvent>) {
        let scenario = get_scenario("skirmish_2v2").unwrap();
        let mut game = Game::new(scenario, 0, false, base_catalog()).unwrap();
        let runner = &mut game.players[0];
        runner.position = Position::new(0, 6);
        runner.robot.stats.movement = 2;
        runner.hand = vec![base_catalog().get("blink").unwrap()];
        runner.energy = 5;
        game.take_turn(0, &Sprinter { stride });
        (game.players[0].position, game.events)
    }

    fn config(scenarios: &[&str], games: u32, seeds: u32) -> SimulationConfig {
        SimulationConfig {
            scenarios: scenarios.iter().map(|s| s.to_string()).collect(),
            games_per_scenario: games,
            seeds,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_build_unit_overrides() {
        let scenario = get_scenario("boss_gate_siege").unwrap();
        let boss = build_unit(base_catalog(), "boss", &scenario.teams[1].units[0]);
        assert_eq!(boss.hp, 50);
        assert_eq!(boss.max_hp, 50);
        assert_eq!(boss.robot.stats.attack, 5);
        assert_eq!(boss.robot.stats.defense, 3);
        assert_eq!(boss.robot.stats.movement, 2);
    }

    #[test]
    fn test_terrain_from_scenario() {
        let scenario = get_scenario("skirmish_3v3").unwrap();
        let terrain = build_terrain(scenario).unwrap();
        assert_eq!(terrain.len(), 11);
        assert_eq!(terrain.high_ground().count(), 3);
        assert_eq!(terrain.at(Position::new(8, 2)).unwrap().kind, TerrainType::Lava);
    }

    #[test]
    fn test_seed_and_job_order() {
        let jobs = plan_jobs(&config(&["skirmish_2v2", "control_vs_burst"], 2, 3));
        assert_eq!(jobs.len(), 12);
        let seeds: Vec<u64> = jobs[..6].iter().map(|j| j.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 1000, 1001, 1002]);
        assert_eq!(jobs[6].scenario.id, "control_vs_burst");
    }

    #[test]
    fn test_unknown_scenario_skipped() {
        let jobs = plan_jobs(&config(&["missing", "skirmish_2v2"], 1, 1));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].scenario.id, "skirmish_2v2");
    }

    #[test]
    fn test_invalid_scenario_is_an_error() {
        let mut scenario = get_scenario("skirmish_2v2").unwrap().clone();
        scenario.teams.truncate(1);
        let result = run_single_game(&scenario, 0, 0, false, base_catalog(), &PassivePolicy);
        assert!(result.is_err());
    }

    #[test]
    fn test_passive_game_is_draw_at_cap() {
        let scenario = get_scenario("control_vs_burst").unwrap();
        let result =
            run_single_game(scenario, 7, 0, false, base_catalog(), &PassivePolicy).unwrap();
        assert_eq!(result.winner, DRAW);
        assert_eq!(result.total_rounds, scenario.max_rounds);
        assert!(result.events.is_empty());
        for stats in &result.players_stats {
            assert_eq!(stats.survived_rounds, u64::from(scenario.max_rounds));
            assert_eq!(stats.cards_played, 0);
        }
    }

    #[test]
    fn test_same_seed_same_game() {
        let scenario = get_scenario("skirmish_2v2").unwrap();
        let ai = HeuristicAi::default();
        let a = run_single_game(scenario, 42, 0, false, base_catalog(), &ai).unwrap();
        let b = run_single_game(scenario, 42, 0, false, base_catalog(), &ai).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_game_invariants() {
        let ai = HeuristicAi::default();
        for scenario in all_scenarios() {
            for seed in 0..3 {
                let result =
                    run_single_game(scenario, seed, 0, false, base_catalog(), &ai).unwrap();
                assert!(result.total_rounds >= 1 && result.total_rounds <= scenario.max_rounds);
                for stats in &result.players_stats {
                    assert!(stats.survived_rounds <= u64::from(result.total_rounds));
                }
                if result.winner != DRAW {
                    let alive_on_winner = result
                        .players_stats
                        .iter()
                        .any(|s| s.team_id == result.winner && s.final_hp > 0);
                    assert!(alive_on_winner, "{} seed {seed}", scenario.id);
                }
                let deaths = result
                    .events
                    .iter()
                    .filter(|e| e.kind == GameEventType::Death)
                    .count();
                let dead = result.players_stats.iter().filter(|s| s.final_hp == 0).count();
                assert_eq!(deaths, dead);
            }
        }
    }

    #[test]
    fn test_move_card_hops_share_one_budget() {
        // Movement 2 plus blink's 3 free steps: 5 tiles in total.
        let (position, events) = sprint_game(12);
        assert_eq!(position, Position::new(5, 6));
        assert_eq!(events.len(), 1);

        let (position, events) = sprint_game(1);
        assert_eq!(position, Position::new(4, 6));
        let moves: Vec<_> = events.iter().filter(|e| e.kind == GameEventType::Move).collect();
        assert_eq!(moves.len(), 4);
        assert_eq!(moves[0].card_id.as_deref(), Some("blink"));
        assert!(moves[1..].iter().all(|e| e.card_id.is_none()));
    }

    #[test]
    fn test_armor_blocks_are_recorded() {
        let ai = HeuristicAi::default();
        let mut results = Vec::new();
        for scenario in all_scenarios() {
            for seed in 0..3 {
                let result = run_single_game(scenario, seed, 0, false, base_catalog(), &ai);
                results.push(result.unwrap());
            }
        }
        let hits = results
            .iter()
            .flat_map(|r| &r.events)
            .filter(|e| e.kind == GameEventType::Damage)
            .count() as u64;
        let blocked: u64 = results
            .iter()
            .flat_map(|r| &r.players_stats)
            .map(|s| s.damage_blocked)
            .sum();
        // Every unit has at least 1 defense, so each landed hit blocks something.
        assert!(hits > 0);
        assert!(blocked >= hits);
        let metrics = aggregate_metrics(&results);
        assert!(metrics.values().any(|m| m.avg_mitigation > 0.0));
        assert!(metrics
            .values()
            .all(|m| (0.0..=100.0).contains(&m.avg_mitigation)));
    }

    #[test]
    fn test_boss_scenario_spawns_waves() {
        let scenario = get_scenario("boss_gate_siege").unwrap();
        let result =
            run_single_game(scenario, 3, 0, false, base_catalog(), &PassivePolicy).unwrap();
        let npcs: Vec<_> = result
            .players_stats
            .iter()
            .filter(|s| s.team_id == NPC_TEAM)
            .collect();
        assert_eq!(npcs.len(), 6);
        assert!(npcs.iter().any(|s| s.player_id == "npc_wave_5_0"));
    }
}
