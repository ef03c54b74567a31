//! Balance metrics over batches of simulated games.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::engine::models::{CardType, PlayerClass, SimulationResult, TeamId};

/// Target damage per energy spent.
pub const DPE_TARGET: f64 = 2.0;
pub const DPE_RANGE: (f64, f64) = (1.5, 2.5);
pub const CONTROL_PREVALENCE_MAX: f64 = 30.0;
pub const CONTROL_PREVALENCE_SUGGESTED: f64 = 20.0;
pub const CLASS_WIN_RANGE: (f64, f64) = (0.35, 0.65);
pub const CLASS_WIN_TARGET: f64 = 0.5;
pub const MITIGATION_MAX: f64 = 40.0;
pub const MITIGATION_SUGGESTED: f64 = 25.0;
pub const OUTLIER_SHARE: f64 = 2.0;
pub const OUTLIER_MIN_PLAYS: u64 = 100;
pub const OUTLIER_SUGGESTED_RATE: f64 = 5.0;
pub const ENERGY_BUCKET_WIDTH: u64 = 5;
/// Recommendation target naming every hard-control card at once.
pub const CONTROL_TARGET: &str = "Control cards";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamWinRate {
    pub wins: u64,
    pub games: u64,
    pub rate: f64,
    /// Wilson score interval at 95 %.
    pub ci_low: f64,
    pub ci_high: f64,
}

impl TeamWinRate {
    fn new(wins: u64, games: u64) -> Self {
        let rate = if games > 0 { wins as f64 / games as f64 } else { 0.0 };
        let (ci_low, ci_high) = wilson_interval_95(rate, games);
        Self {
            wins,
            games,
            rate,
            ci_low,
            ci_high,
        }
    }
}

pub fn wilson_interval_95(p: f64, n: u64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }
    let n = n as f64;
    let z = 1.96_f64;
    let denom = 1.0 + z * z / n;
    let center = (p + z * z / (2.0 * n)) / denom;
    let margin = z * ((p * (1.0 - p) + z * z / (4.0 * n)) / n).sqrt() / denom;
    ((center - margin).max(0.0), (center + margin).min(1.0))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyBucket {
    /// Lower bound of the energy-spent bucket.
    pub energy: u64,
    pub avg_damage: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierCard {
    pub card_id: String,
    pub reason: String,
    pub play_rate: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    pub scenario_id: String,
    pub total_games: usize,
    pub class_win_rates: BTreeMap<PlayerClass, f64>,
    pub team_win_rates: BTreeMap<TeamId, TeamWinRate>,
    /// Mean rounds per game.
    pub avg_ttk: f64,
    pub avg_damage_per_energy: f64,
    pub avg_mitigation: f64,
    /// Percent of unit turns spent under hard control.
    pub control_prevalence: f64,
    /// Percent of card plays per card type.
    pub card_play_rates: BTreeMap<CardType, f64>,
    pub damage_by_energy: Vec<EnergyBucket>,
    pub outlier_cards: Vec<OutlierCard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Damage,
    Energy,
    Armor,
    Control,
    Baseline,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecommendationKind::Damage => "damage",
            RecommendationKind::Energy => "energy",
            RecommendationKind::Armor => "armor",
            RecommendationKind::Control => "control",
            RecommendationKind::Baseline => "baseline",
        };
        f.write_str(s)
    }
}

/// Declared high to low so the derived order sorts most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceRecommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    /// Card id, class or a global knob.
    pub target: String,
    pub current: f64,
    pub suggested: f64,
    pub reason: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_games: usize,
    pub avg_ttk: f64,
    pub avg_damage_per_energy: f64,
    pub scenario_count: usize,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Groups results by scenario id and aggregates each group.
pub fn aggregate_metrics(results: &[SimulationResult]) -> BTreeMap<String, ScenarioMetrics> {
    let mut by_scenario: BTreeMap<&str, Vec<&SimulationResult>> = BTreeMap::new();
    for result in results {
        by_scenario.entry(result.scenario_id.as_str()).or_default().push(result);
    }
    by_scenario
        .into_iter()
        .map(|(id, group)| (id.to_string(), aggregate_scenario(id, &group)))
        .collect()
}

fn aggregate_scenario(scenario_id: &str, results: &[&SimulationResult]) -> ScenarioMetrics {
    let mut class_games: BTreeMap<PlayerClass, u64> = BTreeMap::new();
    let mut class_wins: BTreeMap<PlayerClass, u64> = BTreeMap::new();
    let mut team_games: BTreeMap<TeamId, u64> = BTreeMap::new();
    let mut team_wins: BTreeMap<TeamId, u64> = BTreeMap::new();
    let mut card_types: BTreeMap<CardType, u64> = BTreeMap::new();
    let mut buckets: BTreeMap<u64, (u64, u64)> = BTreeMap::new();

    let mut total_rounds = 0u64;
    let mut damage_dealt = 0u64;
    let mut damage_taken = 0u64;
    let mut damage_blocked = 0u64;
    let mut energy_spent = 0u64;
    let mut cards_played = 0u64;
    let mut control_turns = 0u64;
    let mut unit_turns = 0u64;

    for result in results {
        total_rounds += u64::from(result.total_rounds);
        let mut teams_seen = BTreeSet::new();

        for stats in &result.players_stats {
            let won = result.winner == stats.team_id;
            *class_games.entry(stats.player_class).or_insert(0) += 1;
            if won {
                *class_wins.entry(stats.player_class).or_insert(0) += 1;
            }
            if teams_seen.insert(stats.team_id.as_str()) {
                *team_games.entry(stats.team_id.clone()).or_insert(0) += 1;
                if won {
                    *team_wins.entry(stats.team_id.clone()).or_insert(0) += 1;
                }
            }

            damage_dealt += stats.damage_dealt;
            damage_taken += stats.damage_taken;
            damage_blocked += stats.damage_blocked;
            energy_spent += stats.energy_spent;
            for (card_type, count) in &stats.cards_by_type {
                *card_types.entry(*card_type).or_insert(0) += count;
                cards_played += count;
            }
            control_turns += stats.control_turns;
            unit_turns += stats.survived_rounds;

            if stats.energy_spent > 0 {
                let bucket = stats.energy_spent / ENERGY_BUCKET_WIDTH * ENERGY_BUCKET_WIDTH;
                let entry = buckets.entry(bucket).or_insert((0, 0));
                entry.0 += stats.damage_dealt;
                entry.1 += 1;
            }
        }
    }

    let class_win_rates = class_games
        .iter()
        .map(|(class, games)| {
            let wins = class_wins.get(class).copied().unwrap_or(0);
            (*class, wins as f64 / *games as f64)
        })
        .collect();
    let team_win_rates = team_games
        .into_iter()
        .map(|(team, games)| {
            let wins = team_wins.get(&team).copied().unwrap_or(0);
            (team, TeamWinRate::new(wins, games))
        })
        .collect();

    let total_games = results.len();
    let avg_ttk = if total_games > 0 {
        total_rounds as f64 / total_games as f64
    } else {
        0.0
    };
    let avg_damage_per_energy = if energy_spent > 0 {
        damage_dealt as f64 / energy_spent as f64
    } else {
        0.0
    };
    // Incoming damage before armor is what landed plus what was blocked.
    let incoming = damage_taken + damage_blocked;
    let avg_mitigation = if incoming > 0 {
        (incoming as f64 - damage_taken as f64) / incoming as f64 * 100.0
    } else {
        0.0
    };

    ScenarioMetrics {
        scenario_id: scenario_id.to_string(),
        total_games,
        class_win_rates,
        team_win_rates,
        avg_ttk,
        avg_damage_per_energy,
        avg_mitigation,
        control_prevalence: percent(control_turns, unit_turns),
        card_play_rates: card_types
            .into_iter()
            .map(|(t, n)| (t, percent(n, cards_played)))
            .collect(),
        damage_by_energy: buckets
            .into_iter()
            .map(|(energy, (damage, count))| EnergyBucket {
                energy,
                avg_damage: damage as f64 / count as f64,
                count,
            })
            .collect(),
        outlier_cards: detect_outliers(results),
    }
}

/// Cards whose share of card events is under 2 % once more than 100 card
/// events have been tracked.
fn detect_outliers(results: &[&SimulationResult]) -> Vec<OutlierCard> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for event in results.iter().flat_map(|r| &r.events) {
        if let Some(card_id) = &event.card_id {
            *counts.entry(card_id.as_str()).or_insert(0) += 1;
        }
    }
    let total: u64 = counts.values().sum();
    if total <= OUTLIER_MIN_PLAYS {
        return Vec::new();
    }
    counts
        .into_iter()
        .map(|(card_id, n)| (card_id, percent(n, total)))
        .filter(|(_, rate)| *rate < OUTLIER_SHARE)
        .map(|(card_id, play_rate)| OutlierCard {
            card_id: card_id.to_string(),
            reason: "Low play rate".into(),
            play_rate,
            recommendation: format!("Increase value or reduce cost of {card_id}"),
        })
        .collect()
}

pub fn generate_recommendations(
    metrics: &BTreeMap<String, ScenarioMetrics>,
) -> Vec<BalanceRecommendation> {
    let mut recs = Vec::new();

    for (scenario_id, m) in metrics {
        let dpe = m.avg_damage_per_energy;
        if dpe < DPE_RANGE.0 || dpe > DPE_RANGE.1 {
            let side = if dpe < DPE_RANGE.0 { "below" } else { "above" };
            recs.push(BalanceRecommendation {
                kind: RecommendationKind::Damage,
                target: "Global damage values".into(),
                current: dpe,
                suggested: DPE_TARGET,
                reason: format!(
                    "Damage per energy ({dpe:.2}) is {side} target {DPE_TARGET:.1} in {scenario_id}"
                ),
                priority: Priority::High,
            });
        }

        if m.control_prevalence > CONTROL_PREVALENCE_MAX {
            recs.push(BalanceRecommendation {
                kind: RecommendationKind::Control,
                target: CONTROL_TARGET.into(),
                current: m.control_prevalence,
                suggested: CONTROL_PREVALENCE_SUGGESTED,
                reason: format!(
                    "Control prevalence ({:.1}%) is too high in {scenario_id}",
                    m.control_prevalence
                ),
                priority: Priority::High,
            });
        }

        for (class, rate) in &m.class_win_rates {
            let (low, high) = CLASS_WIN_RANGE;
            if *rate >= low && *rate <= high {
                continue;
            }
            let side = if *rate < low { "low" } else { "high" };
            recs.push(BalanceRecommendation {
                kind: RecommendationKind::Baseline,
                target: class.to_string(),
                current: *rate,
                suggested: CLASS_WIN_TARGET,
                reason: format!(
                    "{class} win rate ({:.1}%) is too {side} in {scenario_id}",
                    rate * 100.0
                ),
                priority: Priority::High,
            });
        }

        if m.avg_mitigation > MITIGATION_MAX {
            recs.push(BalanceRecommendation {
                kind: RecommendationKind::Armor,
                target: "Armor ratings".into(),
                current: m.avg_mitigation,
                suggested: MITIGATION_SUGGESTED,
                reason: format!(
                    "Armor is too effective ({:.1}% mitigation) in {scenario_id}",
                    m.avg_mitigation
                ),
                priority: Priority::Medium,
            });
        }

        for outlier in &m.outlier_cards {
            recs.push(BalanceRecommendation {
                kind: RecommendationKind::Damage,
                target: outlier.card_id.clone(),
                current: outlier.play_rate,
                suggested: OUTLIER_SUGGESTED_RATE,
                reason: outlier.recommendation.clone(),
                priority: Priority::Medium,
            });
        }
    }

    let mut seen = BTreeSet::new();
    recs.retain(|r| seen.insert((r.kind, r.target.clone())));
    recs.sort_by_key(|r| r.priority);
    recs
}

/// Totals plus unweighted means of the per-scenario averages.
pub fn summary_stats(metrics: &BTreeMap<String, ScenarioMetrics>) -> SummaryStats {
    let count = metrics.len();
    let total_games = metrics.values().map(|m| m.total_games).sum();
    let mean = |f: fn(&ScenarioMetrics) -> f64| {
        if count > 0 {
            metrics.values().map(f).sum::<f64>() / count as f64
        } else {
            0.0
        }
    };
    SummaryStats {
        total_games,
        avg_ttk: mean(|m| m.avg_ttk),
        avg_damage_per_energy: mean(|m| m.avg_damage_per_energy),
        scenario_count: count,
    }
}

const SPARK_BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One bar per value, scaled between the min and max. A flat series
/// renders as `width` horizontal rules.
pub fn sparkline(values: &[f64], width: usize) -> String {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return String::new();
    };
    let max = values.iter().copied().fold(min, f64::max);
    let range = max - min;
    if range == 0.0 {
        return "─".repeat(width);
    }
    let top = (SPARK_BARS.len() - 1) as f64;
    values
        .iter()
        .map(|v| SPARK_BARS[((v - min) / range * top).floor() as usize])
        .collect()
}

pub fn progress_bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{GameEvent, GameEventType, PlayerSimStats};

    fn stats(id: &str, class: PlayerClass, team: &str, dealt: u64, energy: u64) -> PlayerSimStats {
        let mut s = PlayerSimStats::new(id, class, team, 10);
        s.damage_dealt = dealt;
        s.damage_taken = dealt;
        s.energy_spent = energy;
        s.survived_rounds = 10;
        s
    }

    fn result(scenario: &str, winner: &str, players: Vec<PlayerSimStats>) -> SimulationResult {
        SimulationResult {
            scenario_id: scenario.into(),
            game_id: 0,
            seed: 0,
            winner: winner.into(),
            total_rounds: 10,
            players_stats: players,
            events: vec![],
        }
    }

    fn balanced_pair() -> Vec<SimulationResult> {
        vec![
            result(
                "s",
                "a",
                vec![
                    stats("a0", PlayerClass::Warrior, "a", 30, 15),
                    stats("b0", PlayerClass::Mage, "b", 20, 10),
                ],
            ),
            result(
                "s",
                "b",
                vec![
                    stats("a0", PlayerClass::Warrior, "a", 20, 10),
                    stats("b0", PlayerClass::Mage, "b", 30, 15),
                ],
            ),
        ]
    }

    #[test]
    fn test_damage_per_energy_on_rail() {
        let metrics = aggregate_metrics(&balanced_pair());
        let m = &metrics["s"];
        assert_eq!(m.total_games, 2);
        assert_eq!(m.avg_damage_per_energy, 2.0);
        assert_eq!(m.class_win_rates[&PlayerClass::Warrior], 0.5);
        assert!(generate_recommendations(&metrics).is_empty());
    }

    #[test]
    fn test_team_win_rate_counts_games_not_units() {
        let mut results = balanced_pair();
        results[0].players_stats.push(stats("a1", PlayerClass::Engineer, "a", 0, 0));
        let metrics = aggregate_metrics(&results);
        let a = &metrics["s"].team_win_rates["a"];
        assert_eq!((a.wins, a.games), (1, 2));
        assert!(a.ci_low < 0.5 && a.ci_high > 0.5);
    }

    #[test]
    fn test_energy_buckets() {
        let metrics = aggregate_metrics(&balanced_pair());
        let buckets = &metrics["s"].damage_by_energy;
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].energy, 10);
        assert_eq!(buckets[0].avg_damage, 20.0);
        assert_eq!(buckets[1].energy, 15);
        assert_eq!(buckets[1].count, 2);
    }

    #[test]
    fn test_recommendations_sorted_and_deduped() {
        let mut results = balanced_pair();
        for r in &mut results {
            r.winner = "a".into();
            for s in &mut r.players_stats {
                s.energy_spent = 100;
                s.control_turns = 5;
            }
        }
        results.push(result("t", "b", vec![stats("x", PlayerClass::Mage, "b", 10, 100)]));
        let recs = generate_recommendations(&aggregate_metrics(&results));

        let damage: Vec<_> = recs.iter().filter(|r| r.kind == RecommendationKind::Damage).collect();
        assert_eq!(damage.len(), 1);
        assert!(damage[0].reason.ends_with("in s"));
        assert!(recs.iter().any(|r| r.kind == RecommendationKind::Control));
        assert!(recs.iter().any(|r| r.target == "warrior" && r.reason.contains("too high")));
        assert!(recs.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn test_outlier_needs_volume() {
        let mut r = result("s", "a", vec![stats("a0", PlayerClass::Warrior, "a", 0, 0)]);
        let event = |card: &str| GameEvent {
            round: 1,
            player_id: "a0".into(),
            kind: GameEventType::Damage,
            value: Some(1),
            target: None,
            card_id: Some(card.into()),
        };
        r.events = (0..100).map(|_| event("common")).collect();
        r.events.push(event("rare"));
        let metrics = aggregate_metrics(std::slice::from_ref(&r));
        let outliers = &metrics["s"].outlier_cards;
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].card_id, "rare");

        r.events.pop();
        r.events.pop();
        r.events.push(event("rare"));
        let metrics = aggregate_metrics(&[r]);
        assert!(metrics["s"].outlier_cards.is_empty());
    }

    #[test]
    fn test_mitigation_counts_blocked_damage() {
        let mut results = balanced_pair();
        assert_eq!(aggregate_metrics(&results)["s"].avg_mitigation, 0.0);

        // 100 taken across both games, 100 more soaked by armor.
        for r in &mut results {
            for s in &mut r.players_stats {
                s.damage_blocked = 25;
            }
        }
        let metrics = aggregate_metrics(&results);
        assert_eq!(metrics["s"].avg_mitigation, 50.0);
        let recs = generate_recommendations(&metrics);
        let armor: Vec<_> = recs.iter().filter(|r| r.kind == RecommendationKind::Armor).collect();
        assert_eq!(armor.len(), 1);
        assert_eq!(armor[0].priority, Priority::Medium);
        assert_eq!(armor[0].suggested, MITIGATION_SUGGESTED);
    }

    #[test]
    fn test_summary_stats() {
        let mut results = balanced_pair();
        results.push(result("t", "b", vec![stats("x", PlayerClass::Mage, "b", 10, 10)]));
        let summary = summary_stats(&aggregate_metrics(&results));
        assert_eq!(summary.total_games, 3);
        assert_eq!(summary.scenario_count, 2);
        assert_eq!(summary.avg_damage_per_energy, 1.5);
        assert_eq!(summary_stats(&BTreeMap::new()).avg_ttk, 0.0);
    }

    #[test]
    fn test_wilson_interval() {
        assert_eq!(wilson_interval_95(0.5, 0), (0.0, 0.0));
        let (lo, hi) = wilson_interval_95(0.5, 100);
        assert!((lo - 0.404).abs() < 0.001);
        assert!((hi - 0.596).abs() < 0.001);
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[], 5), "");
        assert_eq!(sparkline(&[3.0, 3.0], 4), "────");
        assert_eq!(sparkline(&[0.0, 7.0, 14.0], 3), "▁▄█");
        assert_eq!(progress_bar(0.5, 4), "██░░");
    }
}
