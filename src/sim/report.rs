//! Markdown balance report.

use std::fmt::Write;

use crate::engine::models::SimulationResult;
use crate::sim::metrics::{
    aggregate_metrics, generate_recommendations, progress_bar, sparkline, summary_stats,
    BalanceRecommendation, Priority, ScenarioMetrics, CONTROL_PREVALENCE_MAX, DPE_TARGET,
    MITIGATION_MAX,
};

const TOP_RECOMMENDATIONS: usize = 5;
const BAR_WIDTH: usize = 20;

/// Ratios under 1 print as percentages.
fn format_value(value: f64) -> String {
    if value < 1.0 {
        format!("{:.1}%", value * 100.0)
    } else {
        format!("{value:.2}")
    }
}

/// Renders the report for `results`. Scenarios in `requested` that produced
/// no games get a "no data" section.
pub fn render_report(results: &[SimulationResult], requested: &[String]) -> String {
    let metrics = aggregate_metrics(results);
    let recs = generate_recommendations(&metrics);
    let summary = summary_stats(&metrics);
    let high = recs.iter().filter(|r| r.priority == Priority::High).count();

    let mut out = String::new();
    let _ = writeln!(out, "# BrickQuest Balance Report\n");
    let _ = writeln!(out, "## Executive Summary\n");
    let _ = writeln!(out, "- **Total Games Simulated**: {}", summary.total_games);
    let _ = writeln!(out, "- **Scenarios Tested**: {}", summary.scenario_count);
    let _ = writeln!(out, "- **Average TTK**: {:.1} rounds", summary.avg_ttk);
    let _ = writeln!(
        out,
        "- **Average Damage per Energy**: {:.2} (Target: {DPE_TARGET:.1})",
        summary.avg_damage_per_energy
    );
    let _ = writeln!(out, "- **Balance Issues Found**: {high} high priority\n");

    let _ = writeln!(out, "## Top {TOP_RECOMMENDATIONS} Recommendations\n");
    if recs.is_empty() {
        let _ = writeln!(out, "*No major balance issues detected.*\n");
    }
    for (i, rec) in recs.iter().take(TOP_RECOMMENDATIONS).enumerate() {
        write_recommendation(&mut out, i, rec);
    }

    let _ = writeln!(out, "## Scenario Analysis\n");
    for m in metrics.values() {
        write_scenario(&mut out, m);
    }
    for id in requested {
        if !metrics.contains_key(id) {
            let _ = writeln!(out, "### {id}\n\n*No data: no valid games were simulated.*\n\n---\n");
        }
    }

    if recs.len() > TOP_RECOMMENDATIONS {
        let _ = writeln!(out, "## All Recommendations\n");
        for (i, rec) in recs.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. **[{}]** {} - {}",
                i + 1,
                rec.priority,
                rec.kind,
                rec.target
            );
            let _ = writeln!(out, "   - {}", rec.reason);
            let _ = writeln!(
                out,
                "   - Current: {} → Suggested: {}\n",
                format_value(rec.current),
                format_value(rec.suggested)
            );
        }
    }
    out
}

fn write_recommendation(out: &mut String, i: usize, rec: &BalanceRecommendation) {
    let _ = writeln!(out, "{}. **[{}]** {}", i + 1, rec.priority, rec.reason);
    let _ = writeln!(out, "   - Current: {}", format_value(rec.current));
    let _ = writeln!(out, "   - Suggested: {}\n", format_value(rec.suggested));
}

fn write_scenario(out: &mut String, m: &ScenarioMetrics) {
    let _ = writeln!(out, "### {}\n", m.scenario_id);
    let _ = writeln!(out, "- **Games Played**: {}", m.total_games);
    let _ = writeln!(out, "- **Average TTK**: {:.1} rounds", m.avg_ttk);
    let _ = writeln!(out, "- **Damage per Energy**: {:.2}\n", m.avg_damage_per_energy);

    let _ = writeln!(out, "#### Team Win Rates\n");
    let _ = writeln!(out, "| Team | Win Rate | 95% CI | Bar |");
    let _ = writeln!(out, "|------|----------|--------|-----|");
    for (team, wr) in &m.team_win_rates {
        let _ = writeln!(
            out,
            "| {team} | {:.1}% | {:.1}%-{:.1}% | {} |",
            wr.rate * 100.0,
            wr.ci_low * 100.0,
            wr.ci_high * 100.0,
            progress_bar(wr.rate, BAR_WIDTH)
        );
    }

    let _ = writeln!(out, "\n#### Class Win Rates\n");
    let _ = writeln!(out, "| Class | Win Rate | Bar |");
    let _ = writeln!(out, "|-------|----------|-----|");
    for (class, rate) in &m.class_win_rates {
        let bar = progress_bar(*rate, BAR_WIDTH);
        let _ = writeln!(out, "| {class} | {:.1}% | {bar} |", rate * 100.0);
    }

    let _ = writeln!(out, "\n#### Card Type Distribution\n");
    let _ = writeln!(out, "| Card Type | Play Rate |");
    let _ = writeln!(out, "|-----------|-----------|");
    for (card_type, rate) in &m.card_play_rates {
        let _ = writeln!(out, "| {card_type} | {rate:.1}% |");
    }

    let _ = writeln!(out, "\n#### Damage Distribution (by Energy)\n");
    let _ = writeln!(out, "| Energy Spent | Avg Damage | Units |");
    let _ = writeln!(out, "|--------------|------------|-------|");
    for bucket in &m.damage_by_energy {
        let _ = writeln!(
            out,
            "| {}E | {:.1} | {} |",
            bucket.energy, bucket.avg_damage, bucket.count
        );
    }
    let curve: Vec<f64> = m.damage_by_energy.iter().map(|b| b.avg_damage).collect();
    if !curve.is_empty() {
        let _ = writeln!(out, "\nCurve: `{}`", sparkline(&curve, curve.len()));
    }

    let _ = writeln!(out, "\n#### Control Effects\n");
    let _ = writeln!(out, "- **Control Prevalence**: {:.1}% of turns", m.control_prevalence);
    let note = if m.control_prevalence > CONTROL_PREVALENCE_MAX {
        "  - **WARNING**: Control is too prevalent (target: <25%)"
    } else if m.control_prevalence < 5.0 {
        "  - **NOTE**: Control is rarely used (target: 10-25%)"
    } else {
        "  - Control usage is healthy"
    };
    let _ = writeln!(out, "{note}");

    let _ = writeln!(out, "\n#### Armor Effectiveness\n");
    let _ = writeln!(out, "- **Damage Mitigation**: {:.1}%", m.avg_mitigation);
    let note = if m.avg_mitigation > MITIGATION_MAX {
        "  - **WARNING**: Armor is too effective (target: 20-30%)"
    } else if m.avg_mitigation < 15.0 {
        "  - **WARNING**: Armor is too weak (target: 20-30%)"
    } else {
        "  - Armor effectiveness is healthy"
    };
    let _ = writeln!(out, "{note}");

    if !m.outlier_cards.is_empty() {
        let _ = writeln!(out, "\n#### Outlier Cards\n");
        for outlier in &m.outlier_cards {
            let _ = writeln!(
                out,
                "- **{}**: {} ({:.1}% play rate)\n  - {}",
                outlier.card_id, outlier.reason, outlier.play_rate, outlier.recommendation
            );
        }
    }
    let _ = writeln!(out, "\n---\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::{PlayerClass, PlayerSimStats};

    fn game(winner: &str) -> SimulationResult {
        let mut a = PlayerSimStats::new("a0", PlayerClass::Warrior, "a", 10);
        a.damage_dealt = 20;
        a.energy_spent = 10;
        a.survived_rounds = 4;
        let b = PlayerSimStats::new("b0", PlayerClass::Mage, "b", 0);
        SimulationResult {
            scenario_id: "s".into(),
            game_id: 0,
            seed: 0,
            winner: winner.into(),
            total_rounds: 4,
            players_stats: vec![a, b],
            events: vec![],
        }
    }

    #[test]
    fn test_report_sections() {
        let report = render_report(&[game("a"), game("b")], &["s".to_string()]);
        assert!(report.starts_with("# BrickQuest Balance Report"));
        assert!(report.contains("- **Total Games Simulated**: 2"));
        assert!(report.contains("### s"));
        assert!(report.contains("| a | 50.0% |"));
        assert!(report.contains("| 10E | 20.0 | 2 |"));
        assert!(!report.contains("No data"));
    }

    #[test]
    fn test_missing_scenario_reports_no_data() {
        let report = render_report(&[], &["boss_gate_siege".to_string()]);
        assert!(report.contains("- **Total Games Simulated**: 0"));
        assert!(report.contains("### boss_gate_siege\n\n*No data"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.5), "50.0%");
        assert_eq!(format_value(2.0), "2.00");
    }
}
