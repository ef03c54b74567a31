//! Batch playtest CLI.
//!
//! Usage:
//!   cargo run --release --bin simulate -- --scenarios skirmish_2v2 --games 50 --seeds 2
//!   cargo run --release --bin simulate -- --config simulation.toml --parallel \
//!       --output results.json --report BALANCE.md --mutations mutations.json

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use brickquest_sim::engine::cards::{base_catalog, CardCatalog};
use brickquest_sim::sim::ai::{AiWeights, HeuristicAi};
use brickquest_sim::sim::config::{find_default_config, load_config, SimulationConfig};
use brickquest_sim::sim::metrics::{aggregate_metrics, generate_recommendations, summary_stats};
use brickquest_sim::sim::mutate::mutations_from_recommendations;
use brickquest_sim::sim::report::render_report;
use brickquest_sim::sim::runner::{run_simulations_parallel, run_simulations_with};
use brickquest_sim::sim::scenarios::all_scenario_ids;

#[derive(Parser)]
#[command(name = "simulate", about = "Run seeded BrickQuest playtest simulations")]
struct Cli {
    /// Path to simulation.toml (default: auto-discover)
    #[arg(long, env = "BRICKQUEST_SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated scenario ids, or "all"
    #[arg(long, value_delimiter = ',')]
    scenarios: Option<Vec<String>>,

    /// Games per scenario
    #[arg(long)]
    games: Option<u32>,

    /// Seeds per game
    #[arg(long)]
    seeds: Option<u32>,

    /// Roll hits on a d20
    #[arg(long)]
    dice: bool,

    /// Spread games over all cores
    #[arg(long)]
    parallel: bool,

    /// Card catalog JSON (default: built-in set)
    #[arg(long, env = "BRICKQUEST_CARDS")]
    cards: Option<PathBuf>,

    /// AI weight preset: "default", "aggressive" or "cautious"
    #[arg(long)]
    ai_profile: Option<String>,

    /// Write results as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write a markdown balance report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write suggested card mutations as JSON
    #[arg(long)]
    mutations: Option<PathBuf>,

    /// List scenario ids and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list {
        for id in all_scenario_ids() {
            println!("{id}");
        }
        return Ok(());
    }

    let mut config = match cli.config.clone().or_else(find_default_config) {
        Some(path) => load_config(&path)?,
        None => SimulationConfig::default(),
    };
    if let Some(scenarios) = cli.scenarios {
        config.scenarios = scenarios;
    }
    if let Some(games) = cli.games {
        config.games_per_scenario = games;
    }
    if let Some(seeds) = cli.seeds {
        config.seeds = seeds;
    }
    if cli.dice {
        config.dice_mode = true;
    }
    if let Some(cards) = cli.cards {
        config.cards = Some(cards);
    }
    if let Some(name) = &cli.ai_profile {
        config.ai =
            AiWeights::preset(name).ok_or_else(|| format!("unknown AI profile '{name}'"))?;
    }

    let loaded;
    let catalog: &CardCatalog = match &config.cards {
        Some(path) => {
            loaded = CardCatalog::load_json(path)?;
            &loaded
        }
        None => base_catalog(),
    };
    let policy = HeuristicAi::new(config.ai.clone());

    eprintln!(
        "Simulate: scenarios={:?}, games={}, seeds={}, dice={}, parallel={}",
        config.scenarios, config.games_per_scenario, config.seeds, config.dice_mode, cli.parallel
    );

    let results = if cli.parallel {
        run_simulations_parallel(&config, catalog, &policy)
    } else {
        let progress_cb = |done: usize, total: usize| {
            eprint!("\r  [{}/{}] games completed", done, total);
        };
        let results = run_simulations_with(&config, catalog, &policy, Some(&progress_cb));
        eprintln!("\r                                        ");
        results
    };

    let metrics = aggregate_metrics(&results);
    let summary = summary_stats(&metrics);
    println!(
        "{} games across {} scenarios  |  avg TTK {:.1} rounds  |  damage/energy {:.2}",
        summary.total_games, summary.scenario_count, summary.avg_ttk, summary.avg_damage_per_energy
    );

    if let Some(path) = &cli.output {
        fs::write(path, serde_json::to_string_pretty(&results)?)?;
        eprintln!("Results written to {}", path.display());
    }
    if let Some(path) = &cli.report {
        let requested = if config.runs_all() {
            all_scenario_ids().into_iter().map(String::from).collect()
        } else {
            config.scenarios.clone()
        };
        fs::write(path, render_report(&results, &requested))?;
        eprintln!("Balance report written to {}", path.display());
    }
    if let Some(path) = &cli.mutations {
        let recommendations = generate_recommendations(&metrics);
        let mutations = mutations_from_recommendations(&recommendations, catalog);
        fs::write(path, serde_json::to_string_pretty(&mutations)?)?;
        eprintln!("{} card mutations written to {}", mutations.len(), path.display());
    }
    Ok(())
}
