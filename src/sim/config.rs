//! Batch configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::error::{SimError, SimResult};
use crate::sim::ai::AiWeights;

pub const ALL_SCENARIOS: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Scenario ids to run, or `["all"]`.
    pub scenarios: Vec<String>,
    pub games_per_scenario: u32,
    /// Seeds per game index; seed = seed_index + game_index * 1000.
    pub seeds: u32,
    pub dice_mode: bool,
    /// Card catalog JSON to use instead of the built-in set.
    pub cards: Option<PathBuf>,
    pub ai: AiWeights,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scenarios: vec![ALL_SCENARIOS.to_string()],
            games_per_scenario: 100,
            seeds: 4,
            dice_mode: false,
            cards: None,
            ai: AiWeights::default(),
        }
    }
}

impl SimulationConfig {
    pub fn runs_all(&self) -> bool {
        self.scenarios.iter().any(|s| s == ALL_SCENARIOS)
    }

    pub fn total_games_per_scenario(&self) -> usize {
        self.games_per_scenario as usize * self.seeds as usize
    }

    pub fn seed_for(game_index: u32, seed_index: u32) -> u64 {
        u64::from(seed_index) + u64::from(game_index) * 1000
    }
}

/// Parses a config file. Missing keys take their defaults.
pub fn load_config(path: &Path) -> SimResult<SimulationConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: SimulationConfig = toml::from_str(&content).map_err(|e| SimError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!(
        path = %path.display(),
        scenarios = ?config.scenarios,
        games = config.games_per_scenario,
        seeds = config.seeds,
        "loaded simulation config"
    );
    Ok(config)
}

/// First of the conventional config locations that exists.
pub fn find_default_config() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("simulation.toml"),
        PathBuf::from("config/simulation.toml"),
        Path::new(env!("CARGO_MANIFEST_DIR")).join("simulation.toml"),
    ];
    candidates.into_iter().find(|p| p.exists())
}
