//! Configuration and data errors. Rule rejections (playing out of phase,
//! short on energy, blocked move) are plain `bool` / unsuccessful results and
//! never appear here.

use thiserror::Error;

use crate::engine::models::Position;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error("invalid scenario '{id}': {reason}")]
    InvalidScenario { id: String, reason: String },
    #[error("terrain tile already present at ({}, {})", .0.x, .0.y)]
    TerrainCollision(Position),
    #[error("invalid card record '{id}': {reason}")]
    CardRecord { id: String, reason: String },
    #[error("mutation of '{id}' rejected: {reason}")]
    InvalidMutation { id: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;
