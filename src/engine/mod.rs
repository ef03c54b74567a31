pub mod rng;
pub mod models;
pub mod error;
pub mod terrain;
pub mod cards;
pub mod encounter;
pub mod combat;
pub mod turn;
