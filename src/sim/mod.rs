pub mod ai;
pub mod config;
pub mod metrics;
pub mod mutate;
pub mod report;
pub mod runner;
pub mod scenarios;
