pub mod engine;
pub mod sim;
