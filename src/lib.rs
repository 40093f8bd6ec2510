pub mod actions;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod outcome;
pub mod output;
pub mod phase;
pub mod pool;
pub mod state;
pub mod stats;
