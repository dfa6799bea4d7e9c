//! Transcript Waterfall - resilient multi-source transcript retrieval
//!
//! This library races several unreliable transcript sources (a timed-text client, an
//! external extractor process, watch page scraping, a client-emulation API and a
//! metadata lookup) in ordered waves, under a single global deadline, and returns the
//! best text it could find or an aggregated diagnostic trail.

pub mod cli;
pub mod config;
pub mod engine;
pub mod output;
pub mod strategies;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use engine::{RetrievalEngine, RetrievalOutcome, Retrieved};
pub use strategies::{QualityTier, Strategy, StrategyResult, Transcript, VideoId};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types surfaced by the retrieval engine
#[derive(thiserror::Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid video identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Strategy {strategy} failed: {reason}")]
    StrategyFailure { strategy: String, reason: String },

    #[error("All {attempts} strategies in wave '{wave}' failed")]
    WaveExhaustion { wave: String, attempts: usize },

    #[error("All strategies failed after {attempts} attempts. Log: {trail}")]
    WaterfallExhaustion { attempts: usize, trail: String },

    #[error("Global {deadline_ms}ms timeout reached. Best effort errors: {trail}")]
    GlobalTimeout { deadline_ms: u64, trail: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
