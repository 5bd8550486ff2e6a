//! GoalMap Core: error type, configuration, data directory layout.

pub mod config;
pub mod error;

pub use config::{
    price_per_million, BatchConfig, ChunkingConfig, DataPaths, EmbeddingConfig,
    EmbeddingProviderKind, FallbackConfig, FallbackStrategy, FeatureLimits, GoalMapConfig,
    ScoringConfig,
};
pub use error::{Error, Result};
