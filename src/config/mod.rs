// src/config/mod.rs
//! Engine configuration and its hot-reload wrapper.

pub mod engine;
pub mod hot_reload;

pub use engine::{
    BatchConfig, CategoryThresholds, ConfidenceConfig, EngagementConfig, EngineConfig,
    FactorWeights, MarketConfig, ReferenceMode, SentimentConfig,
};
pub use hot_reload::HotReloadConfig;
