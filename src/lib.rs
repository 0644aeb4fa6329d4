// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod batch;
pub mod config;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod history;
pub mod market;
pub mod mentions;
pub mod metrics;
pub mod records;
pub mod sentiment;
pub mod signal;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::batch::{AssetInputs, Batch, BatchOutcome, BatchProcessor, BatchStats, SkippedAsset};
pub use crate::config::{EngineConfig, HotReloadConfig};
pub use crate::engagement::{EngagementNormalizer, EngagementScore};
pub use crate::engine::{GeneratorInputs, SignalGenerator};
pub use crate::error::{SignalError, SkipReason};
pub use crate::market::{MarketContextProvider, StaticMarketContext};
pub use crate::mentions::AssetAliases;
pub use crate::records::{EngagementMetric, MarketSnapshot, TextSource, TextUnit};
pub use crate::sentiment::{SentimentScore, SentimentScorer};
pub use crate::signal::{ConfidenceBreakdown, Factor, Signal, SignalCategory};
