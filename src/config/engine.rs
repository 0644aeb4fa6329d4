// src/config/engine.rs
//! Engine configuration: every tunable of the signal engine in one place.
//!
//! Loaded from TOML or JSON (chosen by file extension). Every field has a
//! default, so a file only needs to list what it overrides:
//!
//! ```toml
//! [weights]
//! sentiment = 0.6
//! engagement = 0.1
//! market = 0.3
//!
//! [market]
//! freshness_window_secs = 600
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SignalError;

pub const ENV_CONFIG_PATH: &str = "SIGNALS_CONFIG_PATH";
pub const DEFAULT_CONFIG_TOML: &str = "config/engine.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/engine.json";

/// Tolerance for the "weights sum to 1" rule.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Upper bound for `market.freshness_window_secs` (30 days).
pub const MAX_FRESHNESS_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: FactorWeights,
    pub thresholds: CategoryThresholds,
    pub market: MarketConfig,
    pub engagement: EngagementConfig,
    pub confidence: ConfidenceConfig,
    pub sentiment: SentimentConfig,
    pub batch: BatchConfig,
}

/// Composite weights. Must be non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub sentiment: f64,
    pub engagement: f64,
    pub market: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            sentiment: 0.5,
            engagement: 0.2,
            market: 0.3,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.sentiment + self.engagement + self.market
    }
}

/// Four cut points splitting [-1, 1] into five bands.
///
/// `strong_sell < sell < buy < strong_buy`. A score sitting exactly on a cut
/// point belongs to the band closer to hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryThresholds {
    pub strong_sell: f64,
    pub sell: f64,
    pub buy: f64,
    pub strong_buy: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            strong_sell: -0.6,
            sell: -0.2,
            buy: 0.2,
            strong_buy: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Maximum snapshot age before it counts as stale.
    pub freshness_window_secs: u64,
    /// |price_change_pct| that maps to a full ±1 market factor.
    pub max_swing_pct: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: 15 * 60,
            max_swing_pct: 20.0,
        }
    }
}

impl MarketConfig {
    /// Saturates instead of panicking for windows chrono cannot represent.
    pub fn freshness_window(&self) -> chrono::Duration {
        i64::try_from(self.freshness_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// What raw engagement level maps to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Largest raw engagement in the batch, never below `ceiling`.
    BatchMax,
    /// Always `ceiling`.
    Ceiling,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub mentions_weight: f64,
    pub reactions_weight: f64,
    pub reposts_weight: f64,
    /// Base of the logarithmic compression; larger means flatter tops.
    pub log_base: f64,
    pub ceiling: f64,
    pub reference: ReferenceMode,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            mentions_weight: 0.5,
            reactions_weight: 0.3,
            reposts_weight: 0.2,
            log_base: 10.0,
            ceiling: 100.0,
            reference: ReferenceMode::BatchMax,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Token count at which sentiment confidence saturates.
    pub full_confidence_samples: u32,
    /// Mention count at which engagement reliability saturates.
    pub min_mentions: u32,
    /// Freshness factor for a snapshot at the window edge, stale or absent.
    pub stale_floor: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            full_confidence_samples: 64,
            min_mentions: 5,
            stale_floor: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Tokens beyond this count are ignored.
    pub max_tokens: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self { max_tokens: 512 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Soft latency target; overruns are logged, never fatal.
    pub latency_budget_ms: u64,
    /// Evaluate assets on the rayon pool. Output is identical either way.
    pub parallel: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            latency_budget_ms: 20,
            parallel: false,
        }
    }
}

impl EngineConfig {
    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), SignalError> {
        let w = &self.weights;
        for (name, v) in [
            ("sentiment", w.sentiment),
            ("engagement", w.engagement),
            ("market", w.market),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(SignalError::config(format!(
                    "weight `{name}` must be a non-negative number, got {v}"
                )));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SignalError::config(format!(
                "weights must sum to 1, got {}",
                w.sum()
            )));
        }

        let t = &self.thresholds;
        let cuts = [t.strong_sell, t.sell, t.buy, t.strong_buy];
        if cuts.iter().any(|c| !c.is_finite() || !(-1.0..=1.0).contains(c)) {
            return Err(SignalError::config(format!(
                "thresholds must lie within [-1, 1], got {cuts:?}"
            )));
        }
        if !cuts.windows(2).all(|p| p[0] < p[1]) {
            return Err(SignalError::config(format!(
                "thresholds must be strictly increasing (strong_sell < sell < buy < strong_buy), got {cuts:?}"
            )));
        }

        let window = self.market.freshness_window_secs;
        if window == 0 || window > MAX_FRESHNESS_WINDOW_SECS {
            return Err(SignalError::config(format!(
                "market.freshness_window_secs must be in 1..={MAX_FRESHNESS_WINDOW_SECS}, got {window}"
            )));
        }
        if !self.market.max_swing_pct.is_finite() || self.market.max_swing_pct <= 0.0 {
            return Err(SignalError::config("market.max_swing_pct must be > 0"));
        }

        let e = &self.engagement;
        let ew = [e.mentions_weight, e.reactions_weight, e.reposts_weight];
        if ew.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SignalError::config(
                "engagement weights must be non-negative numbers",
            ));
        }
        if ew.iter().sum::<f64>() <= 0.0 {
            return Err(SignalError::config("engagement weights must not all be zero"));
        }
        if !e.log_base.is_finite() || e.log_base <= 1.0 {
            return Err(SignalError::config("engagement.log_base must be > 1"));
        }
        if !e.ceiling.is_finite() || e.ceiling <= 0.0 {
            return Err(SignalError::config("engagement.ceiling must be > 0"));
        }

        let c = &self.confidence;
        if c.full_confidence_samples == 0 || c.min_mentions == 0 {
            return Err(SignalError::config(
                "confidence saturation counts must be > 0",
            ));
        }
        if !(0.0..=1.0).contains(&c.stale_floor) {
            return Err(SignalError::config("confidence.stale_floor must lie in [0, 1]"));
        }

        if self.sentiment.max_tokens == 0 {
            return Err(SignalError::config("sentiment.max_tokens must be > 0"));
        }

        Ok(())
    }

    /// Load and validate a config file. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing engine config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validating engine config {}", path.display()))?;
        Ok(cfg)
    }

    /// Resolve the config path and load it:
    /// 1) $SIGNALS_CONFIG_PATH
    /// 2) config/engine.toml
    /// 3) config/engine.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        match resolve_config_path()? {
            Some(p) => Self::load_from(&p),
            None => Ok(Self::default()),
        }
    }
}

/// Path the default loader would read, if any.
pub fn resolve_config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<EngineConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        _ => toml::from_str::<EngineConfig>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported engine config format")),
    }
}
