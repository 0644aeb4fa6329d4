//! signal.rs: the engine's output record and its explainability parts.
//!
//! A `Signal` is built once per (asset, batch) and never mutated afterwards.
//! `contributing_factors` keeps every weighted term so the composite can be
//! audited: the terms always add up to `composite_score`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Five ordered trading-signal classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl SignalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::StrongSell => "strong_sell",
            SignalCategory::Sell => "sell",
            SignalCategory::Hold => "hold",
            SignalCategory::Buy => "buy",
            SignalCategory::StrongBuy => "strong_buy",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, SignalCategory::Buy | SignalCategory::StrongBuy)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, SignalCategory::Sell | SignalCategory::StrongSell)
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs fused into the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Sentiment,
    Engagement,
    Market,
}

impl Factor {
    pub const ALL: [Factor; 3] = [Factor::Sentiment, Factor::Engagement, Factor::Market];
}

/// The three multiplicative parts of a signal's confidence, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub base: f64,
    pub freshness: f64,
    pub engagement_reliability: f64,
}

impl ConfidenceBreakdown {
    pub fn combined(&self) -> f64 {
        clamp01(self.base * self.freshness * self.engagement_reliability)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub asset_symbol: String,
    pub category: SignalCategory,
    /// Weighted fusion of all factors, in [-1, 1].
    pub composite_score: f64,
    /// Trust in the composite, in [0, 1].
    pub confidence: f64,
    /// Weighted term per factor; absent factors contribute 0.
    pub contributing_factors: BTreeMap<Factor, f64>,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// Sum of the weighted terms; equals `composite_score` up to rounding.
    pub fn factor_sum(&self) -> f64 {
        self.contributing_factors.values().sum()
    }

    pub fn contribution(&self, factor: Factor) -> f64 {
        self.contributing_factors.get(&factor).copied().unwrap_or(0.0)
    }

    /// Same values, ignoring when the signal was produced.
    pub fn same_values(&self, other: &Signal) -> bool {
        self.asset_symbol == other.asset_symbol
            && self.category == other.category
            && self.composite_score == other.composite_score
            && self.confidence == other.confidence
            && self.contributing_factors == other.contributing_factors
            && self.confidence_breakdown == other.confidence_breakdown
    }
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
