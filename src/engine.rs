//! # Signal Generator
//! Pure, testable fusion of `(sentiment, engagement, market)` → `Signal`.
//! No I/O and no clock reads: the evaluation instant is passed in, so the
//! same inputs always give the same signal.
//!
//! Policy:
//! - composite = Σ weight · term, with terms sentiment ∈ [-1, 1],
//!   engagement mapped from [0, 1] to [-1, 1], market = clamped price swing.
//! - Absent inputs (including stale market data) drop out and their weight is
//!   spread proportionally over the factors that remain.
//! - Category bands are conservative on their edges.
//! - Confidence multiplies sample-size, freshness and engagement reliability,
//!   so one weak input caps the result.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{CategoryThresholds, EngineConfig};
use crate::engagement::EngagementScore;
use crate::error::SignalError;
use crate::market::Freshness;
use crate::records::MarketSnapshot;
use crate::sentiment::SentimentScore;
use crate::signal::{clamp01, ConfidenceBreakdown, Factor, Signal, SignalCategory};

/// Scores on a cut point within this distance count as on it.
pub const BOUNDARY_EPSILON: f64 = 1e-9;

/// Everything the generator knows about one asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorInputs<'a> {
    pub sentiment: Option<&'a SentimentScore>,
    pub engagement: Option<&'a EngagementScore>,
    pub market: Option<&'a MarketSnapshot>,
    /// Text units seen for the asset; each one is a mention for reliability.
    pub text_count: usize,
}

#[derive(Debug, Clone)]
pub struct SignalGenerator<'c> {
    cfg: &'c EngineConfig,
}

impl<'c> SignalGenerator<'c> {
    /// The config must already be validated.
    pub fn new(cfg: &'c EngineConfig) -> Self {
        Self { cfg }
    }

    pub fn generate(
        &self,
        asset_symbol: &str,
        inputs: GeneratorInputs<'_>,
        as_of: DateTime<Utc>,
    ) -> Result<Signal, SignalError> {
        let sentiment = inputs.sentiment.filter(|s| s.sample_size > 0);
        let engagement = inputs.engagement;
        if sentiment.is_none() && engagement.is_none() {
            return Err(SignalError::MissingInput {
                asset: asset_symbol.to_string(),
            });
        }

        let freshness = Freshness::assess(
            inputs.market,
            as_of,
            self.cfg.market.freshness_window(),
        );
        let market_term = match (freshness, inputs.market) {
            (Freshness::Fresh { .. }, Some(m)) => Some(market_factor(
                m.price_change_pct,
                self.cfg.market.max_swing_pct,
            )),
            _ => None,
        };

        // 1) Terms of the present factors
        let w = &self.cfg.weights;
        let terms = [
            (Factor::Sentiment, w.sentiment, sentiment.map(|s| s.value.clamp(-1.0, 1.0))),
            (Factor::Engagement, w.engagement, engagement.map(|e| 2.0 * e.value.clamp(0.0, 1.0) - 1.0)),
            (Factor::Market, w.market, market_term),
        ];

        // 2) Redistribute absent weight proportionally
        let present: Vec<(Factor, f64, f64)> = terms
            .iter()
            .filter_map(|(f, w, t)| t.map(|t| (*f, *w, t)))
            .collect();
        let present_weight: f64 = present.iter().map(|(_, w, _)| w).sum();

        let mut contributing_factors: BTreeMap<Factor, f64> =
            Factor::ALL.iter().map(|f| (*f, 0.0)).collect();
        for (factor, weight, term) in &present {
            let effective = if present_weight > 0.0 {
                weight / present_weight
            } else {
                // Only zero-weighted factors left; share equally.
                1.0 / present.len() as f64
            };
            contributing_factors.insert(*factor, effective * term);
        }
        let composite_score = contributing_factors.values().sum::<f64>().clamp(-1.0, 1.0);

        // 3) Category
        let category = categorize(composite_score, &self.cfg.thresholds);

        // 4) Confidence
        let conf = &self.cfg.confidence;
        let mentions = engagement
            .map(|e| e.sample_count)
            .unwrap_or(0)
            .max(inputs.text_count as u64);
        let confidence_breakdown = ConfidenceBreakdown {
            base: saturating_log(
                sentiment.map(|s| s.sample_size as u64).unwrap_or(0),
                conf.full_confidence_samples as u64,
            ),
            freshness: freshness_factor(
                freshness,
                self.cfg.market.freshness_window_secs,
                conf.stale_floor,
            ),
            engagement_reliability: saturating_log(mentions, conf.min_mentions as u64),
        };
        let confidence = confidence_breakdown.combined();

        debug!(
            target: "signals",
            asset = asset_symbol,
            composite = composite_score,
            confidence,
            category = %category,
            market_fresh = freshness.is_fresh(),
            "signal generated"
        );

        Ok(Signal {
            asset_symbol: asset_symbol.to_string(),
            category,
            composite_score,
            confidence,
            contributing_factors,
            confidence_breakdown,
            generated_at: as_of,
        })
    }
}

/// Price change normalized to [-1, 1] by the configured maximum swing.
///
/// Validated configs never pass a non-positive swing; the guard covers
/// direct callers and maps that case to a neutral 0.
pub fn market_factor(price_change_pct: f64, max_swing_pct: f64) -> f64 {
    if !price_change_pct.is_finite() || max_swing_pct <= 0.0 {
        return 0.0;
    }
    (price_change_pct / max_swing_pct).clamp(-1.0, 1.0)
}

/// Band lookup. A score on a cut point resolves toward hold.
pub fn categorize(score: f64, t: &CategoryThresholds) -> SignalCategory {
    if score > t.strong_buy + BOUNDARY_EPSILON {
        SignalCategory::StrongBuy
    } else if score > t.buy + BOUNDARY_EPSILON {
        SignalCategory::Buy
    } else if score < t.strong_sell - BOUNDARY_EPSILON {
        SignalCategory::StrongSell
    } else if score < t.sell - BOUNDARY_EPSILON {
        SignalCategory::Sell
    } else {
        SignalCategory::Hold
    }
}

/// `ln(1 + n) / ln(1 + full)`, capped at 1. Zero samples give zero.
pub fn saturating_log(n: u64, full: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let full = full.max(1) as f64;
    clamp01((n as f64).ln_1p() / full.ln_1p())
}

/// 1 for a brand-new snapshot, falling linearly to `stale_floor` at the
/// window edge; stale or absent snapshots sit at the floor.
pub fn freshness_factor(freshness: Freshness, window_secs: u64, stale_floor: f64) -> f64 {
    let floor = clamp01(stale_floor);
    match freshness {
        Freshness::Fresh { age } => {
            let window = window_secs.max(1) as f64;
            let ratio = (age.num_milliseconds() as f64 / 1000.0 / window).clamp(0.0, 1.0);
            1.0 - (1.0 - floor) * ratio
        }
        Freshness::Stale | Freshness::Absent => floor,
    }
}
