//! # Engagement Normalizer
//!
//! Maps raw social engagement (mentions, reactions, reposts) onto an impact
//! score in [0, 1].
//!
//! - Raw engagement is a weighted sum; mentions weigh most by default.
//! - The raw value is scaled against a reference maximum (the batch maximum
//!   or a fixed ceiling) and compressed with `log_b(1 + (b - 1) * x)`, which
//!   keeps 0 → 0 and reference → 1 while flattening viral outliers.
//! - Zero engagement is a valid input and yields 0.

use serde::Serialize;

use crate::config::{EngagementConfig, ReferenceMode};
use crate::records::EngagementMetric;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementScore {
    pub asset_symbol: String,
    /// Impact in [0, 1].
    pub value: f64,
    /// Mentions backing the score; drives engagement reliability.
    pub sample_count: u64,
}

#[derive(Debug, Clone)]
pub struct EngagementNormalizer {
    cfg: EngagementConfig,
}

impl EngagementNormalizer {
    pub fn new(cfg: &EngagementConfig) -> Self {
        Self { cfg: *cfg }
    }

    fn weighted(&self, m: &EngagementMetric) -> f64 {
        m.mentions as f64 * self.cfg.mentions_weight
            + m.reactions as f64 * self.cfg.reactions_weight
            + m.reposts as f64 * self.cfg.reposts_weight
    }

    /// Weighted sum of all metrics for one asset.
    pub fn raw_engagement<'a, I>(&self, metrics: I) -> f64
    where
        I: IntoIterator<Item = &'a EngagementMetric>,
    {
        metrics.into_iter().map(|m| self.weighted(m)).sum()
    }

    /// Reference maximum for a batch whose largest raw engagement is `batch_max`.
    pub fn reference(&self, batch_max: f64) -> f64 {
        match self.cfg.reference {
            ReferenceMode::Ceiling => self.cfg.ceiling,
            ReferenceMode::BatchMax => batch_max.max(self.cfg.ceiling),
        }
    }

    /// Compress a raw engagement value against `reference`.
    pub fn compress(&self, raw: f64, reference: f64) -> f64 {
        if raw.is_nan() || raw <= 0.0 || reference.is_nan() || reference <= 0.0 {
            return 0.0;
        }
        let x = (raw / reference).min(1.0);
        let b = self.cfg.log_base;
        ((1.0 + (b - 1.0) * x).ln() / b.ln()).clamp(0.0, 1.0)
    }

    /// Full score for one asset. `None` when the asset has no metrics at all.
    pub fn score<'a, I>(
        &self,
        asset_symbol: &str,
        metrics: I,
        reference: f64,
    ) -> Option<EngagementScore>
    where
        I: IntoIterator<Item = &'a EngagementMetric>,
    {
        let mut seen = false;
        let mut raw = 0.0f64;
        let mut mentions = 0u64;
        for m in metrics {
            seen = true;
            raw += self.weighted(m);
            mentions = mentions.saturating_add(m.mentions);
        }
        if !seen {
            return None;
        }
        Some(EngagementScore {
            asset_symbol: asset_symbol.to_string(),
            value: self.compress(raw, reference),
            sample_count: mentions,
        })
    }
}
