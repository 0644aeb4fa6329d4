//! # Batch Processor
//! Drives the signal generator over every asset of a batch.
//!
//! - The config snapshot is validated once up front; an invalid config fails
//!   the whole batch before any signal is produced.
//! - Assets are evaluated independently (optionally on the rayon pool) and
//!   the output keeps the input asset order.
//! - Assets without usable input are skipped with a recorded reason.
//! - Elapsed time is measured against a soft latency budget.
//! - An abort flag is honoured between assets; signals emitted before the
//!   abort are returned untouched.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{EngineConfig, HotReloadConfig};
use crate::engagement::EngagementNormalizer;
use crate::engine::{GeneratorInputs, SignalGenerator};
use crate::error::{SignalError, SkipReason};
use crate::market::MarketContextProvider;
use crate::records::{normalize_symbol, EngagementMetric, MarketSnapshot, TextUnit};
use crate::sentiment::SentimentScorer;
use crate::signal::Signal;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("signal_batches_total", "Batches run through the engine.");
        describe_counter!(
            "signal_batches_rejected_total",
            "Batches refused because of an invalid configuration."
        );
        describe_counter!("signal_assets_processed_total", "Signals emitted.");
        describe_counter!(
            "signal_assets_skipped_total",
            "Assets skipped for lack of usable input or an abort."
        );
        describe_counter!(
            "signal_batch_over_budget_total",
            "Batches that exceeded the latency budget."
        );
        describe_histogram!("signal_batch_ms", "Batch wall time in milliseconds.");
    });
}

/// Per-asset input bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAssetInputs")]
pub struct AssetInputs {
    pub asset_symbol: String,
    pub texts: Vec<TextUnit>,
    pub engagement: Vec<EngagementMetric>,
    pub market: Option<MarketSnapshot>,
}

#[derive(Deserialize)]
struct RawAssetInputs {
    asset_symbol: String,
    #[serde(default)]
    texts: Vec<TextUnit>,
    #[serde(default)]
    engagement: Vec<EngagementMetric>,
    #[serde(default)]
    market: Option<MarketSnapshot>,
}

impl TryFrom<RawAssetInputs> for AssetInputs {
    type Error = SignalError;

    fn try_from(r: RawAssetInputs) -> Result<Self, Self::Error> {
        Ok(AssetInputs::new(r.asset_symbol)?
            .with_texts(r.texts)
            .with_engagement(r.engagement)
            .with_market(r.market))
    }
}

impl AssetInputs {
    pub fn new(asset_symbol: impl AsRef<str>) -> Result<Self, SignalError> {
        Ok(Self {
            asset_symbol: normalize_symbol("asset_inputs", asset_symbol.as_ref())?,
            texts: Vec::new(),
            engagement: Vec::new(),
            market: None,
        })
    }

    pub fn with_texts(mut self, texts: Vec<TextUnit>) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_engagement(mut self, engagement: Vec<EngagementMetric>) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn with_market(mut self, market: Option<MarketSnapshot>) -> Self {
        self.market = market;
        self
    }

    fn own_texts(&self) -> impl Iterator<Item = &TextUnit> + '_ {
        self.texts
            .iter()
            .filter(move |t| t.asset_symbol == self.asset_symbol)
    }

    fn own_engagement(&self) -> impl Iterator<Item = &EngagementMetric> + '_ {
        self.engagement
            .iter()
            .filter(move |m| m.asset_symbol == self.asset_symbol)
    }

    fn own_market(&self) -> Option<&MarketSnapshot> {
        self.market
            .as_ref()
            .filter(|m| m.asset_symbol == self.asset_symbol)
    }

    /// Records that name a different asset than their bundle.
    fn foreign_records(&self) -> usize {
        let texts = self.texts.len() - self.own_texts().count();
        let metrics = self.engagement.len() - self.own_engagement().count();
        let market = usize::from(self.market.is_some() && self.own_market().is_none());
        texts + metrics + market
    }
}

/// One batch: the evaluation instant plus ordered asset bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Freshness and `generated_at` are both taken from this instant.
    pub as_of: DateTime<Utc>,
    pub assets: Vec<AssetInputs>,
}

impl Batch {
    pub fn new(as_of: DateTime<Utc>, assets: Vec<AssetInputs>) -> Self {
        Self { as_of, assets }
    }

    /// Group flat record streams into bundles.
    ///
    /// `order` fixes the output order; assets that only appear in the records
    /// follow in order of first appearance. Snapshots come from `provider`.
    pub fn assemble<S: AsRef<str>>(
        as_of: DateTime<Utc>,
        order: &[S],
        texts: Vec<TextUnit>,
        metrics: Vec<EngagementMetric>,
        provider: &dyn MarketContextProvider,
    ) -> Result<Self, SignalError> {
        let mut bundles: Vec<AssetInputs> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut slot = |symbol: &str, bundles: &mut Vec<AssetInputs>| -> Result<usize, SignalError> {
            if let Some(&i) = index.get(symbol) {
                return Ok(i);
            }
            let inputs = AssetInputs::new(symbol)?;
            let i = bundles.len();
            index.insert(inputs.asset_symbol.clone(), i);
            bundles.push(inputs);
            Ok(i)
        };

        for s in order {
            let sym = normalize_symbol("asset_inputs", s.as_ref())?;
            slot(&sym, &mut bundles)?;
        }
        for t in texts {
            let i = slot(&t.asset_symbol, &mut bundles)?;
            bundles[i].texts.push(t);
        }
        for m in metrics {
            let i = slot(&m.asset_symbol, &mut bundles)?;
            bundles[i].engagement.push(m);
        }
        for b in &mut bundles {
            b.market = provider.snapshot(&b.asset_symbol);
        }

        Ok(Self::new(as_of, bundles))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAsset {
    pub asset_symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub assets_processed: usize,
    pub assets_skipped: usize,
    pub skipped: Vec<SkippedAsset>,
    /// Records dropped because they named another asset than their bundle.
    pub ignored_records: usize,
    pub elapsed_seconds: f64,
    pub over_budget: bool,
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// One signal per usable asset, in input order.
    pub signals: Vec<Signal>,
    pub stats: BatchStats,
}

impl BatchOutcome {
    /// Signals by decreasing |composite_score|; ties keep input order.
    pub fn ranked(&self) -> Vec<&Signal> {
        let mut out: Vec<&Signal> = self.signals.iter().collect();
        out.sort_by(|a, b| b.composite_score.abs().total_cmp(&a.composite_score.abs()));
        out
    }
}

enum AssetResult {
    Emitted(Signal),
    Skipped(SkippedAsset),
}

#[derive(Debug, Clone)]
pub struct BatchProcessor {
    cfg: Arc<EngineConfig>,
}

impl BatchProcessor {
    pub fn new(cfg: Arc<EngineConfig>) -> Self {
        Self { cfg }
    }

    /// Snapshot the live config; later reloads do not affect this processor.
    pub fn from_hot(hot: &HotReloadConfig) -> Self {
        Self::new(hot.snapshot())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn process(&self, batch: &Batch) -> Result<BatchOutcome, SignalError> {
        self.process_with_abort(batch, &AtomicBool::new(false))
    }

    pub fn process_with_abort(
        &self,
        batch: &Batch,
        abort: &AtomicBool,
    ) -> Result<BatchOutcome, SignalError> {
        self.process_with_progress(batch, abort, |_| {})
    }

    /// Like `process_with_abort`, calling `on_signal` as each signal is
    /// emitted. In parallel mode the calls arrive in completion order.
    pub fn process_with_progress<F>(
        &self,
        batch: &Batch,
        abort: &AtomicBool,
        on_signal: F,
    ) -> Result<BatchOutcome, SignalError>
    where
        F: Fn(&Signal) + Sync,
    {
        ensure_metrics_described();
        let started = Instant::now();
        let cfg = self.cfg.as_ref();

        if let Err(e) = cfg.validate() {
            warn!(error = %e, "batch rejected");
            counter!("signal_batches_rejected_total").increment(1);
            return Err(e);
        }

        let scorer = SentimentScorer::new(&cfg.sentiment);
        let normalizer = EngagementNormalizer::new(&cfg.engagement);
        let generator = SignalGenerator::new(cfg);

        // Reference maximum is a batch-wide, read-only value.
        let batch_max = batch
            .assets
            .iter()
            .map(|a| normalizer.raw_engagement(a.own_engagement()))
            .fold(0.0f64, f64::max);
        let reference = normalizer.reference(batch_max);

        let evaluate = |inputs: &AssetInputs| -> AssetResult {
            let symbol = inputs.asset_symbol.as_str();
            if abort.load(Ordering::Relaxed) {
                return AssetResult::Skipped(SkippedAsset {
                    asset_symbol: symbol.to_string(),
                    reason: SkipReason::Aborted,
                });
            }

            let text_count = inputs.own_texts().count();
            let sentiment = (text_count > 0).then(|| scorer.score_units(symbol, inputs.own_texts()));
            let engagement = normalizer.score(symbol, inputs.own_engagement(), reference);

            let generated = generator.generate(
                symbol,
                GeneratorInputs {
                    sentiment: sentiment.as_ref(),
                    engagement: engagement.as_ref(),
                    market: inputs.own_market(),
                    text_count,
                },
                batch.as_of,
            );
            match generated {
                Ok(sig) => {
                    on_signal(&sig);
                    AssetResult::Emitted(sig)
                }
                Err(e) => {
                    warn!(asset = symbol, error = %e, "asset skipped");
                    AssetResult::Skipped(SkippedAsset {
                        asset_symbol: symbol.to_string(),
                        reason: SkipReason::MissingInput,
                    })
                }
            }
        };

        let results: Vec<AssetResult> = if cfg.batch.parallel {
            batch.assets.par_iter().map(evaluate).collect()
        } else {
            batch.assets.iter().map(evaluate).collect()
        };

        let mut signals = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for r in results {
            match r {
                AssetResult::Emitted(s) => signals.push(s),
                AssetResult::Skipped(s) => skipped.push(s),
            }
        }

        let ignored_records = batch.assets.iter().map(AssetInputs::foreign_records).sum();
        if ignored_records > 0 {
            warn!(ignored_records, "records did not match their asset bundle");
        }

        let aborted = skipped.iter().any(|s| s.reason == SkipReason::Aborted);
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let over_budget = elapsed_ms > cfg.batch.latency_budget_ms as f64;

        counter!("signal_batches_total").increment(1);
        counter!("signal_assets_processed_total").increment(signals.len() as u64);
        counter!("signal_assets_skipped_total").increment(skipped.len() as u64);
        histogram!("signal_batch_ms").record(elapsed_ms);

        if over_budget {
            counter!("signal_batch_over_budget_total").increment(1);
            warn!(
                elapsed_ms,
                budget_ms = cfg.batch.latency_budget_ms,
                assets = batch.assets.len(),
                "batch exceeded latency budget"
            );
        }
        info!(
            processed = signals.len(),
            skipped = skipped.len(),
            aborted,
            elapsed_ms,
            "batch complete"
        );

        Ok(BatchOutcome {
            stats: BatchStats {
                assets_processed: signals.len(),
                assets_skipped: skipped.len(),
                skipped,
                ignored_records,
                elapsed_seconds: elapsed.as_secs_f64(),
                over_budget,
                aborted,
            },
            signals,
        })
    }
}
