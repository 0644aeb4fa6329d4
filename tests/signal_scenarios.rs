// tests/signal_scenarios.rs
//
// End-to-end behaviour of the engine through its public API:
// - redistribution when the market is missing
// - the strong-sentiment / weak-engagement scenario with and without market
// - skipped assets never stop the batch
// - idempotence and order invariance over whole batches
// - conservative category edges

use chrono::{DateTime, Duration, Utc};
use crypto_trend_signals::config::{CategoryThresholds, EngineConfig};
use crypto_trend_signals::engine::categorize;
use crypto_trend_signals::{
    AssetInputs, AssetAliases, Batch, BatchProcessor, EngagementMetric, EngagementScore, Factor,
    GeneratorInputs, MarketSnapshot, SentimentScore, SignalCategory, SignalGenerator, SkipReason,
    StaticMarketContext, TextSource, TextUnit,
};
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    "2025-03-01T12:00:00Z".parse().unwrap()
}

fn sentiment(v: f64, n: usize) -> SentimentScore {
    SentimentScore {
        asset_symbol: "BTC".into(),
        value: v,
        sample_size: n,
    }
}

fn engagement(v: f64, mentions: u64) -> EngagementScore {
    EngagementScore {
        asset_symbol: "BTC".into(),
        value: v,
        sample_count: mentions,
    }
}

fn text(sym: &str, body: &str) -> TextUnit {
    TextUnit::new(sym, body, now() - Duration::minutes(2), TextSource::Post).unwrap()
}

fn metric(sym: &str, mentions: u64, reactions: u64) -> EngagementMetric {
    EngagementMetric::new(sym, mentions, reactions, 0, now()).unwrap()
}

fn market(sym: &str, pct: f64, age: Duration) -> MarketSnapshot {
    MarketSnapshot::new(sym, 100.0, 1e6, pct, now() - age).unwrap()
}

fn mixed_batch() -> Batch {
    Batch::new(
        now(),
        vec![
            AssetInputs::new("BTC")
                .unwrap()
                .with_texts(vec![
                    text("BTC", "Bitcoin breakout, very bullish"),
                    text("BTC", "btc looks strong, accumulate"),
                ])
                .with_engagement(vec![metric("BTC", 120, 300)])
                .with_market(Some(market("BTC", 6.0, Duration::minutes(1)))),
            AssetInputs::new("ETH")
                .unwrap()
                .with_texts(vec![text("ETH", "eth dump incoming, bearish")])
                .with_engagement(vec![metric("ETH", 20, 10)])
                .with_market(Some(market("ETH", -3.0, Duration::hours(2)))),
            AssetInputs::new("GHOST")
                .unwrap()
                .with_market(Some(market("GHOST", 1.0, Duration::zero()))),
            AssetInputs::new("SOL")
                .unwrap()
                .with_engagement(vec![metric("SOL", 5, 0)]),
        ],
    )
}

#[test]
fn two_factor_sum_is_renormalized_without_market() {
    let cfg = EngineConfig::default();
    let g = SignalGenerator::new(&cfg);
    let (s, e) = (sentiment(0.8, 30), engagement(0.5, 10));
    let sig = g
        .generate(
            "BTC",
            GeneratorInputs {
                sentiment: Some(&s),
                engagement: Some(&e),
                ..Default::default()
            },
            now(),
        )
        .unwrap();

    let w = cfg.weights;
    let expected = (w.sentiment * 0.8 + w.engagement * (2.0 * 0.5 - 1.0)) / (w.sentiment + w.engagement);
    assert!((sig.composite_score - expected).abs() < 1e-9);
    // Not the implicit-zero version that drags the score toward neutral.
    let naive = w.sentiment * 0.8 + w.engagement * 0.0;
    assert!(sig.composite_score > naive);
    assert_eq!(sig.contribution(Factor::Market), 0.0);
}

#[test]
fn strong_sentiment_weak_engagement_with_and_without_market() {
    let cfg = EngineConfig::default();
    let g = SignalGenerator::new(&cfg);
    let (s, e) = (sentiment(0.9, 50), engagement(0.1, 20));
    let fresh = market("BTC", 10.0, Duration::zero());

    let without = g
        .generate(
            "BTC",
            GeneratorInputs {
                sentiment: Some(&s),
                engagement: Some(&e),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
    let with = g
        .generate(
            "BTC",
            GeneratorInputs {
                sentiment: Some(&s),
                engagement: Some(&e),
                market: Some(&fresh),
                text_count: 0,
            },
            now(),
        )
        .unwrap();

    assert!(matches!(without.category, SignalCategory::Buy | SignalCategory::StrongBuy));
    assert!(matches!(with.category, SignalCategory::Buy | SignalCategory::StrongBuy));
    assert!(without.confidence < with.confidence);
    assert!(without.confidence_breakdown.freshness < with.confidence_breakdown.freshness);
}

#[test]
fn all_absent_asset_is_skipped_and_batch_continues() {
    let out = BatchProcessor::new(Arc::new(EngineConfig::default()))
        .process(&mixed_batch())
        .unwrap();

    let syms: Vec<_> = out.signals.iter().map(|s| s.asset_symbol.as_str()).collect();
    assert_eq!(syms, vec!["BTC", "ETH", "SOL"]);
    assert_eq!(out.stats.assets_processed, 3);
    assert_eq!(out.stats.assets_skipped, 1);
    assert_eq!(out.stats.skipped[0].asset_symbol, "GHOST");
    assert_eq!(out.stats.skipped[0].reason, SkipReason::MissingInput);
    assert!(!out.stats.aborted);

    // ETH's two-hour-old snapshot is stale: no market term, floor freshness.
    let eth = &out.signals[1];
    assert_eq!(eth.contribution(Factor::Market), 0.0);
    assert_eq!(eth.confidence_breakdown.freshness, 0.6);

    for s in &out.signals {
        assert!((-1.0..=1.0).contains(&s.composite_score));
        assert!((0.0..=1.0).contains(&s.confidence));
        assert!((s.factor_sum() - s.composite_score).abs() < 1e-9);
        assert_eq!(s.generated_at, now());
    }
}

#[test]
fn same_batch_twice_gives_identical_signals() {
    let p = BatchProcessor::new(Arc::new(EngineConfig::default()));
    let a = p.process(&mixed_batch()).unwrap();
    let b = p.process(&mixed_batch()).unwrap();
    assert_eq!(a.signals, b.signals);
    assert_eq!(a.stats.skipped, b.stats.skipped);
}

#[test]
fn permuting_assets_only_permutes_output() {
    let p = BatchProcessor::new(Arc::new(EngineConfig::default()));
    let forward = p.process(&mixed_batch()).unwrap();

    let mut reversed = mixed_batch();
    reversed.assets.reverse();
    let backward = p.process(&reversed).unwrap();

    let rev_syms: Vec<_> = backward.signals.iter().map(|s| s.asset_symbol.clone()).collect();
    assert_eq!(rev_syms, vec!["SOL", "ETH", "BTC"]);
    for s in &forward.signals {
        let twin = backward
            .signals
            .iter()
            .find(|o| o.asset_symbol == s.asset_symbol)
            .unwrap();
        assert_eq!(s, twin);
    }
}

#[test]
fn threshold_edge_is_hold() {
    let t = CategoryThresholds::default();
    assert_eq!(categorize(0.2, &t), SignalCategory::Hold);
    assert_eq!(categorize(-0.2, &t), SignalCategory::Hold);
}

#[test]
fn posts_flow_from_mentions_to_signals() {
    let aliases = AssetAliases::default();
    let mut texts = Vec::new();
    for body in [
        "Bitcoin rally continues, $ETH lagging",
        "ethereum upgrade looks bullish",
        "btc to the moon",
    ] {
        texts.extend(aliases.attribute(body, now(), TextSource::Trend).unwrap());
    }
    let ctx: StaticMarketContext = vec![market("BTC", 4.0, Duration::minutes(3))]
        .into_iter()
        .collect();

    let batch = Batch::assemble(
        now(),
        &["BTC", "ETH"],
        texts,
        vec![metric("BTC", 50, 80), metric("ETH", 10, 5)],
        &ctx,
    )
    .unwrap();
    assert_eq!(batch.assets[0].texts.len(), 2);
    assert_eq!(batch.assets[1].texts.len(), 2);

    let out = BatchProcessor::new(Arc::new(EngineConfig::default()))
        .process(&batch)
        .unwrap();
    assert_eq!(out.signals.len(), 2);
    assert!(out.signals[0].category.is_bullish());
    assert!(out.signals[0].contribution(Factor::Market) > 0.0);
    assert_eq!(out.signals[1].contribution(Factor::Market), 0.0);

    let ranked = out.ranked();
    assert!(ranked[0].composite_score.abs() >= ranked[1].composite_score.abs());
}
