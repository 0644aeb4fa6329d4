// src/records.rs
//! Input records handed over by the acquisition layer.
//!
//! All records are validated when constructed, including when they are
//! deserialized from JSON, so the engine never sees an empty asset symbol,
//! a non-positive price or a non-finite number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Where a piece of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Trend,
    Post,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTextUnit")]
pub struct TextUnit {
    pub asset_symbol: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub source: TextSource,
}

#[derive(Deserialize)]
struct RawTextUnit {
    asset_symbol: String,
    body: String,
    timestamp: DateTime<Utc>,
    source: TextSource,
}

impl TryFrom<RawTextUnit> for TextUnit {
    type Error = SignalError;

    fn try_from(r: RawTextUnit) -> Result<Self, Self::Error> {
        TextUnit::new(r.asset_symbol, r.body, r.timestamp, r.source)
    }
}

impl TextUnit {
    pub fn new(
        asset_symbol: impl AsRef<str>,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: TextSource,
    ) -> Result<Self, SignalError> {
        Ok(Self {
            asset_symbol: normalize_symbol("text_unit", asset_symbol.as_ref())?,
            body: body.into(),
            timestamp,
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEngagementMetric")]
pub struct EngagementMetric {
    pub asset_symbol: String,
    pub mentions: u64,
    pub reactions: u64,
    pub reposts: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawEngagementMetric {
    asset_symbol: String,
    #[serde(default)]
    mentions: u64,
    #[serde(default)]
    reactions: u64,
    #[serde(default)]
    reposts: u64,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawEngagementMetric> for EngagementMetric {
    type Error = SignalError;

    fn try_from(r: RawEngagementMetric) -> Result<Self, Self::Error> {
        EngagementMetric::new(r.asset_symbol, r.mentions, r.reactions, r.reposts, r.timestamp)
    }
}

impl EngagementMetric {
    pub fn new(
        asset_symbol: impl AsRef<str>,
        mentions: u64,
        reactions: u64,
        reposts: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, SignalError> {
        Ok(Self {
            asset_symbol: normalize_symbol("engagement_metric", asset_symbol.as_ref())?,
            mentions,
            reactions,
            reposts,
            timestamp,
        })
    }
}

/// Latest market view for one asset. Read-only input, valid for the
/// configured freshness window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMarketSnapshot")]
pub struct MarketSnapshot {
    pub asset_symbol: String,
    pub price: f64,
    pub volume_24h: f64,
    pub price_change_pct: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawMarketSnapshot {
    asset_symbol: String,
    price: f64,
    #[serde(default)]
    volume_24h: f64,
    #[serde(default)]
    price_change_pct: f64,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawMarketSnapshot> for MarketSnapshot {
    type Error = SignalError;

    fn try_from(r: RawMarketSnapshot) -> Result<Self, Self::Error> {
        MarketSnapshot::new(
            r.asset_symbol,
            r.price,
            r.volume_24h,
            r.price_change_pct,
            r.timestamp,
        )
    }
}

impl MarketSnapshot {
    pub fn new(
        asset_symbol: impl AsRef<str>,
        price: f64,
        volume_24h: f64,
        price_change_pct: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, SignalError> {
        const R: &str = "market_snapshot";
        let asset_symbol = normalize_symbol(R, asset_symbol.as_ref())?;
        if !price.is_finite() || price <= 0.0 {
            return Err(SignalError::record(R, format!("price must be positive, got {price}")));
        }
        if !volume_24h.is_finite() || volume_24h < 0.0 {
            return Err(SignalError::record(
                R,
                format!("volume_24h must be non-negative, got {volume_24h}"),
            ));
        }
        if !price_change_pct.is_finite() {
            return Err(SignalError::record(R, "price_change_pct must be finite"));
        }
        Ok(Self {
            asset_symbol,
            price,
            volume_24h,
            price_change_pct,
            timestamp,
        })
    }

    /// Age relative to `as_of`; negative when the snapshot is from the future.
    pub fn age_at(&self, as_of: DateTime<Utc>) -> chrono::Duration {
        as_of - self.timestamp
    }
}

/// Trim + upper-case; rejects empty symbols.
pub fn normalize_symbol(record: &'static str, raw: &str) -> Result<String, SignalError> {
    let s = raw.trim().trim_start_matches('$').to_ascii_uppercase();
    if s.is_empty() {
        return Err(SignalError::record(record, "asset_symbol must not be empty"));
    }
    Ok(s)
}
