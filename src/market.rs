// src/market.rs
//! Market context: the external collaborator that supplies snapshots, and
//! the freshness check the generator applies to them.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::records::{normalize_symbol, MarketSnapshot};

/// Supplies the latest known snapshot per asset. Implementations must have
/// resolved their data already; the engine never waits on them.
pub trait MarketContextProvider: Send + Sync {
    fn snapshot(&self, asset_symbol: &str) -> Option<MarketSnapshot>;
}

impl<F> MarketContextProvider for F
where
    F: Fn(&str) -> Option<MarketSnapshot> + Send + Sync,
{
    fn snapshot(&self, asset_symbol: &str) -> Option<MarketSnapshot> {
        self(asset_symbol)
    }
}

/// In-memory provider; keeps the newest snapshot per asset.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketContext {
    by_asset: HashMap<String, MarketSnapshot>,
}

impl StaticMarketContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snap: MarketSnapshot) {
        match self.by_asset.get(&snap.asset_symbol) {
            Some(existing) if existing.timestamp >= snap.timestamp => {}
            _ => {
                self.by_asset.insert(snap.asset_symbol.clone(), snap);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_asset.is_empty()
    }
}

impl FromIterator<MarketSnapshot> for StaticMarketContext {
    fn from_iter<T: IntoIterator<Item = MarketSnapshot>>(iter: T) -> Self {
        let mut ctx = Self::new();
        for s in iter {
            ctx.insert(s);
        }
        ctx
    }
}

impl MarketContextProvider for StaticMarketContext {
    fn snapshot(&self, asset_symbol: &str) -> Option<MarketSnapshot> {
        let key = normalize_symbol("market_snapshot", asset_symbol).ok()?;
        self.by_asset.get(&key).cloned()
    }
}

/// How usable a snapshot is at the evaluation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within the window; `age` is clamped to zero for small clock skew.
    Fresh { age: Duration },
    /// Older than the window, or further in the future than the window.
    Stale,
    Absent,
}

impl Freshness {
    pub fn assess(
        snapshot: Option<&MarketSnapshot>,
        as_of: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let Some(s) = snapshot else {
            return Freshness::Absent;
        };
        let age = s.age_at(as_of);
        if age > window || -age > window {
            return Freshness::Stale;
        }
        Freshness::Fresh {
            age: age.max(Duration::zero()),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh { .. })
    }
}
