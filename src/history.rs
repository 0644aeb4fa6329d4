//! history.rs: bounded in-memory log of emitted signals, newest last.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

use crate::signal::{Signal, SignalCategory};

const MAX_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub asset_symbol: String,
    pub category: SignalCategory,
    pub composite_score: f64,
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

impl From<&Signal> for HistoryEntry {
    fn from(s: &Signal) -> Self {
        Self {
            asset_symbol: s.asset_symbol.clone(),
            category: s.category,
            composite_score: s.composite_score,
            confidence: s.confidence,
            generated_at: s.generated_at,
        }
    }
}

#[derive(Debug)]
pub struct SignalHistory {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl SignalHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, MAX_CAPACITY);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn record<'a, I>(&self, signals: I)
    where
        I: IntoIterator<Item = &'a Signal>,
    {
        let mut v = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        v.extend(signals.into_iter().map(HistoryEntry::from));
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ConfidenceBreakdown;
    use std::collections::BTreeMap;

    fn sig(sym: &str) -> Signal {
        Signal {
            asset_symbol: sym.into(),
            category: SignalCategory::Hold,
            composite_score: 0.0,
            confidence: 0.5,
            contributing_factors: BTreeMap::new(),
            confidence_breakdown: ConfidenceBreakdown {
                base: 1.0,
                freshness: 0.5,
                engagement_reliability: 1.0,
            },
            generated_at: "2025-03-01T12:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn keeps_newest_within_capacity() {
        let h = SignalHistory::with_capacity(2);
        h.record(&[sig("BTC"), sig("ETH")]);
        h.record(&[sig("SOL")]);
        assert_eq!(h.len(), 2);
        let last: Vec<_> = h
            .snapshot_last_n(10)
            .into_iter()
            .map(|e| e.asset_symbol)
            .collect();
        assert_eq!(last, vec!["ETH", "SOL"]);
        assert_eq!(h.snapshot_last_n(1)[0].asset_symbol, "SOL");
    }
}
