// src/mentions.rs
//! Asset mention detection: attributes free-form posts to asset symbols via
//! cashtags (`$BTC`) and known names (`bitcoin`, `ether`).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::SignalError;
use crate::records::{normalize_symbol, TextSource, TextUnit};

static CASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$(?P<tag>[a-z]{1,6})\b").expect("cashtag regex"));
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("btc", "BTC"),
    ("ethereum", "ETH"),
    ("ether", "ETH"),
    ("eth", "ETH"),
    ("solana", "SOL"),
    ("sol", "SOL"),
    ("dogecoin", "DOGE"),
    ("doge", "DOGE"),
    ("cardano", "ADA"),
    ("ripple", "XRP"),
    ("xrp", "XRP"),
    ("litecoin", "LTC"),
    ("polkadot", "DOT"),
    ("avalanche", "AVAX"),
    ("chainlink", "LINK"),
];

/// Lower-case name → symbol table.
#[derive(Debug, Clone)]
pub struct AssetAliases {
    by_name: HashMap<String, String>,
}

impl Default for AssetAliases {
    fn default() -> Self {
        Self {
            by_name: DEFAULT_ALIASES
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
        }
    }
}

impl AssetAliases {
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, symbol: &str) -> Result<(), SignalError> {
        let symbol = normalize_symbol("alias", symbol)?;
        self.by_name.insert(name.trim().to_lowercase(), symbol);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_name.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Distinct symbols mentioned in `text`, sorted.
    pub fn detect(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = CASHTAG_RE
            .captures_iter(text)
            .filter_map(|c| c.name("tag"))
            .map(|m| m.as_str().to_ascii_uppercase())
            .collect();
        found.extend(
            WORD_RE
                .find_iter(text)
                .filter_map(|w| self.resolve(w.as_str()))
                .map(str::to_string),
        );
        found.sort();
        found.dedup();
        found
    }

    /// One text unit per asset the post mentions; none when it mentions none.
    pub fn attribute(
        &self,
        body: &str,
        timestamp: DateTime<Utc>,
        source: TextSource,
    ) -> Result<Vec<TextUnit>, SignalError> {
        self.detect(body)
            .into_iter()
            .map(|sym| TextUnit::new(sym, body, timestamp, source))
            .collect()
    }
}
