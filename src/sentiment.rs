//! # Sentiment Scorer
//! Lexicon-based polarity for short social texts. Pure: no I/O, no state
//! beyond the embedded lexicon.
//!
//! Each lexicon hit adds its integer valence. A negator within the previous
//! three tokens flips the sign, an intensifier right before the hit scales it.
//! The raw sum is squashed into [-1, 1] so long rants do not saturate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::SentimentConfig;
use crate::records::TextUnit;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Squash constant: raw score ±alpha^0.5 maps to about ±0.7.
const NORMALIZE_ALPHA: f64 = 15.0;
const INTENSIFIER_BOOST: f64 = 1.5;
const NEGATION_LOOKBACK: usize = 3;

/// Aggregated polarity of all texts about one asset in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentScore {
    pub asset_symbol: String,
    /// Polarity in [-1, 1].
    pub value: f64,
    /// Tokens that backed the value.
    pub sample_size: usize,
}

#[derive(Debug, Clone)]
pub struct SentimentScorer {
    max_tokens: usize,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(&SentimentConfig::default())
    }
}

impl SentimentScorer {
    pub fn new(cfg: &SentimentConfig) -> Self {
        Self {
            max_tokens: cfg.max_tokens.max(1),
        }
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns `(value in [-1, 1], token count)`.
    /// Empty or whitespace-only input yields `(0.0, 0)`.
    pub fn score_text(&self, text: &str) -> (f64, usize) {
        let clean = normalize_text(text);
        let tokens: Vec<String> = tokenize(&clean).take(self.max_tokens).collect();
        if tokens.is_empty() {
            return (0.0, 0);
        }

        let mut raw = 0.0f64;
        for i in 0..tokens.len() {
            let base = self.word_score(&tokens[i]);
            if base == 0 {
                continue;
            }
            let negated =
                (1..=NEGATION_LOOKBACK).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let boosted = i >= 1 && is_intensifier(tokens[i - 1].as_str());

            let mut v = base as f64;
            if boosted {
                v *= INTENSIFIER_BOOST;
            }
            if negated {
                v = -v;
            }
            raw += v;
        }

        (squash(raw), tokens.len())
    }

    /// Score every unit and fold them into one asset-level score.
    pub fn score_units<'a, I>(&self, asset_symbol: &str, units: I) -> SentimentScore
    where
        I: IntoIterator<Item = &'a TextUnit>,
    {
        aggregate(
            asset_symbol,
            units.into_iter().map(|u| self.score_text(&u.body)),
        )
    }
}

/// Weighted mean of per-text values, weighted by each text's token count.
/// Texts without tokens contribute nothing.
pub fn aggregate<I>(asset_symbol: &str, scores: I) -> SentimentScore
where
    I: IntoIterator<Item = (f64, usize)>,
{
    let mut weighted = 0.0f64;
    let mut total = 0usize;
    for (value, n) in scores {
        if n == 0 {
            continue;
        }
        weighted += value * n as f64;
        total += n;
    }
    let value = if total > 0 {
        (weighted / total as f64).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    SentimentScore {
        asset_symbol: asset_symbol.to_string(),
        value,
        sample_size: total,
    }
}

fn squash(raw: f64) -> f64 {
    if raw == 0.0 {
        return 0.0;
    }
    (raw / (raw * raw + NORMALIZE_ALPHA).sqrt()).clamp(-1.0, 1.0)
}

/// Decode HTML entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

    let decoded = html_escape::decode_html_entities(s);
    let untagged = RE_TAGS.replace_all(&decoded, " ");
    let quotes = untagged
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WS.replace_all(&quotes, " ").trim().to_string()
}

/// Lower-case alphanumeric tokens; inner apostrophes survive so "isn't" stays one token.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "nor"
            | "isn't"
            | "isnt"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cant"
            | "cannot"
            | "don't"
            | "dont"
            | "doesn't"
            | "didn't"
            | "without"
    )
}

fn is_intensifier(tok: &str) -> bool {
    matches!(
        tok,
        "very" | "extremely" | "super" | "really" | "massively" | "hugely" | "incredibly" | "so"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TextSource;

    fn scorer() -> SentimentScorer {
        SentimentScorer::default()
    }

    #[test]
    fn empty_and_whitespace_are_neutral() {
        assert_eq!(scorer().score_text(""), (0.0, 0));
        assert_eq!(scorer().score_text("   \n\t "), (0.0, 0));
        assert_eq!(scorer().score_text("&nbsp; <br/>"), (0.0, 0));
    }

    #[test]
    fn polarity_direction() {
        let (pos, n) = scorer().score_text("BTC is bullish, huge rally incoming!");
        assert!(pos > 0.5, "got {pos}");
        assert_eq!(n, 6);
        let (neg, _) = scorer().score_text("Exchange hacked, funds stolen, panic selling");
        assert!(neg < -0.5, "got {neg}");
    }

    #[test]
    fn negation_flips_sign() {
        let (v, _) = scorer().score_text("this is not bullish at all");
        assert!(v < 0.0, "got {v}");
        let (v, _) = scorer().score_text("ETH isn't going to crash");
        assert!(v > 0.0, "got {v}");
    }

    #[test]
    fn intensifier_strengthens() {
        let (plain, _) = scorer().score_text("good news");
        let (boosted, _) = scorer().score_text("very good news");
        assert!(boosted > plain);
    }

    #[test]
    fn values_stay_bounded() {
        let text = "moon ".repeat(500);
        let (v, n) = scorer().score_text(&text);
        assert!(v <= 1.0 && v > 0.99);
        assert_eq!(n, 500);
    }

    #[test]
    fn token_cap_applies() {
        let s = SentimentScorer::new(&SentimentConfig { max_tokens: 3 });
        let (v, n) = s.score_text("one two three crash crash");
        assert_eq!(n, 3);
        assert_eq!(v, 0.0);
    }

    #[test]
    fn aggregate_weights_by_sample_size() {
        // A long positive text vs one short negative one.
        let agg = aggregate("BTC", vec![(0.8, 40), (-0.8, 2), (0.5, 0)]);
        let expected = (0.8 * 40.0 - 0.8 * 2.0) / 42.0;
        assert!((agg.value - expected).abs() < 1e-12);
        assert_eq!(agg.sample_size, 42);

        let simple_mean = (0.8 - 0.8) / 2.0;
        assert!(agg.value > simple_mean);
    }

    #[test]
    fn aggregate_of_nothing_is_neutral() {
        let agg = aggregate("BTC", Vec::new());
        assert_eq!(agg.value, 0.0);
        assert_eq!(agg.sample_size, 0);
    }

    #[test]
    fn score_units_uses_bodies() {
        let ts = "2025-03-01T12:00:00Z".parse().unwrap();
        let units = vec![
            TextUnit::new("SOL", "solana adoption growing fast", ts, TextSource::Post).unwrap(),
            TextUnit::new("SOL", "", ts, TextSource::Trend).unwrap(),
        ];
        let s = scorer().score_units("SOL", &units);
        assert_eq!(s.asset_symbol, "SOL");
        assert_eq!(s.sample_size, 4);
        assert!(s.value > 0.0);
    }

    #[test]
    fn normalize_text_decodes_and_strips() {
        assert_eq!(
            normalize_text("  <b>Bitcoin</b>&nbsp;&amp; \u{201C}ETH\u{201D}  "),
            r#"Bitcoin & "ETH""#
        );
    }
}
