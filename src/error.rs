//! Error taxonomy of the signal engine.
//!
//! Configuration problems are fatal for a whole batch, missing inputs only
//! for one asset. Stale market data is not an error at all: the generator
//! degrades to the remaining factors instead.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    /// Weights, thresholds or scaling parameters are unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Neither sentiment nor engagement input exists for the asset.
    #[error("no sentiment or engagement input for {asset}")]
    MissingInput { asset: String },

    /// A record failed validation at construction time.
    #[error("invalid {record} record: {reason}")]
    InvalidRecord {
        record: &'static str,
        reason: String,
    },
}

impl SignalError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub(crate) fn record(record: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            record,
            reason: reason.into(),
        }
    }
}

/// Why an asset produced no signal in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No text with tokens and no engagement metrics.
    MissingInput,
    /// The batch was aborted before the asset was reached.
    Aborted,
}
