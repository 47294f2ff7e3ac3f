//! Error types for the quoting pipeline.
//!
//! Each enum maps to one failure class of the pipeline:
//!
//! - [`ParseError`]: a single line-parser stage failed. The caller substitutes
//!   the stage default and keeps going.
//! - [`WeightError`]: the part weight could not be resolved. The line is still
//!   quoted, with a weight of zero.
//! - [`RateError`]: the exchange rate could not be resolved. This aborts the
//!   whole message.
//! - [`ConfigError`]: the configuration file or an environment override is bad.

use crate::heuristics::Currency;
use thiserror::Error;
use time::Date;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid number '{value}': {reason}")]
    InvalidNumber { value: String, reason: String },

    /// The lead-time pattern matched a unit word the conversion table does not know.
    #[error("unknown lead time period: {0}")]
    UnknownLeadUnit(String),
}

impl ParseError {
    pub fn invalid_number(value: &str, reason: impl ToString) -> Self {
        ParseError::InvalidNumber {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WeightError {
    /// No resolver is registered for the part number prefix.
    #[error("unsupported part number: {0}")]
    UnsupportedPartNumber(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no weight listed for part {0}")]
    NotListed(String),

    #[error("unreadable weight '{value}' for part {part_number}")]
    InvalidWeight { part_number: String, value: String },
}

#[derive(Debug, Error)]
pub enum RateError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no {from}->{to} rate for {date}")]
    Missing { from: Currency, to: Currency, date: Date },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: String, value: String },
}
