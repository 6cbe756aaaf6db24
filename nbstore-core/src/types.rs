//! Core domain types for nbstore
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Polarity** | The binary class label, positive or negative |
//! | **Token** | An opaque string produced by an external tokenizer |
//! | **Counter** | One of three scalar tallies counting trained batches (documents) |
//! | **TokenCount** | Net occurrences of a token under one polarity, always >= 1 when stored |
//!
//! Counters track *batches*, not token occurrences: training a document with
//! 40 tokens moves `global_counter` and the polarity counter by exactly one.

use crate::error::Error;
use serde::{Deserialize, Serialize};

// ============================================
// Polarity
// ============================================

/// Binary class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    /// Both polarities, positive first.
    pub const ALL: [Polarity; 2] = [Polarity::Positive, Polarity::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }

    /// The document counter that moves with this polarity.
    pub fn counter(&self) -> CounterName {
        match self {
            Polarity::Positive => CounterName::Positive,
            Polarity::Negative => CounterName::Negative,
        }
    }

    /// Token table holding counts for this polarity.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Polarity::Positive => "positive_classification",
            Polarity::Negative => "negative_classification",
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Polarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Polarity::Positive),
            "negative" => Ok(Polarity::Negative),
            _ => Err(Error::InvalidArgument(format!("unknown polarity: {:?}", s))),
        }
    }
}

// ============================================
// Counters
// ============================================

/// Name of one of the three document counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterName {
    Global,
    Positive,
    Negative,
}

impl CounterName {
    /// All counters in storage order.
    pub const ALL: [CounterName; 3] = [
        CounterName::Global,
        CounterName::Positive,
        CounterName::Negative,
    ];

    /// Row name as persisted in the `counters` table.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterName::Global => "global_counter",
            CounterName::Positive => "positive_counter",
            CounterName::Negative => "negative_counter",
        }
    }
}

impl std::fmt::Display for CounterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CounterName {
    type Err = Error;

    /// Accepts both the short (`global`) and persisted (`global_counter`) names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" | "global_counter" => Ok(CounterName::Global),
            "positive" | "positive_counter" => Ok(CounterName::Positive),
            "negative" | "negative_counter" => Ok(CounterName::Negative),
            _ => Err(Error::InvalidArgument(format!("unknown counter: {:?}", s))),
        }
    }
}

/// A counter row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: CounterName,
    /// Signed; untraining can drive it below zero.
    pub value: i64,
    pub description: String,
}

/// Descriptions stored alongside each counter when the store is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDescriptions {
    pub global: String,
    pub positive: String,
    pub negative: String,
}

impl CounterDescriptions {
    pub fn get(&self, name: CounterName) -> &str {
        match name {
            CounterName::Global => &self.global,
            CounterName::Positive => &self.positive,
            CounterName::Negative => &self.negative,
        }
    }
}

// ============================================
// Tokens
// ============================================

/// A stored token row. `count` is never persisted as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub token: String,
    pub count: i64,
    pub polarity: Polarity,
}

// ============================================
// Stats
// ============================================

/// Point-in-time summary of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub global_counter: i64,
    pub positive_counter: i64,
    pub negative_counter: i64,
    /// Distinct tokens stored under positive
    pub positive_tokens: i64,
    /// Distinct tokens stored under negative
    pub negative_tokens: i64,
}
