//! # nbstore-core
//!
//! Persistent frequency statistics for a binary (positive/negative) Naive
//! Bayes text classifier.
//!
//! This library provides:
//! - Domain types for polarities, counters and token counts
//! - A SQLite-backed counter store with atomic per-row updates
//! - A trainer that applies token batches and serves counts to a classifier
//! - Configuration management
//! - Logging infrastructure
//!
//! Tokenization and probability math live outside this crate: callers hand
//! in pre-tokenized documents and read back `token_count` / `polarity_total`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nbstore_core::{Config, CounterStore, Polarity, Trainer};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = CounterStore::open_or_initialize(&config.database_path(), &config.descriptions())
//!     .expect("failed to open store");
//!
//! let trainer = Trainer::with_policy(store, config.training.batch_policy);
//! trainer.train_positive(&["buy", "now", "buy"]).expect("training failed");
//!
//! let ratio = trainer.token_count("buy", Polarity::Positive).unwrap()
//!     / trainer.polarity_total(Polarity::Positive).unwrap() as f64;
//! assert_eq!(ratio, 2.0);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{CounterStore, UnseenDefaults};
pub use error::{Error, Result};
pub use training::{BatchPolicy, Direction, Trainer, TrainingReport};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod training;
pub mod types;
