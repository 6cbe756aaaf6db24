//! Training and untraining of token batches
//!
//! A batch is the token sequence of one document, already tokenized by the
//! caller. Duplicates count as separate occurrences.
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  tokenizer   │ ──► │   Trainer   │ ──► │ CounterStore │
//! │  (external)  │     │             │     │   (SQLite)   │
//! └──────────────┘     └─────────────┘     └──────────────┘
//!                            ▲
//!                            │ token_count / polarity_total
//!                      ┌─────────────┐
//!                      │ classifier  │
//!                      └─────────────┘
//! ```
//!
//! Token updates run first, then `global_counter` and the polarity counter
//! move by one. A batch as a whole is not atomic: each token update commits
//! on its own.

use crate::db::CounterStore;
use crate::error::Result;
use crate::types::{CounterName, Polarity, StoreStats};
use serde::Deserialize;

/// What to do when a single token update fails mid-batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Log and skip the failing token, then adjust the counters anyway.
    #[default]
    BestEffort,
    /// Stop at the first failing token and leave the counters untouched.
    FailFast,
}

/// Whether a batch added or removed evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Train,
    Untrain,
}

impl Direction {
    fn delta(self) -> i64 {
        match self {
            Direction::Train => 1,
            Direction::Untrain => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Train => "train",
            Direction::Untrain => "untrain",
        }
    }
}

/// Outcome of one training call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingReport {
    pub polarity: Polarity,
    pub direction: Direction,
    /// Token updates that committed
    pub tokens_applied: usize,
    /// Token updates that failed and were skipped (best-effort only)
    pub tokens_skipped: usize,
}

/// Applies token batches to a [`CounterStore`] and serves counts back to a
/// classifier.
pub struct Trainer {
    store: CounterStore,
    policy: BatchPolicy,
}

impl Trainer {
    /// Create a trainer with the best-effort batch policy.
    pub fn new(store: CounterStore) -> Self {
        Self::with_policy(store, BatchPolicy::default())
    }

    pub fn with_policy(store: CounterStore, policy: BatchPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// The underlying store
    pub fn store(&self) -> &CounterStore {
        &self.store
    }

    pub fn train_positive<S: AsRef<str>>(&self, tokens: &[S]) -> Result<TrainingReport> {
        self.apply(tokens, Polarity::Positive, Direction::Train)
    }

    pub fn train_negative<S: AsRef<str>>(&self, tokens: &[S]) -> Result<TrainingReport> {
        self.apply(tokens, Polarity::Negative, Direction::Train)
    }

    /// Reverse a positive document. Purely count-based: tokens that are not
    /// stored are ignored, and nothing ties this call to a specific earlier batch.
    pub fn untrain_positive<S: AsRef<str>>(&self, tokens: &[S]) -> Result<TrainingReport> {
        self.apply(tokens, Polarity::Positive, Direction::Untrain)
    }

    pub fn untrain_negative<S: AsRef<str>>(&self, tokens: &[S]) -> Result<TrainingReport> {
        self.apply(tokens, Polarity::Negative, Direction::Untrain)
    }

    /// Train or untrain one batch under `polarity`.
    pub fn apply<S: AsRef<str>>(
        &self,
        tokens: &[S],
        polarity: Polarity,
        direction: Direction,
    ) -> Result<TrainingReport> {
        let _span = tracing::info_span!(
            "batch",
            %polarity,
            direction = direction.as_str(),
            tokens = tokens.len()
        )
        .entered();

        let mut report = TrainingReport {
            polarity,
            direction,
            tokens_applied: 0,
            tokens_skipped: 0,
        };

        for token in tokens {
            let token = token.as_ref();
            let outcome = match direction {
                Direction::Train => self.store.bump_token(token, polarity),
                Direction::Untrain => self.store.drop_token(token, polarity),
            };

            match outcome {
                Ok(_) => report.tokens_applied += 1,
                Err(e) => match self.policy {
                    BatchPolicy::FailFast => {
                        tracing::error!(
                            token,
                            %polarity,
                            direction = direction.as_str(),
                            applied = report.tokens_applied,
                            error = %e,
                            "Token update failed, aborting batch"
                        );
                        return Err(e);
                    }
                    BatchPolicy::BestEffort => {
                        tracing::warn!(
                            token,
                            %polarity,
                            direction = direction.as_str(),
                            error = %e,
                            "Token update failed, skipping"
                        );
                        report.tokens_skipped += 1;
                    }
                },
            }
        }

        self.store
            .adjust_counter(CounterName::Global, direction.delta())?;
        self.store
            .adjust_counter(polarity.counter(), direction.delta())?;

        tracing::info!(
            %polarity,
            direction = direction.as_str(),
            applied = report.tokens_applied,
            skipped = report.tokens_skipped,
            "Batch complete"
        );

        Ok(report)
    }

    // ============================================
    // Read side
    // ============================================

    /// See [`CounterStore::token_count`].
    pub fn token_count(&self, token: &str, polarity: Polarity) -> Result<f64> {
        self.store.token_count(token, polarity)
    }

    /// See [`CounterStore::polarity_total`].
    pub fn polarity_total(&self, polarity: Polarity) -> Result<i64> {
        self.store.polarity_total(polarity)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CounterDescriptions;

    fn test_trainer(policy: BatchPolicy) -> Trainer {
        let store = CounterStore::open_in_memory().unwrap();
        store.initialize(&CounterDescriptions::default()).unwrap();
        Trainer::with_policy(store, policy)
    }

    /// Makes every token update fail by dropping the token tables.
    fn break_token_tables(trainer: &Trainer) {
        trainer
            .store()
            .connection_for_test()
            .execute_batch(
                "DROP TABLE positive_classification; DROP TABLE negative_classification;",
            )
            .unwrap();
    }

    #[test]
    fn test_batch_runs_inside_span() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::layer::{Context, SubscriberExt};

        struct SpanNames(Arc<Mutex<Vec<String>>>);

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanNames {
            fn on_new_span(
                &self,
                attrs: &tracing::span::Attributes<'_>,
                _id: &tracing::span::Id,
                _ctx: Context<'_, S>,
            ) {
                self.0
                    .lock()
                    .unwrap()
                    .push(attrs.metadata().name().to_string());
            }
        }

        let names = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(SpanNames(names.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let trainer = test_trainer(BatchPolicy::BestEffort);
            trainer.train_negative(&["a", "b"]).unwrap();
            trainer.untrain_negative(&["a"]).unwrap();
        });

        assert_eq!(*names.lock().unwrap(), vec!["batch", "batch"]);
    }

    #[test]
    fn test_train_positive() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        let report = trainer.train_positive(&["buy", "now", "buy"]).unwrap();

        assert_eq!(report.tokens_applied, 3);
        assert_eq!(report.tokens_skipped, 0);

        let store = trainer.store();
        assert_eq!(store.raw_token_count("buy", Polarity::Positive).unwrap(), Some(2));
        assert_eq!(store.raw_token_count("now", Polarity::Positive).unwrap(), Some(1));
        assert_eq!(store.counter(CounterName::Global).unwrap().value, 1);
        assert_eq!(store.counter(CounterName::Positive).unwrap().value, 1);
        assert_eq!(store.counter(CounterName::Negative).unwrap().value, 0);
    }

    #[test]
    fn test_untrain_positive_removes_single_count_token() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        trainer.train_positive(&["buy", "now", "buy"]).unwrap();
        trainer.untrain_positive(&["now"]).unwrap();

        let store = trainer.store();
        assert_eq!(store.raw_token_count("now", Polarity::Positive).unwrap(), None);
        assert_eq!(store.raw_token_count("buy", Polarity::Positive).unwrap(), Some(2));
        assert_eq!(store.counter(CounterName::Global).unwrap().value, 0);
        assert_eq!(store.counter(CounterName::Positive).unwrap().value, 0);
    }

    #[test]
    fn test_polarity_isolation() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        trainer.train_positive(&["free", "offer"]).unwrap();

        let stats = trainer.stats().unwrap();
        assert_eq!(stats.negative_counter, 0);
        assert_eq!(stats.negative_tokens, 0);
        assert_eq!(trainer.token_count("free", Polarity::Negative).unwrap(), 1.0);
        assert_eq!(trainer.token_count("free", Polarity::Positive).unwrap(), 1.0);
    }

    #[test]
    fn test_train_and_untrain_negative() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        trainer.train_negative(&["meeting", "agenda"]).unwrap();
        trainer.train_negative(&["meeting"]).unwrap();
        trainer.untrain_negative(&["meeting", "agenda", "unknown"]).unwrap();

        let store = trainer.store();
        assert_eq!(store.raw_token_count("meeting", Polarity::Negative).unwrap(), Some(1));
        assert_eq!(store.raw_token_count("agenda", Polarity::Negative).unwrap(), None);
        assert_eq!(store.counter(CounterName::Global).unwrap().value, 1);
        assert_eq!(store.counter(CounterName::Negative).unwrap().value, 1);
        assert_eq!(trainer.polarity_total(Polarity::Negative).unwrap(), 1);
    }

    #[test]
    fn test_empty_batch_still_counts_document() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        let empty: [&str; 0] = [];
        trainer.train_positive(&empty).unwrap();

        let stats = trainer.stats().unwrap();
        assert_eq!(stats.global_counter, 1);
        assert_eq!(stats.positive_counter, 1);
        assert_eq!(stats.positive_tokens, 0);
    }

    #[test]
    fn test_untrain_on_fresh_store_goes_negative() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        trainer.untrain_positive(&["never"]).unwrap();

        let store = trainer.store();
        assert_eq!(store.counter(CounterName::Global).unwrap().value, -1);
        assert_eq!(store.counter(CounterName::Positive).unwrap().value, -1);
        assert_eq!(trainer.polarity_total(Polarity::Positive).unwrap(), -1);
    }

    #[test]
    fn test_best_effort_skips_failed_tokens() {
        let trainer = test_trainer(BatchPolicy::BestEffort);
        break_token_tables(&trainer);

        let report = trainer.train_positive(&["a", "b"]).unwrap();
        assert_eq!(report.tokens_applied, 0);
        assert_eq!(report.tokens_skipped, 2);
        assert_eq!(
            trainer.store().counter(CounterName::Positive).unwrap().value,
            1
        );
    }

    #[test]
    fn test_fail_fast_leaves_counters() {
        let trainer = test_trainer(BatchPolicy::FailFast);
        break_token_tables(&trainer);

        assert!(trainer.train_positive(&["a", "b"]).is_err());
        let store = trainer.store();
        assert_eq!(store.counter(CounterName::Global).unwrap().value, 0);
        assert_eq!(store.counter(CounterName::Positive).unwrap().value, 0);
    }
}
