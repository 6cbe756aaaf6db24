//! Counter store
//!
//! Persists the three document counters and the per-polarity token counts.
//! Every mutation is a read-modify-write executed inside one immediate
//! transaction while holding the connection lock, so two callers touching the
//! same counter or token can never interleave.

use crate::error::{Error, Result};
use crate::types::*;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Values returned by [`CounterStore::token_count`] for tokens never seen
/// under a polarity.
///
/// The defaults are asymmetric (0.5 positive, 1.0 negative). Set both fields
/// explicitly for symmetric smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnseenDefaults {
    pub positive: f64,
    pub negative: f64,
}

impl Default for UnseenDefaults {
    fn default() -> Self {
        Self {
            positive: 0.5,
            negative: 1.0,
        }
    }
}

impl UnseenDefaults {
    pub fn get(&self, polarity: Polarity) -> f64 {
        match polarity {
            Polarity::Positive => self.positive,
            Polarity::Negative => self.negative,
        }
    }
}

/// Handle to a counter store (single long-lived connection)
pub struct CounterStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    unseen: UnseenDefaults,
}

impl CounterStore {
    /// Open or create a store at the given path.
    ///
    /// Existing data is never touched. Any failure to reach a usable SQLite
    /// file is reported as [`Error::StorageUnavailable`].
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::unavailable(path, e))?;
        }

        let conn = Connection::open(path).map_err(|e| Error::unavailable(path, e))?;

        // Probe the file so corruption surfaces here rather than mid-training
        super::schema::get_schema_version(&conn).map_err(|e| Error::unavailable(path, e))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )
        .map_err(|e| Error::unavailable(path, e))?;

        tracing::debug!(path = %path.display(), "Opened counter store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            unseen: UnseenDefaults::default(),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
            unseen: UnseenDefaults::default(),
        })
    }

    /// Open the store at `path` and make sure its schema and counters exist.
    pub fn open_or_initialize(path: &Path, descriptions: &CounterDescriptions) -> Result<Self> {
        let store = Self::open(path)?;
        store.initialize(descriptions)?;
        Ok(store)
    }

    /// Replace the fallback values used for unseen tokens.
    pub fn with_unseen_defaults(mut self, unseen: UnseenDefaults) -> Self {
        self.unseen = unseen;
        self
    }

    /// Path of the backing file (`:memory:` for in-memory stores)
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::unavailable(&self.path, "connection lock poisoned"))
    }

    /// Create the schema and the three counters if they do not exist yet.
    ///
    /// Idempotent: on an existing store, values and descriptions are kept.
    /// A file that already holds any of the store's tables without a schema
    /// version is refused with [`Error::StorageUnavailable`].
    pub fn initialize(&self, descriptions: &CounterDescriptions) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let foreign = super::schema::unversioned_tables(&tx)?;
        if !foreign.is_empty() {
            return Err(Error::unavailable(
                &self.path,
                format!("existing tables {:?} were not created by nbstore", foreign),
            ));
        }

        super::schema::run_migrations(&tx)?;
        let created = super::schema::seed_counters(&tx, descriptions)?;
        tx.commit()?;

        if created > 0 {
            tracing::info!(path = %self.path.display(), created, "Initialized counter store");
        } else {
            tracing::debug!(path = %self.path.display(), "Counter store already initialized");
        }
        Ok(())
    }

    // ============================================
    // Counter operations
    // ============================================

    /// Add `delta` to a counter and return the new value.
    pub fn adjust_counter(&self, name: CounterName, delta: i64) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::read_counter(&tx, name)?;
        let updated = current.checked_add(delta).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "adjusting {} by {} overflows its value {}",
                name, delta, current
            ))
        })?;
        tx.execute(
            "UPDATE counters SET counter = ?1 WHERE name = ?2",
            params![updated, name.as_str()],
        )?;
        tx.commit()?;

        tracing::debug!(counter = %name, delta, value = updated, "Adjusted counter");
        Ok(updated)
    }

    /// Like [`adjust_counter`](Self::adjust_counter), addressing the counter by name.
    pub fn adjust_counter_named(&self, name: &str, delta: i64) -> Result<i64> {
        self.adjust_counter(name.parse()?, delta)
    }

    /// Overwrite a counter value.
    pub fn set_counter(&self, name: CounterName, value: i64) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE counters SET counter = ?1 WHERE name = ?2",
            params![value, name.as_str()],
        )?;
        if updated == 0 {
            return Err(uninitialized(name));
        }
        tracing::info!(counter = %name, value, "Counter overwritten");
        Ok(())
    }

    /// Get a counter row
    pub fn counter(&self, name: CounterName) -> Result<Counter> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT counter, description FROM counters WHERE name = ?",
            [name.as_str()],
            |row| {
                Ok(Counter {
                    name,
                    value: row.get(0)?,
                    description: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| uninitialized(name))
    }

    /// All counters, global first
    pub fn counters(&self) -> Result<Vec<Counter>> {
        CounterName::ALL
            .into_iter()
            .map(|name| self.counter(name))
            .collect()
    }

    fn read_counter(conn: &Connection, name: CounterName) -> Result<i64> {
        conn.query_row(
            "SELECT counter FROM counters WHERE name = ?",
            [name.as_str()],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| uninitialized(name))
    }

    // ============================================
    // Token operations
    // ============================================

    /// Record one occurrence of `token` under `polarity`; returns the new count.
    pub fn bump_token(&self, token: &str, polarity: Polarity) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let table = polarity.table();
        let existing = Self::read_token(&tx, token, polarity)?;
        let count = match existing {
            Some(count) => {
                let bumped = count.checked_add(1).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "count for {:?} under {} is at its maximum",
                        token, polarity
                    ))
                })?;
                tx.execute(
                    &format!("UPDATE {table} SET count = ?1 WHERE token = ?2"),
                    params![bumped, token],
                )?;
                bumped
            }
            None => {
                tx.execute(
                    &format!("INSERT INTO {table} (token, count) VALUES (?1, 1)"),
                    [token],
                )?;
                1
            }
        };
        tx.commit()?;

        tracing::trace!(token, %polarity, count, "Bumped token");
        Ok(count)
    }

    /// Remove one occurrence of `token` under `polarity`; returns the remaining count.
    ///
    /// An absent token is a no-op returning 0. A row whose count would reach
    /// zero is deleted instead.
    pub fn drop_token(&self, token: &str, polarity: Polarity) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let table = polarity.table();
        let remaining = match Self::read_token(&tx, token, polarity)? {
            None => 0,
            Some(count) if count <= 1 => {
                tx.execute(&format!("DELETE FROM {table} WHERE token = ?1"), [token])?;
                0
            }
            Some(count) => {
                tx.execute(
                    &format!("UPDATE {table} SET count = ?1 WHERE token = ?2"),
                    params![count - 1, token],
                )?;
                count - 1
            }
        };
        tx.commit()?;

        tracing::trace!(token, %polarity, remaining, "Dropped token");
        Ok(remaining)
    }

    /// Like [`bump_token`](Self::bump_token), addressing the polarity by name.
    pub fn bump_token_named(&self, token: &str, polarity: &str) -> Result<i64> {
        self.bump_token(token, polarity.parse()?)
    }

    /// Like [`drop_token`](Self::drop_token), addressing the polarity by name.
    pub fn drop_token_named(&self, token: &str, polarity: &str) -> Result<i64> {
        self.drop_token(token, polarity.parse()?)
    }

    /// Stored count for a token, if any
    pub fn raw_token_count(&self, token: &str, polarity: Polarity) -> Result<Option<i64>> {
        let conn = self.lock()?;
        Self::read_token(&conn, token, polarity)
    }

    fn read_token(conn: &Connection, token: &str, polarity: Polarity) -> Result<Option<i64>> {
        let count = conn
            .query_row(
                &format!("SELECT count FROM {} WHERE token = ?", polarity.table()),
                [token],
                |r| r.get(0),
            )
            .optional()?;
        Ok(count)
    }

    /// Tokens under a polarity, most frequent first
    pub fn tokens(&self, polarity: Polarity, limit: usize) -> Result<Vec<TokenCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT token, count FROM {} ORDER BY count DESC, token ASC LIMIT ?",
            polarity.table()
        ))?;

        let tokens = stmt
            .query_map([limit as i64], |row| {
                Ok(TokenCount {
                    token: row.get(0)?,
                    count: row.get(1)?,
                    polarity,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tokens)
    }

    /// Number of distinct tokens stored under a polarity
    pub fn vocabulary_size(&self, polarity: Polarity) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", polarity.table()),
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // ============================================
    // Query contract
    // ============================================

    /// Count of `token` under `polarity`, or the configured unseen default.
    pub fn token_count(&self, token: &str, polarity: Polarity) -> Result<f64> {
        Ok(self
            .raw_token_count(token, polarity)?
            .map(|count| count as f64)
            .unwrap_or_else(|| self.unseen.get(polarity)))
    }

    /// Documents trained under `polarity`, with a stored 0 reported as 1.
    pub fn polarity_total(&self, polarity: Polarity) -> Result<i64> {
        let value = self.counter(polarity.counter())?.value;
        Ok(if value == 0 { 1 } else { value })
    }

    /// Snapshot of counters and vocabulary sizes
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            global_counter: self.counter(CounterName::Global)?.value,
            positive_counter: self.counter(CounterName::Positive)?.value,
            negative_counter: self.counter(CounterName::Negative)?.value,
            positive_tokens: self.vocabulary_size(Polarity::Positive)?,
            negative_tokens: self.vocabulary_size(Polarity::Negative)?,
        })
    }
}

#[cfg(test)]
impl CounterStore {
    pub(crate) fn connection_for_test(&self) -> MutexGuard<'_, Connection> {
        self.lock().unwrap()
    }
}

fn uninitialized(name: CounterName) -> Error {
    Error::InvalidArgument(format!("counter {} does not exist; store not initialized", name))
}
