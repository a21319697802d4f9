//! # Storage Layer
//!
//! This module defines the storage abstraction for docrecall. The [`TableStore`]
//! trait is the only surface the engine touches, so the engine never sees a
//! backend-specific error code: every failure comes back as a tagged
//! [`StoreError`](crate::error::StoreError).
//!
//! ## Bounded Tables
//!
//! Every table has a fixed byte allocation ([`Capacities`]). A write that would
//! push a table past its allocation is rejected with `CapacityExhausted` and
//! leaves the table untouched. Eviction is the engine's job (see
//! [`retention`](crate::retention)), not the store's.
//!
//! ## Row Shape
//!
//! ```text
//! (id INTEGER autoincrement, session_id TEXT, value TEXT, timestamp INTEGER)
//! ```
//!
//! - Hot-close tables: `session_id` is unique, `timestamp` is the last time the
//!   row was written (used for least-recently-touched eviction).
//! - Local history: `timestamp` is the unique capture time, `session_id` repeats.
//!
//! ## Implementations
//!
//! - [`sqlite::SqliteStore`]: Production store on an embedded SQLite file.
//! - [`memory::InMemoryStore`]: For testing, with fault injection.
//!
//! ## Concurrency
//!
//! All methods take `&self`. Implementations serialize access internally, and
//! each call is its own atomic unit; nothing spans multiple calls.

use crate::error::StoreResult;
use crate::model::{SessionKey, Table};
use crate::schema::TableSpec;
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod sqlite;

/// Fixed per-row bookkeeping cost counted against a table's allocation.
pub const ROW_OVERHEAD_BYTES: u64 = 16;

pub const DEFAULT_TABLE_BYTES: u64 = 200 * 1024 * 1024;

/// Bytes a row occupies against its table's allocation.
pub fn row_size(session: &SessionKey, value: &str) -> u64 {
    session.as_str().len() as u64 + value.len() as u64 + ROW_OVERHEAD_BYTES
}

/// Storage allocation per table, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacities {
    pub hot_close_table_bytes: u64,
    pub local_history_table_bytes: u64,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            hot_close_table_bytes: DEFAULT_TABLE_BYTES,
            local_history_table_bytes: DEFAULT_TABLE_BYTES,
        }
    }
}

impl Capacities {
    pub fn uniform(bytes: u64) -> Self {
        Self {
            hot_close_table_bytes: bytes,
            local_history_table_bytes: bytes,
        }
    }

    pub fn for_table(&self, table: Table) -> u64 {
        if table.is_hot_close() {
            self.hot_close_table_bytes
        } else {
            self.local_history_table_bytes
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewRow<'a> {
    pub session: &'a SessionKey,
    pub value: &'a str,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i64,
    pub session: SessionKey,
    pub value: String,
    pub timestamp: i64,
}

/// A row without its payload, for retention decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMeta {
    pub id: i64,
    pub session: SessionKey,
    pub timestamp: i64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableUsage {
    pub table: Table,
    pub rows: u64,
    pub bytes: u64,
    pub capacity: u64,
}

/// Abstract interface for bounded-table storage.
pub trait TableStore: Send + Sync {
    /// Create the table if it does not exist yet.
    fn create_table(&self, spec: &TableSpec) -> StoreResult<()>;

    /// Drop the table with all its rows. Dropping a missing table is not an error.
    fn drop_table(&self, table: Table) -> StoreResult<()>;

    fn has_table(&self, table: Table) -> bool;

    /// Insert a row, returning its id.
    /// Fails with `Conflict` on a uniqueness violation and with
    /// `CapacityExhausted` if the row does not fit.
    fn insert(&self, table: Table, row: &NewRow) -> StoreResult<i64>;

    /// Overwrite value and timestamp of every row for `session`. Returns rows changed.
    fn update(&self, table: Table, session: &SessionKey, value: &str, timestamp: i64)
        -> StoreResult<usize>;

    /// All rows for a session, newest first.
    fn select(&self, table: Table, session: &SessionKey) -> StoreResult<Vec<Row>>;

    fn select_at(&self, table: Table, session: &SessionKey, timestamp: i64)
        -> StoreResult<Option<Row>>;

    /// Every row in the table without payloads, oldest first.
    fn rows(&self, table: Table) -> StoreResult<Vec<RowMeta>>;

    fn delete_session(&self, table: Table, session: &SessionKey) -> StoreResult<usize>;

    fn delete_at(&self, table: Table, session: &SessionKey, timestamp: i64) -> StoreResult<usize>;

    fn delete_ids(&self, table: Table, ids: &[i64]) -> StoreResult<usize>;

    fn usage(&self, table: Table) -> StoreResult<TableUsage>;
}
