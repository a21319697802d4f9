//! # Upsert
//!
//! A write is one insert into one table. Two failures are recoverable:
//!
//! - `Conflict` on a hot-close table: the session already has a row, so the
//!   write becomes an update of that row ("latest wins").
//! - `CapacityExhausted`: the retention policy evicts synchronously and the
//!   same write is attempted exactly once more. A second failure abandons the
//!   write. Nothing is queued or retried later.
//!
//! Every other failure abandons the write. Nothing here returns `Err`; the
//! outcome says what happened.

use crate::error::StoreError;
use crate::model::{SessionKey, Table};
use crate::retention::{EvictionReport, RetentionPolicy};
use crate::store::{row_size, NewRow, TableStore};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Inserted,
    Updated,
    /// The value could not be encoded, so nothing reached the store.
    EncodeFailed(String),
    /// The feature owning the table is turned off.
    Disabled,
    Abandoned(StoreError),
}

impl WriteStatus {
    pub fn is_stored(&self) -> bool {
        matches!(self, WriteStatus::Inserted | WriteStatus::Updated)
    }
}

impl Serialize for WriteStatus {
    fn serialize<Ser: serde::Serializer>(&self, s: Ser) -> Result<Ser::Ok, Ser::Error> {
        match self {
            WriteStatus::Inserted => s.serialize_str("inserted"),
            WriteStatus::Updated => s.serialize_str("updated"),
            WriteStatus::Disabled => s.serialize_str("disabled"),
            WriteStatus::EncodeFailed(reason) => s.serialize_str(&format!("encode failed: {reason}")),
            WriteStatus::Abandoned(err) => s.serialize_str(&format!("abandoned: {err}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub table: Table,
    pub status: WriteStatus,
    /// Present when the write hit the table's allocation.
    pub eviction: Option<EvictionReport>,
}

impl WriteOutcome {
    pub fn new(table: Table, status: WriteStatus) -> Self {
        Self {
            table,
            status,
            eviction: None,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.status.is_stored()
    }
}

pub struct Upserter<S: TableStore> {
    store: Arc<S>,
    retention: RetentionPolicy<S>,
}

impl<S: TableStore> Clone for Upserter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            retention: self.retention.clone(),
        }
    }
}

impl<S: TableStore> Upserter<S> {
    pub fn new(store: Arc<S>, retention: RetentionPolicy<S>) -> Self {
        Self { store, retention }
    }

    /// Write an already encoded value for `session` into `table`.
    pub fn write(&self, table: Table, session: &SessionKey, value: &str, timestamp: i64) -> WriteOutcome {
        let row = NewRow {
            session,
            value,
            timestamp,
        };

        let first = self.attempt(table, &row);
        let outcome = match first {
            Ok(status) => WriteOutcome::new(table, status),
            Err(StoreError::CapacityExhausted { .. }) => {
                let deficit = self.deficit(table, row_size(session, value));
                let eviction = self.retention.evict(table, deficit, session);
                let status = match self.attempt(table, &row) {
                    Ok(status) => status,
                    Err(err) => WriteStatus::Abandoned(err),
                };
                WriteOutcome {
                    table,
                    status,
                    eviction: Some(eviction),
                }
            }
            Err(err) => WriteOutcome::new(table, WriteStatus::Abandoned(err)),
        };

        match &outcome.status {
            WriteStatus::Abandoned(err @ (StoreError::MissingTable { .. } | StoreError::Unavailable)) => {
                tracing::debug!(table = %table, session = %session, error = %err, "Write skipped");
            }
            WriteStatus::Abandoned(err) => {
                tracing::warn!(table = %table, session = %session, error = %err, "Write abandoned");
            }
            status => {
                tracing::debug!(table = %table, session = %session, status = ?status, "Upserted");
            }
        }
        outcome
    }

    /// Bytes that must go before a row of `incoming` bytes fits. The table
    /// can be over its allocation already, after the allocation was lowered.
    fn deficit(&self, table: Table, incoming: u64) -> u64 {
        match self.store.usage(table) {
            Ok(usage) => match (usage.bytes + incoming).saturating_sub(usage.capacity) {
                0 => incoming,
                over => over,
            },
            Err(_) => incoming,
        }
    }

    fn attempt(&self, table: Table, row: &NewRow) -> Result<WriteStatus, StoreError> {
        match self.store.insert(table, row) {
            Ok(_) => Ok(WriteStatus::Inserted),
            Err(StoreError::Conflict { .. }) if table.is_hot_close() => {
                match self.store.update(table, row.session, row.value, row.timestamp)? {
                    0 => Err(StoreError::Backend(format!(
                        "Conflicting row for '{}' vanished before update",
                        row.session
                    ))),
                    _ => Ok(WriteStatus::Updated),
                }
            }
            Err(err) => Err(err),
        }
    }
}
