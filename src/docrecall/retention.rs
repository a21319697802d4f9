//! # Retention
//!
//! Two ways rows leave the store outside of explicit user deletion:
//!
//! - **Session purge**: a document became clean, so its hot-close rows are
//!   removed from every hot-close table.
//! - **Capacity eviction**: an insert did not fit, so rows are removed until
//!   at least that insert's size is free.
//!
//! ## Eviction Order
//!
//! Local history first trims every session down to its most recent
//! `snapshots_per_session` snapshots. If that did not free enough, the
//! globally oldest snapshots go next.
//!
//! Hot-close tables evict whole sessions, least recently touched first. A
//! session is evicted from all four hot-close tables at once so its recovered
//! state is never half a document. The session being written is never chosen.

use crate::error::StoreError;
use crate::model::{SessionKey, Table};
use crate::store::{RowMeta, TableStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_SNAPSHOTS_PER_SESSION: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvictionReport {
    pub table: Option<Table>,
    pub rows_removed: usize,
    pub bytes_freed: u64,
    /// Hot-close sessions evicted whole.
    pub sessions: Vec<SessionKey>,
}

pub struct RetentionPolicy<S: TableStore> {
    store: Arc<S>,
    snapshots_per_session: usize,
}

impl<S: TableStore> Clone for RetentionPolicy<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            snapshots_per_session: self.snapshots_per_session,
        }
    }
}

impl<S: TableStore> RetentionPolicy<S> {
    pub fn new(store: Arc<S>, snapshots_per_session: usize) -> Self {
        Self {
            store,
            snapshots_per_session: snapshots_per_session.max(1),
        }
    }

    pub fn snapshots_per_session(&self) -> usize {
        self.snapshots_per_session
    }

    /// Remove every row of `session` from `tables`. Tables that fail are
    /// skipped. Returns the number of rows removed.
    pub fn purge_session(&self, session: &SessionKey, tables: &[Table]) -> usize {
        let mut removed = 0;
        for &table in tables {
            match self.store.delete_session(table, session) {
                Ok(n) => removed += n,
                Err(StoreError::MissingTable { .. }) => {}
                Err(err) if err.is_unavailable() => {
                    tracing::debug!(table = %table, session = %session, "Purge skipped, store unavailable");
                }
                Err(err) => {
                    tracing::warn!(table = %table, session = %session, error = %err, "Purge failed");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(session = %session, rows = removed, "Purged session");
        }
        removed
    }

    /// Free at least `needed_bytes` in `table`, or as much as the table holds.
    pub fn evict(&self, table: Table, needed_bytes: u64, writer: &SessionKey) -> EvictionReport {
        let rows = match self.store.rows(table) {
            Ok(rows) => rows,
            Err(err) => {
                if err.is_unavailable() {
                    tracing::debug!(table = %table, "Eviction skipped, store unavailable");
                } else {
                    tracing::warn!(table = %table, error = %err, "Eviction could not list rows");
                }
                return EvictionReport {
                    table: Some(table),
                    ..Default::default()
                };
            }
        };

        let report = if table.is_hot_close() {
            self.evict_sessions(table, rows, needed_bytes, writer)
        } else {
            self.evict_snapshots(table, rows, needed_bytes)
        };

        tracing::info!(
            table = %table,
            rows = report.rows_removed,
            bytes = report.bytes_freed,
            "Evicted rows"
        );
        report
    }

    fn evict_snapshots(&self, table: Table, rows: Vec<RowMeta>, needed: u64) -> EvictionReport {
        // rows are oldest first, so walking backwards counts each session's newest first
        let mut seen: HashMap<&SessionKey, usize> = HashMap::new();
        let mut excess = HashSet::new();
        for row in rows.iter().rev() {
            let count = seen.entry(&row.session).or_default();
            *count += 1;
            if *count > self.snapshots_per_session {
                excess.insert(row.id);
            }
        }

        let mut victims: Vec<&RowMeta> = rows.iter().filter(|r| excess.contains(&r.id)).collect();
        let mut freed: u64 = victims.iter().map(|r| r.bytes).sum();
        for row in rows.iter().filter(|r| !excess.contains(&r.id)) {
            if freed >= needed {
                break;
            }
            freed += row.bytes;
            victims.push(row);
        }

        self.remove(table, &victims, Vec::new())
    }

    fn evict_sessions(
        &self,
        table: Table,
        rows: Vec<RowMeta>,
        needed: u64,
        writer: &SessionKey,
    ) -> EvictionReport {
        let mut last_touch: HashMap<&SessionKey, i64> = HashMap::new();
        let mut bytes: HashMap<&SessionKey, u64> = HashMap::new();
        for row in &rows {
            let touch = last_touch.entry(&row.session).or_insert(row.timestamp);
            *touch = (*touch).max(row.timestamp);
            *bytes.entry(&row.session).or_default() += row.bytes;
        }

        let mut sessions: Vec<(&SessionKey, i64)> = last_touch
            .into_iter()
            .filter(|(s, _)| *s != writer)
            .collect();
        sessions.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let mut chosen = Vec::new();
        let mut freed = 0;
        for (session, _) in sessions {
            if freed >= needed {
                break;
            }
            freed += bytes.get(session).copied().unwrap_or(0);
            chosen.push(session.clone());
        }

        let victims: Vec<&RowMeta> = rows
            .iter()
            .filter(|r| chosen.contains(&r.session))
            .collect();
        let mut report = self.remove(table, &victims, chosen.clone());

        // the rest of each evicted session's hot-close state goes with it
        let others: Vec<Table> = Table::HOT_CLOSE
            .into_iter()
            .filter(|t| *t != table)
            .collect();
        for session in &chosen {
            report.rows_removed += self.purge_session(session, &others);
        }
        report
    }

    fn remove(&self, table: Table, victims: &[&RowMeta], sessions: Vec<SessionKey>) -> EvictionReport {
        let ids: Vec<i64> = victims.iter().map(|r| r.id).collect();
        let mut report = EvictionReport {
            table: Some(table),
            sessions,
            ..Default::default()
        };
        if ids.is_empty() {
            return report;
        }
        match self.store.delete_ids(table, &ids) {
            Ok(n) => {
                report.rows_removed = n;
                report.bytes_freed = victims.iter().map(|r| r.bytes).sum();
            }
            Err(err) => {
                tracing::warn!(table = %table, error = %err, "Eviction delete failed");
                report.sessions.clear();
            }
        }
        report
    }
}
