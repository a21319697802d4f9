//! Table definitions and startup creation.
//!
//! Creation is idempotent and never fatal: a table that cannot be created is
//! logged and reported, and writes to it later resolve as `MissingTable`.

use crate::error::StoreError;
use crate::model::{Features, Scope, Table};
use crate::store::TableStore;
use std::sync::Arc;

/// The column carrying the table's uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    Session,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub table: Table,
    pub unique: UniqueKey,
}

impl TableSpec {
    pub fn for_table(table: Table) -> Self {
        let unique = if table.is_hot_close() {
            UniqueKey::Session
        } else {
            UniqueKey::Timestamp
        };
        Self { table, unique }
    }
}

#[derive(Debug, Default)]
pub struct SchemaReport {
    pub ready: Vec<Table>,
    pub failed: Vec<(Table, StoreError)>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge(&mut self, other: SchemaReport) {
        self.ready.extend(other.ready);
        self.failed.extend(other.failed);
    }
}

pub struct SchemaManager<S: TableStore> {
    store: Arc<S>,
}

impl<S: TableStore> Clone for SchemaManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: TableStore> SchemaManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ensure the tables of every enabled feature exist.
    pub fn initialize(&self, features: Features) -> SchemaReport {
        let mut report = SchemaReport::default();
        for scope in [Scope::HotClose, Scope::LocalHistory] {
            if features.enabled(scope) {
                report.merge(self.ensure_scope(scope));
            }
        }
        report
    }

    pub fn ensure_scope(&self, scope: Scope) -> SchemaReport {
        let mut report = SchemaReport::default();
        for &table in scope.tables() {
            match self.store.create_table(&TableSpec::for_table(table)) {
                Ok(()) => report.ready.push(table),
                Err(err) => {
                    if err.is_unavailable() {
                        tracing::debug!(table = %table, "Table not created, store unavailable");
                    } else {
                        tracing::warn!(table = %table, error = %err, "Could not create table");
                    }
                    report.failed.push((table, err));
                }
            }
        }
        report
    }

    /// Drop every table of the scope. Returns the tables that failed to drop.
    pub fn drop_scope(&self, scope: Scope) -> Vec<(Table, StoreError)> {
        let mut failed = Vec::new();
        for &table in scope.tables() {
            if let Err(err) = self.store.drop_table(table) {
                if err.is_unavailable() {
                    tracing::debug!(table = %table, "Table not dropped, store unavailable");
                } else {
                    tracing::warn!(table = %table, error = %err, "Could not drop table");
                }
                failed.push((table, err));
            }
        }
        failed
    }
}
