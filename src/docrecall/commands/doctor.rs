//! Consistency repair.
//!
//! Databases created without the session constraint can hold several rows per
//! session in a hot-close table. Doctor keeps the newest row of each session
//! and deletes the rest, then recreates any table an enabled feature is missing.

use super::{CmdMessage, CmdResult, Engine};
use crate::model::{Scope, SessionKey, Table};
use crate::store::{RowMeta, TableStore};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    pub duplicates_removed: usize,
    pub tables_recreated: Vec<Table>,
}

/// Ids of every row that is not its session's newest, by (timestamp, id).
fn stale_ids(rows: &[RowMeta]) -> Vec<i64> {
    let mut newest: HashMap<&SessionKey, &RowMeta> = HashMap::new();
    for row in rows {
        let entry = newest.entry(&row.session).or_insert(row);
        if (row.timestamp, row.id) > (entry.timestamp, entry.id) {
            *entry = row;
        }
    }
    rows.iter()
        .filter(|r| newest.get(&r.session).is_some_and(|keep| keep.id != r.id))
        .map(|r| r.id)
        .collect()
}

pub fn scan<S: TableStore>(engine: &Engine<S>) -> DoctorReport {
    let mut report = DoctorReport::default();

    for scope in [Scope::HotClose, Scope::LocalHistory] {
        if !engine.enabled(scope) {
            continue;
        }
        let missing: Vec<Table> = scope
            .tables()
            .iter()
            .copied()
            .filter(|t| !engine.store.has_table(*t))
            .collect();
        if !missing.is_empty() {
            report.tables_recreated = engine.schema.ensure_scope(scope).ready;
            report.tables_recreated.retain(|t| missing.contains(t));
        }
    }

    for table in Table::HOT_CLOSE {
        let Ok(rows) = engine.store.rows(table) else {
            continue;
        };
        let stale = stale_ids(&rows);
        if stale.is_empty() {
            continue;
        }
        match engine.store.delete_ids(table, &stale) {
            Ok(n) => {
                tracing::info!(table = %table, rows = n, "Removed duplicate rows");
                report.duplicates_removed += n;
            }
            Err(err) => tracing::warn!(table = %table, error = %err, "Could not remove duplicates"),
        }
    }

    report
}

pub fn run<S: TableStore>(engine: &Engine<S>) -> CmdResult {
    let report = scan(engine);
    let mut result = CmdResult::default();

    if report.duplicates_removed == 0 && report.tables_recreated.is_empty() {
        result.add_message(CmdMessage::success("No inconsistencies found."));
        return result;
    }

    result.add_message(CmdMessage::warning("Inconsistencies found and fixed:"));
    if report.duplicates_removed > 0 {
        result.add_message(CmdMessage::info(format!(
            "  - Removed {} duplicate hot-close row(s).",
            report.duplicates_removed
        )));
    }
    for table in &report.tables_recreated {
        result.add_message(CmdMessage::info(format!("  - Recreated missing table {}.", table)));
    }
    result.removed = report.duplicates_removed;
    result
}
