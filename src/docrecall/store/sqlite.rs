//! SQLite-backed [`TableStore`].
//!
//! One database file holds all five tables. Values are always bound as
//! parameters; table names are spliced from [`Table::name`] only.
//!
//! Each table's byte footprint is measured once, on first use, and from then
//! on kept current by the delta of every write and delete. A write is made
//! inside a transaction and rolled back with `CapacityExhausted` if the new
//! footprint would exceed the table's allocation, so a write never scans the
//! table. `usage` measures afresh and resynchronizes the tracked value.

use super::{row_size, Capacities, NewRow, Row, RowMeta, TableStore, TableUsage, ROW_OVERHEAD_BYTES};
use crate::error::{StoreError, StoreResult};
use crate::model::{SessionKey, Table};
use crate::schema::{TableSpec, UniqueKey};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stored size of a row, matching [`row_size`].
const ROW_BYTES_SQL: &str =
    "LENGTH(CAST(session_id AS BLOB)) + LENGTH(CAST(value AS BLOB))";

struct Db {
    conn: Connection,
    footprints: HashMap<Table, u64>,
}

impl Db {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            footprints: HashMap::new(),
        }
    }

    fn used_bytes(&mut self, table: Table) -> StoreResult<u64> {
        if let Some(bytes) = self.footprints.get(&table) {
            return Ok(*bytes);
        }
        let (_, bytes) = footprint(&self.conn, table)?;
        self.footprints.insert(table, bytes);
        Ok(bytes)
    }

    fn released(&mut self, table: Table, bytes: u64) {
        if let Some(used) = self.footprints.get_mut(&table) {
            *used = used.saturating_sub(bytes);
        }
    }
}

pub struct SqliteStore {
    db: Option<Mutex<Db>>,
    capacities: Capacities,
}

impl SqliteStore {
    /// Open the database at `path`. A database that cannot be opened yields a
    /// store on which every operation fails with `Unavailable`.
    pub fn open(path: &Path, capacities: Capacities) -> Self {
        match Self::try_open(path, capacities) {
            Ok(store) => store,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "Store unavailable");
                Self {
                    db: None,
                    capacities,
                }
            }
        }
    }

    pub fn try_open(path: &Path, capacities: Capacities) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(backend)?;
        Ok(Self {
            db: Some(Mutex::new(Db::new(conn))),
            capacities,
        })
    }

    pub fn open_in_memory(capacities: Capacities) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Ok(Self {
            db: Some(Mutex::new(Db::new(conn))),
            capacities,
        })
    }

    pub fn is_available(&self) -> bool {
        self.db.is_some()
    }

    fn db(&self) -> StoreResult<MutexGuard<'_, Db>> {
        self.db
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
            .ok_or(StoreError::Unavailable)
    }

    /// Insert without any uniqueness constraint, as databases created before
    /// the session constraint allowed. Creates the table unconstrained if missing.
    pub fn insert_legacy(&self, table: Table, row: &NewRow) -> StoreResult<i64> {
        let mut db = self.db()?;
        db.footprints.remove(&table);
        db.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {t} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    value TEXT NOT NULL,
                    timestamp INTEGER NOT NULL
                );",
                t = table.name()
            ))
            .map_err(|e| classify(table, e))?;
        db.conn
            .execute(
                &format!(
                    "INSERT INTO {} (session_id, value, timestamp) VALUES (?1, ?2, ?3)",
                    table.name()
                ),
                params![row.session.as_str(), row.value, row.timestamp],
            )
            .map_err(|e| classify(table, e))?;
        Ok(db.conn.last_insert_rowid())
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Map a native SQLite failure onto the tagged store error.
fn classify(table: Table, err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict { table }
        }
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::DiskFull => {
            StoreError::CapacityExhausted { table }
        }
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table") => {
            StoreError::MissingTable { table }
        }
        _ => backend(err),
    }
}

/// Row count and byte footprint of the whole table. Scans every row.
fn footprint(conn: &Connection, table: Table) -> StoreResult<(u64, u64)> {
    let sql = format!(
        "SELECT COUNT(*), COALESCE(SUM({bytes} + {overhead}), 0) FROM {t}",
        bytes = ROW_BYTES_SQL,
        overhead = ROW_OVERHEAD_BYTES,
        t = table.name()
    );
    let (rows, bytes): (i64, i64) = conn
        .query_row(&sql, [], |r| Ok((r.get(0)?, r.get(1)?)))
        .map_err(|e| classify(table, e))?;
    Ok((rows as u64, bytes as u64))
}

/// Delete with `condition`, returning how many rows and bytes went.
fn delete_where<P: Params>(
    conn: &Connection,
    table: Table,
    condition: &str,
    params: P,
) -> StoreResult<(usize, u64)> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "DELETE FROM {t} WHERE {condition} RETURNING {bytes} + {overhead}",
            t = table.name(),
            bytes = ROW_BYTES_SQL,
            overhead = ROW_OVERHEAD_BYTES,
        ))
        .map_err(|e| classify(table, e))?;
    let sizes = stmt
        .query_map(params, |r| r.get::<_, i64>(0))
        .map_err(|e| classify(table, e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| classify(table, e))?;
    Ok((sizes.len(), sizes.iter().map(|b| *b as u64).sum()))
}

fn to_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok(Row {
        id: r.get(0)?,
        session: SessionKey::new(r.get::<_, String>(1)?),
        value: r.get(2)?,
        timestamp: r.get(3)?,
    })
}

impl TableStore for SqliteStore {
    fn create_table(&self, spec: &TableSpec) -> StoreResult<()> {
        let mut db = self.db()?;
        let (session_unique, timestamp_unique) = match spec.unique {
            UniqueKey::Session => (" UNIQUE", ""),
            UniqueKey::Timestamp => ("", " UNIQUE"),
        };
        let name = spec.table.name();
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL{session_unique},
                value TEXT NOT NULL,
                timestamp INTEGER NOT NULL{timestamp_unique}
            );"
        );
        if spec.unique == UniqueKey::Timestamp {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{name}_session ON {name}(session_id);"
            ));
        }
        db.footprints.remove(&spec.table);
        db.conn
            .execute_batch(&sql)
            .map_err(|e| classify(spec.table, e))
    }

    fn drop_table(&self, table: Table) -> StoreResult<()> {
        let mut db = self.db()?;
        db.footprints.remove(&table);
        db.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", table.name()))
            .map_err(|e| classify(table, e))
    }

    fn has_table(&self, table: Table) -> bool {
        let Ok(db) = self.db() else {
            return false;
        };
        db.conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table.name()],
                |r| r.get::<_, i64>(0),
            )
            .map(|n| n > 0)
            .unwrap_or(false)
    }

    fn insert(&self, table: Table, row: &NewRow) -> StoreResult<i64> {
        let mut guard = self.db()?;
        let db = &mut *guard;
        let used = db.used_bytes(table)?;
        let after = used + row_size(row.session, row.value);

        let tx = db.conn.transaction().map_err(|e| classify(table, e))?;
        tx.execute(
            &format!(
                "INSERT INTO {} (session_id, value, timestamp) VALUES (?1, ?2, ?3)",
                table.name()
            ),
            params![row.session.as_str(), row.value, row.timestamp],
        )
        .map_err(|e| classify(table, e))?;
        let id = tx.last_insert_rowid();
        if after > self.capacities.for_table(table) {
            tx.rollback().map_err(|e| classify(table, e))?;
            return Err(StoreError::CapacityExhausted { table });
        }
        tx.commit().map_err(|e| classify(table, e))?;

        db.footprints.insert(table, after);
        Ok(id)
    }

    fn update(
        &self,
        table: Table,
        session: &SessionKey,
        value: &str,
        timestamp: i64,
    ) -> StoreResult<usize> {
        let mut guard = self.db()?;
        let db = &mut *guard;
        let used = db.used_bytes(table)?;

        let tx = db.conn.transaction().map_err(|e| classify(table, e))?;
        let replaced: i64 = tx
            .query_row(
                &format!(
                    "SELECT COALESCE(SUM({bytes} + {overhead}), 0) FROM {t} WHERE session_id = ?1",
                    bytes = ROW_BYTES_SQL,
                    overhead = ROW_OVERHEAD_BYTES,
                    t = table.name()
                ),
                params![session.as_str()],
                |r| r.get(0),
            )
            .map_err(|e| classify(table, e))?;
        let changed = tx
            .execute(
                &format!(
                    "UPDATE {} SET value = ?1, timestamp = ?2 WHERE session_id = ?3",
                    table.name()
                ),
                params![value, timestamp, session.as_str()],
            )
            .map_err(|e| classify(table, e))?;
        let after =
            (used + changed as u64 * row_size(session, value)).saturating_sub(replaced as u64);
        if after > self.capacities.for_table(table) {
            tx.rollback().map_err(|e| classify(table, e))?;
            return Err(StoreError::CapacityExhausted { table });
        }
        tx.commit().map_err(|e| classify(table, e))?;

        db.footprints.insert(table, after);
        Ok(changed)
    }

    fn select(&self, table: Table, session: &SessionKey) -> StoreResult<Vec<Row>> {
        let db = self.db()?;
        let mut stmt = db
            .conn
            .prepare(&format!(
                "SELECT id, session_id, value, timestamp FROM {}
                 WHERE session_id = ?1 ORDER BY timestamp DESC, id DESC",
                table.name()
            ))
            .map_err(|e| classify(table, e))?;
        let rows = stmt
            .query_map(params![session.as_str()], to_row)
            .map_err(|e| classify(table, e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| classify(table, e))?;
        Ok(rows)
    }

    fn select_at(
        &self,
        table: Table,
        session: &SessionKey,
        timestamp: i64,
    ) -> StoreResult<Option<Row>> {
        let db = self.db()?;
        db.conn
            .query_row(
                &format!(
                    "SELECT id, session_id, value, timestamp FROM {}
                     WHERE session_id = ?1 AND timestamp = ?2
                     ORDER BY id DESC LIMIT 1",
                    table.name()
                ),
                params![session.as_str(), timestamp],
                to_row,
            )
            .optional()
            .map_err(|e| classify(table, e))
    }

    fn rows(&self, table: Table) -> StoreResult<Vec<RowMeta>> {
        let db = self.db()?;
        let mut stmt = db
            .conn
            .prepare(&format!(
                "SELECT id, session_id, timestamp, {bytes} + {overhead}
                 FROM {t} ORDER BY timestamp ASC, id ASC",
                bytes = ROW_BYTES_SQL,
                overhead = ROW_OVERHEAD_BYTES,
                t = table.name()
            ))
            .map_err(|e| classify(table, e))?;
        let rows = stmt
            .query_map([], |r| {
                Ok(RowMeta {
                    id: r.get(0)?,
                    session: SessionKey::new(r.get::<_, String>(1)?),
                    timestamp: r.get(2)?,
                    bytes: r.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(|e| classify(table, e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| classify(table, e))?;
        Ok(rows)
    }

    fn delete_session(&self, table: Table, session: &SessionKey) -> StoreResult<usize> {
        let mut db = self.db()?;
        let (removed, bytes) =
            delete_where(&db.conn, table, "session_id = ?1", params![session.as_str()])?;
        db.released(table, bytes);
        Ok(removed)
    }

    fn delete_at(&self, table: Table, session: &SessionKey, timestamp: i64) -> StoreResult<usize> {
        let mut db = self.db()?;
        let (removed, bytes) = delete_where(
            &db.conn,
            table,
            "session_id = ?1 AND timestamp = ?2",
            params![session.as_str(), timestamp],
        )?;
        db.released(table, bytes);
        Ok(removed)
    }

    fn delete_ids(&self, table: Table, ids: &[i64]) -> StoreResult<usize> {
        let mut guard = self.db()?;
        let db = &mut *guard;
        let tx = db.conn.transaction().map_err(|e| classify(table, e))?;
        let (mut removed, mut bytes) = (0, 0);
        for id in ids {
            let (n, b) = delete_where(&tx, table, "id = ?1", params![id])?;
            removed += n;
            bytes += b;
        }
        tx.commit().map_err(|e| classify(table, e))?;
        db.released(table, bytes);
        Ok(removed)
    }

    fn usage(&self, table: Table) -> StoreResult<TableUsage> {
        let mut db = self.db()?;
        let (rows, bytes) = footprint(&db.conn, table)?;
        db.footprints.insert(table, bytes);
        Ok(TableUsage {
            table,
            rows,
            bytes,
            capacity: self.capacities.for_table(table),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::row_size;
    use tempfile::tempdir;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory(Capacities::default()).unwrap();
        for table in Table::ALL {
            store.create_table(&TableSpec::for_table(table)).unwrap();
        }
        store
    }

    fn row<'a>(session: &'a SessionKey, value: &'a str, timestamp: i64) -> NewRow<'a> {
        NewRow {
            session,
            value,
            timestamp,
        }
    }

    #[test]
    fn creates_all_tables_idempotently() {
        let store = store();
        for table in Table::ALL {
            assert!(store.has_table(table));
            store.create_table(&TableSpec::for_table(table)).unwrap();
        }
    }

    #[test]
    fn duplicate_session_is_a_conflict() {
        let store = store();
        let a = SessionKey::from("/a.js");
        store.insert(Table::ScrollPos, &row(&a, "v1", 1)).unwrap();

        assert_eq!(
            store.insert(Table::ScrollPos, &row(&a, "v2", 2)).unwrap_err(),
            StoreError::Conflict { table: Table::ScrollPos }
        );
        assert_eq!(store.update(Table::ScrollPos, &a, "v2", 2).unwrap(), 1);

        let rows = store.select(Table::ScrollPos, &a).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "v2");
        assert_eq!(rows[0].timestamp, 2);
    }

    #[test]
    fn duplicate_timestamp_is_a_conflict_in_local_history() {
        let store = store();
        let a = SessionKey::from("/a.js");
        let b = SessionKey::from("/b.js");
        store.insert(Table::LocalHistory, &row(&a, "v1", 100)).unwrap();
        store.insert(Table::LocalHistory, &row(&a, "v2", 200)).unwrap();
        assert!(matches!(
            store.insert(Table::LocalHistory, &row(&b, "v3", 200)),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn select_orders_newest_first() {
        let store = store();
        let a = SessionKey::from("/a.js");
        for ts in [300, 100, 200] {
            store.insert(Table::LocalHistory, &row(&a, "v", ts)).unwrap();
        }
        let order: Vec<i64> = store
            .select(Table::LocalHistory, &a)
            .unwrap()
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(order, vec![300, 200, 100]);
        assert!(store.select_at(Table::LocalHistory, &a, 200).unwrap().is_some());
        assert!(store.select_at(Table::LocalHistory, &a, 250).unwrap().is_none());
    }

    #[test]
    fn over_capacity_insert_is_rolled_back() {
        let a = SessionKey::from("/a");
        let cap = row_size(&a, "0123456789");
        let store = SqliteStore::open_in_memory(Capacities::uniform(cap)).unwrap();
        store
            .create_table(&TableSpec::for_table(Table::LocalHistory))
            .unwrap();

        store.insert(Table::LocalHistory, &row(&a, "0123456789", 1)).unwrap();
        assert_eq!(
            store.insert(Table::LocalHistory, &row(&a, "x", 2)).unwrap_err(),
            StoreError::CapacityExhausted { table: Table::LocalHistory }
        );

        let usage = store.usage(Table::LocalHistory).unwrap();
        assert_eq!(usage.rows, 1);
        assert_eq!(usage.bytes, cap);
    }

    #[test]
    fn values_are_bound_not_spliced() {
        let store = store();
        let a = SessionKey::from("/it's \"quoted\"; DROP TABLE cursorpos_coords; --");
        store
            .insert(Table::CursorPos, &row(&a, "'); DELETE FROM x; --", 1))
            .unwrap();
        assert!(store.has_table(Table::CursorPos));
        assert_eq!(
            store.select(Table::CursorPos, &a).unwrap()[0].value,
            "'); DELETE FROM x; --"
        );
    }

    #[test]
    fn missing_table_is_tagged() {
        let store = SqliteStore::open_in_memory(Capacities::default()).unwrap();
        let a = SessionKey::from("/a");
        assert_eq!(
            store.insert(Table::CursorPos, &row(&a, "v", 1)).unwrap_err(),
            StoreError::MissingTable { table: Table::CursorPos }
        );
        assert_eq!(
            store.select(Table::LocalHistory, &a).unwrap_err(),
            StoreError::MissingTable { table: Table::LocalHistory }
        );
    }

    #[test]
    fn drop_table_removes_rows_and_is_idempotent() {
        let store = store();
        let a = SessionKey::from("/a");
        store.insert(Table::LocalHistory, &row(&a, "v", 1)).unwrap();

        store.drop_table(Table::LocalHistory).unwrap();
        store.drop_table(Table::LocalHistory).unwrap();
        assert!(!store.has_table(Table::LocalHistory));
    }

    #[test]
    fn deletes_by_session_timestamp_and_id() {
        let store = store();
        let a = SessionKey::from("/a");
        let b = SessionKey::from("/b");
        store.insert(Table::LocalHistory, &row(&a, "v", 1)).unwrap();
        store.insert(Table::LocalHistory, &row(&a, "v", 2)).unwrap();
        let id = store.insert(Table::LocalHistory, &row(&b, "v", 3)).unwrap();

        assert_eq!(store.delete_at(Table::LocalHistory, &a, 1).unwrap(), 1);
        assert_eq!(store.delete_ids(Table::LocalHistory, &[id]).unwrap(), 1);
        assert_eq!(store.delete_session(Table::LocalHistory, &a).unwrap(), 1);
        assert!(store.rows(Table::LocalHistory).unwrap().is_empty());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("change_history.db");
        let a = SessionKey::from("/a.js");
        {
            let store = SqliteStore::try_open(&path, Capacities::default()).unwrap();
            store
                .create_table(&TableSpec::for_table(Table::UnsavedDocChanges))
                .unwrap();
            store
                .insert(Table::UnsavedDocChanges, &row(&a, "payload", 7))
                .unwrap();
        }
        let store = SqliteStore::open(&path, Capacities::default());
        assert!(store.is_available());
        assert_eq!(store.select(Table::UnsavedDocChanges, &a).unwrap()[0].value, "payload");
    }

    #[test]
    fn unopenable_database_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("db");
        let store = SqliteStore::open(&path, Capacities::default());

        assert!(!store.is_available());
        assert!(!store.has_table(Table::CursorPos));
        assert_eq!(
            store
                .create_table(&TableSpec::for_table(Table::CursorPos))
                .unwrap_err(),
            StoreError::Unavailable
        );
    }

    #[test]
    fn legacy_table_accepts_duplicate_sessions() {
        let store = SqliteStore::open_in_memory(Capacities::default()).unwrap();
        let a = SessionKey::from("/a");
        store.insert_legacy(Table::CursorPos, &row(&a, "old", 1)).unwrap();
        store.insert_legacy(Table::CursorPos, &row(&a, "new", 2)).unwrap();
        assert_eq!(store.select(Table::CursorPos, &a).unwrap().len(), 2);
    }

    fn tracked(store: &SqliteStore, table: Table) -> Option<u64> {
        store.db().unwrap().footprints.get(&table).copied()
    }

    #[test]
    fn tracked_footprint_follows_every_write_and_delete() {
        let store = store();
        let table = Table::LocalHistory;
        let a = SessionKey::from("/a.js");
        let b = SessionKey::from("/b.js");

        store.insert(table, &row(&a, "first", 1)).unwrap();
        store.insert(table, &row(&a, "second value", 2)).unwrap();
        let id = store.insert(table, &row(&b, "third", 3)).unwrap();
        store.insert(table, &row(&b, "fourth", 4)).unwrap();
        store.delete_at(table, &a, 1).unwrap();
        store.update(table, &a, "shorter", 6).unwrap();
        store.delete_ids(table, &[id]).unwrap();

        let expected = row_size(&a, "shorter") + row_size(&b, "fourth");
        assert_eq!(tracked(&store, table), Some(expected));
        assert_eq!(store.usage(table).unwrap().bytes, expected);

        store.delete_session(table, &b).unwrap();
        assert_eq!(tracked(&store, table), Some(row_size(&a, "shorter")));
    }

    #[test]
    fn over_capacity_update_is_rolled_back() {
        let a = SessionKey::from("/a");
        let cap = row_size(&a, "0123456789");
        let store = SqliteStore::open_in_memory(Capacities::uniform(cap)).unwrap();
        store
            .create_table(&TableSpec::for_table(Table::CursorPos))
            .unwrap();

        store.insert(Table::CursorPos, &row(&a, "short", 1)).unwrap();
        assert_eq!(
            store
                .update(Table::CursorPos, &a, "much longer than ten", 2)
                .unwrap_err(),
            StoreError::CapacityExhausted { table: Table::CursorPos }
        );
        assert_eq!(store.select(Table::CursorPos, &a).unwrap()[0].value, "short");
        assert_eq!(tracked(&store, Table::CursorPos), Some(row_size(&a, "short")));

        assert_eq!(store.update(Table::CursorPos, &a, "0123456789", 3).unwrap(), 1);
        assert_eq!(store.usage(Table::CursorPos).unwrap().bytes, cap);
    }

    #[test]
    fn capacity_check_uses_tracked_footprint() {
        let a = SessionKey::from("/a");
        let b = SessionKey::from("/b");
        let cap = row_size(&a, "v") * 2;
        let store = SqliteStore::open_in_memory(Capacities::uniform(cap)).unwrap();
        store
            .create_table(&TableSpec::for_table(Table::ScrollPos))
            .unwrap();
        store.insert(Table::ScrollPos, &row(&a, "v", 1)).unwrap();

        // Written behind the store's back, so only a table scan would see it.
        store
            .db()
            .unwrap()
            .conn
            .execute(
                "INSERT INTO scrollpos_coords (session_id, value, timestamp) VALUES ('/x', 'v', 9)",
                [],
            )
            .unwrap();
        store.insert(Table::ScrollPos, &row(&b, "v", 2)).unwrap();
        assert_eq!(tracked(&store, Table::ScrollPos), Some(cap));

        // A fresh measurement resynchronizes, after which the table is over.
        assert_eq!(store.usage(Table::ScrollPos).unwrap().rows, 3);
        store.delete_session(Table::ScrollPos, &b).unwrap();
        assert_eq!(tracked(&store, Table::ScrollPos), Some(cap));
        assert!(matches!(
            store.insert(Table::ScrollPos, &row(&b, "v", 3)),
            Err(StoreError::CapacityExhausted { .. })
        ));
    }
}
